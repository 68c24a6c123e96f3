//! Single-pass or map-reduce summarization over transcript chunks.

use crate::chunking::Chunk;
use crate::prompts::PromptBuilder;
use pg_llm::TextGenerator;
use std::sync::Arc;

pub const SUMMARY_FALLBACK: &str = "Could not generate summary.";

#[derive(Clone)]
pub struct Summarizer {
    generator: Arc<dyn TextGenerator>,
    prompts: Arc<PromptBuilder>,
}

impl Summarizer {
    pub fn new(generator: Arc<dyn TextGenerator>, prompts: Arc<PromptBuilder>) -> Self {
        Self { generator, prompts }
    }

    /// One chunk: one call. N > 1 chunks: N sequential map calls in chunk
    /// order, then one reduce call. The first backend error aborts the run.
    /// Empty final output becomes [`SUMMARY_FALLBACK`].
    #[tracing::instrument(level = "info", skip_all, fields(chunk_count = chunks.len(), model = %self.generator.model()))]
    pub async fn summarize(&self, chunks: &[Chunk]) -> pg_llm::Result<String> {
        let output = match chunks {
            [] => String::new(),
            [only] => {
                tracing::debug!(
                    chunk_lines = only.lines().len(),
                    chunk_chars = only.size(),
                    "single-pass summary"
                );
                self.generator
                    .generate(&self.prompts.summary(&only.text()))
                    .await?
            }
            _ => {
                let total = chunks.len();
                let mut partials = Vec::with_capacity(total);
                for (i, chunk) in chunks.iter().enumerate() {
                    let prompt = self.prompts.chunk_summary(&chunk.text(), i + 1, total);
                    let partial = self.generator.generate(&prompt).await?;
                    tracing::debug!(
                        chunk = i + 1,
                        total,
                        chunk_lines = chunk.lines().len(),
                        chunk_chars = chunk.size(),
                        partial_chars = partial.chars().count(),
                        "map phase chunk summarized"
                    );
                    partials.push(partial);
                }
                self.generator
                    .generate(&self.prompts.reduce(&partials.join("\n")))
                    .await?
            }
        };

        if output.is_empty() {
            tracing::warn!("summary generation returned no text");
            return Ok(SUMMARY_FALLBACK.to_string());
        }
        Ok(output)
    }
}
