//! Instruction templates sent to the generation backend.
//!
//! Every template asks for mention-free output with members named as plain
//! text, and for the requested output only.

use crate::glossary::SlangGlossary;

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    glossary_json: String,
    window_hours: u32,
}

impl PromptBuilder {
    pub fn new(glossary: &SlangGlossary, window_hours: u32) -> Self {
        Self {
            glossary_json: glossary.to_prompt_json(),
            window_hours,
        }
    }

    pub fn translation(&self, text: &str, target_language: &str) -> String {
        format!(
            "You are a highly accurate translator for informal chat. The input may be Hinglish \
(Hindi written in Latin letters mixed with English),\n\
with slang, abbreviations, and funny spellings. Translate into: {target_language}.\n\
\n\
Rules:\n\
- Preserve meaning, tone, and intent.\n\
- If the text is already in the target language, still rewrite it cleanly in the target language.\n\
- Expand/interpret Hinglish and phonetic Hindi correctly.\n\
- Do NOT use @mentions or ping formats; refer to people by plain text names.\n\
- Use this slang glossary when helpful:\n\
{glossary}\n\
\n\
Return ONLY the translated text. No extra commentary.\n\
\n\
Text:\n\
{text}",
            glossary = self.glossary_json,
        )
    }

    pub fn summary(&self, chat_block: &str) -> String {
        format!(
            "You are summarizing the last {hours} hours of a Discord channel. The content may \
include Hinglish + slang + funny spellings.\n\
\n\
Write a SHORT bullet-point summary.\n\
Requirements:\n\
- Use short bullets only (no long paragraphs).\n\
- When referring to members, use the plain text names shown in the chat lines.\n\
- Do NOT use @mentions or ping formats.\n\
- Capture key topics, decisions, and outcomes.\n\
- If there was a heated discussion/fight, mention which members were involved and what it \
was about, and what the outcome was.\n\
- Use this slang glossary when helpful:\n\
{glossary}\n\
\n\
Chat (chronological):\n\
{chat_block}\n\
\n\
Return ONLY bullets, each starting with \"- \".",
            hours = self.window_hours,
            glossary = self.glossary_json,
        )
    }

    /// Map-phase prompt for chunk `index` (1-based) of `total`.
    pub fn chunk_summary(&self, chat_block: &str, index: usize, total: usize) -> String {
        format!(
            "Summarize this subset of Discord chat into SHORT bullet points.\n\
Requirements:\n\
- Mention member names as plain text (no pings, no @mentions).\n\
- Keep who disagreed with whom, and about what.\n\
- Use this slang glossary when helpful:\n\
{glossary}\n\
\n\
Return ONLY bullets starting with \"- \".\n\
Chunk {index}/{total}:\n\
\n\
{chat_block}",
            glossary = self.glossary_json,
        )
    }

    /// Reduce-phase prompt over the newline-joined partial summaries.
    pub fn reduce(&self, partial_summaries: &str) -> String {
        format!(
            "Combine these partial summaries into ONE short bullet-point summary.\n\
Requirements:\n\
- Short bullets only\n\
- Mention member names as plain text (no pings)\n\
- Capture fights/disagreements and outcomes if present\n\
Return ONLY bullets starting with \"- \".\n\
\n\
Partial summaries:\n\
{partial_summaries}"
        )
    }
}
