use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Model identifier used for requests, for logging.
    fn model(&self) -> &str;

    /// Send one prompt and return the generated text, trimmed.
    ///
    /// A response that carries no text (blocked prompt, empty candidate) is
    /// `Ok(String::new())`, not an error.
    async fn generate(&self, prompt: &str) -> Result<String>;
}
