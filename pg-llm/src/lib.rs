//! Generation backend client for Polyglot.
//!
//! Pure HTTP client around the Gemini `generateContent` endpoint. The bot only
//! ever needs "prompt in, text out", which is what [`TextGenerator`] exposes.

mod error;
mod gemini;
mod traits;
mod types;

pub use error::{LlmError, Result};
pub use gemini::{DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL, GeminiClient};
pub use traits::TextGenerator;
