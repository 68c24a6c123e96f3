//! Slang glossary: informal term → meaning, embedded in prompts.
//!
//! Loaded once at startup and shared read-only. Any failure to load yields an
//! empty glossary; the bot runs fine without one.

use serde_json::{Map, Value};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlangGlossary {
    entries: Map<String, Value>,
}

impl SlangGlossary {
    #[tracing::instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Self {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no slang glossary file; continuing without one");
                return Self::default();
            }
            Err(e) => {
                tracing::warn!(%e, "slang glossary unreadable; continuing without one");
                return Self::default();
            }
        };
        match Self::parse(&contents) {
            Ok(glossary) => {
                tracing::info!(terms = glossary.len(), "slang glossary loaded");
                glossary
            }
            Err(e) => {
                tracing::warn!(%e, "slang glossary invalid; continuing without one");
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        match serde_json::from_str::<Value>(contents)? {
            Value::Object(entries) => Ok(Self { entries }),
            other => Err(anyhow::anyhow!(
                "glossary must be a JSON object of term -> meaning, got {}",
                json_kind(&other)
            )),
        }
    }

    #[cfg(test)]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let entries = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), Value::String(v.into())))
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pretty JSON (two-space indent, file order, non-ASCII verbatim); `{}` when empty.
    pub fn to_prompt_json(&self) -> String {
        if self.is_empty() {
            return "{}".to_string();
        }
        serde_json::to_string_pretty(&self.entries).unwrap_or_else(|_| "{}".to_string())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
