//! Reaction emoji → target language table.

#[derive(Debug, Clone)]
pub struct SupportedLanguages {
    entries: Vec<(String, String)>,
}

impl Default for SupportedLanguages {
    fn default() -> Self {
        Self::from_pairs([
            ("🇬🇧", "English"),
            ("🇺🇸", "English"),
            ("🇮🇳", "Hindi (Devanagari script)"),
            ("🇩🇪", "German"),
        ])
    }
}

impl SupportedLanguages {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            entries: pairs
                .into_iter()
                .map(|(emoji, language)| (emoji.to_string(), language.to_string()))
                .collect(),
        }
    }

    /// Exact match on the emoji's string form; anything else is unsupported.
    pub fn language_for(&self, emoji: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == emoji)
            .map(|(_, language)| language.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
