//! Term Tokenizer
//!
//! Normalizes free text into index terms: lowercase, punctuation stripped,
//! whitespace split, short and stop-listed tokens discarded.

use super::IndexingConfig;

/// Shared document/query tokenizer
#[derive(Clone, Debug)]
pub struct Tokenizer {
    config: IndexingConfig,
}

impl Tokenizer {
    /// Creates a tokenizer with the given configuration
    pub fn new(config: IndexingConfig) -> Self {
        Self { config }
    }

    /// Normalizes text into kept terms, in document order
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect::<String>()
            .split_whitespace()
            .filter(|token| {
                token.chars().count() >= self.config.min_token_len
                    && !self.config.stop_words.contains(*token)
            })
            .map(|token| token.to_string())
            .collect()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(IndexingConfig::default())
    }
}
