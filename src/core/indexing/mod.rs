//! Transcript Indexing
//!
//! Tokenizes transcripts into normalized terms, computes per-term relevance
//! weights for an event, and merges them into the inverted index. The same
//! tokenizer is shared with the search engine so queries and documents are
//! normalized identically.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

mod indexer;
mod tokenizer;

pub use indexer::Indexer;
pub use tokenizer::Tokenizer;

/// Tokens shorter than this are discarded by default
pub const DEFAULT_MIN_TOKEN_LEN: usize = 3;

/// Default stop words: high-frequency function words that carry no
/// relevance signal in meeting transcripts
pub const DEFAULT_STOP_WORDS: &[&str] = &[
    "the", "and", "for", "that", "this", "with", "are", "was", "were", "will", "have", "has",
    "had", "not", "but", "from", "they", "them", "their", "there", "been", "being", "would",
    "should", "could", "about", "into", "than", "then", "also", "all", "any", "our", "out",
    "who", "what", "when", "where", "which", "how", "why", "you", "your",
];

/// Tokenizer configuration shared by the indexer and the search engine
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexingConfig {
    /// Minimum kept token length
    #[serde(default = "default_min_token_len")]
    pub min_token_len: usize,
    /// Tokens discarded outright
    #[serde(default = "default_stop_words")]
    pub stop_words: BTreeSet<String>,
}

fn default_min_token_len() -> usize {
    DEFAULT_MIN_TOKEN_LEN
}

fn default_stop_words() -> BTreeSet<String> {
    DEFAULT_STOP_WORDS.iter().map(|w| w.to_string()).collect()
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            min_token_len: default_min_token_len(),
            stop_words: default_stop_words(),
        }
    }
}

impl IndexingConfig {
    /// A configuration that keeps every token; used by tests that need exact
    /// token counts
    pub fn keep_all() -> Self {
        Self {
            min_token_len: 1,
            stop_words: BTreeSet::new(),
        }
    }
}
