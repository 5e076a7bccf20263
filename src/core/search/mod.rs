//! Search Engine
//!
//! Ranks events against free-text queries using the inverted index. The
//! score is intentionally a plain sum of matched term weights — predictable
//! and debuggable rather than precise. Read-only: querying never mutates
//! the index.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::core::indexing::{IndexingConfig, Tokenizer};
use crate::core::model::EventMatch;
use crate::core::store::StructuredStore;
use crate::core::{CoreResult, EventId};

/// Relevance-ranked search over a structured store's inverted index
#[derive(Clone, Debug)]
pub struct SearchEngine {
    tokenizer: Tokenizer,
}

impl SearchEngine {
    /// Creates a search engine; the configuration must match the one used
    /// at indexing time so queries tokenize identically
    pub fn new(config: IndexingConfig) -> Self {
        Self {
            tokenizer: Tokenizer::new(config),
        }
    }

    /// Ranks events against a free-text query.
    ///
    /// An event's score is the sum of its index weights for the distinct
    /// query terms; events matching no term are never returned. Results are
    /// ordered by descending score, ties broken by more recent scheduled
    /// start, and truncated to `limit`. All terms' entries are fetched in
    /// one store call so a concurrently committed reindex never contributes
    /// a mix of old and new weights to one score.
    pub fn search(
        &self,
        store: &dyn StructuredStore,
        query_text: &str,
        limit: usize,
    ) -> CoreResult<Vec<EventMatch>> {
        // Distinct terms, in a deterministic order.
        let terms: Vec<String> = self
            .tokenizer
            .tokenize(query_text)
            .into_iter()
            .collect::<BTreeSet<String>>()
            .into_iter()
            .collect();
        if terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let mut scores: HashMap<EventId, f64> = HashMap::new();
        for entry in store.entries_for_terms(&terms)? {
            *scores.entry(entry.event_id).or_insert(0.0) += entry.weight;
        }
        debug!("Query {:?}: {} candidate events", terms, scores.len());

        let mut matches = Vec::with_capacity(scores.len());
        for (event_id, score) in scores {
            let event = store.load_event(&event_id)?;
            matches.push(EventMatch { event, score });
        }

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.event.scheduled_start.cmp(&a.event.scheduled_start))
        });
        matches.truncate(limit);

        Ok(matches)
    }
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new(IndexingConfig::default())
    }
}

// =============================================================================
// Tests
// =============================================================================
