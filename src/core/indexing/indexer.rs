//! Event Indexer
//!
//! Computes per-term relevance weights for one event's transcript and
//! replaces the event's entries in the inverted index atomically.

use std::collections::BTreeMap;

use tracing::info;

use crate::core::model::{IndexEntry, Transcript};
use crate::core::store::StructuredStore;
use crate::core::CoreResult;

use super::{IndexingConfig, Tokenizer};

/// Turns transcripts into inverted-index entries
#[derive(Clone, Debug)]
pub struct Indexer {
    tokenizer: Tokenizer,
}

impl Indexer {
    /// Creates an indexer with the given tokenizer configuration
    pub fn new(config: IndexingConfig) -> Self {
        Self {
            tokenizer: Tokenizer::new(config),
        }
    }

    /// Computes the index entries for a transcript without persisting them.
    ///
    /// Weight is the term's frequency within the transcript normalized by
    /// the total kept-token count, so each weight falls in (0, 1] and an
    /// identical transcript always produces identical entries.
    pub fn entries_for(&self, event_id: &str, transcript: &Transcript) -> Vec<IndexEntry> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut total = 0usize;

        for segment in &transcript.segments {
            for term in self.tokenizer.tokenize(&segment.text) {
                *counts.entry(term).or_insert(0) += 1;
                total += 1;
            }
        }

        if total == 0 {
            return Vec::new();
        }

        counts
            .into_iter()
            .map(|(term, count)| IndexEntry {
                term,
                event_id: event_id.to_string(),
                weight: count as f64 / total as f64,
            })
            .collect()
    }

    /// Indexes a transcript: replaces the event's prior index entries with
    /// freshly computed ones, atomically. Returns the number of entries
    /// written. Idempotent.
    pub fn index(
        &self,
        store: &dyn StructuredStore,
        event_id: &str,
        transcript: &Transcript,
    ) -> CoreResult<usize> {
        let entries = self.entries_for(event_id, transcript);
        let written = store.replace_index_entries(event_id, &entries)?;
        info!("Indexed event {}: {} terms", event_id, written);
        Ok(written)
    }
}

impl Default for Indexer {
    fn default() -> Self {
        Self::new(IndexingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::TranscriptSegment;
    use crate::core::store::SqliteStore;

    fn transcript_of(event_id: &str, texts: &[&str]) -> Transcript {
        let segments = texts
            .iter()
            .enumerate()
            .map(|(i, text)| TranscriptSegment::new(i as f64, i as f64 + 1.0, text, 0.9))
            .collect();
        Transcript::with_segments(event_id, segments)
    }

    #[test]
    fn test_weights_normalized_by_token_count() {
        let indexer = Indexer::new(IndexingConfig::keep_all());
        let transcript = transcript_of("event_1", &["bicycle bicycle lane", "bicycle"]);

        let entries = indexer.entries_for("event_1", &transcript);
        let bicycle = entries.iter().find(|e| e.term == "bicycle").unwrap();
        let lane = entries.iter().find(|e| e.term == "lane").unwrap();

        assert_eq!(bicycle.weight, 0.75);
        assert_eq!(lane.weight, 0.25);
    }

    #[test]
    fn test_weights_are_in_unit_interval() {
        let indexer = Indexer::default();
        let transcript = transcript_of("event_1", &["zoning variance approved for the parcel"]);

        for entry in indexer.entries_for("event_1", &transcript) {
            assert!(entry.weight > 0.0 && entry.weight <= 1.0);
        }
    }

    #[test]
    fn test_single_term_transcript_has_weight_one() {
        let indexer = Indexer::new(IndexingConfig::keep_all());
        let transcript = transcript_of("event_1", &["adjourned"]);

        let entries = indexer.entries_for("event_1", &transcript);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].weight, 1.0);
    }

    #[test]
    fn test_empty_transcript_yields_no_entries() {
        let indexer = Indexer::default();
        let transcript = Transcript::with_segments("event_1", vec![]);
        assert!(indexer.entries_for("event_1", &transcript).is_empty());
    }

    #[test]
    fn test_index_is_idempotent() {
        let store = SqliteStore::in_memory().unwrap();
        let indexer = Indexer::default();
        let transcript = transcript_of("event_1", &["bicycle lane funding", "bicycle safety"]);

        indexer.index(&store, "event_1", &transcript).unwrap();
        let first = store.entries_for_term("bicycle").unwrap();

        indexer.index(&store, "event_1", &transcript).unwrap();
        let second = store.entries_for_term("bicycle").unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn test_reindex_replaces_entries() {
        let store = SqliteStore::in_memory().unwrap();
        let indexer = Indexer::default();

        indexer
            .index(&store, "event_1", &transcript_of("event_1", &["bicycle lane"]))
            .unwrap();
        indexer
            .index(&store, "event_1", &transcript_of("event_1", &["transit budget"]))
            .unwrap();

        assert!(store.entries_for_term("bicycle").unwrap().is_empty());
        assert_eq!(store.entries_for_term("transit").unwrap().len(), 1);
    }
}
