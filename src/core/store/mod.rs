//! Structured Store
//!
//! A minimal relational capability set over the tables `body`, `event`,
//! `transcript`, and `index_entry`, polymorphic over the storage engine. Any
//! document or relational database can back [`StructuredStore`] provided it
//! can enforce per-event atomic multi-row replace; the crate ships a SQLite
//! variant.

use serde_json::Value;

use crate::core::model::{Event, EventMatch, EventStatus, IndexEntry, Transcript};
use crate::core::{CoreError, CoreResult};

mod sqlite;

pub use sqlite::SqliteStore;

/// A row as a JSON field mapping
pub type Row = serde_json::Map<String, Value>;

// =============================================================================
// Table Registry
// =============================================================================

/// The fixed relational schema the core operates over
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Table {
    Body,
    Event,
    Transcript,
    IndexEntry,
}

impl Table {
    /// Parses a table name; rejects unknown tables with a validation error
    pub fn parse(name: &str) -> CoreResult<Self> {
        match name {
            "body" => Ok(Table::Body),
            "event" => Ok(Table::Event),
            "transcript" => Ok(Table::Transcript),
            "index_entry" => Ok(Table::IndexEntry),
            other => Err(CoreError::Validation(format!("Unknown table: {}", other))),
        }
    }

    /// SQL table name
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Body => "body",
            Table::Event => "event",
            Table::Transcript => "transcript",
            Table::IndexEntry => "index_entry",
        }
    }

    /// (row field, column) pairs for this table
    pub(crate) fn columns(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Table::Body => &[("id", "id"), ("name", "name"), ("isActive", "is_active")],
            Table::Event => &[
                ("id", "id"),
                ("bodyId", "body_id"),
                ("scheduledStart", "scheduled_start"),
                ("sourceUri", "source_uri"),
                ("videoHash", "video_hash"),
                ("videoLocator", "video_locator"),
                ("audioLocator", "audio_locator"),
                ("status", "status"),
            ],
            Table::Transcript => &[
                ("transcriptId", "transcript_id"),
                ("eventId", "event_id"),
                ("seq", "seq"),
                ("startSec", "start_sec"),
                ("endSec", "end_sec"),
                ("text", "text"),
                ("confidence", "confidence"),
            ],
            Table::IndexEntry => &[
                ("term", "term"),
                ("eventId", "event_id"),
                ("weight", "weight"),
            ],
        }
    }

    /// The natural key the generic `upsert` is keyed by.
    ///
    /// For `event` this is the source video's content hash, which is the
    /// system's primary deduplication mechanism.
    pub(crate) fn natural_key(&self) -> (&'static str, &'static str) {
        match self {
            Table::Body => ("id", "id"),
            Table::Event => ("videoHash", "video_hash"),
            Table::Transcript => ("transcriptId", "transcript_id"),
            Table::IndexEntry => ("term", "term"),
        }
    }

    /// Natural sort for `select`; `None` means insertion order
    pub(crate) fn order_by(&self) -> Option<&'static str> {
        match self {
            // Events sort most recent first.
            Table::Event => Some("scheduled_start DESC"),
            _ => None,
        }
    }
}

// =============================================================================
// Structured Store Trait
// =============================================================================

/// Polymorphic structured storage for the ingestion pipeline and search.
///
/// The generic `insert` / `upsert` / `select` operations expose the schema
/// as row mappings; the typed operations are the pipeline's and search
/// engine's fast paths and carry the store's atomicity obligations:
/// `replace_index_entries` must be atomic per event (a reader never observes
/// a partially updated index), and `transition_event` is the conditional
/// state advance that serves as the per-event advisory lock.
pub trait StructuredStore: Send + Sync {
    /// Inserts a row, generating an id when the table has one.
    ///
    /// Returns the row's primary key.
    fn insert(&self, table: Table, row: Row) -> CoreResult<String>;

    /// Inserts or replaces the row(s) keyed by the table's natural key
    fn upsert(&self, table: Table, key: &str, row: Row) -> CoreResult<()>;

    /// Selects rows matching all equality filters.
    ///
    /// Ordering is insertion order unless the table defines a natural sort
    /// key (events sort by scheduled start time descending).
    fn select(&self, table: Table, filter: &[(&str, Value)]) -> CoreResult<Vec<Row>>;

    /// Creates a newly discovered event.
    ///
    /// Fails with `CoreError::Conflict` when another worker created an event
    /// for the same video hash first.
    fn create_event(&self, event: &Event) -> CoreResult<()>;

    /// Loads an event by id; `CoreError::NotFound` when absent
    fn load_event(&self, event_id: &str) -> CoreResult<Event>;

    /// Looks an event up by its source video content hash
    fn load_event_by_hash(&self, video_hash: &str) -> CoreResult<Option<Event>>;

    /// Advances an event's status only if the recorded status still matches
    /// `expected`. Returns `Ok(false)` when the guard fails, which means
    /// another worker owns the event.
    fn transition_event(
        &self,
        event_id: &str,
        expected: &EventStatus,
        next: &EventStatus,
    ) -> CoreResult<bool>;

    /// Records content-store locators on an event; `None` leaves a locator
    /// unchanged
    fn record_locators(
        &self,
        event_id: &str,
        video: Option<&str>,
        audio: Option<&str>,
    ) -> CoreResult<()>;

    /// Persists a transcript, superseding any prior transcript of the same
    /// event, atomically
    fn save_transcript(&self, transcript: &Transcript) -> CoreResult<()>;

    /// Loads the current transcript for an event, if any
    fn load_transcript(&self, event_id: &str) -> CoreResult<Option<Transcript>>;

    /// Replaces an event's index entries atomically (delete-then-insert in
    /// one transaction). Returns the number of entries written.
    fn replace_index_entries(&self, event_id: &str, entries: &[IndexEntry]) -> CoreResult<usize>;

    /// All index entries for a term, in a deterministic order
    fn entries_for_term(&self, term: &str) -> CoreResult<Vec<IndexEntry>>;

    /// Index entries for all given terms, read as one consistent snapshot:
    /// a reindex committing concurrently is observed either for every term
    /// or for none, never mixed. Entries are grouped by term in input order.
    fn entries_for_terms(&self, terms: &[String]) -> CoreResult<Vec<IndexEntry>>;

    /// Relevance-ranked search over this store's own read path.
    ///
    /// Read-only; an empty result set is a normal outcome.
    fn search_events(&self, query_text: &str, limit: usize) -> CoreResult<Vec<EventMatch>>;
}

/// Direct structured access bypassing search ranking: selects rows from a
/// table by name, as a list of row mappings.
pub fn select_rows_as_list(
    store: &dyn StructuredStore,
    table_name: &str,
    filter: &[(&str, Value)],
) -> CoreResult<Vec<Row>> {
    store.select(Table::parse(table_name)?, filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_parse_known_names() {
        assert_eq!(Table::parse("body").unwrap(), Table::Body);
        assert_eq!(Table::parse("event").unwrap(), Table::Event);
        assert_eq!(Table::parse("transcript").unwrap(), Table::Transcript);
        assert_eq!(Table::parse("index_entry").unwrap(), Table::IndexEntry);
    }

    #[test]
    fn test_table_parse_rejects_unknown() {
        let result = Table::parse("minutes");
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_event_natural_key_is_video_hash() {
        assert_eq!(Table::Event.natural_key(), ("videoHash", "video_hash"));
    }
}
