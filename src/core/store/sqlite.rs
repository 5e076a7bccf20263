//! SQLite Structured Store
//!
//! SQLite-backed implementation of [`StructuredStore`]. The connection is
//! wrapped in a mutex so one store can be shared across worker tasks; all
//! multi-row mutations (transcript supersede, index entry replace) run
//! inside a transaction so concurrent readers never observe partial state
//! for an event.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;

use crate::core::indexing::IndexingConfig;
use crate::core::model::{Event, EventMatch, EventStatus, IndexEntry, Transcript, TranscriptSegment};
use crate::core::search::SearchEngine;
use crate::core::{CoreError, CoreResult};

use super::{Row, StructuredStore, Table};

// =============================================================================
// SQLite Store
// =============================================================================

/// SQLite-backed structured store
pub struct SqliteStore {
    conn: Mutex<Connection>,
    /// Tokenizer configuration shared with the indexer, so `search_events`
    /// tokenizes queries identically to indexing
    indexing: IndexingConfig,
}

impl SqliteStore {
    /// Creates (or opens) a store at the given path and initializes the schema
    pub fn create<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let conn = Connection::open(path).map_err(db_err)?;
        let store = Self {
            conn: Mutex::new(conn),
            indexing: IndexingConfig::default(),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Creates an in-memory store (for testing)
    pub fn in_memory() -> CoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        let store = Self {
            conn: Mutex::new(conn),
            indexing: IndexingConfig::default(),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Overrides the tokenizer configuration used by `search_events`
    pub fn with_indexing_config(mut self, config: IndexingConfig) -> Self {
        self.indexing = config;
        self
    }

    fn init_schema(&self) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            -- Governing bodies
            CREATE TABLE IF NOT EXISTS body (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1
            );

            -- Meeting events; video_hash is the dedup key
            CREATE TABLE IF NOT EXISTS event (
                id TEXT PRIMARY KEY,
                body_id TEXT NOT NULL,
                scheduled_start TEXT NOT NULL,
                source_uri TEXT NOT NULL,
                video_hash TEXT NOT NULL UNIQUE,
                video_locator TEXT,
                audio_locator TEXT,
                status TEXT NOT NULL
            );

            -- Transcript segments, one row per spoken segment
            CREATE TABLE IF NOT EXISTS transcript (
                transcript_id TEXT NOT NULL,
                event_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                start_sec REAL NOT NULL,
                end_sec REAL NOT NULL,
                text TEXT NOT NULL,
                confidence REAL NOT NULL,
                PRIMARY KEY (transcript_id, seq)
            );

            -- Inverted index: at most one entry per (term, event)
            CREATE TABLE IF NOT EXISTS index_entry (
                term TEXT NOT NULL,
                event_id TEXT NOT NULL,
                weight REAL NOT NULL,
                PRIMARY KEY (term, event_id)
            );

            CREATE INDEX IF NOT EXISTS idx_event_body ON event(body_id);
            CREATE INDEX IF NOT EXISTS idx_transcript_event ON transcript(event_id);
            CREATE INDEX IF NOT EXISTS idx_index_entry_event ON index_entry(event_id);
            "#,
        )
        .map_err(db_err)?;
        Ok(())
    }
}

// =============================================================================
// Value Conversion
// =============================================================================

fn db_err(e: rusqlite::Error) -> CoreError {
    if let rusqlite::Error::SqliteFailure(err, _) = &e {
        if err.code == rusqlite::ErrorCode::ConstraintViolation {
            return CoreError::Conflict(e.to_string());
        }
    }
    CoreError::Database(e.to_string())
}

fn to_sql_value(value: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;
    match value {
        Value::Null => Sql::Null,
        Value::Bool(b) => Sql::Integer(*b as i64),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Sql::Integer(i)
            } else {
                Sql::Real(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => Sql::Text(s.clone()),
        // Structured values (e.g. event status) are stored as JSON text.
        other => Sql::Text(other.to_string()),
    }
}

fn from_sql_ref(value: rusqlite::types::ValueRef<'_>) -> Value {
    use rusqlite::types::ValueRef;
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(_) => Value::Null,
    }
}

fn status_to_text(status: &EventStatus) -> CoreResult<String> {
    Ok(serde_json::to_string(status)?)
}

fn status_from_text(text: &str) -> CoreResult<EventStatus> {
    serde_json::from_str(text)
        .map_err(|e| CoreError::Database(format!("Corrupt event status '{}': {}", text, e)))
}

fn datetime_from_text(text: &str) -> CoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CoreError::Database(format!("Corrupt timestamp '{}': {}", text, e)))
}

/// Raw event columns as read from SQLite, before status/timestamp decoding
struct RawEvent {
    id: String,
    body_id: String,
    scheduled_start: String,
    source_uri: String,
    video_hash: String,
    video_locator: Option<String>,
    audio_locator: Option<String>,
    status: String,
}

impl RawEvent {
    const COLUMNS: &'static str = "id, body_id, scheduled_start, source_uri, video_hash, \
                                   video_locator, audio_locator, status";

    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            body_id: row.get(1)?,
            scheduled_start: row.get(2)?,
            source_uri: row.get(3)?,
            video_hash: row.get(4)?,
            video_locator: row.get(5)?,
            audio_locator: row.get(6)?,
            status: row.get(7)?,
        })
    }

    fn decode(self) -> CoreResult<Event> {
        Ok(Event {
            id: self.id,
            body_id: self.body_id,
            scheduled_start: datetime_from_text(&self.scheduled_start)?,
            source_uri: self.source_uri,
            video_hash: self.video_hash,
            video_locator: self.video_locator,
            audio_locator: self.audio_locator,
            status: status_from_text(&self.status)?,
        })
    }
}

// =============================================================================
// StructuredStore Implementation
// =============================================================================

impl SqliteStore {
    /// Row field holding the generated id, where the table has one
    fn id_field(table: Table) -> Option<(&'static str, &'static str)> {
        match table {
            Table::Body | Table::Event => Some(("id", "id")),
            Table::Transcript => Some(("transcriptId", "transcript_id")),
            Table::IndexEntry => None,
        }
    }

    /// Validates the row's fields, fills in a generated id where the table
    /// has one, and computes the row's primary key. No storage mutation.
    fn prepare_row(table: Table, mut row: Row) -> CoreResult<(Row, String)> {
        let columns = table.columns();

        for key in row.keys() {
            if !columns.iter().any(|(field, _)| field == key) {
                return Err(CoreError::Validation(format!(
                    "Unknown field '{}' for table {}",
                    key,
                    table.as_str()
                )));
            }
        }

        let id_field = Self::id_field(table).map(|(field, _)| field);
        if let Some(field) = id_field {
            row.entry(field.to_string())
                .or_insert_with(|| Value::String(ulid::Ulid::new().to_string()));
        }

        let primary_key = match table {
            Table::IndexEntry => format!(
                "{}:{}",
                row.get("term").and_then(Value::as_str).unwrap_or_default(),
                row.get("eventId").and_then(Value::as_str).unwrap_or_default()
            ),
            _ => row
                .get(id_field.unwrap_or("id"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        };

        Ok((row, primary_key))
    }

    /// Executes the insert for a prepared row on the given connection scope
    fn insert_row(conn: &Connection, table: Table, row: &Row) -> CoreResult<()> {
        let present: Vec<(&str, &str)> = table
            .columns()
            .iter()
            .filter(|(field, _)| row.contains_key(*field))
            .map(|&(field, col)| (field, col))
            .collect();
        let col_list = present
            .iter()
            .map(|(_, col)| *col)
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=present.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let values: Vec<rusqlite::types::Value> = present
            .iter()
            .map(|(field, _)| to_sql_value(&row[*field]))
            .collect();

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table.as_str(),
            col_list,
            placeholders
        );
        conn.execute(&sql, rusqlite::params_from_iter(values))
            .map_err(db_err)?;
        Ok(())
    }
}

impl StructuredStore for SqliteStore {
    fn insert(&self, table: Table, row: Row) -> CoreResult<String> {
        let (row, primary_key) = Self::prepare_row(table, row)?;
        let conn = self.conn.lock().unwrap();
        Self::insert_row(&conn, table, &row)?;
        Ok(primary_key)
    }

    fn upsert(&self, table: Table, key: &str, row: Row) -> CoreResult<()> {
        let (key_field, key_col) = table.natural_key();
        let mut row = row;
        row.insert(key_field.to_string(), Value::String(key.to_string()));

        // Delete-then-insert keyed by the natural key, in one transaction:
        // re-running ingestion on the same source replaces rather than
        // duplicates, a rejected row leaves the existing one intact, and a
        // concurrent reader never observes the row missing.
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(db_err)?;

        // Keep the replaced row's id so child rows keyed by it stay attached.
        if let Some((id_row_field, id_col)) = Self::id_field(table) {
            if !row.contains_key(id_row_field) {
                let existing: Option<String> = tx
                    .query_row(
                        &format!(
                            "SELECT {} FROM {} WHERE {} = ?1",
                            id_col,
                            table.as_str(),
                            key_col
                        ),
                        [key],
                        |r| r.get(0),
                    )
                    .optional()
                    .map_err(db_err)?;
                if let Some(id) = existing {
                    row.insert(id_row_field.to_string(), Value::String(id));
                }
            }
        }

        let (row, _) = Self::prepare_row(table, row)?;
        tx.execute(
            &format!("DELETE FROM {} WHERE {} = ?1", table.as_str(), key_col),
            [key],
        )
        .map_err(db_err)?;
        Self::insert_row(&tx, table, &row)?;
        tx.commit().map_err(db_err)?;
        Ok(())
    }

    fn select(&self, table: Table, filter: &[(&str, Value)]) -> CoreResult<Vec<Row>> {
        let columns = table.columns();

        let mut clauses = Vec::new();
        let mut values = Vec::new();
        for (field, value) in filter {
            let col = columns
                .iter()
                .find(|(f, _)| f == field)
                .map(|(_, c)| *c)
                .ok_or_else(|| {
                    CoreError::Validation(format!(
                        "Unknown filter field '{}' for table {}",
                        field,
                        table.as_str()
                    ))
                })?;
            values.push(to_sql_value(value));
            clauses.push(format!("{} = ?{}", col, values.len()));
        }

        let col_list = columns
            .iter()
            .map(|(_, col)| *col)
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!("SELECT {} FROM {}", col_list, table.as_str());
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(table.order_by().unwrap_or("rowid"));

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(values), |sql_row| {
                let mut row = Row::new();
                for (idx, (field, col)) in columns.iter().enumerate() {
                    let mut value = from_sql_ref(sql_row.get_ref(idx)?);
                    // Status is stored as JSON text; surface it structured.
                    if *col == "status" {
                        if let Value::String(text) = &value {
                            if let Ok(parsed) = serde_json::from_str::<Value>(text) {
                                value = parsed;
                            }
                        }
                    }
                    if !value.is_null() {
                        row.insert((*field).to_string(), value);
                    }
                }
                Ok(row)
            })
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        Ok(rows)
    }

    fn create_event(&self, event: &Event) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO event (id, body_id, scheduled_start, source_uri, video_hash, \
             video_locator, audio_locator, status) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                event.id,
                event.body_id,
                event.scheduled_start.to_rfc3339(),
                event.source_uri,
                event.video_hash,
                event.video_locator,
                event.audio_locator,
                status_to_text(&event.status)?,
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn load_event(&self, event_id: &str) -> CoreResult<Event> {
        let conn = self.conn.lock().unwrap();
        let raw = conn
            .query_row(
                &format!("SELECT {} FROM event WHERE id = ?1", RawEvent::COLUMNS),
                [event_id],
                RawEvent::read,
            )
            .optional()
            .map_err(db_err)?
            .ok_or_else(|| CoreError::NotFound(format!("event {}", event_id)))?;
        raw.decode()
    }

    fn load_event_by_hash(&self, video_hash: &str) -> CoreResult<Option<Event>> {
        let conn = self.conn.lock().unwrap();
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {} FROM event WHERE video_hash = ?1",
                    RawEvent::COLUMNS
                ),
                [video_hash],
                RawEvent::read,
            )
            .optional()
            .map_err(db_err)?;
        raw.map(RawEvent::decode).transpose()
    }

    fn transition_event(
        &self,
        event_id: &str,
        expected: &EventStatus,
        next: &EventStatus,
    ) -> CoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE event SET status = ?1 WHERE id = ?2 AND status = ?3",
                rusqlite::params![
                    status_to_text(next)?,
                    event_id,
                    status_to_text(expected)?
                ],
            )
            .map_err(db_err)?;
        Ok(changed == 1)
    }

    fn record_locators(
        &self,
        event_id: &str,
        video: Option<&str>,
        audio: Option<&str>,
    ) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE event SET video_locator = COALESCE(?1, video_locator), \
                 audio_locator = COALESCE(?2, audio_locator) WHERE id = ?3",
                rusqlite::params![video, audio, event_id],
            )
            .map_err(db_err)?;
        if changed == 0 {
            return Err(CoreError::NotFound(format!("event {}", event_id)));
        }
        Ok(())
    }

    fn save_transcript(&self, transcript: &Transcript) -> CoreResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(db_err)?;

        // Supersede any prior transcript of this event.
        tx.execute(
            "DELETE FROM transcript WHERE event_id = ?1",
            [&transcript.event_id],
        )
        .map_err(db_err)?;

        for (seq, segment) in transcript.segments.iter().enumerate() {
            tx.execute(
                "INSERT INTO transcript (transcript_id, event_id, seq, start_sec, end_sec, \
                 text, confidence) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    transcript.id,
                    transcript.event_id,
                    seq as i64,
                    segment.start_sec,
                    segment.end_sec,
                    segment.text,
                    segment.confidence,
                ],
            )
            .map_err(db_err)?;
        }

        tx.commit().map_err(db_err)?;
        Ok(())
    }

    fn load_transcript(&self, event_id: &str) -> CoreResult<Option<Transcript>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT transcript_id, start_sec, end_sec, text, confidence \
                 FROM transcript WHERE event_id = ?1 ORDER BY seq",
            )
            .map_err(db_err)?;

        let mut transcript_id = None;
        let segments = stmt
            .query_map([event_id], |row| {
                let id: String = row.get(0)?;
                Ok((
                    id,
                    TranscriptSegment {
                        start_sec: row.get(1)?,
                        end_sec: row.get(2)?,
                        text: row.get(3)?,
                        confidence: row.get(4)?,
                    },
                ))
            })
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?
            .into_iter()
            .map(|(id, segment)| {
                transcript_id.get_or_insert(id);
                segment
            })
            .collect::<Vec<_>>();

        Ok(transcript_id.map(|id| Transcript {
            id,
            event_id: event_id.to_string(),
            segments,
        }))
    }

    fn replace_index_entries(&self, event_id: &str, entries: &[IndexEntry]) -> CoreResult<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(db_err)?;

        tx.execute("DELETE FROM index_entry WHERE event_id = ?1", [event_id])
            .map_err(db_err)?;

        for entry in entries {
            tx.execute(
                "INSERT INTO index_entry (term, event_id, weight) VALUES (?1, ?2, ?3)",
                rusqlite::params![entry.term, entry.event_id, entry.weight],
            )
            .map_err(db_err)?;
        }

        tx.commit().map_err(db_err)?;
        Ok(entries.len())
    }

    fn entries_for_term(&self, term: &str) -> CoreResult<Vec<IndexEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT term, event_id, weight FROM index_entry \
                 WHERE term = ?1 ORDER BY event_id",
            )
            .map_err(db_err)?;

        let entries = stmt
            .query_map([term], |row| {
                Ok(IndexEntry {
                    term: row.get(0)?,
                    event_id: row.get(1)?,
                    weight: row.get(2)?,
                })
            })
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        Ok(entries)
    }

    fn entries_for_terms(&self, terms: &[String]) -> CoreResult<Vec<IndexEntry>> {
        // One lock scope for the whole read: `replace_index_entries` needs
        // the same connection, so a reindex lands either before or after all
        // of these queries, never between two of them.
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT term, event_id, weight FROM index_entry \
                 WHERE term = ?1 ORDER BY event_id",
            )
            .map_err(db_err)?;

        let mut entries = Vec::new();
        for term in terms {
            let term_entries = stmt
                .query_map([term.as_str()], |row| {
                    Ok(IndexEntry {
                        term: row.get(0)?,
                        event_id: row.get(1)?,
                        weight: row.get(2)?,
                    })
                })
                .map_err(db_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(db_err)?;
            entries.extend(term_entries);
        }

        Ok(entries)
    }

    fn search_events(&self, query_text: &str, limit: usize) -> CoreResult<Vec<EventMatch>> {
        SearchEngine::new(self.indexing.clone()).search(self, query_text, limit)
    }
}

// =============================================================================
// Tests
// =============================================================================
