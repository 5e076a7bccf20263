//! Data Model
//!
//! Persistent records for governing bodies, meeting events, transcripts, and
//! the inverted index, plus the transient search result type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{BodyId, EventId, TimeSec, TranscriptId};

// =============================================================================
// Body
// =============================================================================

/// A governing sub-unit whose meetings are tracked (e.g., a committee).
///
/// Immutable once created; updated only on roster changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Body {
    /// Unique body ID (ULID)
    pub id: BodyId,
    /// Display name
    pub name: String,
    /// Whether the body is currently active
    pub is_active: bool,
}

impl Body {
    /// Creates a new active body
    pub fn new(name: &str) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            name: name.to_string(),
            is_active: true,
        }
    }
}

// =============================================================================
// Event Status
// =============================================================================

/// Per-event pipeline state.
///
/// Transitions move strictly forward (`Discovered` → `AudioExtracted` →
/// `Transcribed` → `Indexed`); `Failed` is terminal and reachable from any
/// non-terminal state. The recorded status is the source of truth for what
/// work remains after a crash or restart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum EventStatus {
    /// Meeting discovered, source video not yet processed
    Discovered,
    /// Audio derived from the source video and stored
    AudioExtracted,
    /// Transcript produced and durably persisted
    Transcribed,
    /// Transcript indexed; terminal success state
    Indexed,
    /// Terminal failure, recorded durably for operator inspection
    Failed { stage: String, reason: String },
}

impl EventStatus {
    /// Short state name for logging
    pub fn name(&self) -> &'static str {
        match self {
            EventStatus::Discovered => "discovered",
            EventStatus::AudioExtracted => "audioExtracted",
            EventStatus::Transcribed => "transcribed",
            EventStatus::Indexed => "indexed",
            EventStatus::Failed { .. } => "failed",
        }
    }

    /// Whether the event has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventStatus::Indexed | EventStatus::Failed { .. })
    }
}

// =============================================================================
// Event
// =============================================================================

/// One recorded meeting instance of a [`Body`].
///
/// `video_hash` (hex SHA-256 of the source video bytes) is the natural key:
/// re-discovering the same recording never creates a second event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Unique event ID (ULID)
    pub id: EventId,
    /// Owning body reference
    pub body_id: BodyId,
    /// Scheduled meeting start time
    pub scheduled_start: DateTime<Utc>,
    /// Where the source video came from (external URI)
    pub source_uri: String,
    /// Content hash of the source video; dedup key
    pub video_hash: String,
    /// Content-store locator of the stored video, once acquired
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_locator: Option<String>,
    /// Content-store locator of the derived audio, once extracted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_locator: Option<String>,
    /// Current pipeline state
    pub status: EventStatus,
}

impl Event {
    /// Creates a newly discovered event
    pub fn new(
        body_id: &str,
        scheduled_start: DateTime<Utc>,
        source_uri: &str,
        video_hash: &str,
    ) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            body_id: body_id.to_string(),
            scheduled_start,
            source_uri: source_uri.to_string(),
            video_hash: video_hash.to_string(),
            video_locator: None,
            audio_locator: None,
            status: EventStatus::Discovered,
        }
    }
}

// =============================================================================
// Transcript
// =============================================================================

/// Time-aligned textual rendering of an event's audio.
///
/// Owned exclusively by its event and immutable once written;
/// re-transcription produces a new transcript that supersedes the old one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    /// Unique transcript ID (ULID)
    pub id: TranscriptId,
    /// Owning event
    pub event_id: EventId,
    /// Spoken segments, ordered by start offset
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    /// Creates a transcript with segments
    pub fn with_segments(event_id: &str, segments: Vec<TranscriptSegment>) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            event_id: event_id.to_string(),
            segments,
        }
    }

    /// Returns the full text of the transcript
    pub fn full_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Whether the transcript contains no segments
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// A single spoken segment of a transcript
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptSegment {
    /// Start offset in seconds
    pub start_sec: TimeSec,
    /// End offset in seconds
    pub end_sec: TimeSec,
    /// Transcribed text
    pub text: String,
    /// Recognition confidence (0.0 - 1.0)
    pub confidence: f64,
}

impl TranscriptSegment {
    /// Creates a new transcript segment
    pub fn new(start_sec: TimeSec, end_sec: TimeSec, text: &str, confidence: f64) -> Self {
        Self {
            start_sec,
            end_sec,
            text: text.to_string(),
            confidence,
        }
    }

    /// Returns the duration of this segment
    pub fn duration(&self) -> TimeSec {
        self.end_sec - self.start_sec
    }
}

// =============================================================================
// Index Entry
// =============================================================================

/// A (term, event, weight) relevance record in the inverted index.
///
/// At most one entry exists per (term, event) pair; weight is the term's
/// frequency within the event's transcript normalized by transcript length,
/// so it always falls in (0, 1].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    /// Normalized token
    pub term: String,
    /// Owning event
    pub event_id: EventId,
    /// Relevance weight in (0, 1]
    pub weight: f64,
}

// =============================================================================
// Event Match
// =============================================================================

/// A transient search result pairing an event with a relevance score.
///
/// Produced only by the search engine; never persisted.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMatch {
    /// Matched event
    pub event: Event,
    /// Aggregate relevance score (sum of matched term weights)
    pub score: f64,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_creation() {
        let body = Body::new("Transportation Committee");
        assert!(!body.id.is_empty());
        assert_eq!(body.name, "Transportation Committee");
        assert!(body.is_active);
    }

    #[test]
    fn test_event_starts_discovered() {
        let event = Event::new("body_1", Utc::now(), "https://example.org/m.mp4", "abc123");
        assert_eq!(event.status, EventStatus::Discovered);
        assert!(event.video_locator.is_none());
        assert!(event.audio_locator.is_none());
    }

    #[test]
    fn test_status_terminality() {
        assert!(!EventStatus::Discovered.is_terminal());
        assert!(!EventStatus::Transcribed.is_terminal());
        assert!(EventStatus::Indexed.is_terminal());
        assert!(EventStatus::Failed {
            stage: "transcribe".to_string(),
            reason: "unsupported codec".to_string(),
        }
        .is_terminal());
    }

    #[test]
    fn test_status_serialization_is_tagged() {
        let json = serde_json::to_string(&EventStatus::Indexed).unwrap();
        assert!(json.contains("\"state\":\"indexed\""));

        let failed = EventStatus::Failed {
            stage: "index".to_string(),
            reason: "db down".to_string(),
        };
        let json = serde_json::to_string(&failed).unwrap();
        let parsed: EventStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, failed);
    }

    #[test]
    fn test_transcript_full_text() {
        let transcript = Transcript::with_segments(
            "event_1",
            vec![
                TranscriptSegment::new(0.0, 2.0, "Call to", 0.9),
                TranscriptSegment::new(2.0, 4.0, "order", 0.8),
            ],
        );
        assert_eq!(transcript.full_text(), "Call to order");
        assert!(!transcript.is_empty());
    }

    #[test]
    fn test_segment_duration() {
        let segment = TranscriptSegment::new(2.5, 7.5, "test", 1.0);
        assert_eq!(segment.duration(), 5.0);
    }
}
