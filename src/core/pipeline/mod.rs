//! Ingestion Pipeline
//!
//! Drives a meeting recording from discovery to searchability through the
//! per-event state machine: `Discovered` → `AudioExtracted` → `Transcribed`
//! → `Indexed`, with `Failed` as the terminal error state.
//!
//! The recorded event status is the only coordination mechanism between
//! workers: every stage finishes by attempting a guarded status transition,
//! and a worker whose guard fails backs off because another worker owns the
//! event. All stage outputs are persisted before the status that announces
//! them, so a crash at any point resumes cleanly from the recorded state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::core::content::{hash_bytes, ContentStore};
use crate::core::indexing::{Indexer, IndexingConfig};
use crate::core::model::{Event, EventStatus, Transcript};
use crate::core::store::StructuredStore;
use crate::core::transcription::TranscriptionProvider;
use crate::core::{CoreError, CoreResult, EventId};

use chrono::{DateTime, Utc};

// =============================================================================
// Pipeline Configuration
// =============================================================================

fn default_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    500
}

fn default_timeout_secs() -> u64 {
    600
}

fn default_concurrency() -> usize {
    num_cpus::get().clamp(1, 4)
}

/// Tunables for the ingestion pipeline
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Transcription attempts before the event is marked failed
    #[serde(default = "default_attempts")]
    pub max_transcription_attempts: u32,
    /// First retry delay; doubles on each subsequent retry
    #[serde(default = "default_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Per-attempt transcription deadline
    #[serde(default = "default_timeout_secs")]
    pub transcription_timeout_secs: u64,
    /// Concurrent transcriptions admitted across the process
    #[serde(default = "default_concurrency")]
    pub max_concurrent_transcriptions: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_transcription_attempts: default_attempts(),
            initial_backoff_ms: default_backoff_ms(),
            transcription_timeout_secs: default_timeout_secs(),
            max_concurrent_transcriptions: default_concurrency(),
        }
    }
}

// =============================================================================
// Pipeline Orchestrator
// =============================================================================

/// Derives audio bytes from source video bytes.
///
/// Injectable so deployments can plug in a real demuxer; the default passes
/// the source bytes through unchanged, which suits audio-only recordings.
pub type AudioExtractor = dyn Fn(&[u8]) -> CoreResult<Vec<u8>> + Send + Sync;

/// Coordinates content storage, transcription, and indexing for events
#[derive(Clone)]
pub struct PipelineOrchestrator {
    content: Arc<dyn ContentStore>,
    store: Arc<dyn StructuredStore>,
    transcriber: Arc<dyn TranscriptionProvider>,
    indexer: Indexer,
    config: PipelineConfig,
    transcription_permits: Arc<Semaphore>,
    audio_extractor: Arc<AudioExtractor>,
}

impl PipelineOrchestrator {
    /// Creates an orchestrator over the given backends
    pub fn new(
        content: Arc<dyn ContentStore>,
        store: Arc<dyn StructuredStore>,
        transcriber: Arc<dyn TranscriptionProvider>,
        config: PipelineConfig,
        indexing: IndexingConfig,
    ) -> Self {
        let permits = config.max_concurrent_transcriptions.max(1);
        Self {
            content,
            store,
            transcriber,
            indexer: Indexer::new(indexing),
            config,
            transcription_permits: Arc::new(Semaphore::new(permits)),
            audio_extractor: Arc::new(|video: &[u8]| Ok(video.to_vec())),
        }
    }

    /// Replaces the audio extraction step
    pub fn with_audio_extractor(
        mut self,
        extractor: impl Fn(&[u8]) -> CoreResult<Vec<u8>> + Send + Sync + 'static,
    ) -> Self {
        self.audio_extractor = Arc::new(extractor);
        self
    }

    // =========================================================================
    // Ingestion
    // =========================================================================

    /// Registers a discovered recording and stores its video bytes.
    ///
    /// Idempotent on video content: ingesting bytes whose hash is already
    /// known returns the existing event's id without creating a second event
    /// or re-uploading the blob.
    pub async fn ingest(
        &self,
        body_id: &str,
        scheduled_start: DateTime<Utc>,
        source_uri: &str,
        video: &[u8],
    ) -> CoreResult<EventId> {
        let video_hash = hash_bytes(video);

        if let Some(existing) = self.store.load_event_by_hash(&video_hash)? {
            info!(
                "Recording {} already ingested as event {}",
                video_hash, existing.id
            );
            return Ok(existing.id);
        }

        let locator = self.content.put(video, &video_hash).await?;

        let event = Event::new(body_id, scheduled_start, source_uri, video_hash.as_str());
        match self.store.create_event(&event) {
            Ok(()) => {}
            // Another worker discovered the same recording first; converge
            // on its event.
            Err(CoreError::Conflict(_)) => {
                if let Some(existing) = self.store.load_event_by_hash(&video_hash)? {
                    return Ok(existing.id);
                }
                return Err(CoreError::Conflict(format!(
                    "Event for video {} vanished after conflict",
                    video_hash
                )));
            }
            Err(e) => return Err(e),
        }

        self.store.record_locators(&event.id, Some(&locator), None)?;
        info!("Ingested event {} from {}", event.id, source_uri);
        Ok(event.id)
    }

    // =========================================================================
    // Stage Execution
    // =========================================================================

    /// Runs the pipeline for one event until it reaches a terminal state.
    ///
    /// Resumes from whatever status is recorded, so a restart after a crash
    /// repeats at most one stage. Returns the event's final status; stage
    /// failures are recorded on the event rather than surfaced as errors, so
    /// an `Err` here means the pipeline itself could not make progress (e.g.,
    /// storage unavailable).
    pub async fn run(&self, event_id: &str) -> CoreResult<EventStatus> {
        loop {
            let event = self.store.load_event(event_id)?;
            let advanced = match &event.status {
                EventStatus::Discovered => self.stage_extract_audio(&event).await?,
                EventStatus::AudioExtracted => self.stage_transcribe(&event).await?,
                EventStatus::Transcribed => self.stage_index(&event).await?,
                terminal => return Ok(terminal.clone()),
            };

            // A failed guard means another worker advanced the event while
            // we were working; leave it to them.
            if !advanced {
                warn!(
                    "Event {} changed state under us at {}; yielding",
                    event.id,
                    event.status.name()
                );
                return self.store.load_event(event_id).map(|e| e.status);
            }
        }
    }

    /// Derives and stores the audio blob, then advances to `AudioExtracted`
    async fn stage_extract_audio(&self, event: &Event) -> CoreResult<bool> {
        let video_locator = match &event.video_locator {
            Some(locator) => locator.clone(),
            None => {
                return self
                    .record_failure(event, "extract", "Event has no stored video")
                    .map(|_| true)
            }
        };

        let outcome = async {
            let video = self.content.get(&video_locator).await?;
            let audio = (self.audio_extractor)(&video)?;
            let audio_hash = hash_bytes(&audio);
            let locator = self.content.put(&audio, &audio_hash).await?;
            Ok::<String, CoreError>(locator)
        }
        .await;

        match outcome {
            Ok(audio_locator) => {
                self.store
                    .record_locators(&event.id, None, Some(&audio_locator))?;
                self.store.transition_event(
                    &event.id,
                    &EventStatus::Discovered,
                    &EventStatus::AudioExtracted,
                )
            }
            Err(e) => self
                .record_failure(event, "extract", &e.to_string())
                .map(|_| true),
        }
    }

    /// Transcribes the stored audio with admission control, a per-attempt
    /// deadline, and retries with exponential backoff. The transcript is
    /// persisted before the status advances to `Transcribed`, so the state
    /// always implies a durable transcript.
    async fn stage_transcribe(&self, event: &Event) -> CoreResult<bool> {
        let audio_locator = match &event.audio_locator {
            Some(locator) => locator.clone(),
            None => {
                return self
                    .record_failure(event, "transcribe", "Event has no stored audio")
                    .map(|_| true)
            }
        };

        let _permit = self
            .transcription_permits
            .acquire()
            .await
            .map_err(|e| CoreError::Internal(format!("Transcription pool closed: {}", e)))?;

        let audio = match self.content.get(&audio_locator).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return self
                    .record_failure(event, "transcribe", &e.to_string())
                    .map(|_| true)
            }
        };

        match self.transcribe_with_retry(&event.id, &audio).await {
            Ok(output) => {
                let transcript = Transcript::with_segments(&event.id, output.segments);
                self.store.save_transcript(&transcript)?;
                self.store.transition_event(
                    &event.id,
                    &EventStatus::AudioExtracted,
                    &EventStatus::Transcribed,
                )
            }
            Err(e) => self
                .record_failure(event, "transcribe", &e.to_string())
                .map(|_| true),
        }
    }

    async fn transcribe_with_retry(
        &self,
        event_id: &str,
        audio: &[u8],
    ) -> CoreResult<crate::core::transcription::TranscriptionOutput> {
        let deadline = Duration::from_secs(self.config.transcription_timeout_secs);
        let mut backoff = Duration::from_millis(self.config.initial_backoff_ms);
        let attempts = self.config.max_transcription_attempts.max(1);

        let mut last_error = CoreError::Internal("Transcription never attempted".to_string());
        for attempt in 1..=attempts {
            let result = match tokio::time::timeout(deadline, self.transcriber.transcribe(audio))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(CoreError::Timeout(format!(
                    "Transcription of event {} exceeded {}s",
                    event_id,
                    deadline.as_secs()
                ))),
            };

            match result {
                Ok(output) => return Ok(output),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!(
                        "Transcription attempt {}/{} for event {} failed: {}; retrying in {:?}",
                        attempt, attempts, event_id, e, backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    last_error = e;
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error)
    }

    /// Indexes the persisted transcript, then advances to `Indexed`
    async fn stage_index(&self, event: &Event) -> CoreResult<bool> {
        let transcript = match self.store.load_transcript(&event.id)? {
            Some(transcript) => transcript,
            // Transcribed status without a transcript means storage was
            // tampered with; record it rather than guessing.
            None => {
                return self
                    .record_failure(event, "index", "No transcript recorded for event")
                    .map(|_| true)
            }
        };

        match self.indexer.index(self.store.as_ref(), &event.id, &transcript) {
            Ok(_) => self.store.transition_event(
                &event.id,
                &EventStatus::Transcribed,
                &EventStatus::Indexed,
            ),
            Err(e) => self
                .record_failure(event, "index", &e.to_string())
                .map(|_| true),
        }
    }

    /// Durably marks the event failed at a stage.
    ///
    /// A lost guard here is benign: another worker advanced the event past
    /// the state we failed in, so its result stands.
    fn record_failure(&self, event: &Event, stage: &str, reason: &str) -> CoreResult<()> {
        warn!("Event {} failed at {}: {}", event.id, stage, reason);
        let failed = EventStatus::Failed {
            stage: stage.to_string(),
            reason: reason.to_string(),
        };
        let applied = self.store.transition_event(&event.id, &event.status, &failed)?;
        if !applied {
            warn!(
                "Event {} advanced past {} before failure was recorded",
                event.id,
                event.status.name()
            );
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::content::MemoryContentStore;
    use crate::core::store::{SqliteStore, Table};
    use crate::core::transcription::ScriptedTranscriber;
    use chrono::TimeZone;

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            max_transcription_attempts: 3,
            initial_backoff_ms: 1,
            transcription_timeout_secs: 5,
            max_concurrent_transcriptions: 2,
        }
    }

    fn orchestrator(
        transcriber: ScriptedTranscriber,
    ) -> (PipelineOrchestrator, Arc<SqliteStore>, Arc<ScriptedTranscriber>) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let transcriber = Arc::new(transcriber);
        let pipeline = PipelineOrchestrator::new(
            Arc::new(MemoryContentStore::new()),
            store.clone(),
            transcriber.clone(),
            fast_config(),
            IndexingConfig::default(),
        );
        (pipeline, store, transcriber)
    }

    fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 18, 30, 0).unwrap()
    }

    #[tokio::test]
    async fn test_full_pipeline_reaches_indexed() {
        let (pipeline, store, _) =
            orchestrator(ScriptedTranscriber::with_text("bicycle lane funding approved"));

        let event_id = pipeline
            .ingest("body_1", start_time(), "https://city.example.org/m.mp4", b"video")
            .await
            .unwrap();
        let status = pipeline.run(&event_id).await.unwrap();

        assert_eq!(status, EventStatus::Indexed);

        let event = store.load_event(&event_id).unwrap();
        assert_eq!(event.status, EventStatus::Indexed);
        assert!(event.video_locator.is_some());
        assert!(event.audio_locator.is_some());

        let results = store.search_events("bicycle", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].event.id, event_id);
    }

    #[tokio::test]
    async fn test_ingest_is_idempotent_on_content() {
        let (pipeline, store, _) = orchestrator(ScriptedTranscriber::with_text("minutes"));

        let first = pipeline
            .ingest("body_1", start_time(), "https://a.example.org/m.mp4", b"same bytes")
            .await
            .unwrap();
        // Same recording rediscovered from a different URI.
        let second = pipeline
            .ingest("body_1", start_time(), "https://b.example.org/m.mp4", b"same bytes")
            .await
            .unwrap();

        assert_eq!(first, second);
        let rows = store.select(Table::Event, &[]).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_retryable_failure_is_retried() {
        let (pipeline, _, transcriber) = orchestrator(
            ScriptedTranscriber::with_text("zoning variance").fail_once_retryable("asr busy"),
        );

        let event_id = pipeline
            .ingest("body_1", start_time(), "https://city.example.org/m.mp4", b"video")
            .await
            .unwrap();
        let status = pipeline.run(&event_id).await.unwrap();

        assert_eq!(status, EventStatus::Indexed);
        assert_eq!(transcriber.call_count(), 2);
    }

    #[tokio::test]
    async fn test_terminal_failure_marks_event_failed() {
        let (pipeline, store, transcriber) = orchestrator(
            ScriptedTranscriber::with_text("ignored").fail_once_terminal("unsupported codec"),
        );

        let event_id = pipeline
            .ingest("body_1", start_time(), "https://city.example.org/m.mp4", b"video")
            .await
            .unwrap();
        let status = pipeline.run(&event_id).await.unwrap();

        match &status {
            EventStatus::Failed { stage, reason } => {
                assert_eq!(stage, "transcribe");
                assert!(reason.contains("unsupported codec"));
            }
            other => panic!("Expected failed status, got {:?}", other),
        }
        assert!(status.is_terminal());
        assert_eq!(transcriber.call_count(), 1);
        assert_eq!(store.load_event(&event_id).unwrap().status, status);
    }

    #[tokio::test]
    async fn test_retries_exhaust_into_failure() {
        let transcriber = ScriptedTranscriber::with_text("ignored")
            .fail_once_retryable("busy")
            .fail_once_retryable("busy")
            .fail_once_retryable("busy");
        let (pipeline, _, transcriber) = orchestrator(transcriber);

        let event_id = pipeline
            .ingest("body_1", start_time(), "https://city.example.org/m.mp4", b"video")
            .await
            .unwrap();
        let status = pipeline.run(&event_id).await.unwrap();

        assert!(matches!(status, EventStatus::Failed { ref stage, .. } if stage == "transcribe"));
        // Attempts are capped by configuration.
        assert_eq!(transcriber.call_count(), 3);
    }

    #[tokio::test]
    async fn test_run_on_terminal_event_is_a_no_op() {
        let (pipeline, _, transcriber) =
            orchestrator(ScriptedTranscriber::with_text("budget hearing"));

        let event_id = pipeline
            .ingest("body_1", start_time(), "https://city.example.org/m.mp4", b"video")
            .await
            .unwrap();
        pipeline.run(&event_id).await.unwrap();
        let calls_after_first = transcriber.call_count();

        let status = pipeline.run(&event_id).await.unwrap();
        assert_eq!(status, EventStatus::Indexed);
        assert_eq!(transcriber.call_count(), calls_after_first);
    }

    #[tokio::test]
    async fn test_transcript_is_durable_before_indexing() {
        let (pipeline, store, _) =
            orchestrator(ScriptedTranscriber::with_text("public comment period"));

        let event_id = pipeline
            .ingest("body_1", start_time(), "https://city.example.org/m.mp4", b"video")
            .await
            .unwrap();
        pipeline.run(&event_id).await.unwrap();

        let transcript = store.load_transcript(&event_id).unwrap().unwrap();
        assert_eq!(transcript.full_text(), "public comment period");
    }

    #[tokio::test]
    async fn test_resumes_from_transcribed_without_retranscribing() {
        let (pipeline, store, transcriber) =
            orchestrator(ScriptedTranscriber::with_text("transit corridor study"));

        let event_id = pipeline
            .ingest("body_1", start_time(), "https://city.example.org/m.mp4", b"video")
            .await
            .unwrap();

        // Drive the event to Transcribed by hand, simulating a crash right
        // before the indexing stage.
        let event = store.load_event(&event_id).unwrap();
        assert!(pipeline.stage_extract_audio(&event).await.unwrap());
        let event = store.load_event(&event_id).unwrap();
        assert!(pipeline.stage_transcribe(&event).await.unwrap());
        assert_eq!(
            store.load_event(&event_id).unwrap().status,
            EventStatus::Transcribed
        );
        let calls = transcriber.call_count();

        let status = pipeline.run(&event_id).await.unwrap();
        assert_eq!(status, EventStatus::Indexed);
        assert_eq!(transcriber.call_count(), calls);
    }

    #[tokio::test]
    async fn test_custom_audio_extractor_failure_is_recorded() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let pipeline = PipelineOrchestrator::new(
            Arc::new(MemoryContentStore::new()),
            store.clone(),
            Arc::new(ScriptedTranscriber::with_text("ignored")),
            fast_config(),
            IndexingConfig::default(),
        )
        .with_audio_extractor(|_| {
            Err(CoreError::Validation("No audio track in container".to_string()))
        });

        let event_id = pipeline
            .ingest("body_1", start_time(), "https://city.example.org/m.mp4", b"video")
            .await
            .unwrap();
        let status = pipeline.run(&event_id).await.unwrap();

        assert!(matches!(status, EventStatus::Failed { ref stage, .. } if stage == "extract"));
    }

    #[test]
    fn test_config_defaults_from_empty_json() {
        let config: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_transcription_attempts, 3);
        assert_eq!(config.initial_backoff_ms, 500);
        assert_eq!(config.transcription_timeout_secs, 600);
        assert!(config.max_concurrent_transcriptions >= 1);
    }
}
