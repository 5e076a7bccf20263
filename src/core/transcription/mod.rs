//! Transcription Adapter
//!
//! Converts an audio blob into a time-aligned transcript. Real speech-to-
//! text engines live behind [`TranscriptionProvider`]; the crate ships a
//! deterministic sidecar-file variant for local runs and a scripted test
//! double for exercising retry behavior.
//!
//! Transcription is the pipeline's dominant latency source: callers must
//! treat `transcribe` as a long-running, cancellable operation and bound it
//! with a timeout.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::model::TranscriptSegment;
use crate::core::CoreResult;

mod scripted;
mod sidecar;

pub use scripted::ScriptedTranscriber;
pub use sidecar::SidecarTranscriber;

// =============================================================================
// Transcription Output
// =============================================================================

/// Raw adapter output, before it is bound to an event as a transcript
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionOutput {
    /// Spoken segments with offsets and confidence
    pub segments: Vec<TranscriptSegment>,
    /// Detected language code, if the engine reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

// =============================================================================
// Transcription Provider Trait
// =============================================================================

/// Pluggable speech-to-text backend.
///
/// Failures are classified via `CoreError::Transcription { retryable }`:
/// unusable audio or an unsupported codec is terminal, transient service
/// errors are retryable. The orchestrator treats timeouts as retryable.
#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    /// Backend identifier for logging
    fn provider_name(&self) -> &str;

    /// Whether the backend is currently usable (e.g., model present,
    /// credentials configured)
    fn is_available(&self) -> bool;

    /// Transcribes an audio blob into time-aligned segments
    async fn transcribe(&self, audio: &[u8]) -> CoreResult<TranscriptionOutput>;
}
