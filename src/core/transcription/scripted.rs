//! Scripted Transcriber
//!
//! Test double for [`TranscriptionProvider`]. Returns a fixed set of
//! segments, optionally after a queue of scripted failures, and counts
//! calls so retry behavior can be asserted.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::model::TranscriptSegment;
use crate::core::{CoreError, CoreResult};

use super::{TranscriptionOutput, TranscriptionProvider};

/// Deterministic in-memory transcription backend for tests
pub struct ScriptedTranscriber {
    segments: Vec<TranscriptSegment>,
    language: Option<String>,
    failures: Mutex<VecDeque<CoreError>>,
    calls: AtomicUsize,
}

impl ScriptedTranscriber {
    /// Creates a transcriber that always succeeds with the given segments
    pub fn new(segments: Vec<TranscriptSegment>) -> Self {
        Self {
            segments,
            language: Some("en".to_string()),
            failures: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Convenience constructor: one segment covering the given text
    pub fn with_text(text: &str) -> Self {
        Self::new(vec![TranscriptSegment::new(0.0, 10.0, text, 0.95)])
    }

    /// Queues a retryable failure for the next call
    pub fn fail_once_retryable(self, message: &str) -> Self {
        self.failures
            .lock()
            .unwrap()
            .push_back(CoreError::Transcription {
                message: message.to_string(),
                retryable: true,
            });
        self
    }

    /// Queues a terminal failure for the next call
    pub fn fail_once_terminal(self, message: &str) -> Self {
        self.failures
            .lock()
            .unwrap()
            .push_back(CoreError::Transcription {
                message: message.to_string(),
                retryable: false,
            });
        self
    }

    /// Number of `transcribe` calls made so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranscriptionProvider for ScriptedTranscriber {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn transcribe(&self, _audio: &[u8]) -> CoreResult<TranscriptionOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        Ok(TranscriptionOutput {
            segments: self.segments.clone(),
            language: self.language.clone(),
        })
    }
}
