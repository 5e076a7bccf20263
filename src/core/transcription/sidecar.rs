//! Sidecar Transcriber
//!
//! Local [`TranscriptionProvider`] variant that resolves transcripts from
//! sidecar files produced by an out-of-band ASR run: for an audio blob with
//! content hash `H`, the segment document is expected at
//! `{sidecar_dir}/{H}.json` as a serialized [`TranscriptionOutput`].
//!
//! Deterministic and offline, which makes it the default backend for local
//! deployments and fixtures.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::core::content::hash_bytes;
use crate::core::{CoreError, CoreResult};

use super::{TranscriptionOutput, TranscriptionProvider};

/// Sidecar-file transcription backend
pub struct SidecarTranscriber {
    sidecar_dir: PathBuf,
}

impl SidecarTranscriber {
    /// Creates a transcriber resolving sidecars under the given directory
    pub fn new(sidecar_dir: &Path) -> Self {
        Self {
            sidecar_dir: sidecar_dir.to_path_buf(),
        }
    }

    /// Sidecar path for an audio content hash
    pub fn sidecar_path(&self, audio_hash: &str) -> PathBuf {
        self.sidecar_dir.join(format!("{}.json", audio_hash))
    }
}

#[async_trait]
impl TranscriptionProvider for SidecarTranscriber {
    fn provider_name(&self) -> &str {
        "sidecar"
    }

    fn is_available(&self) -> bool {
        self.sidecar_dir.is_dir()
    }

    async fn transcribe(&self, audio: &[u8]) -> CoreResult<TranscriptionOutput> {
        let hash = hash_bytes(audio);
        let path = self.sidecar_path(&hash);

        // No sidecar means this audio cannot be transcribed by this backend;
        // retrying will not change that.
        if !path.exists() {
            return Err(CoreError::Transcription {
                message: format!("No sidecar transcript for audio {}", hash),
                retryable: false,
            });
        }

        let content = std::fs::read_to_string(&path).map_err(|e| CoreError::Transcription {
            message: format!("Failed to read sidecar {}: {}", path.display(), e),
            retryable: true,
        })?;

        serde_json::from_str(&content).map_err(|e| CoreError::Transcription {
            message: format!("Malformed sidecar {}: {}", path.display(), e),
            retryable: false,
        })
    }
}
