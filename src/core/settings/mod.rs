//! Settings Persistence
//!
//! Persistent deployment settings with atomic file writes (temp file +
//! rename), schema validation with defaults, and a version field for future
//! migrations.
//!
//! Storage location: `{data_dir}/settings.json`

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::indexing::IndexingConfig;
use crate::core::pipeline::PipelineConfig;
use crate::core::{CoreError, CoreResult};

/// Settings schema version for migration support
pub const SETTINGS_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE: &str = "settings.json";

fn default_version() -> u32 {
    SETTINGS_VERSION
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("gavel"))
        .unwrap_or_else(|| PathBuf::from("."))
}

// =============================================================================
// Settings Schema
// =============================================================================

/// Deployment settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Schema version for migrations
    #[serde(default = "default_version")]
    pub version: u32,

    /// Root directory for the content store and database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Ingestion pipeline tunables
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Tokenizer and index tunables
    #[serde(default)]
    pub indexing: IndexingConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            data_dir: default_data_dir(),
            pipeline: PipelineConfig::default(),
            indexing: IndexingConfig::default(),
        }
    }
}

impl Settings {
    /// Normalizes and clamps settings so persisted state is always valid.
    ///
    /// Tolerant on purpose: corrects bad values instead of failing, so a
    /// corrupted or stale file never prevents startup.
    pub fn normalize(&mut self) {
        self.version = SETTINGS_VERSION;

        self.pipeline.max_transcription_attempts =
            self.pipeline.max_transcription_attempts.clamp(1, 10);
        self.pipeline.initial_backoff_ms = self.pipeline.initial_backoff_ms.clamp(50, 60_000);
        self.pipeline.transcription_timeout_secs =
            self.pipeline.transcription_timeout_secs.clamp(1, 7_200);
        self.pipeline.max_concurrent_transcriptions =
            self.pipeline.max_concurrent_transcriptions.clamp(1, 32);

        self.indexing.min_token_len = self.indexing.min_token_len.clamp(1, 12);
    }
}

// =============================================================================
// Settings Manager
// =============================================================================

/// Loads and saves the settings file
pub struct SettingsManager {
    settings_path: PathBuf,
}

impl SettingsManager {
    /// Creates a manager storing settings under the given directory
    pub fn new(dir: &Path) -> Self {
        Self {
            settings_path: dir.join(SETTINGS_FILE),
        }
    }

    /// The settings file path
    pub fn settings_path(&self) -> &PathBuf {
        &self.settings_path
    }

    /// Loads settings from disk, returning defaults if the file is missing
    /// or unreadable
    pub fn load(&self) -> Settings {
        if !self.settings_path.exists() {
            info!("Settings file not found, using defaults");
            return Settings::default();
        }

        let result: Result<Settings, String> = fs::read_to_string(&self.settings_path)
            .map_err(|e| format!("Failed to read settings file: {}", e))
            .and_then(|content| {
                serde_json::from_str(&content)
                    .map_err(|e| format!("Failed to parse settings file: {}", e))
            });

        match result {
            Ok(mut settings) => {
                if settings.version < SETTINGS_VERSION {
                    info!(
                        "Migrating settings from version {} to {}",
                        settings.version, SETTINGS_VERSION
                    );
                }
                settings.normalize();
                settings
            }
            Err(e) => {
                warn!("Failed to load settings, using defaults: {}", e);
                Settings::default()
            }
        }
    }

    /// Saves settings to disk using an atomic write (temp file + rename).
    ///
    /// Returns the normalized settings actually persisted.
    pub fn save(&self, settings: &Settings) -> CoreResult<Settings> {
        let mut normalized = settings.clone();
        normalized.normalize();

        let content = serde_json::to_string_pretty(&normalized)?;

        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.settings_path.with_extension("json.tmp");
        if temp_path.exists() {
            let _ = fs::remove_file(&temp_path);
        }

        let mut file = fs::File::create(&temp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;

        fs::rename(&temp_path, &self.settings_path).map_err(|e| {
            CoreError::Internal(format!("Failed to finalize settings file: {}", e))
        })?;

        info!("Settings saved to {:?}", self.settings_path);
        Ok(normalized)
    }

    /// Resets settings to defaults and deletes the settings file
    pub fn reset(&self) -> CoreResult<Settings> {
        if self.settings_path.exists() {
            fs::remove_file(&self.settings_path)?;
            info!("Settings file deleted");
        }
        Ok(Settings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(dir.path());
        assert_eq!(manager.load(), Settings::default());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(dir.path());

        let mut settings = Settings::default();
        settings.pipeline.max_transcription_attempts = 5;
        settings.indexing.min_token_len = 4;

        manager.save(&settings).unwrap();
        let loaded = manager.load();

        assert_eq!(loaded.pipeline.max_transcription_attempts, 5);
        assert_eq!(loaded.indexing.min_token_len, 4);
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(dir.path());

        manager.save(&Settings::default()).unwrap();
        assert!(manager.settings_path().exists());
        assert!(!manager.settings_path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_normalize_clamps_out_of_range_values() {
        let mut settings = Settings::default();
        settings.pipeline.max_transcription_attempts = 0;
        settings.pipeline.initial_backoff_ms = 1;
        settings.pipeline.transcription_timeout_secs = 1_000_000;
        settings.pipeline.max_concurrent_transcriptions = 500;
        settings.indexing.min_token_len = 99;

        settings.normalize();

        assert_eq!(settings.pipeline.max_transcription_attempts, 1);
        assert_eq!(settings.pipeline.initial_backoff_ms, 50);
        assert_eq!(settings.pipeline.transcription_timeout_secs, 7_200);
        assert_eq!(settings.pipeline.max_concurrent_transcriptions, 32);
        assert_eq!(settings.indexing.min_token_len, 12);
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(dir.path());
        fs::write(manager.settings_path(), "{ not json").unwrap();

        assert_eq!(manager.load(), Settings::default());
    }

    #[test]
    fn test_parse_applies_field_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"version":1}"#).unwrap();
        assert_eq!(settings.pipeline, PipelineConfig::default());
        assert_eq!(settings.indexing, IndexingConfig::default());
    }

    #[test]
    fn test_reset_deletes_file() {
        let dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(dir.path());

        manager.save(&Settings::default()).unwrap();
        let settings = manager.reset().unwrap();

        assert!(!manager.settings_path().exists());
        assert_eq!(settings, Settings::default());
    }
}
