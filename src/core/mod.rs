//! Gavel Core Engine
//!
//! Core ingestion and search module. Handles the per-event pipeline state
//! machine, transcript indexing, and relevance-ranked search, on top of
//! pluggable content, structured-store, and transcription backends.

pub mod content;
pub mod discovery;
pub mod indexing;
pub mod model;
pub mod pipeline;
pub mod search;
pub mod settings;
pub mod store;
pub mod transcription;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;
