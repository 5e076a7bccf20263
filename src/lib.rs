//! Gavel Core Library
//!
//! Ingestion pipeline and searchable index for municipal governing-body
//! meeting recordings. Raw meeting videos are driven through a resumable
//! sequence of stages (acquisition, audio extraction, transcription,
//! indexing) into a structured store, and free-text queries are ranked
//! against the resulting inverted index.
//!
//! Storage backends, the structured store, and the speech-to-text engine
//! are pluggable: the pipeline depends only on the traits in
//! [`core::content`], [`core::store`], and [`core::transcription`].

pub mod core;

use std::path::Path;
use std::sync::OnceLock;

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Initializes structured logging.
///
/// Logs to stdout, and additionally to a daily-rolling file when `log_dir`
/// is provided. Safe to call more than once (tests, embedders); later calls
/// are no-ops.
pub fn init_logging(log_dir: Option<&Path>) {
    use tracing_subscriber::prelude::*;

    let env_filter =
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(cfg!(debug_assertions));

    let file_layer = log_dir.map(|dir| {
        let _ = std::fs::create_dir_all(dir);
        let file_appender = tracing_appender::rolling::daily(dir, "gavel.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let _ = LOG_GUARD.set(guard);

        tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
    });

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer);

    // Avoid panics if already initialized (tests, embedders).
    let _ = tracing::subscriber::set_global_default(subscriber);
}
