//! Gavel Core Type Definitions
//!
//! Fundamental identifier and time types used throughout the crate.

// =============================================================================
// ID Types
// =============================================================================

/// Governing body unique identifier (ULID)
pub type BodyId = String;

/// Meeting event unique identifier (ULID)
pub type EventId = String;

/// Transcript unique identifier (ULID)
pub type TranscriptId = String;

/// Content-store locator (opaque, backend-defined)
pub type Locator = String;

// =============================================================================
// Time Types
// =============================================================================

/// Time offset in seconds (floating point)
pub type TimeSec = f64;
