//! Content Store
//!
//! Uniform put/get/exists operations over immutable binary blobs (video,
//! audio, transcript files), keyed by content hash. Any object-storage-like
//! backend can implement [`ContentStore`]; the crate ships a local
//! filesystem variant and an in-memory variant.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::core::{CoreResult, Locator};

mod local;
mod memory;

pub use local::LocalContentStore;
pub use memory::MemoryContentStore;

// =============================================================================
// Content Hashing
// =============================================================================

/// Computes the hex SHA-256 content hash for a blob
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

// =============================================================================
// Content Store Trait
// =============================================================================

/// Content-addressed blob storage.
///
/// Implementations:
/// - [`LocalContentStore`]: files under a root directory
/// - [`MemoryContentStore`]: in-memory map, for tests and ephemeral runs
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Stores a blob under its content hash and returns a locator.
    ///
    /// Idempotent: putting a hash that already exists is a no-op returning
    /// the existing locator.
    async fn put(&self, bytes: &[u8], content_hash: &str) -> CoreResult<Locator>;

    /// Retrieves a blob by locator.
    ///
    /// Fails with `CoreError::NotFound` if the locator is unknown and
    /// `CoreError::Io` on transport failure (retryable by the caller).
    async fn get(&self, locator: &str) -> CoreResult<Vec<u8>>;

    /// Whether a blob with the given content hash is stored
    async fn exists(&self, content_hash: &str) -> CoreResult<bool>;
}
