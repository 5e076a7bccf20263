//! Local Content Store
//!
//! Content-addressed files under a root directory, fanned out by hash
//! prefix (`{root}/ab/abcdef...`). Writes are atomic (temp file + rename)
//! so readers never observe a partially written blob.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::core::{CoreError, CoreResult, Locator};

use super::ContentStore;

/// Filesystem-backed content store
pub struct LocalContentStore {
    /// Root directory for stored blobs
    root: PathBuf,
}

impl LocalContentStore {
    /// Creates a content store rooted at the given directory
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Returns the relative locator for a content hash
    fn locator_for(content_hash: &str) -> String {
        format!("{}/{}", &content_hash[..2.min(content_hash.len())], content_hash)
    }

    /// Resolves a locator to an on-disk path, rejecting traversal
    fn resolve(&self, locator: &str) -> CoreResult<PathBuf> {
        if locator.is_empty() || locator.contains("..") || locator.starts_with('/') {
            return Err(CoreError::Validation(format!(
                "Invalid content locator: {}",
                locator
            )));
        }
        Ok(self.root.join(locator))
    }
}

#[async_trait]
impl ContentStore for LocalContentStore {
    async fn put(&self, bytes: &[u8], content_hash: &str) -> CoreResult<Locator> {
        if content_hash.is_empty() {
            return Err(CoreError::Validation("Empty content hash".to_string()));
        }

        let locator = Self::locator_for(content_hash);
        let path = self.resolve(&locator)?;

        // Content-addressed blobs are immutable: an existing file already
        // holds these bytes.
        if path.exists() {
            return Ok(locator);
        }

        let parent = path
            .parent()
            .ok_or_else(|| CoreError::Internal(format!("No parent for {}", path.display())))?;
        fs::create_dir_all(parent)?;

        let temp_path = parent.join(format!(".{}.tmp.{}", content_hash, std::process::id()));
        fs::write(&temp_path, bytes)?;
        fs::rename(&temp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            CoreError::Io(e)
        })?;

        Ok(locator)
    }

    async fn get(&self, locator: &str) -> CoreResult<Vec<u8>> {
        let path = self.resolve(locator)?;
        if !path.exists() {
            return Err(CoreError::NotFound(format!("blob {}", locator)));
        }
        Ok(fs::read(&path)?)
    }

    async fn exists(&self, content_hash: &str) -> CoreResult<bool> {
        let path = self.resolve(&Self::locator_for(content_hash))?;
        Ok(path.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::content::hash_bytes;
    use tempfile::TempDir;

    fn create_store() -> (TempDir, LocalContentStore) {
        let dir = TempDir::new().unwrap();
        let store = LocalContentStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn test_put_and_get_round_trip() {
        let (_dir, store) = create_store();
        let bytes = b"council meeting video";
        let hash = hash_bytes(bytes);

        let locator = store.put(bytes, &hash).await.unwrap();
        let loaded = store.get(&locator).await.unwrap();

        assert_eq!(loaded, bytes);
        assert!(store.exists(&hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_put_is_idempotent() {
        let (_dir, store) = create_store();
        let bytes = b"same bytes";
        let hash = hash_bytes(bytes);

        let first = store.put(bytes, &hash).await.unwrap();
        let second = store.put(bytes, &hash).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let (_dir, store) = create_store();
        let result = store.get("ab/abcdef").await;
        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_traversal_locator_rejected() {
        let (_dir, store) = create_store();
        let result = store.get("../etc/passwd").await;
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_exists_false_for_unknown_hash() {
        let (_dir, store) = create_store();
        assert!(!store.exists(&hash_bytes(b"never stored")).await.unwrap());
    }
}
