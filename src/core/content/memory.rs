//! In-Memory Content Store
//!
//! Test double and ephemeral-run variant of [`ContentStore`]. Locators use
//! the `mem://` scheme.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::{CoreError, CoreResult, Locator};

use super::ContentStore;

/// HashMap-backed content store
#[derive(Default)]
pub struct MemoryContentStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryContentStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn locator_for(content_hash: &str) -> String {
        format!("mem://{}", content_hash)
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(&self, bytes: &[u8], content_hash: &str) -> CoreResult<Locator> {
        if content_hash.is_empty() {
            return Err(CoreError::Validation("Empty content hash".to_string()));
        }
        let mut objects = self.objects.lock().unwrap();
        objects
            .entry(content_hash.to_string())
            .or_insert_with(|| bytes.to_vec());
        Ok(Self::locator_for(content_hash))
    }

    async fn get(&self, locator: &str) -> CoreResult<Vec<u8>> {
        let hash = locator
            .strip_prefix("mem://")
            .ok_or_else(|| CoreError::Validation(format!("Invalid locator: {}", locator)))?;
        let objects = self.objects.lock().unwrap();
        objects
            .get(hash)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("blob {}", locator)))
    }

    async fn exists(&self, content_hash: &str) -> CoreResult<bool> {
        Ok(self.objects.lock().unwrap().contains_key(content_hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::content::hash_bytes;

    #[tokio::test]
    async fn test_round_trip() {
        let store = MemoryContentStore::new();
        let hash = hash_bytes(b"audio");

        let locator = store.put(b"audio", &hash).await.unwrap();
        assert_eq!(store.get(&locator).await.unwrap(), b"audio");
        assert!(store.exists(&hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_put_keeps_first_write() {
        let store = MemoryContentStore::new();
        let hash = "deadbeef";

        let locator = store.put(b"first", hash).await.unwrap();
        store.put(b"second", hash).await.unwrap();

        // Content-addressed: same hash means same bytes, first write wins.
        assert_eq!(store.get(&locator).await.unwrap(), b"first");
    }

    #[tokio::test]
    async fn test_get_requires_mem_scheme() {
        let store = MemoryContentStore::new();
        assert!(matches!(
            store.get("ab/abcdef").await,
            Err(CoreError::Validation(_))
        ));
    }
}
