use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;

use super::{ContentId, ContentLoader, ContentNetwork};
use crate::error::{VaultError, VaultResult};

/// An in-memory content network addressing payloads the same way as
/// [`super::IpfsClient`].
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    entries: Mutex<HashMap<ContentId, Vec<u8>>>,
}

impl MemoryContentStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<ContentId, Vec<u8>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of stored payloads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Whether nothing has been stored yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Replaces whatever is stored under `id`, bypassing addressing.
    pub fn insert_raw(&self, id: ContentId, content: Vec<u8>) {
        self.entries().insert(id, content);
    }

    /// Drops the payload stored under `id`.
    pub fn remove(&self, id: &ContentId) -> Option<Vec<u8>> {
        self.entries().remove(id)
    }
}

#[async_trait]
impl ContentLoader for MemoryContentStore {
    async fn get(&self, id: &ContentId) -> VaultResult<Vec<u8>> {
        self.entries()
            .get(id)
            .cloned()
            .ok_or_else(|| VaultError::InvalidInput {
                attribute: "content_id".to_string(),
                reason: format!("{id} not found"),
            })
    }
}

#[async_trait]
impl ContentNetwork for MemoryContentStore {
    async fn add(&self, content: Vec<u8>) -> VaultResult<ContentId> {
        let id = ContentId::for_content(&content)?;
        self.entries().insert(id, content);
        Ok(id)
    }
}
