//! In-memory vector index implementation.
//!
//! Useful for testing and small corpora.

use super::{rank_nearest, CollectionInfo, IndexedEntry, QueryHit, VectorIndex};
use crate::error::{Result, ScreenragError};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

struct MemoryCollection {
    info: CollectionInfo,
    entries: BTreeMap<String, IndexedEntry>,
}

/// In-memory vector index.
pub struct MemoryVectorIndex {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl MemoryVectorIndex {
    /// Create a new, empty in-memory index.
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, MemoryCollection>>> {
        self.collections
            .read()
            .map_err(|e| ScreenragError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, MemoryCollection>>> {
        self.collections
            .write()
            .map_err(|e| ScreenragError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }
}

impl Default for MemoryVectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn get_collection(&self, name: &str) -> Result<Option<CollectionInfo>> {
        Ok(self.read()?.get(name).map(|c| c.info.clone()))
    }

    async fn create_collection(
        &self,
        name: &str,
        embedding_model: &str,
        dimensions: usize,
    ) -> Result<CollectionInfo> {
        let mut collections = self.write()?;
        if collections.contains_key(name) {
            return Err(ScreenragError::VectorStore(format!(
                "Collection '{}' already exists",
                name
            )));
        }

        let info = CollectionInfo {
            name: name.to_string(),
            embedding_model: embedding_model.to_string(),
            dimensions,
            created_at: Utc::now(),
        };
        collections.insert(
            name.to_string(),
            MemoryCollection {
                info: info.clone(),
                entries: BTreeMap::new(),
            },
        );
        Ok(info)
    }

    async fn delete_collection(&self, name: &str) -> Result<bool> {
        Ok(self.write()?.remove(name).is_some())
    }

    async fn add(&self, collection: &str, entries: &[IndexedEntry]) -> Result<usize> {
        let mut collections = self.write()?;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| ScreenragError::CollectionMissing(collection.to_string()))?;

        for entry in entries {
            target.info.check_dimensions(&entry.embedding)?;
        }
        for entry in entries {
            target.entries.insert(entry.id.clone(), entry.clone());
        }
        Ok(entries.len())
    }

    async fn query(&self, collection: &str, embedding: &[f32], k: usize) -> Result<Vec<QueryHit>> {
        let collections = self.read()?;
        let target = collections
            .get(collection)
            .ok_or_else(|| ScreenragError::CollectionMissing(collection.to_string()))?;

        target.info.check_dimensions(embedding)?;
        Ok(rank_nearest(embedding, target.entries.values(), k))
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.read()?;
        collections
            .get(collection)
            .map(|c| c.entries.len())
            .ok_or_else(|| ScreenragError::CollectionMissing(collection.to_string()))
    }

    async fn ids(&self, collection: &str) -> Result<Vec<String>> {
        let collections = self.read()?;
        collections
            .get(collection)
            .map(|c| c.entries.keys().cloned().collect())
            .ok_or_else(|| ScreenragError::CollectionMissing(collection.to_string()))
    }
}
