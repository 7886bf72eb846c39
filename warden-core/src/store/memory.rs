use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::types::{DocumentStore, StoreError};

type Collections = HashMap<String, BTreeMap<String, Vec<u8>>>;

/// MemoryStore keeps every collection in process memory
///
/// Used by tests and by single process deployments that do not need durability
#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<Collections>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(key))
            .cloned())
    }

    async fn insert(&self, collection: &str, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        if docs.contains_key(key) {
            return Err(StoreError::AlreadyExists(format!("{}:{}", collection, key)));
        }

        docs.insert(key.to_string(), value);
        Ok(())
    }

    async fn put(&self, collection: &str, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        collection: &str,
        key: &str,
        expected: &[u8],
        value: Vec<u8>,
    ) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        let current = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(key));

        match current {
            Some(stored) if stored.as_slice() == expected => {
                *stored = value;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound(format!("{}:{}", collection, key))),
        }
    }

    async fn remove(&self, collection: &str, key: &str) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(collection)
            .map(|docs| docs.remove(key).is_some())
            .unwrap_or(false))
    }

    async fn list(&self, collection: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }
}
