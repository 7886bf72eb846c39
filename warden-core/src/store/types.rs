use std::fmt::Debug;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::common::types::HubError;

/// StoreError is a base error types for the document store backends
#[derive(Debug, PartialEq, Error, Clone)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("document already exists: {0}")]
    AlreadyExists(String),

    #[error("document conflict: {0}")]
    Conflict(String),

    #[error("serialize error: {0}")]
    SerializeError(String),

    #[error("backend error: {0}")]
    BackendError(String),
}

impl From<StoreError> for HubError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(msg) => HubError::NotFound(msg),
            StoreError::AlreadyExists(msg) => HubError::AlreadyExists(msg),
            other => HubError::Internal(other.to_string()),
        }
    }
}

/// `DocumentStore` is the raw key value abstraction every backend implements
///
/// Documents are opaque bytes grouped by collection. The only conditional write is
/// [`DocumentStore::compare_and_swap`], which is the single serialization point used by the
/// protocol state machines
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// insert must fail with [`StoreError::AlreadyExists`] when the key is already taken
    async fn insert(&self, collection: &str, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    async fn put(&self, collection: &str, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    /// compare_and_swap replaces the stored value only when the current bytes are equal
    /// to `expected`. It returns `false` when another writer won the race
    async fn compare_and_swap(
        &self,
        collection: &str,
        key: &str,
        expected: &[u8],
        value: Vec<u8>,
    ) -> Result<bool, StoreError>;

    async fn remove(&self, collection: &str, key: &str) -> Result<bool, StoreError>;

    /// list returns all values ordered by their keys
    async fn list(&self, collection: &str) -> Result<Vec<Vec<u8>>, StoreError>;
}

/// Document is implemented by every persisted entity
pub trait Document: Serialize + DeserializeOwned + Clone + Debug + Send + Sync {
    const COLLECTION: &'static str;

    /// key returns the natural key of the document inside its collection
    fn key(&self) -> String;

    fn to_bytes(&self) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(self).map_err(|err| StoreError::SerializeError(err.to_string()))
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        serde_json::from_slice(bytes).map_err(|err| StoreError::SerializeError(err.to_string()))
    }
}

/// composite_key joins two natural key parts, the first part is length prefixed so no choice of
/// characters in either part can make two different pairs share a key
pub fn composite_key(first: &str, second: &str) -> String {
    format!("{}:{}:{}", first.len(), first, second)
}

/// Transition is the outcome of a guarded read-modify-write
#[derive(Debug, Clone, PartialEq)]
pub enum Transition<D> {
    /// the guard matched and the mutated document was written
    Applied(D),

    /// the guard did not match, the current document is returned untouched
    Rejected(D),
}
