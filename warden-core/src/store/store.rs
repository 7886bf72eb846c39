use std::sync::Arc;

use log::debug;

use super::types::{Document, DocumentStore, StoreError, Transition};

const MAX_TRANSITION_ATTEMPTS: usize = 8;

/// Store is the typed facade over a [`DocumentStore`] backend
///
/// It is cheap to clone, all clones share the same backend
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn DocumentStore>,
}

impl Store {
    pub fn new(backend: Arc<dyn DocumentStore>) -> Self {
        Self { backend }
    }

    pub async fn find<D: Document>(&self, key: &str) -> Result<Option<D>, StoreError> {
        let value = self.backend.get(D::COLLECTION, key).await?;
        value.map(|bytes| D::from_bytes(&bytes)).transpose()
    }

    pub async fn get<D: Document>(&self, key: &str) -> Result<D, StoreError> {
        self.find::<D>(key)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("{}:{}", D::COLLECTION, key)))
    }

    pub async fn insert<D: Document>(&self, doc: &D) -> Result<(), StoreError> {
        let bytes = doc.to_bytes()?;
        self.backend.insert(D::COLLECTION, &doc.key(), bytes).await
    }

    pub async fn put<D: Document>(&self, doc: &D) -> Result<(), StoreError> {
        let bytes = doc.to_bytes()?;
        self.backend.put(D::COLLECTION, &doc.key(), bytes).await
    }

    pub async fn remove<D: Document>(&self, key: &str) -> Result<bool, StoreError> {
        self.backend.remove(D::COLLECTION, key).await
    }

    pub async fn list<D: Document>(&self) -> Result<Vec<D>, StoreError> {
        let values = self.backend.list(D::COLLECTION).await?;
        values.iter().map(|bytes| D::from_bytes(bytes)).collect()
    }

    pub async fn filter<D, F>(&self, predicate: F) -> Result<Vec<D>, StoreError>
    where
        D: Document,
        F: Fn(&D) -> bool,
    {
        let docs = self.list::<D>().await?;
        Ok(docs.into_iter().filter(|doc| predicate(doc)).collect())
    }

    pub async fn first<D, F>(&self, predicate: F) -> Result<Option<D>, StoreError>
    where
        D: Document,
        F: Fn(&D) -> bool,
    {
        let docs = self.list::<D>().await?;
        Ok(docs.into_iter().find(|doc| predicate(doc)))
    }

    /// transition runs a guarded read-modify-write on a single document
    ///
    /// The guard is evaluated against the current value, when it holds the mutated value is
    /// written with compare-and-swap. Losing the swap re-reads the document and evaluates the
    /// guard again, so concurrent writers of one key always resolve to a single winner
    pub async fn transition<D, G, M>(
        &self,
        key: &str,
        guard: G,
        mut mutate: M,
    ) -> Result<Transition<D>, StoreError>
    where
        D: Document,
        G: Fn(&D) -> bool,
        M: FnMut(D) -> D,
    {
        for attempt in 0..MAX_TRANSITION_ATTEMPTS {
            let current = self
                .backend
                .get(D::COLLECTION, key)
                .await?
                .ok_or_else(|| StoreError::NotFound(format!("{}:{}", D::COLLECTION, key)))?;

            let doc = D::from_bytes(&current)?;
            if !guard(&doc) {
                return Ok(Transition::Rejected(doc));
            }

            let next = mutate(doc);
            let swapped = self
                .backend
                .compare_and_swap(D::COLLECTION, key, &current, next.to_bytes()?)
                .await?;

            if swapped {
                return Ok(Transition::Applied(next));
            }

            debug!(
                "transition lost compare-and-swap on {}:{} (attempt {})",
                D::COLLECTION,
                key,
                attempt + 1
            );
        }

        Err(StoreError::Conflict(format!("{}:{}", D::COLLECTION, key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde::{Deserialize, Serialize};
    use tokio::task::JoinSet;

    use crate::store::MemoryStore;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Counter {
        id: String,
        step: u32,
    }

    impl Document for Counter {
        const COLLECTION: &'static str = "counters";

        fn key(&self) -> String {
            self.id.clone()
        }
    }

    fn build_store() -> Store {
        Store::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_insert_duplicate_rejected() {
        let store = build_store();
        let counter = Counter {
            id: "c1".to_string(),
            step: 0,
        };

        assert!(store.insert(&counter).await.is_ok());
        let dup = store.insert(&counter).await;
        assert!(matches!(dup, Err(StoreError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = build_store();
        let missing = store.get::<Counter>("nope").await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_transition_guard_rejects() {
        let store = build_store();
        let counter = Counter {
            id: "c1".to_string(),
            step: 3,
        };
        store.insert(&counter).await.unwrap();

        let result = store
            .transition::<Counter, _, _>("c1", |c| c.step == 0, |mut c| {
                c.step += 1;
                c
            })
            .await
            .unwrap();

        assert_eq!(result, Transition::Rejected(counter));
    }

    #[tokio::test]
    async fn test_concurrent_transitions_single_winner() {
        let store = build_store();
        store
            .insert(&Counter {
                id: "c1".to_string(),
                step: 0,
            })
            .await
            .unwrap();

        let mut tasks = JoinSet::new();
        for _ in 0..16 {
            let store = store.clone();
            tasks.spawn(async move {
                store
                    .transition::<Counter, _, _>("c1", |c| c.step == 0, |mut c| {
                        c.step = 1;
                        c
                    })
                    .await
            });
        }

        let mut applied = 0;
        while let Some(result) = tasks.join_next().await {
            if let Ok(Ok(Transition::Applied(_))) = result {
                applied += 1;
            }
        }

        assert_eq!(applied, 1);
        let stored = store.get::<Counter>("c1").await.unwrap();
        assert_eq!(stored.step, 1);
    }
}
