use std::sync::Arc;

use log::info;

use prople_warden_core::store::types::DocumentStore;
use prople_warden_core::store::MemoryStore;

use crate::common::types::CommonError;
use crate::config::{Backend, Database};

/// Builder opens the document store backend selected by `[database]`
pub struct Builder {
    cfg: Database,
}

impl Builder {
    pub fn new(cfg: Database) -> Self {
        Self { cfg }
    }

    pub fn build(&self) -> Result<Arc<dyn DocumentStore>, CommonError> {
        match self.cfg.get_backend() {
            Backend::Memory => {
                info!("using the in-memory document store");
                Ok(Arc::new(MemoryStore::new()))
            }
            Backend::RocksDB => self.build_rocksdb(),
        }
    }

    #[cfg(feature = "rocksdb")]
    fn build_rocksdb(&self) -> Result<Arc<dyn DocumentStore>, CommonError> {
        let opts = self.cfg.rocksdb.as_ref().ok_or(CommonError::DbError(String::from(
            "config: database:rocksdb is missing",
        )))?;

        let store = super::RocksStore::open(opts)
            .map_err(|err| CommonError::DbError(err.to_string()))?;
        Ok(Arc::new(store))
    }

    #[cfg(not(feature = "rocksdb"))]
    fn build_rocksdb(&self) -> Result<Arc<dyn DocumentStore>, CommonError> {
        Err(CommonError::DbError(String::from(
            "rocksdb backend requires the `rocksdb` feature",
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::common::helpers::testconfig;

    #[tokio::test]
    async fn test_build_memory_backend() {
        let cfg = testconfig::global_config();
        let store = Builder::new(cfg.db().clone()).build().unwrap();

        store.put("agent", "alice", b"v".to_vec()).await.unwrap();
        assert_eq!(store.get("agent", "alice").await.unwrap(), Some(b"v".to_vec()));
    }

    #[cfg(not(feature = "rocksdb"))]
    #[test]
    fn test_rocksdb_requires_feature() {
        let cfg: Database = toml::from_str("backend = \"rocksdb\"").unwrap();
        let result = Builder::new(cfg).build();
        assert!(matches!(result, Err(CommonError::DbError(_))));
    }
}
