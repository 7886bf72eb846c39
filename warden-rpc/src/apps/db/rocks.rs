use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};
use rocksdb::{ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode, MultiThreaded, Options};
use tokio::sync::Mutex;
use tokio::task::spawn_blocking;

use prople_warden_core::store::types::{DocumentStore, StoreError};

use crate::config::RocksDB;

type Db = DBWithThreadMode<MultiThreaded>;

const KEY_SEPARATOR: u8 = 0x1f;

/// RocksStore keeps every collection inside one column family, keys are
/// `<collection> 0x1f <key>` so a collection is a contiguous key range
///
/// Conditional writes (`insert`, `compare_and_swap`) are serialised by `writer`, plain writes
/// are not
#[derive(Clone)]
pub struct RocksStore {
    db: Arc<Db>,
    cf_name: String,
    writer: Arc<Mutex<()>>,
}

fn backend_error(err: impl ToString) -> StoreError {
    StoreError::BackendError(err.to_string())
}

fn build_key(collection: &str, key: &str) -> Vec<u8> {
    let mut output = collection_prefix(collection);
    output.extend_from_slice(key.as_bytes());
    output
}

fn collection_prefix(collection: &str) -> Vec<u8> {
    let mut output = collection.as_bytes().to_vec();
    output.push(KEY_SEPARATOR);
    output
}

impl RocksStore {
    pub fn open(opts: &RocksDB) -> Result<Self, StoreError> {
        let (path, cf_name) = opts.get();

        let mut db_opts = Options::default();
        db_opts.create_if_missing(opts.get_create_if_missing());
        db_opts.create_missing_column_families(opts.get_create_missing_columns());
        db_opts.set_error_if_exists(opts.get_set_error_if_exists());

        let wal_dir = opts.get_set_wal_dir();
        if !wal_dir.is_empty() {
            db_opts.set_wal_dir(wal_dir);
        }

        let cfs = vec![ColumnFamilyDescriptor::new(cf_name.as_str(), Options::default())];
        let db = Db::open_cf_descriptors(&db_opts, Path::new(&path), cfs).map_err(backend_error)?;
        info!("rocksdb store opened at {} (cf: {})", path, cf_name);

        Ok(Self {
            db: Arc::new(db),
            cf_name,
            writer: Arc::new(Mutex::new(())),
        })
    }

    async fn read(&self, key: Vec<u8>) -> Result<Option<Vec<u8>>, StoreError> {
        let db = self.db.clone();
        let cf_name = self.cf_name.clone();

        spawn_blocking(move || {
            let cf = db
                .cf_handle(&cf_name)
                .ok_or(StoreError::BackendError("cf handler failed".to_string()))?;
            db.get_cf(&cf, key).map_err(backend_error)
        })
        .await
        .map_err(backend_error)?
    }

    async fn write(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StoreError> {
        let db = self.db.clone();
        let cf_name = self.cf_name.clone();

        spawn_blocking(move || {
            let cf = db
                .cf_handle(&cf_name)
                .ok_or(StoreError::BackendError("cf handler failed".to_string()))?;
            db.put_cf(&cf, key, value).map_err(backend_error)
        })
        .await
        .map_err(backend_error)?
    }
}

#[async_trait]
impl DocumentStore for RocksStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.read(build_key(collection, key)).await
    }

    async fn insert(&self, collection: &str, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let _guard = self.writer.lock().await;

        let db_key = build_key(collection, key);
        if self.read(db_key.clone()).await?.is_some() {
            return Err(StoreError::AlreadyExists(format!("{}:{}", collection, key)));
        }

        self.write(db_key, value).await
    }

    async fn put(&self, collection: &str, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.write(build_key(collection, key), value).await
    }

    async fn compare_and_swap(
        &self,
        collection: &str,
        key: &str,
        expected: &[u8],
        value: Vec<u8>,
    ) -> Result<bool, StoreError> {
        let _guard = self.writer.lock().await;

        let db_key = build_key(collection, key);
        match self.read(db_key.clone()).await? {
            Some(current) if current.as_slice() == expected => {
                self.write(db_key, value).await?;
                Ok(true)
            }
            Some(_) => {
                debug!("compare and swap lost on {}:{}", collection, key);
                Ok(false)
            }
            None => Err(StoreError::NotFound(format!("{}:{}", collection, key))),
        }
    }

    async fn remove(&self, collection: &str, key: &str) -> Result<bool, StoreError> {
        let _guard = self.writer.lock().await;

        let db_key = build_key(collection, key);
        if self.read(db_key.clone()).await?.is_none() {
            return Ok(false);
        }

        let db = self.db.clone();
        let cf_name = self.cf_name.clone();
        spawn_blocking(move || {
            let cf = db
                .cf_handle(&cf_name)
                .ok_or(StoreError::BackendError("cf handler failed".to_string()))?;
            db.delete_cf(&cf, db_key).map_err(backend_error)
        })
        .await
        .map_err(backend_error)??;

        Ok(true)
    }

    async fn list(&self, collection: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        let db = self.db.clone();
        let cf_name = self.cf_name.clone();
        let prefix = collection_prefix(collection);

        spawn_blocking(move || {
            let cf = db
                .cf_handle(&cf_name)
                .ok_or(StoreError::BackendError("cf handler failed".to_string()))?;

            let mut values = Vec::new();
            let iter = db.iterator_cf(&cf, IteratorMode::From(&prefix, Direction::Forward));
            for item in iter {
                let (key, value) = item.map_err(backend_error)?;
                if !key.starts_with(&prefix) {
                    break;
                }
                values.push(value.to_vec());
            }

            Ok(values)
        })
        .await
        .map_err(backend_error)?
    }
}
