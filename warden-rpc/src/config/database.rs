use serde::Deserialize;

use crate::common::types::{CommonError, ToValidate};

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Memory,
    RocksDB,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RocksDB {
    pub(super) path: String,
    pub(super) cf_name: String,

    #[serde(default = "enabled")]
    pub(super) create_if_missing: bool,

    #[serde(default = "enabled")]
    pub(super) create_missing_columns: bool,

    #[serde(default)]
    pub(super) set_error_if_exists: bool,

    #[serde(default)]
    pub(super) set_wal_dir: String,
}

fn enabled() -> bool {
    true
}

impl RocksDB {
    pub fn get(&self) -> (String, String) {
        (self.path.to_owned(), self.cf_name.to_owned())
    }

    pub fn get_create_if_missing(&self) -> bool {
        self.create_if_missing
    }

    pub fn get_create_missing_columns(&self) -> bool {
        self.create_missing_columns
    }

    pub fn get_set_error_if_exists(&self) -> bool {
        self.set_error_if_exists
    }

    pub fn get_set_wal_dir(&self) -> String {
        self.set_wal_dir.to_owned()
    }
}

impl Default for RocksDB {
    fn default() -> Self {
        Self {
            path: "./db".to_string(),
            cf_name: "".to_string(),
            create_if_missing: true,
            create_missing_columns: true,
            set_error_if_exists: false,
            set_wal_dir: "".to_string(),
        }
    }
}

impl ToValidate for RocksDB {
    fn validate(&self) -> Result<(), CommonError> {
        if self.path.is_empty() {
            return Err(CommonError::ValidationError(
                "config: rocksdb:path is missing".to_string(),
            ));
        }

        if self.cf_name.is_empty() {
            return Err(CommonError::ValidationError(
                "config: rocksdb:cf_name is missing".to_string(),
            ));
        }

        if self.set_wal_dir.is_empty() {
            return Err(CommonError::ValidationError(
                "config: rocksdb:wal_dir is missing".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Database {
    #[serde(default)]
    pub(super) backend: Backend,

    #[serde(default)]
    pub rocksdb: Option<RocksDB>,
}

impl Database {
    pub fn get_backend(&self) -> Backend {
        self.backend
    }
}

impl ToValidate for Database {
    fn validate(&self) -> Result<(), CommonError> {
        match (self.backend, &self.rocksdb) {
            (Backend::Memory, _) => Ok(()),
            (Backend::RocksDB, Some(rocksdb)) => rocksdb.validate(),
            (Backend::RocksDB, None) => Err(CommonError::ValidationError(
                "config: database:rocksdb is missing".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::common::helpers::{self, testconfig};

    #[test]
    fn test_parse_database_config() {
        let content = std::fs::read_to_string(testconfig::fixture("config_db.toml")).unwrap();
        let config_db: Database = toml::from_str(&content).unwrap();
        assert_eq!(config_db.get_backend(), Backend::RocksDB);

        let rocksdb = config_db.rocksdb.unwrap();
        let (path, cf_name) = rocksdb.get();
        assert_eq!(path, "./warden-storage");
        assert_eq!(cf_name, "warden-cf");
        assert_eq!(rocksdb.get_set_wal_dir(), "./warden-db-wal");

        assert!(rocksdb.get_create_if_missing());
        assert!(rocksdb.get_create_missing_columns());
        assert!(rocksdb.get_set_error_if_exists());
    }

    #[test]
    fn test_rocksdb_validation_failed() {
        let mut rocksdb = RocksDB::default();
        rocksdb.path = "".to_string();

        let validation = helpers::validate(rocksdb.clone());
        assert!(validation.unwrap_err().to_string().contains("rocksdb:path"));

        rocksdb.path = "path".to_string();
        let validation = helpers::validate(rocksdb.clone());
        assert!(validation.unwrap_err().to_string().contains("rocksdb:cf_name"));

        rocksdb.cf_name = "cf".to_string();
        let validation = helpers::validate(rocksdb);
        assert!(validation.unwrap_err().to_string().contains("rocksdb:wal_dir"));
    }

    #[test]
    fn test_memory_backend_needs_nothing() {
        let validation = helpers::validate(Database::default());
        assert!(validation.is_ok());

        let database = Database {
            backend: Backend::RocksDB,
            rocksdb: None,
        };
        let validation = helpers::validate(database);
        assert!(validation
            .unwrap_err()
            .to_string()
            .contains("database:rocksdb"));
    }
}
