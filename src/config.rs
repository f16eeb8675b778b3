use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use log::info;
use serde::Deserialize;

use crate::error::Result;
use crate::memory::MemoryBackend;
use crate::relational::RelationalBackend;
use crate::single_table::{MongoTables, SingleTableBackend};
use crate::store::Backend;

/// Which physical store to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Transient in-process maps. Tests only.
    Memory,
    /// Normalised SQLite schema.
    Relational,
    /// Single-table NoSQL layout on MongoDB.
    SingleTable,
}

/// Store configuration, derived from `Store.toml` and `STORE_*` environment
/// variables.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    backend: BackendKind,
    // relational
    #[serde(default)]
    sqlite_path: Option<PathBuf>,
    // single table
    #[serde(default = "default_mongo_uri")]
    mongo_uri: String,
    #[serde(default = "default_mongo_database")]
    mongo_database: String,
}

fn default_mongo_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_mongo_database() -> String {
    "rcv".to_string()
}

impl StoreConfig {
    /// The default configuration sources: `Store.toml`, overridden by
    /// `STORE_*` environment variables.
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Toml::file("Store.toml"))
            .merge(Env::prefixed("STORE_"))
    }

    /// Load from the default sources.
    pub fn load() -> Result<Self> {
        Self::from_figment(&Self::figment())
    }

    pub fn from_figment(figment: &Figment) -> Result<Self> {
        Ok(figment.extract()?)
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// SQLite database file. If unset, the relational store lives in memory.
    pub fn sqlite_path(&self) -> Option<&Path> {
        self.sqlite_path.as_deref()
    }

    /// MongoDB connection string for the single-table store.
    pub fn mongo_uri(&self) -> &str {
        &self.mongo_uri
    }

    /// MongoDB database holding the single-table store.
    pub fn mongo_database(&self) -> &str {
        &self.mongo_database
    }

    /// Open the configured backend, performing any setup it needs.
    pub fn open(&self) -> Result<Box<dyn Backend>> {
        match self.backend {
            BackendKind::Memory => {
                info!("Using transient in-memory store");
                Ok(Box::new(MemoryBackend::new()))
            }
            BackendKind::Relational => {
                let backend = match self.sqlite_path() {
                    Some(path) => {
                        info!("Opening SQLite store at {}", path.display());
                        RelationalBackend::open(path)?
                    }
                    None => {
                        info!("Opening transient SQLite store");
                        RelationalBackend::in_memory()?
                    }
                };
                Ok(Box::new(backend))
            }
            BackendKind::SingleTable => {
                info!("Loaded database config, connecting...");
                let tables = MongoTables::connect(&self.mongo_uri, &self.mongo_database)?;
                info!("...database connection online!");
                Ok(Box::new(SingleTableBackend::new(tables)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use figment::providers::Serialized;

    use super::*;

    use crate::error::Error;
    use crate::testing::ADMIN;

    fn from_toml(toml: &str) -> Result<StoreConfig> {
        StoreConfig::from_figment(&Figment::new().merge(Toml::string(toml)))
    }

    #[test]
    fn defaults() {
        let config = from_toml(r#"backend = "single_table""#).unwrap();
        assert_eq!(config.backend(), BackendKind::SingleTable);
        assert_eq!(config.sqlite_path(), None);
        assert_eq!(config.mongo_uri(), "mongodb://localhost:27017");
        assert_eq!(config.mongo_database(), "rcv");
    }

    #[test]
    fn overrides() {
        let figment = Figment::new()
            .merge(Toml::string(
                r#"
                backend = "memory"
                sqlite_path = "/var/lib/rcv/store.db"
                "#,
            ))
            .merge(Serialized::default("backend", "relational"));
        let config = StoreConfig::from_figment(&figment).unwrap();
        assert_eq!(config.backend(), BackendKind::Relational);
        assert_eq!(
            config.sqlite_path(),
            Some(Path::new("/var/lib/rcv/store.db"))
        );
    }

    #[test]
    fn bad_config() {
        let err = from_toml(r#"backend = "cassandra""#).unwrap_err();
        assert!(matches!(err, Error::Config(_)), "{err:?}");
        let err = from_toml("").unwrap_err();
        assert!(matches!(err, Error::Config(_)), "{err:?}");
    }

    #[test]
    fn open_transient_backends() {
        for toml in [r#"backend = "memory""#, r#"backend = "relational""#] {
            let store = from_toml(toml).unwrap().open().unwrap();
            store
                .create_user(ADMIN, &crate::testing::examples::alice())
                .unwrap();
            assert_eq!(store.list_users().unwrap().len(), 1);
        }
    }
}
