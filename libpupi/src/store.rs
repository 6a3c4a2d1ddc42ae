//! Pluggable storage for pupi and votes.
//!
//! Three backends are available and one of them is selected from a database
//! url (usually the `DATABASE_URL` environment variable):
//!
//! - a flat json file ([json::JsonFileStore])
//! - an embedded SQLite database ([sqlite::SqliteStore])
//! - a hosted Postgres database ([postgres::PostgresStore])
//!
//! All of them implement the [Store] trait, and [Database] wraps whichever one
//! was opened.
use crate::{
    error::{Error, Result},
    pupo::{Pupo, PupoData, PupoInput},
};
use async_trait::async_trait;
use std::{collections::BTreeMap, ops::Deref, path::PathBuf, str::FromStr};
use tracing::info;

pub mod json;
pub mod postgres;
pub mod sqlite;

/// The default location of the database when no url is configured
pub const DEFAULT_SQLITE_PATH: &str = "data/pupi.db";

/// Operations that every storage backend provides
#[async_trait]
pub trait Store: Send + Sync + std::fmt::Debug {
    /// All pupi, sorted by name
    async fn list_pupi(&self) -> Result<Vec<Pupo>>;

    async fn get_pupo(&self, id: i64) -> Result<Option<Pupo>>;

    async fn count_pupi(&self) -> Result<i64>;

    /// Store a new pupo and return it with its newly assigned id
    async fn create_pupo(&self, data: PupoData) -> Result<Pupo>;

    /// Apply a partial update. Returns `None` if the pupo does not exist.
    async fn update_pupo(&self, id: i64, patch: PupoInput) -> Result<Option<Pupo>>;

    /// Delete a pupo together with all of its votes. Returns whether a pupo
    /// was actually removed.
    async fn delete_pupo(&self, id: i64) -> Result<bool>;

    /// Insert many pupi at once. Either all of them are stored or none are.
    async fn insert_bulk(&self, pupi: Vec<PupoData>) -> Result<usize>;

    async fn has_vote(&self, user_id: &str, pupo_id: i64) -> Result<bool>;

    /// Record a vote. Adding an existing vote is a no-op.
    async fn add_vote(&self, user_id: &str, pupo_id: i64) -> Result<()>;

    /// Remove a vote. Removing a vote that doesn't exist is a no-op.
    async fn remove_vote(&self, user_id: &str, pupo_id: i64) -> Result<()>;

    /// Ids of all pupi the user has voted for, in ascending order
    async fn user_votes(&self, user_id: &str) -> Result<Vec<i64>>;

    /// Number of votes per pupo. Pupi without votes are absent.
    async fn vote_counts(&self) -> Result<BTreeMap<i64, i64>>;

    async fn close(&self);
}

/// The kind of storage backend in use
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Backend {
    Json,
    Sqlite,
    Postgres,
}

/// Where the data lives, as parsed from a database url
#[derive(Debug, Clone, PartialEq)]
pub enum StoreConfig {
    JsonFile(PathBuf),
    Sqlite(PathBuf),
    Postgres(String),
}

impl StoreConfig {
    /// Select a backend from an optional database url:
    ///
    /// - no url: SQLite at [DEFAULT_SQLITE_PATH]
    /// - `postgres://` or `postgresql://`: Postgres
    /// - `sqlite://` or `file:`: SQLite at the remaining path
    /// - `json://` or any path ending in `.json`: json file
    /// - anything else is treated as the path of a SQLite database
    pub fn from_url(url: Option<&str>) -> Self {
        let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) else {
            return Self::Sqlite(PathBuf::from(DEFAULT_SQLITE_PATH));
        };
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            return Self::Postgres(url.to_string());
        }
        if let Some(path) = url.strip_prefix("json://") {
            return Self::JsonFile(PathBuf::from(path));
        }
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("file:"))
            .unwrap_or(url);
        if path.ends_with(".json") {
            Self::JsonFile(PathBuf::from(path))
        } else {
            Self::Sqlite(PathBuf::from(path))
        }
    }

    pub fn backend(&self) -> Backend {
        match self {
            Self::JsonFile(_) => Backend::Json,
            Self::Sqlite(_) => Backend::Sqlite,
            Self::Postgres(_) => Backend::Postgres,
        }
    }
}

impl FromStr for StoreConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Err(Error::UnsupportedDatabaseUrl(s.to_string()));
        }
        Ok(Self::from_url(Some(s)))
    }
}

/// An open connection to one of the storage backends
#[derive(Clone, Debug)]
pub enum Database {
    Json(json::JsonFileStore),
    Sqlite(sqlite::SqliteStore),
    Postgres(postgres::PostgresStore),
}

impl Database {
    /// Open the configured backend. This will also perform any necessary
    /// migrations so that the schema is up to date.
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        info!(backend = %config.backend(), "Opening database");
        Ok(match config {
            StoreConfig::JsonFile(path) => Self::Json(json::JsonFileStore::open(path).await?),
            StoreConfig::Sqlite(path) => Self::Sqlite(sqlite::SqliteStore::open(path).await?),
            StoreConfig::Postgres(url) => Self::Postgres(postgres::PostgresStore::open(url).await?),
        })
    }

    /// Open the backend selected by `url`, see [StoreConfig::from_url]
    pub async fn open_url(url: Option<&str>) -> Result<Self> {
        Self::open(&StoreConfig::from_url(url)).await
    }

    pub fn backend(&self) -> Backend {
        match self {
            Self::Json(_) => Backend::Json,
            Self::Sqlite(_) => Backend::Sqlite,
            Self::Postgres(_) => Backend::Postgres,
        }
    }
}

impl Deref for Database {
    type Target = dyn Store;

    fn deref(&self) -> &Self::Target {
        match self {
            Self::Json(s) => s as &dyn Store,
            Self::Sqlite(s) => s,
            Self::Postgres(s) => s,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_config_from_url() {
        assert_eq!(
            StoreConfig::from_url(None),
            StoreConfig::Sqlite(PathBuf::from("data/pupi.db"))
        );
        assert_eq!(
            StoreConfig::from_url(Some("  ")),
            StoreConfig::Sqlite(PathBuf::from("data/pupi.db"))
        );
        assert_eq!(
            StoreConfig::from_url(Some("postgres://user:pw@db.example.com/pupi")),
            StoreConfig::Postgres("postgres://user:pw@db.example.com/pupi".into())
        );
        assert_eq!(
            StoreConfig::from_url(Some("postgresql://localhost/pupi")).backend(),
            Backend::Postgres
        );
        assert_eq!(
            StoreConfig::from_url(Some("sqlite://var/pupi.sqlite")),
            StoreConfig::Sqlite(PathBuf::from("var/pupi.sqlite"))
        );
        assert_eq!(
            StoreConfig::from_url(Some("file:/tmp/pupi.db")),
            StoreConfig::Sqlite(PathBuf::from("/tmp/pupi.db"))
        );
        assert_eq!(
            StoreConfig::from_url(Some("json://data/pupi")),
            StoreConfig::JsonFile(PathBuf::from("data/pupi"))
        );
        assert_eq!(
            StoreConfig::from_url(Some("data/pupi.json")),
            StoreConfig::JsonFile(PathBuf::from("data/pupi.json"))
        );
        assert_eq!(
            StoreConfig::from_url(Some("file:data/pupi.json")),
            StoreConfig::JsonFile(PathBuf::from("data/pupi.json"))
        );
        assert_eq!(
            StoreConfig::from_url(Some("pupi.db")),
            StoreConfig::Sqlite(PathBuf::from("pupi.db"))
        );
    }

    #[test]
    fn test_store_config_from_str() {
        assert!("".parse::<StoreConfig>().is_err());
        assert_eq!(
            "x.json".parse::<StoreConfig>().unwrap().backend(),
            Backend::Json
        );
    }

    #[test]
    fn test_backend_display() {
        assert_eq!(Backend::Json.to_string(), "json");
        assert_eq!(Backend::Postgres.to_string(), "postgres");
    }
}
