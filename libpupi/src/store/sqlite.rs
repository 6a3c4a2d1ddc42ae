//! Storage backend for an embedded SQLite database
use crate::{
    error::Result,
    pupo::{Pupo, PupoData, PupoInput},
    store::Store,
};
use async_trait::async_trait;
use sqlx::{
    Pool, Sqlite, SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode},
};
use std::{collections::BTreeMap, path::Path};
use tracing::{debug, trace};

/// A connection pool for the SQLite database file
#[derive(Clone, Debug)]
pub struct SqliteStore(Pool<Sqlite>);

impl From<Pool<Sqlite>> for SqliteStore {
    /// **WARNING**: This is primarily intended for tests. You should probably
    /// use [SqliteStore::open()] instead of creating the pool yourself, since
    /// [SqliteStore::open()] will perform database schema migration automatically.
    fn from(value: Pool<Sqlite>) -> Self {
        Self(value)
    }
}

impl SqliteStore {
    /// Open (or create) the database at `path` and bring its schema up to
    /// date
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        debug!(?path, "Opening sqlite database");
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);
        let pool = SqlitePool::connect_with(options).await?;
        trace!("Running database migrations");
        sqlx::migrate!("../db/migrations/sqlite").run(&pool).await?;
        Ok(Self(pool))
    }

    /// gets a reference to the underlying sqlx connection pool
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.0
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn list_pupi(&self) -> Result<Vec<Pupo>> {
        Ok(
            sqlx::query_as("SELECT * FROM pupi ORDER BY name ASC, id ASC")
                .fetch_all(self.pool())
                .await?,
        )
    }

    async fn get_pupo(&self, id: i64) -> Result<Option<Pupo>> {
        Ok(sqlx::query_as("SELECT * FROM pupi WHERE id=?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?)
    }

    async fn count_pupi(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM pupi")
            .fetch_one(self.pool())
            .await?)
    }

    async fn create_pupo(&self, data: PupoData) -> Result<Pupo> {
        let id = sqlx::query(
            r#"INSERT INTO pupi (name, description, lat, lng, image, artist, theme, address)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&data.name)
        .bind(&data.description)
        .bind(data.lat)
        .bind(data.lng)
        .bind(&data.image)
        .bind(&data.artist)
        .bind(&data.theme)
        .bind(&data.address)
        .execute(self.pool())
        .await?
        .last_insert_rowid();
        debug!(id, name = %data.name, "Created pupo");
        Ok(data.with_id(id))
    }

    async fn update_pupo(&self, id: i64, patch: PupoInput) -> Result<Option<Pupo>> {
        let Some(current) = self.get_pupo(id).await? else {
            return Ok(None);
        };
        let updated = current.apply(patch)?;
        sqlx::query(
            r#"UPDATE pupi SET name=?, description=?, lat=?, lng=?, image=?, artist=?, theme=?, address=?
            WHERE id=?"#,
        )
        .bind(&updated.name)
        .bind(&updated.description)
        .bind(updated.lat)
        .bind(updated.lng)
        .bind(&updated.image)
        .bind(&updated.artist)
        .bind(&updated.theme)
        .bind(&updated.address)
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(Some(updated))
    }

    async fn delete_pupo(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool().begin().await?;
        sqlx::query("DELETE FROM votes WHERE pupo_id=?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let res = sqlx::query("DELETE FROM pupi WHERE id=?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(res.rows_affected() > 0)
    }

    async fn insert_bulk(&self, pupi: Vec<PupoData>) -> Result<usize> {
        let mut tx = self.pool().begin().await?;
        for data in pupi.iter() {
            sqlx::query(
                r#"INSERT INTO pupi (name, description, lat, lng, image, artist, theme, address)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(&data.name)
            .bind(&data.description)
            .bind(data.lat)
            .bind(data.lng)
            .bind(&data.image)
            .bind(&data.artist)
            .bind(&data.theme)
            .bind(&data.address)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        debug!(n = pupi.len(), "Inserted pupi");
        Ok(pupi.len())
    }

    async fn has_vote(&self, user_id: &str, pupo_id: i64) -> Result<bool> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM votes WHERE user_id=? AND pupo_id=?")
            .bind(user_id)
            .bind(pupo_id)
            .fetch_one(self.pool())
            .await?;
        Ok(n > 0)
    }

    async fn add_vote(&self, user_id: &str, pupo_id: i64) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO votes (user_id, pupo_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(pupo_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn remove_vote(&self, user_id: &str, pupo_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM votes WHERE user_id=? AND pupo_id=?")
            .bind(user_id)
            .bind(pupo_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn user_votes(&self, user_id: &str) -> Result<Vec<i64>> {
        Ok(
            sqlx::query_scalar("SELECT pupo_id FROM votes WHERE user_id=? ORDER BY pupo_id ASC")
                .bind(user_id)
                .fetch_all(self.pool())
                .await?,
        )
    }

    async fn vote_counts(&self) -> Result<BTreeMap<i64, i64>> {
        let rows: Vec<(i64, i64)> =
            sqlx::query_as("SELECT pupo_id, COUNT(*) FROM votes GROUP BY pupo_id")
                .fetch_all(self.pool())
                .await?;
        Ok(rows.into_iter().collect())
    }

    async fn close(&self) {
        self.0.close().await
    }
}
