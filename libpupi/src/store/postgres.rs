//! Storage backend for a hosted Postgres database
use crate::{
    error::Result,
    pupo::{Pupo, PupoData, PupoInput},
    store::Store,
};
use async_trait::async_trait;
use sqlx::{PgPool, Pool, Postgres, postgres::PgPoolOptions};
use std::{collections::BTreeMap, time::Duration};
use tracing::{debug, trace};

const MAX_CONNECTIONS: u32 = 10;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

const INSERT_PUPO: &str = r#"INSERT INTO pupi (name, description, lat, lng, image, artist, theme, address)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id"#;

/// A connection pool for a Postgres server
#[derive(Clone, Debug)]
pub struct PostgresStore(Pool<Postgres>);

impl From<Pool<Postgres>> for PostgresStore {
    fn from(value: Pool<Postgres>) -> Self {
        Self(value)
    }
}

impl PostgresStore {
    /// Connect to the server at `url` and bring its schema up to date
    pub async fn open(url: &str) -> Result<Self> {
        let pool: PgPool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(url)
            .await?;
        trace!("Running database migrations");
        sqlx::migrate!("../db/migrations/postgres").run(&pool).await?;
        Ok(Self(pool))
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.0
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn list_pupi(&self) -> Result<Vec<Pupo>> {
        Ok(
            sqlx::query_as("SELECT * FROM pupi ORDER BY name ASC, id ASC")
                .fetch_all(self.pool())
                .await?,
        )
    }

    async fn get_pupo(&self, id: i64) -> Result<Option<Pupo>> {
        Ok(sqlx::query_as("SELECT * FROM pupi WHERE id=$1")
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
        let id: i64 = sqlx::query_scalar(INSERT_PUPO)
            .bind(&data.name)
            .bind(&data.description)
            .bind(data.lat)
            .bind(data.lng)
            .bind(&data.image)
            .bind(&data.artist)
            .bind(&data.theme)
            .bind(&data.address)
            .fetch_one(self.pool())
            .await?;
        debug!(id, name = %data.name, "Created pupo");
        Ok(data.with_id(id))
    }

    async fn update_pupo(&self, id: i64, patch: PupoInput) -> Result<Option<Pupo>> {
        let Some(current) = self.get_pupo(id).await? else {
            return Ok(None);
        };
        let updated = current.apply(patch)?;
        sqlx::query(
            r#"UPDATE pupi SET name=$1, description=$2, lat=$3, lng=$4, image=$5, artist=$6,
            theme=$7, address=$8 WHERE id=$9"#,
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
        sqlx::query("DELETE FROM votes WHERE pupo_id=$1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let res = sqlx::query("DELETE FROM pupi WHERE id=$1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(res.rows_affected() > 0)
    }

    async fn insert_bulk(&self, pupi: Vec<PupoData>) -> Result<usize> {
        let mut tx = self.pool().begin().await?;
        for data in pupi.iter() {
            let _id: i64 = sqlx::query_scalar(INSERT_PUPO)
                .bind(&data.name)
                .bind(&data.description)
                .bind(data.lat)
                .bind(data.lng)
                .bind(&data.image)
                .bind(&data.artist)
                .bind(&data.theme)
                .bind(&data.address)
                .fetch_one(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        debug!(n = pupi.len(), "Inserted pupi");
        Ok(pupi.len())
    }

    async fn has_vote(&self, user_id: &str, pupo_id: i64) -> Result<bool> {
        Ok(sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM votes WHERE user_id=$1 AND pupo_id=$2)",
        )
        .bind(user_id)
        .bind(pupo_id)
        .fetch_one(self.pool())
        .await?)
    }

    async fn add_vote(&self, user_id: &str, pupo_id: i64) -> Result<()> {
        sqlx::query("INSERT INTO votes (user_id, pupo_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(user_id)
            .bind(pupo_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn remove_vote(&self, user_id: &str, pupo_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM votes WHERE user_id=$1 AND pupo_id=$2")
            .bind(user_id)
            .bind(pupo_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn user_votes(&self, user_id: &str) -> Result<Vec<i64>> {
        Ok(
            sqlx::query_scalar("SELECT pupo_id FROM votes WHERE user_id=$1 ORDER BY pupo_id ASC")
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
