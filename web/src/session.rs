//! Login sessions are persisted next to the application data when the data
//! lives in a SQL database, and kept in memory otherwise.
use async_trait::async_trait;
use libpupi::Database;
use time::Duration;
use tokio::task::JoinHandle;
use tower_sessions::{
    Expiry, MemoryStore, SessionManagerLayer, SessionStore,
    cookie::SameSite,
    session::{Id, Record},
    session_store::{self, ExpiredDeletion},
};
use tower_sessions_sqlx_store::{PostgresStore, SqliteStore};
use tracing::{debug, warn};

const SESSION_INACTIVITY_DAYS: i64 = 7;
const EXPIRED_DELETION_PERIOD: std::time::Duration = std::time::Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
pub(crate) enum AppSessionStore {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
    Postgres(PostgresStore),
}

impl AppSessionStore {
    /// Pick a session store that matches the storage backend of `db`,
    /// creating the session table if necessary
    pub(crate) async fn for_database(db: &Database) -> Result<Self, sqlx::Error> {
        debug!(backend = %db.backend(), "Setting up session store");
        Ok(match db {
            Database::Json(_) => Self::Memory(MemoryStore::default()),
            Database::Sqlite(s) => {
                let store = SqliteStore::new(s.pool().clone());
                store.migrate().await?;
                Self::Sqlite(store)
            }
            Database::Postgres(s) => {
                let store = PostgresStore::new(s.pool().clone());
                store.migrate().await?;
                Self::Postgres(store)
            }
        })
    }

    /// Start a task that removes expired sessions from the database every
    /// hour. The memory store needs no cleanup and gets no task.
    pub(crate) fn spawn_expired_deletion(&self) -> Option<JoinHandle<()>> {
        if let Self::Memory(_) = self {
            return None;
        }
        let store = self.clone();
        Some(tokio::task::spawn(async move {
            if let Err(e) = store
                .continuously_delete_expired(EXPIRED_DELETION_PERIOD)
                .await
            {
                warn!("Stopped deleting expired sessions: {e}");
            }
        }))
    }
}

#[async_trait]
impl ExpiredDeletion for AppSessionStore {
    async fn delete_expired(&self) -> session_store::Result<()> {
        match self {
            Self::Memory(_) => Ok(()),
            Self::Sqlite(s) => s.delete_expired().await,
            Self::Postgres(s) => s.delete_expired().await,
        }
    }
}

#[async_trait]
impl SessionStore for AppSessionStore {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        match self {
            Self::Memory(s) => s.create(record).await,
            Self::Sqlite(s) => s.create(record).await,
            Self::Postgres(s) => s.create(record).await,
        }
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        match self {
            Self::Memory(s) => s.save(record).await,
            Self::Sqlite(s) => s.save(record).await,
            Self::Postgres(s) => s.save(record).await,
        }
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        match self {
            Self::Memory(s) => s.load(session_id).await,
            Self::Sqlite(s) => s.load(session_id).await,
            Self::Postgres(s) => s.load(session_id).await,
        }
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        match self {
            Self::Memory(s) => s.delete(session_id).await,
            Self::Sqlite(s) => s.delete(session_id).await,
            Self::Postgres(s) => s.delete(session_id).await,
        }
    }
}

/// Build the session layer. The cookie must be sent along with the redirect
/// back from the identity provider, so it uses `SameSite=Lax`.
pub(crate) fn layer(store: AppSessionStore, secure: bool) -> SessionManagerLayer<AppSessionStore> {
    SessionManagerLayer::new(store)
        .with_secure(secure)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(Duration::days(SESSION_INACTIVITY_DAYS)))
}
