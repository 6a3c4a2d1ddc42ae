use crate::{
    EnvConfig,
    chat::ChatClient,
    config::ImageStorage,
    gcs::{self, ServiceAccountTokens},
    geocode::Geocoder,
    images::{GcsImageStore, ImageStore, LocalImageStore},
    oauth::{self, OAuth2Client},
};
use anyhow::{Context, Result, anyhow};
use libpupi::{Database, store::StoreConfig};
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug)]
pub struct SharedState {
    pub db: Database,
    pub config: EnvConfig,
    pub oauth: Option<OAuth2Client>,
    pub images: Option<Arc<dyn ImageStore>>,
    pub geocoder: Geocoder,
    pub chat: ChatClient,
    pub http: reqwest::Client,
}

/// An http client that never follows redirects
fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .with_context(|| "Unable to create http client")
}

fn image_store(
    http: &reqwest::Client,
    config: &EnvConfig,
) -> Result<Option<Arc<dyn ImageStore>>> {
    Ok(match config.image_storage {
        None => None,
        Some(ImageStorage::Local(ref dir)) => Some(Arc::new(LocalImageStore::new(dir))),
        Some(ImageStorage::Gcs(ref cfg)) => {
            let key = cfg.credentials.as_ref().ok_or_else(|| {
                anyhow!("No service account key for cloud storage bucket {}", cfg.bucket)
            })?;
            let tokens = ServiceAccountTokens::new(http.clone(), key, gcs::STORAGE_SCOPE)?;
            Some(Arc::new(GcsImageStore::new(
                http.clone(),
                cfg.bucket.clone(),
                tokens,
            )))
        }
    })
}

impl SharedState {
    pub async fn new(env: EnvConfig) -> Result<Self> {
        trace!("Creating shared app state");
        let store_config = StoreConfig::from_url(env.database.as_deref());
        let db = Database::open(&store_config)
            .await
            .with_context(|| format!("Unable to open {} database", store_config.backend()))?;
        Self::with_database(db, env)
    }

    pub fn with_database(db: Database, env: EnvConfig) -> Result<Self> {
        let http = http_client()?;
        let oauth = match env.oauth {
            Some(ref cfg) => Some(oauth::client(cfg, &env.public_base_url)?),
            None => None,
        };
        debug!(
            oauth = oauth.is_some(),
            images = ?env.image_storage,
            chat = env.chat.api_key.is_some(),
            "Optional services"
        );
        Ok(Self {
            images: image_store(&http, &env)?,
            geocoder: Geocoder::new(http.clone(), &env.geocoder.base_url),
            chat: ChatClient::new(http.clone(), env.chat.model.clone(), env.chat.api_key.clone()),
            db,
            oauth,
            config: env,
            http,
        })
    }

    /// A state for tests with the admin password `topsecret` and no external
    /// services configured
    #[cfg(test)]
    pub fn test(pool: sqlx::Pool<sqlx::Sqlite>) -> Self {
        use crate::config::AdminConfig;

        debug!("Creating test shared app state");
        let config = EnvConfig {
            database: Some("test-database.sqlite".to_string()),
            admin: AdminConfig {
                passwordfile: String::new(),
                password: Some("topsecret".to_string().into()),
            },
            ..Default::default()
        };
        let db = Database::Sqlite(libpupi::store::sqlite::SqliteStore::from(pool));
        Self::with_database(db, config).expect("failed to create test state")
    }
}

pub type AppState = Arc<SharedState>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GcsConfig;
    use test_log::test;

    fn gcs_config(credentials: Option<gcs::ServiceAccountKey>) -> EnvConfig {
        EnvConfig {
            image_storage: Some(ImageStorage::Gcs(GcsConfig {
                bucket: "pupi-images".into(),
                credentials_file: String::new(),
                credentials,
            })),
            ..Default::default()
        }
    }

    #[test]
    fn test_image_store() {
        let http = reqwest::Client::new();
        assert!(image_store(&http, &EnvConfig::default()).unwrap().is_none());

        let local = EnvConfig {
            image_storage: Some(ImageStorage::Local("/tmp/pupi".into())),
            ..Default::default()
        };
        assert!(image_store(&http, &local).unwrap().is_some());

        let key = gcs::tests::key("http://127.0.0.1:9/token");
        assert!(image_store(&http, &gcs_config(Some(key.clone()))).unwrap().is_some());
        assert!(image_store(&http, &gcs_config(None)).is_err());

        let mut bad = key;
        bad.private_key = "not a key".to_string().into();
        assert!(image_store(&http, &gcs_config(Some(bad))).is_err());
    }
}
