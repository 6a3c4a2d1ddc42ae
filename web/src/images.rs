//! Storage for uploaded pupo pictures
use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::body::Bytes;
use crate::gcs::ServiceAccountTokens;
use rand::Rng;
use secrecy::ExposeSecret;
use std::path::PathBuf;
use time::OffsetDateTime;
use tracing::debug;

/// Path prefix under which a [LocalImageStore] is served
pub(crate) const LOCAL_URL_PREFIX: &str = "/uploads";

const GCS_PUBLIC_URL: &str = "https://storage.googleapis.com";
const GCS_UPLOAD_URL: &str = "https://storage.googleapis.com/upload/storage/v1/b";
const NAME_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const DEFAULT_EXTENSION: &str = "jpg";

/// Somewhere to put an image so that it can be fetched by browsers later
#[async_trait]
pub(crate) trait ImageStore: Send + Sync + std::fmt::Debug {
    /// Store `data` under the object `name` and return its public url
    async fn put(&self, name: &str, content_type: &str, data: Bytes) -> Result<String>;
}

/// Generate a unique object name of the form
/// `pupi/<unix-millis>-<7 random chars>.<ext>`, keeping the extension of the
/// uploaded file name if it has one
pub(crate) fn object_name(filename: Option<&str>) -> String {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    let mut rng = rand::thread_rng();
    let suffix: String = (0..7)
        .map(|_| NAME_CHARSET[rng.gen_range(0..NAME_CHARSET.len())] as char)
        .collect();
    let extension = filename
        .and_then(|f| f.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or(DEFAULT_EXTENSION);
    format!("pupi/{millis}-{suffix}.{extension}")
}

/// Writes images into a local directory
#[derive(Debug, Clone)]
pub(crate) struct LocalImageStore {
    dir: PathBuf,
}

impl LocalImageStore {
    pub(crate) fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn put(&self, name: &str, _content_type: &str, data: Bytes) -> Result<String> {
        let path = self.dir.join(name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {parent:?}"))?;
        }
        tokio::fs::write(&path, &data)
            .await
            .with_context(|| format!("Failed to write image {path:?}"))?;
        debug!(?path, size = data.len(), "Stored image");
        Ok(format!("{LOCAL_URL_PREFIX}/{name}"))
    }
}

/// Uploads images to a Google Cloud Storage bucket and makes them publicly
/// readable
#[derive(Debug)]
pub(crate) struct GcsImageStore {
    http: reqwest::Client,
    bucket: String,
    tokens: ServiceAccountTokens,
    upload_url: String,
}

impl GcsImageStore {
    pub(crate) fn new(http: reqwest::Client, bucket: String, tokens: ServiceAccountTokens) -> Self {
        Self {
            http,
            bucket,
            tokens,
            upload_url: GCS_UPLOAD_URL.to_string(),
        }
    }

    #[cfg(test)]
    fn with_upload_url(mut self, url: String) -> Self {
        self.upload_url = url;
        self
    }

    pub(crate) fn public_url(&self, name: &str) -> String {
        format!("{GCS_PUBLIC_URL}/{}/{name}", self.bucket)
    }
}

#[async_trait]
impl ImageStore for GcsImageStore {
    async fn put(&self, name: &str, content_type: &str, data: Bytes) -> Result<String> {
        let size = data.len();
        let token = self
            .tokens
            .token()
            .await
            .with_context(|| "Unable to get a cloud storage access token")?;
        self.http
            .post(format!("{}/{}/o", self.upload_url, self.bucket))
            .query(&[
                ("uploadType", "media"),
                ("name", name),
                ("predefinedAcl", "publicRead"),
            ])
            .bearer_auth(token.expose_secret())
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await
            .with_context(|| "Failed to send upload request to cloud storage")?
            .error_for_status()
            .with_context(|| format!("Cloud storage rejected upload of {name}"))?;
        debug!(bucket = %self.bucket, name, size, "Uploaded image");
        Ok(self.public_url(name))
    }
}
