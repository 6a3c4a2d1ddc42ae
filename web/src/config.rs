use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use tracing::debug;

use crate::gcs::ServiceAccountKey;

pub(crate) const DEFAULT_CHAT_MODEL: &str = "gemini-2.0-flash";
pub(crate) const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org";

fn secrets_eq(a: &Option<SecretString>, b: &Option<SecretString>) -> bool {
    a.as_ref().map(|s| s.expose_secret()) == b.as_ref().map(|s| s.expose_secret())
}

/// Read a secret either from `file` (when it is not empty) or from the first
/// environment variable in `vars` that is set and not blank
fn load_secret(
    file: &str,
    vars: &[&str],
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<Option<SecretString>> {
    if !file.is_empty() {
        debug!("Looking up secret from file '{file}'");
        let value = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read secret from file '{file}'"))?;
        return Ok(Some(value.trim().to_string().into()));
    }
    Ok(vars
        .iter()
        .filter_map(|var| lookup(var))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
        .map(SecretString::from))
}

/// The service account key for cloud storage: the contents of `file` if it
/// is set, else the key json in `GCS_CREDENTIALS`, else the file named by
/// `GOOGLE_APPLICATION_CREDENTIALS`
fn load_gcs_credentials(
    file: &str,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<Option<ServiceAccountKey>> {
    let json = match load_secret(file, &["GCS_CREDENTIALS"], lookup)? {
        Some(json) => json,
        None => match lookup("GOOGLE_APPLICATION_CREDENTIALS").filter(|p| !p.trim().is_empty()) {
            Some(path) => load_secret(path.trim(), &[], lookup)?
                .with_context(|| format!("No service account key in '{path}'"))?,
            None => return Ok(None),
        },
    };
    ServiceAccountKey::from_json(json.expose_secret()).map(Some)
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub(crate) struct AdminConfig {
    #[serde(default)]
    pub(crate) passwordfile: String,
    #[serde(skip)]
    pub(crate) password: Option<SecretString>,
}

impl PartialEq for AdminConfig {
    fn eq(&self, other: &Self) -> bool {
        self.passwordfile == other.passwordfile && secrets_eq(&self.password, &other.password)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct OAuthConfig {
    #[serde(default)]
    pub(crate) client_id: String,
    #[serde(default)]
    pub(crate) client_secret_file: String,
    #[serde(skip)]
    pub(crate) client_secret: Option<SecretString>,
}

impl PartialEq for OAuthConfig {
    fn eq(&self, other: &Self) -> bool {
        self.client_id == other.client_id
            && self.client_secret_file == other.client_secret_file
            && secrets_eq(&self.client_secret, &other.client_secret)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub(crate) struct GcsConfig {
    pub(crate) bucket: String,
    /// A service account key file in Google's json format
    #[serde(default)]
    pub(crate) credentials_file: String,
    #[serde(skip)]
    pub(crate) credentials: Option<ServiceAccountKey>,
}

/// Where uploaded images end up
#[derive(Debug, Deserialize, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) enum ImageStorage {
    /// A local directory, served by this server under `/uploads`
    Local(String),
    /// A Google Cloud Storage bucket
    Gcs(GcsConfig),
}

fn default_chat_model() -> String {
    DEFAULT_CHAT_MODEL.to_string()
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct ChatConfig {
    #[serde(default = "default_chat_model")]
    pub(crate) model: String,
    #[serde(skip)]
    pub(crate) api_key: Option<SecretString>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            api_key: None,
        }
    }
}

impl PartialEq for ChatConfig {
    fn eq(&self, other: &Self) -> bool {
        self.model == other.model && secrets_eq(&self.api_key, &other.api_key)
    }
}

fn default_geocoder_url() -> String {
    DEFAULT_GEOCODER_URL.to_string()
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct GeocoderConfig {
    #[serde(default = "default_geocoder_url")]
    pub(crate) base_url: String,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: default_geocoder_url(),
        }
    }
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct ListenConfig {
    pub(crate) host: String,
    pub(crate) port: u16,
}

const DEFAULT_HTTP_PORT: u16 = 8080;
const DEFAULT_HOST: &str = "0.0.0.0";
fn default_listen() -> ListenConfig {
    ListenConfig {
        host: DEFAULT_HOST.to_string(),
        port: DEFAULT_HTTP_PORT,
    }
}

// This handles the case where the `listen` block is PRESENT, but a field may be missing.
fn deserialize_listen_with_default_port<'de, D>(deserializer: D) -> Result<ListenConfig, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct PartialListenConfig {
        host: Option<String>,
        port: Option<u16>,
    }

    let partial_config = PartialListenConfig::deserialize(deserializer)?;

    Ok(ListenConfig {
        host: partial_config
            .host
            .unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: partial_config.port.unwrap_or(DEFAULT_HTTP_PORT),
    })
}

fn default_public_base_url() -> String {
    format!("http://localhost:{DEFAULT_HTTP_PORT}")
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct EnvConfig {
    #[serde(default = "default_listen")]
    #[serde(deserialize_with = "deserialize_listen_with_default_port")]
    pub(crate) listen: ListenConfig,
    /// A database url, see [libpupi::store::StoreConfig::from_url]
    #[serde(default)]
    pub(crate) database: Option<String>,
    #[serde(default = "default_public_base_url")]
    pub(crate) public_base_url: String,
    /// A directory of static frontend files served at the root
    #[serde(default)]
    pub(crate) static_dir: Option<String>,
    #[serde(default)]
    pub(crate) admin: AdminConfig,
    #[serde(default)]
    pub(crate) oauth: Option<OAuthConfig>,
    #[serde(default)]
    pub(crate) image_storage: Option<ImageStorage>,
    #[serde(default)]
    pub(crate) chat: ChatConfig,
    #[serde(default)]
    pub(crate) geocoder: GeocoderConfig,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            database: None,
            public_base_url: default_public_base_url(),
            static_dir: None,
            admin: AdminConfig::default(),
            oauth: None,
            image_storage: None,
            chat: ChatConfig::default(),
            geocoder: GeocoderConfig::default(),
        }
    }
}

impl EnvConfig {
    /// Parse a yaml file with one top-level key per environment and return
    /// the configuration for `envname`
    pub(crate) fn from_yaml(yaml: &str, envname: &str) -> Result<Self> {
        let mut configs: HashMap<String, EnvConfig> =
            serde_yaml::from_str(yaml).with_context(|| "Failed to parse configuration")?;
        configs
            .remove(envname)
            .with_context(|| format!("No configuration found for environment '{envname}'"))
    }

    pub(crate) fn init(&mut self) -> Result<()> {
        self.init_with(&|var| std::env::var(var).ok())
    }

    /// Fill in the secrets and environment overrides, looking up environment
    /// variables through `lookup`
    pub(crate) fn init_with(&mut self, lookup: &dyn Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup("DATABASE_URL").filter(|u| !u.trim().is_empty()) {
            debug!("Using database url from environment variable DATABASE_URL");
            self.database = Some(url);
        }

        self.admin.password = load_secret(
            &self.admin.passwordfile,
            &["PUPI_ADMIN_PASSWORD", "ADMIN_PASSWORD"],
            lookup,
        )
        .with_context(|| "Failed to load admin password")?;

        if self.oauth.is_none() {
            self.oauth = lookup("GOOGLE_CLIENT_ID")
                .filter(|id| !id.trim().is_empty())
                .map(|client_id| OAuthConfig {
                    client_id,
                    client_secret_file: String::new(),
                    client_secret: None,
                });
        }
        if let Some(ref mut oauth) = self.oauth {
            if oauth.client_id.is_empty() {
                oauth.client_id = lookup("GOOGLE_CLIENT_ID").unwrap_or_default();
            }
            oauth.client_secret = load_secret(
                &oauth.client_secret_file,
                &["GOOGLE_CLIENT_SECRET"],
                lookup,
            )?;
            if oauth.client_id.is_empty() || oauth.client_secret.is_none() {
                anyhow::bail!(
                    "OAuth is configured but the client id or secret is missing (GOOGLE_CLIENT_ID / GOOGLE_CLIENT_SECRET)"
                );
            }
        }

        if self.image_storage.is_none() {
            self.image_storage = lookup("GCS_BUCKET_NAME")
                .filter(|b| !b.trim().is_empty())
                .map(|bucket| {
                    ImageStorage::Gcs(GcsConfig {
                        bucket,
                        credentials_file: String::new(),
                        credentials: None,
                    })
                });
        }
        if let Some(ImageStorage::Gcs(ref mut gcs)) = self.image_storage {
            gcs.credentials = load_gcs_credentials(&gcs.credentials_file, lookup)?;
            if gcs.credentials.is_none() {
                anyhow::bail!(
                    "Cloud storage bucket '{}' is configured but no service account key was found (GCS_CREDENTIALS / GOOGLE_APPLICATION_CREDENTIALS)",
                    gcs.bucket
                );
            }
        }

        self.chat.api_key = load_secret("", &["GEMINI_API_KEY", "API_KEY"], lookup)?;
        Ok(())
    }
}
