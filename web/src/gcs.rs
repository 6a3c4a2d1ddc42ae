//! Access tokens for Google Cloud Storage obtained with a service account key.
//!
//! A short-lived JWT signed with the account's private key is exchanged for an
//! access token at the account's token endpoint. Tokens are cached and
//! renewed shortly before they expire.
use anyhow::{Context, Result, bail};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;
use tracing::debug;

pub(crate) const STORAGE_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_write";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME: Duration = Duration::hours(1);
const REFRESH_MARGIN: Duration = Duration::minutes(2);

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The parts of a service account key file that are needed to request tokens
#[derive(Debug, Deserialize, Clone)]
pub(crate) struct ServiceAccountKey {
    pub(crate) client_email: String,
    pub(crate) private_key: SecretString,
    #[serde(default = "default_token_uri")]
    pub(crate) token_uri: String,
}

impl ServiceAccountKey {
    pub(crate) fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).with_context(|| "Invalid service account key")
    }
}

impl PartialEq for ServiceAccountKey {
    fn eq(&self, other: &Self) -> bool {
        self.client_email == other.client_email
            && self.token_uri == other.token_uri
            && self.private_key.expose_secret() == other.private_key.expose_secret()
    }
}

#[derive(Serialize, Deserialize)]
struct Claims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    token: SecretString,
    expires_at: OffsetDateTime,
}

impl CachedToken {
    fn is_fresh(&self, now: OffsetDateTime) -> bool {
        self.expires_at - REFRESH_MARGIN > now
    }
}

/// Hands out access tokens for one service account
pub(crate) struct ServiceAccountTokens {
    http: reqwest::Client,
    client_email: String,
    token_uri: String,
    scope: String,
    signing_key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for ServiceAccountTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountTokens")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountTokens {
    pub(crate) fn new(http: reqwest::Client, key: &ServiceAccountKey, scope: &str) -> Result<Self> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.expose_secret().as_bytes())
            .with_context(|| {
                format!("Invalid private key for service account {}", key.client_email)
            })?;
        Ok(Self {
            http,
            client_email: key.client_email.clone(),
            token_uri: key.token_uri.clone(),
            scope: scope.to_string(),
            signing_key,
            cached: Mutex::new(None),
        })
    }

    /// The signed JWT that is exchanged for an access token
    fn assertion(&self, now: OffsetDateTime) -> Result<String> {
        let claims = Claims {
            iss: self.client_email.clone(),
            scope: self.scope.clone(),
            aud: self.token_uri.clone(),
            iat: now.unix_timestamp(),
            exp: (now + ASSERTION_LIFETIME).unix_timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .with_context(|| "Failed to sign service account assertion")
    }

    /// A valid access token, requesting a new one if the cached token is
    /// missing or about to expire
    pub(crate) async fn token(&self) -> Result<SecretString> {
        let mut cached = self.cached.lock().await;
        let now = OffsetDateTime::now_utc();
        if let Some(ref token) = *cached {
            if token.is_fresh(now) {
                return Ok(token.token.clone());
            }
        }

        debug!(account = %self.client_email, "Requesting cloud storage access token");
        let assertion = self.assertion(now)?;
        let response: TokenResponse = self
            .http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .with_context(|| "Failed to send token request")?
            .error_for_status()
            .with_context(|| format!("Token request for {} was rejected", self.client_email))?
            .json()
            .await
            .with_context(|| "Invalid token response")?;
        if response.access_token.is_empty() {
            bail!("Token endpoint returned an empty access token");
        }

        let token = SecretString::from(response.access_token);
        *cached = Some(CachedToken {
            token: token.clone(),
            expires_at: now + Duration::seconds(response.expires_in),
        });
        Ok(token)
    }
}
