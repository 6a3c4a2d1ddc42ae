//! Visitor login through Google's OAuth2 / OpenID Connect endpoints
use crate::{
    auth::{SessionUser, UserSession},
    config::OAuthConfig,
    error::Error,
    state::AppState,
};
use anyhow::{Context, anyhow};
use axum::{
    Json, Router,
    extract::{Query, State},
    response::{IntoResponse, Redirect},
    routing::{get, post},
};
use libpupi::user::User;
use oauth2::{
    AuthUrl, AuthorizationCode, Client, ClientId, ClientSecret, CsrfToken, EmptyExtraTokenFields,
    EndpointNotSet, EndpointSet, RedirectUrl, RevocationErrorResponseType, Scope,
    StandardErrorResponse, StandardRevocableToken, StandardTokenIntrospectionResponse,
    StandardTokenResponse, TokenResponse,
    basic::{BasicClient, BasicErrorResponseType, BasicTokenType},
};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Session key for the CSRF token of a login in progress
const SESSION_OAUTH_CSRF_TOKEN: &str = "oauth:csrf_token";

pub(crate) const CALLBACK_PATH: &str = "/auth/callback";

/// An OAuth2 client with the authorization and token endpoints set
pub(crate) type OAuth2Client = Client<
    StandardErrorResponse<BasicErrorResponseType>,
    StandardTokenResponse<EmptyExtraTokenFields, BasicTokenType>,
    StandardTokenIntrospectionResponse<EmptyExtraTokenFields, BasicTokenType>,
    StandardRevocableToken,
    StandardErrorResponse<RevocationErrorResponseType>,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

pub(crate) fn client(config: &OAuthConfig, public_base_url: &str) -> anyhow::Result<OAuth2Client> {
    let secret = config
        .client_secret
        .as_ref()
        .context("OAuth client secret is not set")?;
    let redirect = format!("{}{CALLBACK_PATH}", public_base_url.trim_end_matches('/'));
    Ok(BasicClient::new(ClientId::new(config.client_id.clone()))
        .set_client_secret(ClientSecret::new(secret.expose_secret().to_string()))
        .set_auth_uri(AuthUrl::new(GOOGLE_AUTH_URL.to_string())?)
        .set_token_uri(oauth2::TokenUrl::new(GOOGLE_TOKEN_URL.to_string())?)
        .set_redirect_uri(
            RedirectUrl::new(redirect.clone())
                .with_context(|| format!("Invalid OAuth redirect url '{redirect}'"))?,
        ))
}

/// The subset of the OpenID Connect userinfo response that we use
#[derive(Debug, Deserialize)]
struct GoogleProfile {
    sub: String,
    name: Option<String>,
    email: Option<String>,
    picture: Option<String>,
}

impl From<GoogleProfile> for User {
    fn from(p: GoogleProfile) -> Self {
        User::from_profile(p.sub, p.name, p.email, p.picture)
    }
}

#[derive(Deserialize)]
struct CallbackParams {
    state: String,
    code: String,
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login))
        .route("/callback", get(callback))
        .route("/me", get(me))
        .route("/logout", post(logout))
}

fn oauth_client(state: &AppState) -> Result<&OAuth2Client, Error> {
    state
        .oauth
        .as_ref()
        .ok_or_else(|| Error::ServiceUnavailable("Login is not configured".to_string()))
}

async fn login(
    State(state): State<AppState>,
    session: UserSession,
) -> Result<impl IntoResponse, Error> {
    let (url, csrf_token) = oauth_client(&state)?
        .authorize_url(CsrfToken::new_random)
        .add_scope(Scope::new("openid".to_string()))
        .add_scope(Scope::new("email".to_string()))
        .add_scope(Scope::new("profile".to_string()))
        .url();

    // Store CSRF token in session for verification during callback
    session
        .session()
        .insert(SESSION_OAUTH_CSRF_TOKEN, csrf_token.secret())
        .await?;

    Ok(Redirect::temporary(url.as_str()))
}

async fn callback(
    State(state): State<AppState>,
    session: UserSession,
    Query(params): Query<CallbackParams>,
) -> Result<impl IntoResponse, Error> {
    let client = oauth_client(&state)?;
    let stored: Option<String> = session.session().remove(SESSION_OAUTH_CSRF_TOKEN).await?;
    if stored.as_deref() != Some(params.state.as_str()) {
        return Err(Error::BadRequest("Invalid login state".to_string()));
    }

    let token = client
        .exchange_code(AuthorizationCode::new(params.code))
        .request_async(&state.http)
        .await
        .map_err(|e| {
            debug!("Token exchange failed: {e:?}");
            Error::Unauthorized("Failed to authenticate".to_string())
        })?;

    let profile: GoogleProfile = state
        .http
        .get(GOOGLE_USERINFO_URL)
        .bearer_auth(token.access_token().secret())
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| anyhow!(e).context("Failed to fetch user profile"))?
        .json()
        .await
        .map_err(|e| anyhow!(e).context("Unable to parse user profile"))?;

    let user = User::from(profile);
    info!(user = %user.id, "User logged in");
    session.login(&user).await?;
    Ok(Redirect::to("/"))
}

async fn me(SessionUser(user): SessionUser) -> Json<User> {
    Json(user)
}

async fn logout(session: UserSession) -> Result<impl IntoResponse, Error> {
    session.logout().await?;
    Ok(Json(json!({ "success": true })))
}
