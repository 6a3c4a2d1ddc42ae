use crate::{error::Error, state::AppState};
use anyhow::anyhow;
use axum::{extract::FromRequestParts, http::request::Parts};
use libpupi::user::User;
use secrecy::ExposeSecret;
use tower_sessions::Session;

/// The header that carries the shared admin password
pub(crate) const ADMIN_PASSWORD_HEADER: &str = "x-admin-password";

const SESSION_USER_KEY: &str = "auth:user";

/// Whether `candidate` matches the configured admin password. When no admin
/// password is configured, nothing matches.
pub(crate) fn check_admin_password(state: &AppState, candidate: &str) -> bool {
    state
        .config
        .admin
        .password
        .as_ref()
        .is_some_and(|p| !p.expose_secret().is_empty() && p.expose_secret() == candidate)
}

/// Extractor for requests that are authorized with the admin password
#[derive(Debug)]
pub(crate) struct Admin;

impl FromRequestParts<AppState> for Admin {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let candidate = parts
            .headers
            .get(ADMIN_PASSWORD_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if check_admin_password(state, candidate) {
            Ok(Admin)
        } else {
            Err(Error::Unauthorized("Unauthorized".to_string()))
        }
    }
}

/// The login session of the current visitor
#[derive(Debug, Clone)]
pub(crate) struct UserSession(Session);

impl UserSession {
    pub(crate) async fn user(&self) -> Result<Option<User>, Error> {
        Ok(self.0.get(SESSION_USER_KEY).await?)
    }

    /// Remember `user` as logged in. The session id is cycled to prevent
    /// session fixation.
    pub(crate) async fn login(&self, user: &User) -> Result<(), Error> {
        self.0.cycle_id().await?;
        self.0.insert(SESSION_USER_KEY, user).await?;
        Ok(())
    }

    pub(crate) async fn logout(&self) -> Result<(), Error> {
        self.0.flush().await?;
        Ok(())
    }

    pub(crate) fn session(&self) -> &Session {
        &self.0
    }
}

impl<S> FromRequestParts<S> for UserSession
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|e| anyhow!(e.1))?;
        Ok(UserSession(session))
    }
}

/// Extractor for a logged in user. Rejects anonymous requests.
#[derive(Debug, Clone)]
pub(crate) struct SessionUser(pub(crate) User);

impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        UserSession::from_request_parts(parts, state)
            .await?
            .user()
            .await?
            .map(SessionUser)
            .ok_or_else(|| Error::Unauthorized("Authentication required".to_string()))
    }
}

/// Extractor for the user when one is logged in
#[derive(Debug, Clone)]
pub(crate) struct MaybeUser(pub(crate) Option<User>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            UserSession::from_request_parts(parts, state)
                .await?
                .user()
                .await?,
        ))
    }
}
