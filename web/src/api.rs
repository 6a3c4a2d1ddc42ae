use crate::state::AppState;
use axum::{Json, Router, extract::State, routing::get};
use serde_json::{Value, json};

mod admin;
mod chat;
mod geocode;
mod pupi;
mod upload;
mod votes;

#[cfg(test)]
mod tests;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(pupi::router())
        .merge(votes::router())
        .merge(admin::router())
        .merge(upload::router())
        .merge(geocode::router())
        .merge(chat::router())
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "backend": state.db.backend().to_string(),
    }))
}

/// Parse a numeric id from a path segment
pub(crate) fn parse_id(id: &str) -> Result<i64, crate::error::Error> {
    id.trim()
        .parse()
        .map_err(|_| crate::error::Error::BadRequest("Invalid ID format".to_string()))
}
