use crate::{
    api::parse_id,
    auth::Admin,
    error::Error,
    state::AppState,
};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use axum_extra::extract::WithRejection;
use libpupi::pupo::{Pupo, PupoInput};
use serde_json::json;
use tracing::info;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pupi", get(list_pupi).post(create_pupo))
        .route(
            "/pupi/{id}",
            get(show_pupo).put(update_pupo).delete(delete_pupo),
        )
}

async fn list_pupi(State(state): State<AppState>) -> Result<Json<Vec<Pupo>>, Error> {
    Ok(Json(state.db.list_pupi().await?))
}

async fn show_pupo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Pupo>, Error> {
    let id = parse_id(&id)?;
    state
        .db
        .get_pupo(id)
        .await?
        .map(Json)
        .ok_or_else(|| Error::NotFound("Pupo not found".to_string()))
}

async fn create_pupo(
    _admin: Admin,
    State(state): State<AppState>,
    WithRejection(Json(input), _): WithRejection<Json<PupoInput>, Error>,
) -> Result<impl IntoResponse, Error> {
    let data = input.validate()?;
    let pupo = state.db.create_pupo(data).await?;
    info!(id = pupo.id, name = %pupo.name, "Created pupo");
    Ok((StatusCode::CREATED, Json(pupo)))
}

async fn update_pupo(
    _admin: Admin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    WithRejection(Json(patch), _): WithRejection<Json<PupoInput>, Error>,
) -> Result<Json<Pupo>, Error> {
    let id = parse_id(&id)?;
    let pupo = state
        .db
        .update_pupo(id, patch)
        .await?
        .ok_or_else(|| Error::NotFound("Pupo not found".to_string()))?;
    info!(id, "Updated pupo");
    Ok(Json(pupo))
}

async fn delete_pupo(
    _admin: Admin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let id = parse_id(&id)?;
    if !state.db.delete_pupo(id).await? {
        return Err(Error::NotFound("Pupo not found".to_string()));
    }
    info!(id, "Deleted pupo");
    Ok(Json(json!({ "success": true })))
}
