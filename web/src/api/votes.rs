use crate::{
    auth::{MaybeUser, SessionUser},
    error::Error,
    state::AppState,
};
use axum::{Json, Router, extract::State, routing::get};
use axum_extra::extract::WithRejection;
use libpupi::vote::{self, VoteAction, VoteSummary};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub fn router() -> Router<AppState> {
    Router::new().route("/votes", get(show_votes).post(toggle_vote))
}

#[derive(Deserialize)]
struct ToggleRequest {
    #[serde(rename = "pupoId", default)]
    pupo_id: Value,
}

#[derive(Serialize)]
struct ToggleResponse {
    #[serde(flatten)]
    summary: VoteSummary,
    action: VoteAction,
}

async fn show_votes(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> Result<Json<VoteSummary>, Error> {
    let user_id = user.as_ref().map(|u| u.id.as_str());
    Ok(Json(vote::summary(&*state.db, user_id).await?))
}

async fn toggle_vote(
    SessionUser(user): SessionUser,
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<ToggleRequest>, Error>,
) -> Result<Json<ToggleResponse>, Error> {
    // only integral json numbers are accepted
    let pupo_id = req
        .pupo_id
        .as_i64()
        .ok_or_else(|| Error::BadRequest("Invalid pupoId".to_string()))?;
    let action = vote::toggle(&*state.db, &user.id, pupo_id).await?;
    let summary = vote::summary(&*state.db, Some(&user.id)).await?;
    Ok(Json(ToggleResponse { summary, action }))
}
