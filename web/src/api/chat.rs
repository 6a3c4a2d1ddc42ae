use crate::{chat::ChatMessage, error::Error, state::AppState};
use axum::{Json, Router, extract::State, routing::post};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};

pub fn router() -> Router<AppState> {
    Router::new().route("/chat", post(chat))
}

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    history: Vec<ChatMessage>,
    message: String,
}

#[derive(Serialize)]
struct ChatResponse {
    text: String,
}

async fn chat(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<ChatRequest>, Error>,
) -> Result<Json<ChatResponse>, Error> {
    if req.message.trim().is_empty() {
        return Err(Error::BadRequest("Message is required".to_string()));
    }
    let text = state.chat.reply(req.history, req.message).await;
    Ok(Json(ChatResponse { text }))
}
