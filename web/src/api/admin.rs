use crate::{
    auth::{Admin, check_admin_password},
    error::Error,
    state::AppState,
};
use axum::{Json, Router, extract::State, routing::post};
use axum_extra::extract::WithRejection;
use libpupi::pupo::PupoInput;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/login", post(login))
        .route("/admin/seed", post(seed))
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    password: Option<String>,
}

/// Lets the admin interface check a password before using it for other
/// requests. No session is created.
async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, Error>,
) -> Result<Json<Value>, Error> {
    let password = req
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| Error::BadRequest("Password is required".to_string()))?;
    if !check_admin_password(&state, &password) {
        warn!("Failed admin login attempt");
        return Err(Error::Unauthorized("Invalid password".to_string()));
    }
    Ok(Json(json!({ "success": true })))
}

/// Import a batch of pupi. Every record is validated before anything is
/// stored, and the first invalid record is reported back.
async fn seed(
    _admin: Admin,
    State(state): State<AppState>,
    WithRejection(Json(body), _): WithRejection<Json<Value>, Error>,
) -> Result<Json<Value>, Error> {
    let Some(records) = body.get("pupi").and_then(Value::as_array) else {
        return Err(Error::BadRequest(
            "Invalid data format. Expected an array of pupi.".to_string(),
        ));
    };

    let mut pupi = Vec::with_capacity(records.len());
    for record in records {
        let data = serde_json::from_value::<PupoInput>(record.clone())
            .map_err(libpupi::Error::from)
            .and_then(PupoInput::validate)
            .map_err(|e| {
                let reason = match e {
                    libpupi::Error::InvalidCoordinates { .. } => "Invalid coordinates",
                    _ => "Missing required fields",
                };
                Error::BadRequest(format!("Invalid pupo data. {reason} for pupo: {record}"))
            })?;
        pupi.push(data);
    }

    let imported = state.db.insert_bulk(pupi).await?;
    let total = state.db.count_pupi().await?;
    info!(imported, total, "Imported pupi");
    Ok(Json(json!({
        "success": true,
        "message": format!("Successfully imported {imported} pupi"),
        "total": total,
    })))
}
