use crate::{auth::Admin, error::Error, geocode::Location, state::AppState};
use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;

pub fn router() -> Router<AppState> {
    Router::new().route("/geocode", get(geocode))
}

#[derive(Deserialize)]
struct GeocodeParams {
    #[serde(default)]
    address: String,
}

async fn geocode(
    _admin: Admin,
    State(state): State<AppState>,
    WithRejection(Query(params), _): WithRejection<Query<GeocodeParams>, Error>,
) -> Result<Json<Location>, Error> {
    let address = params.address.trim();
    if address.is_empty() {
        return Err(Error::BadRequest("Address is required".to_string()));
    }
    state
        .geocoder
        .search(address)
        .await?
        .map(Json)
        .ok_or_else(|| Error::NotFound("Address not found".to_string()))
}
