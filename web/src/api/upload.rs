use crate::{auth::Admin, error::Error, images, state::AppState};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartError},
    http::StatusCode,
    routing::post,
};
use serde_json::{Value, json};
use tracing::{info, warn};

/// Largest accepted image
pub(crate) const MAX_IMAGE_SIZE: usize = 5 * 1024 * 1024;

// leave some room for the multipart framing around the file
const MAX_BODY_SIZE: usize = MAX_IMAGE_SIZE + 64 * 1024;

fn too_large() -> Error {
    Error::BadRequest("File size must be less than 5MB".to_string())
}

/// Bodies over the limit surface as multipart errors while the file is read
fn multipart_error(e: MultipartError) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        too_large()
    } else {
        Error::from(e)
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/upload",
        post(upload).layer(DefaultBodyLimit::max(MAX_BODY_SIZE)),
    )
}

async fn upload(
    _admin: Admin,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, Error> {
    let Some(store) = state.images.as_ref() else {
        return Err(Error::ServiceUnavailable(
            "Image storage not configured".to_string(),
        ));
    };

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("image/") {
            return Err(Error::BadRequest("File must be an image".to_string()));
        }
        let filename = field.file_name().map(str::to_string);
        let data = field.bytes().await.map_err(multipart_error)?;
        if data.len() > MAX_IMAGE_SIZE {
            return Err(too_large());
        }
        let name = images::object_name(filename.as_deref());
        let url = store
            .put(&name, &content_type, data)
            .await
            .map_err(|e| {
                warn!("Image upload failed: {e:#}");
                Error::Upstream("Failed to upload file".to_string())
            })?;
        info!(%name, "Uploaded image");
        return Ok(Json(json!({ "url": url })));
    }
    Err(Error::BadRequest("No file provided".to_string()))
}
