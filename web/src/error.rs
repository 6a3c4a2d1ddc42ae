use axum::{
    Json,
    extract::{
        multipart::MultipartError,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{debug, warn};

#[derive(thiserror::Error, Debug)]
pub(crate) enum Error {
    #[error(transparent)]
    Other(#[from] anyhow::Error),
    #[error(transparent)]
    Libpupi(#[from] libpupi::Error),
    #[error("You are not authorized to perform this action: {0}")]
    Unauthorized(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Resource Not Found: {0}")]
    NotFound(String),
    #[error("Service is not available: {0}")]
    ServiceUnavailable(String),
    #[error("Upstream service failed: {0}")]
    Upstream(String),
    #[error(transparent)]
    Session(#[from] tower_sessions::session::Error),
    #[error("The provided json body was rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("The provided query string was rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Unable to read multipart body: {0}")]
    Multipart(#[from] MultipartError),
}

impl Error {
    pub(crate) fn to_client_status(&self) -> (StatusCode, String) {
        match self {
            Error::Other(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
            Error::Libpupi(e) => match e {
                libpupi::Error::MissingField(_) => (
                    StatusCode::BAD_REQUEST,
                    "Missing required fields".to_string(),
                ),
                libpupi::Error::InvalidCoordinates { .. } => {
                    (StatusCode::BAD_REQUEST, "Invalid coordinates".to_string())
                }
                libpupi::Error::NotFound(_) => {
                    (StatusCode::NOT_FOUND, "Pupo not found".to_string())
                }
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                ),
            },
            Error::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message.clone()),
            Error::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
            Error::NotFound(message) => (StatusCode::NOT_FOUND, message.clone()),
            Error::ServiceUnavailable(message) => {
                (StatusCode::SERVICE_UNAVAILABLE, message.clone())
            }
            Error::Upstream(message) => (StatusCode::BAD_GATEWAY, message.clone()),
            Error::Session(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Session error".to_string(),
            ),
            Error::JsonRejection(_) => (StatusCode::BAD_REQUEST, "Invalid JSON body".to_string()),
            Error::QueryRejection(_) => (
                StatusCode::BAD_REQUEST,
                "The query string was not in the expected format".to_string(),
            ),
            Error::Multipart(_) => (
                StatusCode::BAD_REQUEST,
                "Invalid multipart body".to_string(),
            ),
        }
    }
}

// Tell axum how to convert `Error` into a response.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = self.to_client_status();
        if status.is_server_error() {
            warn!("Got error for response: {self:?}");
        } else {
            debug!(%status, "Rejected request: {self}");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}
