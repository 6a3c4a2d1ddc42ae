//! Objects related to reporting errors from this library

/// A list of error types that can occur within this library
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("invalid coordinates: lat={lat}, lng={lng}")]
    InvalidCoordinates { lat: f64, lng: f64 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unsupported database url '{0}'")]
    UnsupportedDatabaseUrl(String),

    #[error(transparent)]
    DatabaseError(#[from] sqlx::Error),

    #[error(transparent)]
    DatabaseMigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("storage file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage file is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the error was caused by invalid input rather than a storage failure
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::MissingField(_) | Error::InvalidCoordinates { .. }
        )
    }
}

/// A convenience type alias for a [Result] with [Error] as its error type
pub type Result<T, E = Error> = std::result::Result<T, E>;
