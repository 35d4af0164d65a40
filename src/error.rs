use axum::Json;
use axum::http::StatusCode;
use thiserror::Error;

/// Boxed source error, so one taxonomy covers both database drivers.
pub type ErrorSource = Box<dyn std::error::Error + Send + Sync>;

/// Standard error type for the mazurka server.
///
/// Storage-layer failures propagate uncaught to the HTTP layer — no retry,
/// no partial response. An unparseable `queries` parameter is *not* an
/// error: it clamps to the default of 1 (see [`crate::updates::parse_queries`]).
#[derive(Debug, Error)]
pub enum MazurkaError {
    /// A single random-row fetch failed. Aborts the whole selection.
    #[error("lookup failed for world id {id}")]
    LookupFailed {
        id: i32,
        #[source]
        source: ErrorSource,
    },

    /// The batched mutation failed or partially failed. Under the
    /// transactional backend this has already triggered a rollback.
    #[error("batch update failed")]
    BatchUpdateFailed(#[source] ErrorSource),

    #[error("database error: {0}")]
    Database(ErrorSource),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

impl MazurkaError {
    pub fn lookup_failed(id: i32, source: impl Into<ErrorSource>) -> Self {
        MazurkaError::LookupFailed {
            id,
            source: source.into(),
        }
    }

    pub fn batch_update(source: impl Into<ErrorSource>) -> Self {
        MazurkaError::BatchUpdateFailed(source.into())
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        // Every storage failure maps to a 5xx; there is no client error in
        // this taxonomy because parameter parsing clamps instead of failing.
        StatusCode::INTERNAL_SERVER_ERROR
    }

    /// Get the error code string for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            MazurkaError::LookupFailed { .. } => "LOOKUP_FAILED",
            MazurkaError::BatchUpdateFailed(_) => "BATCH_UPDATE_FAILED",
            MazurkaError::Database(_) => "DATABASE_ERROR",
            MazurkaError::Config(_) => "CONFIG_ERROR",
            MazurkaError::Io(_) => "IO_ERROR",
        }
    }
}

impl From<tokio_postgres::Error> for MazurkaError {
    fn from(e: tokio_postgres::Error) -> Self {
        MazurkaError::Database(Box::new(e))
    }
}

impl From<sqlx::Error> for MazurkaError {
    fn from(e: sqlx::Error) -> Self {
        MazurkaError::Database(Box::new(e))
    }
}

impl axum::response::IntoResponse for MazurkaError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!(error = %self, code = self.error_code(), "request failed");
        let body = serde_json::json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            }
        });
        (self.status_code(), Json(body)).into_response()
    }
}
