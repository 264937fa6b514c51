use axum::{Json, http::StatusCode, response::IntoResponse};
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;
use tracing::{error, warn};

use crate::api::envelope::Envelope;

#[derive(Debug, ThisError)]
pub enum RelayError {
    #[error("{0}")]
    NotFound(String),

    #[error("Multiple rows in `{table}` matched a lookup expected to be unique")]
    AmbiguousResult { table: &'static str },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Not authenticated")]
    Unauthorized,

    #[error("{detail}")]
    Upstream { status: u16, detail: String },

    #[error("Database error: {0}")]
    Database(SqlxError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),
}

impl From<SqlxError> for RelayError {
    fn from(e: SqlxError) -> Self {
        match e {
            SqlxError::Database(db_err) if db_err.is_unique_violation() => {
                RelayError::ConstraintViolation(db_err.message().to_string())
            }
            other => RelayError::Database(other),
        }
    }
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::NotFound(_) => StatusCode::NOT_FOUND,
            RelayError::Validation(_) => StatusCode::BAD_REQUEST,
            RelayError::ConstraintViolation(_) => StatusCode::CONFLICT,
            RelayError::Unauthorized => StatusCode::UNAUTHORIZED,
            RelayError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            RelayError::Reqwest(_) => StatusCode::BAD_GATEWAY,
            RelayError::AmbiguousResult { .. }
            | RelayError::Database(_)
            | RelayError::Json(_)
            | RelayError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "request rejected");
        }

        // Internal failures keep their cause in the log only.
        let detail = match &self {
            RelayError::AmbiguousResult { .. }
            | RelayError::Database(_)
            | RelayError::Json(_)
            | RelayError::Config(_) => None,
            other => Some(other.to_string()),
        };

        let body = Envelope::new(status.as_u16(), detail, None);
        (status, Json(body)).into_response()
    }
}
