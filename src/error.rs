use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Failures raised by a `RecordStore`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{message} (status {status}{})", code_suffix(.code))]
    Rejected {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("unexpected row shape: {0}")]
    Decode(#[from] serde_json::Error),
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref()
        .map(|c| format!(", code {c}"))
        .unwrap_or_default()
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        StoreError::Rejected {
            status: 503,
            code: None,
            message: message.into(),
        }
    }
}

/// Every failure a handler can surface, and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    ConstraintViolation,
    TransportFailure,
    Configuration,
}

impl ErrorKind {
    pub const fn status(self) -> StatusCode {
        match self {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::ConstraintViolation => StatusCode::BAD_REQUEST,
            ErrorKind::TransportFailure => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        ApiError {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        Self::new(ErrorKind::NotFound, format!("{entity} with ID {id} not found"))
    }

    /// A datastore failure on a read path.
    pub fn datastore(err: StoreError) -> Self {
        let kind = match err {
            StoreError::Configuration(_) => ErrorKind::Configuration,
            _ => ErrorKind::TransportFailure,
        };
        Self::new(kind, format!("Database error: {err}"))
    }

    /// A datastore failure while writing, reported with the table's write policy.
    pub fn write_failed(kind: ErrorKind, err: StoreError) -> Self {
        Self::new(kind, format!("Database error: {err}"))
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self.kind {
            ErrorKind::TransportFailure | ErrorKind::Configuration => {
                tracing::error!("{}", self.message)
            }
            ErrorKind::ConstraintViolation => tracing::warn!("{}", self.message),
            ErrorKind::NotFound => tracing::debug!("{}", self.message),
        }

        let body = Json(json!({
            "error": self.message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}
