use std::fmt::Display;

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

/// Single error type every fallible path in the engine converges on.
#[derive(Debug, Clone, Serialize)]
pub struct EngineError {
    pub message: String,
    #[serde(skip)]
    pub kind: EngineErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineErrorKind {
    InternalError,
    NotFound,
    BadRequest,
}

impl std::error::Error for EngineError {}

impl Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            EngineErrorKind::InternalError => write!(f, "Internal error: {}", self.message),
            EngineErrorKind::NotFound => write!(f, "Not found: {}", self.message),
            EngineErrorKind::BadRequest => write!(f, "Bad request: {}", self.message),
        }
    }
}

impl From<EngineErrorKind> for StatusCode {
    fn from(value: EngineErrorKind) -> Self {
        match value {
            EngineErrorKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            EngineErrorKind::NotFound => StatusCode::NOT_FOUND,
            EngineErrorKind::BadRequest => StatusCode::BAD_REQUEST,
        }
    }
}

impl EngineError {
    pub fn new(message: impl AsRef<str>, kind: EngineErrorKind) -> Self {
        Self {
            message: message.as_ref().into(),
            kind,
        }
    }

    pub fn not_found(msg: impl AsRef<str>) -> Self {
        Self::new(msg, EngineErrorKind::NotFound)
    }

    pub fn bad_request(msg: impl AsRef<str>) -> Self {
        Self::new(msg, EngineErrorKind::BadRequest)
    }

    pub fn internal(msg: impl AsRef<str>) -> Self {
        Self::new(msg, EngineErrorKind::InternalError)
    }
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        Self {
            message: err.to_string(),
            kind: EngineErrorKind::InternalError,
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::RowNotFound => Self {
                message: "record not found".to_string(),
                kind: EngineErrorKind::NotFound,
            },
            rest => Self {
                message: rest.to_string(),
                kind: EngineErrorKind::InternalError,
            },
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(value: std::io::Error) -> Self {
        match value.kind() {
            std::io::ErrorKind::NotFound => Self {
                message: value.to_string(),
                kind: EngineErrorKind::NotFound,
            },
            _ => Self {
                message: value.to_string(),
                kind: EngineErrorKind::InternalError,
            },
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> axum::response::Response {
        let status: StatusCode = self.kind.into();
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlx_row_not_found_maps_to_not_found() {
        let err: EngineError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.kind, EngineErrorKind::NotFound);
    }

    #[test]
    fn io_not_found_maps_to_not_found() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: EngineError = io_err.into();
        assert_eq!(err.kind, EngineErrorKind::NotFound);
    }

    #[test]
    fn io_other_maps_to_internal() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err: EngineError = io_err.into();
        assert_eq!(err.kind, EngineErrorKind::InternalError);
    }

    #[test]
    fn status_codes_match_kind() {
        assert_eq!(StatusCode::from(EngineErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(StatusCode::from(EngineErrorKind::BadRequest), StatusCode::BAD_REQUEST);
        assert_eq!(
            StatusCode::from(EngineErrorKind::InternalError),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
