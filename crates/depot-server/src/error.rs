//! # Application Error
//!
//! Maps artifact and request errors to HTTP responses with explicit status
//! codes and plaintext bodies.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use depot_artifact::ArtifactError;
use std::io::ErrorKind;
use thiserror::Error;

/// Application-level error type that maps to HTTP responses.
#[derive(Error, Debug)]
pub enum AppError {
    /// The `meta` field is missing, malformed or incomplete.
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    /// The request body could not be decoded.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Access key missing or wrong.
    #[error("not authorized")]
    Unauthorized,

    /// No such route.
    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

impl AppError {
    /// Convert a multipart decoding error, keeping body-limit overruns as `413`.
    pub fn from_multipart(err: MultipartError, limit: u64) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::Artifact(ArtifactError::PayloadTooLarge { limit })
        } else {
            AppError::BadRequest(err.body_text())
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidMetadata(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Artifact(err) => match err {
                ArtifactError::InvalidKey(_)
                | ArtifactError::InvalidFilename(_)
                | ArtifactError::UnsupportedVersion(_) => StatusCode::BAD_REQUEST,
                ArtifactError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                ArtifactError::NotFound(_) => StatusCode::NOT_FOUND,
                ArtifactError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                // A body that breaks off mid-stream is the client's problem
                ArtifactError::WriteFailed(e)
                    if matches!(e.kind(), ErrorKind::InvalidData | ErrorKind::UnexpectedEof) =>
                {
                    StatusCode::BAD_REQUEST
                }
                ArtifactError::WriteFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }
        (status, format!("{}\n", self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::InvalidMetadata("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Unauthorized, StatusCode::UNAUTHORIZED),
            (AppError::NotFound, StatusCode::NOT_FOUND),
            (
                ArtifactError::InvalidKey("x".into()).into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                ArtifactError::UnsupportedVersion("v1".into()).into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                ArtifactError::PayloadTooLarge { limit: 1 }.into(),
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (
                ArtifactError::NotFound("a/b/c".into()).into(),
                StatusCode::NOT_FOUND,
            ),
            (
                ArtifactError::StorageUnavailable(io::Error::other("disk")).into(),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ArtifactError::WriteFailed(io::Error::other("disk full")).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ArtifactError::WriteFailed(io::Error::new(ErrorKind::InvalidData, "bad part"))
                    .into(),
                StatusCode::BAD_REQUEST,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.status(), expected, "{}", err);
        }
    }

    #[test]
    fn test_payload_too_large_message() {
        let err: AppError = ArtifactError::PayloadTooLarge { limit: 1024 }.into();
        assert_eq!(err.to_string(), "File too large. Maximum is 1024 bytes");
    }
}
