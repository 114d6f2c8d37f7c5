//! # Error Handling
//!
//! Service-level error type and its mapping onto HTTP responses.
//!
//! ## Layers:
//! - **ConversionError** (`audio`): what went wrong with the audio itself
//! - **LibraryError** (`library`): filename and file access problems, wrapping the above
//! - **ForwardError** (`forward`): delivery to the downstream consumer failed
//! - **AppError** (here): what the HTTP client gets to see
//!
//! ## Why a separate HTTP error:
//! The lower layers describe failures in their own terms. `AppError` decides which of
//! them are the client's fault (4xx) and which are ours or the downstream's (5xx).

use crate::audio::ConversionError;
use crate::forward::ForwardError;
use crate::library::{FilenameError, LibraryError};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Custom error types for the application.
///
/// ## Error Categories:
/// - **BadRequest**: client sent an unusable filename (400)
/// - **NotFound**: named file does not exist (404)
/// - **PayloadTooLarge**: named file exceeds the size limit (413)
/// - **UnprocessableAudio**: file exists but cannot be converted (422)
/// - **BadGateway**: downstream consumer refused or was unreachable (502)
/// - **Internal**: our own problems (500)
/// - **ValidationError**: runtime config update failed validation (400)
#[derive(Debug)]
pub enum AppError {
    Internal(String),
    BadRequest(String),
    NotFound(String),
    PayloadTooLarge(String),
    /// Conversion failure, tagged with its `ErrorKind` name
    UnprocessableAudio { kind: &'static str, message: String },
    BadGateway(String),
    ValidationError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::PayloadTooLarge(msg) => write!(f, "Payload too large: {}", msg),
            AppError::UnprocessableAudio { kind, message } => {
                write!(f, "Unprocessable audio ({}): {}", kind, message)
            }
            AppError::BadGateway(msg) => write!(f, "Bad gateway: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl AppError {
    /// Machine-readable error type used in the JSON body.
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Internal(_) => "internal_error",
            AppError::BadRequest(_) => "bad_request",
            AppError::NotFound(_) => "not_found",
            AppError::PayloadTooLarge(_) => "payload_too_large",
            AppError::UnprocessableAudio { kind, .. } => *kind,
            AppError::BadGateway(_) => "bad_gateway",
            AppError::ValidationError(_) => "validation_error",
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Internal(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::PayloadTooLarge(msg)
            | AppError::BadGateway(msg)
            | AppError::ValidationError(msg) => msg.clone(),
            AppError::UnprocessableAudio { message, .. } => message.clone(),
        }
    }
}

/// All errors render as:
/// ```json
/// {
///   "error": {
///     "type": "format_error",
///     "message": "unsupported encoding: format tag 3",
///     "timestamp": "2025-01-01T12:00:00Z"
///   }
/// }
/// ```
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::UnprocessableAudio { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": {
                "type": self.error_type(),
                "message": self.message(),
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

impl From<ConversionError> for AppError {
    fn from(err: ConversionError) -> Self {
        AppError::UnprocessableAudio {
            kind: err.kind().as_str(),
            message: err.to_string(),
        }
    }
}

/// ## HTTP Mapping:
/// - bad filename → 400, absent → 404, too big → 413
/// - any conversion failure → 422
/// - failing to open an existing file → 500
impl From<LibraryError> for AppError {
    fn from(err: LibraryError) -> Self {
        match err {
            LibraryError::InvalidFilename(FilenameError::Empty) => {
                AppError::BadRequest("Filename required".to_string())
            }
            LibraryError::InvalidFilename(e) => AppError::BadRequest(format!("Invalid filename: {}", e)),
            LibraryError::NotFound(name) => AppError::NotFound(format!("File not found: {}", name)),
            LibraryError::TooLarge { name, size, limit } => AppError::PayloadTooLarge(format!(
                "File {} is {} bytes, limit is {}",
                name, size, limit
            )),
            LibraryError::Open(e) => AppError::Internal(format!("Failed to open file: {}", e)),
            LibraryError::Conversion(e) => e.into(),
        }
    }
}

impl From<ForwardError> for AppError {
    fn from(err: ForwardError) -> Self {
        AppError::BadGateway(format!("Failed to forward audio: {}", err))
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_errors_map_to_client_statuses() {
        let cases = [
            (LibraryError::InvalidFilename(FilenameError::Empty), StatusCode::BAD_REQUEST),
            (LibraryError::InvalidFilename(FilenameError::PathTraversal), StatusCode::BAD_REQUEST),
            (LibraryError::NotFound("x.wav".to_string()), StatusCode::NOT_FOUND),
            (
                LibraryError::TooLarge { name: "x.wav".to_string(), size: 10, limit: 5 },
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (
                LibraryError::Conversion(ConversionError::MissingDataChunk),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).status_code(), status);
        }
    }

    #[test]
    fn test_conversion_error_keeps_its_kind() {
        let err = AppError::from(ConversionError::MonoRequired(2));
        assert_eq!(err.error_type(), "policy_error");
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let err = AppError::from(ConversionError::Truncated { expected: 8, actual: 2 });
        assert_eq!(err.error_type(), "io_error");
    }

    #[test]
    fn test_internal_and_config_errors() {
        let err = AppError::ValidationError("audio.files_dir cannot be changed at runtime".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_type(), "validation_error");

        let err = AppError::from(anyhow::anyhow!("worker gone"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_forward_error_is_bad_gateway() {
        let err = AppError::from(ForwardError::Status(500));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert!(err.to_string().contains("500"));
    }
}
