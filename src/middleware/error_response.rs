//! Error translation: every failure becomes one uniform JSON response.
//!
//! The mapping from error kind to status is fixed. Client-facing messages are
//! fixed per kind as well, so internal detail never leaks; the full error is
//! written to the error log instead. Framework-generated error responses
//! (routing misses, extractor rejections) are folded into the same taxonomy.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::{ApiError, AuthFailure, FieldError};

/// Served if the envelope itself cannot be serialized
const FALLBACK_BODY: &str = r#"{"message":"An error occurred on the server"}"#;

/// Uniform error envelope
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<&'a [FieldError]>,
}

/// Client-facing message for an error. Only forbidden and conflict errors
/// pass their own message through; those are written for clients.
pub fn client_message(err: &ApiError) -> &str {
    match err {
        ApiError::MalformedRequest(_) => "Malformed request body",
        ApiError::ValidationFailed(_) => "Validation failed",
        ApiError::AuthenticationFailed(reason) => reason.client_message(),
        ApiError::Forbidden(message) => message,
        ApiError::NotFound(_) => "Requested resource not found",
        ApiError::Conflict(message) => message,
        ApiError::PayloadTooLarge { .. } => "Request body is too large",
        ApiError::RateLimitExceeded { .. } => "Please try again later",
        ApiError::Internal(_) => "An error occurred on the server",
    }
}

/// Build the response for an error. Never fails.
pub fn translate(err: &ApiError) -> Response {
    let body = ErrorBody {
        message: client_message(err),
        details: match err {
            ApiError::ValidationFailed(fields) => Some(fields.as_slice()),
            _ => None,
        },
    };
    let payload = serde_json::to_string(&body).unwrap_or_else(|_| FALLBACK_BODY.to_string());

    let mut response = (
        err.status(),
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        payload,
    )
        .into_response();

    if let ApiError::RateLimitExceeded {
        retry_after_secs, ..
    } = err
    {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
    }
    response
}

/// Fold an error status produced outside the application's own error path
/// (routing, method matching, extractor rejections) into the taxonomy
pub fn from_status(status: StatusCode) -> Option<ApiError> {
    if !status.is_client_error() && !status.is_server_error() {
        return None;
    }
    let err = match status {
        StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED => {
            ApiError::NotFound(format!("no route ({status})"))
        }
        StatusCode::UNAUTHORIZED => ApiError::AuthenticationFailed(AuthFailure::MissingCredential),
        StatusCode::FORBIDDEN => ApiError::Forbidden("Access to this resource is forbidden".into()),
        StatusCode::CONFLICT => ApiError::Conflict("Resource already exists".into()),
        StatusCode::PAYLOAD_TOO_LARGE => ApiError::PayloadTooLarge { limit: 0 },
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimitExceeded {
            client: "unknown".to_string(),
            retry_after_secs: 1,
        },
        s if s.is_client_error() => ApiError::MalformedRequest(format!("framework rejection ({s})")),
        s => ApiError::internal(format!("framework fault ({s})")),
    };
    Some(err)
}
