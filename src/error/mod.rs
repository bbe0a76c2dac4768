//! Unified error handling for the Mesto API
//!
//! Every failure raised anywhere in the request pipeline is an [`ApiError`].
//! Stages and handlers return it as a plain `Result` value; the pipeline's
//! error tail logs it once and hands it to the error translator.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, ApiError>;

/// Stable per-field reason codes reported by validation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldReason {
    /// A required field is absent (or null)
    Required,
    /// The field has the wrong JSON type
    Type,
    /// The value is not email-shaped
    Email,
    /// The value is not an absolute http(s) URL
    Url,
    /// The value is shorter or longer than allowed
    Length,
    /// The field is not part of the schema
    Unknown,
}

impl FieldReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldReason::Required => "required",
            FieldReason::Type => "type",
            FieldReason::Email => "email",
            FieldReason::Url => "url",
            FieldReason::Length => "length",
            FieldReason::Unknown => "unknown",
        }
    }
}

/// One failing field of a validated payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub reason: FieldReason,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, reason: FieldReason, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason,
            message: message.into(),
        }
    }
}

/// Why an authentication attempt was rejected.
///
/// The reason is logged in full; clients only ever see the generic message
/// returned by [`AuthFailure::client_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// Neither the credential cookie nor an Authorization header was present
    MissingCredential,
    /// Authorization header present but not `Bearer <token>` or not ASCII
    MalformedHeader,
    /// Signature did not verify against the signing key
    InvalidSignature,
    /// Token is past its `exp` claim
    Expired,
    /// Token could not be decoded or carries unusable claims
    InvalidToken,
    /// Token verified but the user it names no longer exists
    UnknownIdentity,
    /// Login with an unknown email or a wrong password
    BadCredentials,
}

impl AuthFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthFailure::MissingCredential => "missing_credential",
            AuthFailure::MalformedHeader => "malformed_header",
            AuthFailure::InvalidSignature => "invalid_signature",
            AuthFailure::Expired => "expired",
            AuthFailure::InvalidToken => "invalid_token",
            AuthFailure::UnknownIdentity => "unknown_identity",
            AuthFailure::BadCredentials => "bad_credentials",
        }
    }

    pub fn client_message(&self) -> &'static str {
        match self {
            AuthFailure::BadCredentials => "Incorrect email or password",
            _ => "Authorization required",
        }
    }
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error kinds, used for logging and metrics labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedRequest,
    ValidationFailed,
    AuthenticationFailed,
    Forbidden,
    NotFound,
    Conflict,
    PayloadTooLarge,
    RateLimitExceeded,
    InternalFault,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MalformedRequest => "malformed_request",
            ErrorKind::ValidationFailed => "validation_failed",
            ErrorKind::AuthenticationFailed => "authentication_failed",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::PayloadTooLarge => "payload_too_large",
            ErrorKind::RateLimitExceeded => "rate_limit_exceeded",
            ErrorKind::InternalFault => "internal_fault",
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Validation failed: {}", summarize_fields(.0))]
    ValidationFailed(Vec<FieldError>),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(AuthFailure),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payload too large: limit is {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Rate limit exceeded for client {client}")]
    RateLimitExceeded { client: String, retry_after_secs: u64 },

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

fn summarize_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}={}", f.field, f.reason.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::MalformedRequest(_) => ErrorKind::MalformedRequest,
            ApiError::ValidationFailed(_) => ErrorKind::ValidationFailed,
            ApiError::AuthenticationFailed(_) => ErrorKind::AuthenticationFailed,
            ApiError::Forbidden(_) => ErrorKind::Forbidden,
            ApiError::NotFound(_) => ErrorKind::NotFound,
            ApiError::Conflict(_) => ErrorKind::Conflict,
            ApiError::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            ApiError::RateLimitExceeded { .. } => ErrorKind::RateLimitExceeded,
            ApiError::Internal(_) => ErrorKind::InternalFault,
        }
    }

    /// Stable HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::MalformedRequest | ErrorKind::ValidationFailed => StatusCode::BAD_REQUEST,
            ErrorKind::AuthenticationFailed => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorKind::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::InternalFault => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn internal(message: impl fmt::Display) -> Self {
        ApiError::Internal(anyhow::anyhow!("{}", message))
    }
}

/// An [`ApiError`] carried in response extensions.
///
/// Handlers return errors as responses (axum's model); the pipeline takes the
/// original error back out of the response so it reaches the error tail
/// untransformed.
#[derive(Clone, Debug)]
pub struct RaisedError(pub Arc<ApiError>);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = crate::middleware::error_response::translate(&self);
        response
            .extensions_mut()
            .insert(RaisedError(Arc::new(self)));
        response
    }
}

// Conversion from validator derive errors
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    let reason = match e.code.as_ref() {
                        "email" => FieldReason::Email,
                        "url" => FieldReason::Url,
                        "length" => FieldReason::Length,
                        "required" => FieldReason::Required,
                        _ => FieldReason::Type,
                    };
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("invalid {}", field));
                    FieldError::new(field.to_string(), reason, message)
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        ApiError::ValidationFailed(fields)
    }
}
