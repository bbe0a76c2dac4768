//! REST API handlers and shared response types
//!
//! Handlers are generic over [`crate::state::HasServices`]. By the time one
//! runs, the pipeline has decoded and validated the body and, on protected
//! routes, bound the caller's [`crate::middleware::Identity`].

pub mod auth;
pub mod card;
pub mod user;

use crate::error::ApiError;
use crate::middleware::DecodedBody;
use axum::{extract::FromRequestParts, http::request::Parts, response::Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

/// Success response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse<T> {
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Message response (for sign-out, etc.)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The request body as decoded by the pipeline, deserialized into `T`.
///
/// The body stream itself is consumed by the decode stage, so handlers read
/// the payload through this extractor rather than `Json`.
#[derive(Debug, Clone)]
pub struct Payload<T>(pub T);

impl<S, T> FromRequestParts<S> for Payload<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .extensions
            .remove::<DecodedBody>()
            .map(|DecodedBody(value)| value)
            .unwrap_or_else(|| Value::Object(Default::default()));
        serde_json::from_value(value)
            .map(Payload)
            .map_err(|e| ApiError::MalformedRequest(format!("payload does not fit the route: {e}")))
    }
}

/// Deliberately raise an internal fault: exercises the 500 path end to end
pub async fn crash_test() -> Response {
    panic!("Server will crash now");
}
