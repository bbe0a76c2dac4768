//! Structured request and error logging.
//!
//! One record per request goes to [`REQUEST_TARGET`] and one per failure to
//! [`ERROR_TARGET`], so the two streams can be filtered and shipped
//! independently. Both sit under the crate target, so the default filter
//! keeps them. Logged URIs never carry credential-bearing query values.

use crate::error::{ApiError, ErrorKind};
use crate::pipeline::{RequestContext, Stage};
use async_trait::async_trait;
use axum::http::{StatusCode, Uri};

/// Query parameter names whose values must be redacted in logs.
const SENSITIVE_PARAMS: &[&str] = &[
    "token",
    "jwt",
    "access_token",
    "password",
    "secret",
    "api_key",
];

pub const REQUEST_TARGET: &str = "mesto_api::http::request";
pub const ERROR_TARGET: &str = "mesto_api::http::error";

/// Sanitize a URI by redacting the values of sensitive query parameters.
///
/// `/users/me?token=eyJhbG...` becomes `/users/me?token=[REDACTED]`
pub fn sanitize_uri(uri: &Uri) -> String {
    let query = match uri.query() {
        Some(q) => q,
        None => return uri.path().to_string(),
    };

    let sanitized_pairs: Vec<String> = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if SENSITIVE_PARAMS.contains(&key.to_ascii_lowercase().as_str()) => {
                format!("{key}=[REDACTED]")
            }
            _ => pair.to_string(),
        })
        .collect();

    format!("{}?{}", uri.path(), sanitized_pairs.join("&"))
}

/// Marks the request for the per-request log line emitted when the response
/// completes. Requests rejected before this stage only produce an error record.
pub struct RequestLog;

#[async_trait]
impl Stage for RequestLog {
    fn name(&self) -> &'static str {
        "request_log"
    }

    async fn run(&self, ctx: &mut RequestContext) -> crate::error::Result<()> {
        ctx.log_request = true;
        tracing::debug!(
            target: REQUEST_TARGET,
            request_id = %ctx.request_id.as_str(),
            method = %ctx.method,
            uri = %ctx.uri,
            "request started"
        );
        Ok(())
    }
}

/// Emit the per-request record
pub fn log_request(ctx: &RequestContext, status: StatusCode) {
    let user_id = ctx
        .identity
        .as_ref()
        .map(|id| id.user_id.to_string())
        .unwrap_or_default();
    tracing::info!(
        target: REQUEST_TARGET,
        request_id = %ctx.request_id.as_str(),
        method = %ctx.method,
        uri = %ctx.uri,
        status = status.as_u16(),
        duration_ms = ctx.started_at.elapsed().as_millis() as u64,
        client = %ctx.client_key,
        zone = ctx.zone.as_str(),
        user_id = %user_id,
        "request completed"
    );
}

/// Emit the per-error record with full detail; clients never see this text
pub fn log_error(ctx: &RequestContext, err: &ApiError) {
    let kind = err.kind();
    let status = err.status().as_u16();
    if kind == ErrorKind::InternalFault {
        tracing::error!(
            target: ERROR_TARGET,
            request_id = %ctx.request_id.as_str(),
            method = %ctx.method,
            uri = %ctx.uri,
            kind = kind.as_str(),
            status,
            error = ?err,
            "request failed"
        );
    } else {
        tracing::warn!(
            target: ERROR_TARGET,
            request_id = %ctx.request_id.as_str(),
            method = %ctx.method,
            uri = %ctx.uri,
            kind = kind.as_str(),
            status,
            client = %ctx.client_key,
            error = %err,
            "request rejected"
        );
    }
}
