//! Per-request state carried through the pipeline

use super::routes::Zone;
use crate::middleware::auth::Identity;
use crate::middleware::decode::{Cookies, DecodedBody};
use crate::middleware::rate_limit::RateLimitStatus;
use crate::middleware::request_log::sanitize_uri;
use axum::body::Body;
use axum::http::{request::Parts, HeaderMap, Method};
use serde_json::Value;
use std::net::SocketAddr;
use std::time::Instant;
use uuid::Uuid;

/// Correlation id of one request, echoed as `x-request-id`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    /// Reuse the caller's id when it is a sane token, otherwise mint one
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .filter(|id| is_sane_request_id(id))
            .map(|id| RequestId(id.to_string()))
            .unwrap_or_else(|| RequestId(Uuid::new_v4().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_sane_request_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Mutable bag of facts stages establish about a request.
///
/// Created when the request enters the pipeline and dropped with the
/// response; never shared between requests.
pub struct RequestContext {
    pub request_id: RequestId,
    pub method: Method,
    pub path: String,
    /// URI with sensitive query values redacted, safe to log
    pub uri: String,
    pub zone: Zone,
    pub headers: HeaderMap,
    pub peer_addr: Option<SocketAddr>,
    /// Key the rate limiter counted this request under
    pub client_key: String,
    pub started_at: Instant,
    /// Decoded body; `{}` until the decoder runs
    pub body: Value,
    pub cookies: Cookies,
    /// Absent until authentication succeeds, and always on public routes
    pub identity: Option<Identity>,
    pub rate_limit: Option<RateLimitStatus>,
    /// Set by the request-log stage; the tail only logs requests that reached it
    pub log_request: bool,
    pending_body: Option<Body>,
}

impl RequestContext {
    /// Take the headers out of `parts`; [`RequestContext::restore`] puts them back
    pub fn new(parts: &mut Parts, body: Body, zone: Zone, peer_addr: Option<SocketAddr>) -> Self {
        let headers = std::mem::take(&mut parts.headers);
        Self {
            request_id: RequestId::from_headers(&headers),
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            uri: sanitize_uri(&parts.uri),
            zone,
            headers,
            peer_addr,
            client_key: peer_addr
                .map(|addr| addr.ip().to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            started_at: Instant::now(),
            body: Value::Object(Default::default()),
            cookies: Cookies::default(),
            identity: None,
            rate_limit: None,
            log_request: false,
            pending_body: Some(body),
        }
    }

    /// Hand the raw body to the decoder; `None` once taken
    pub fn take_body(&mut self) -> Option<Body> {
        self.pending_body.take()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Move what the stages established into the request the handler sees
    pub fn restore(&mut self, parts: &mut Parts) {
        parts.headers = std::mem::take(&mut self.headers);
        parts.headers.remove(axum::http::header::CONTENT_LENGTH);
        parts
            .extensions
            .insert(DecodedBody(std::mem::take(&mut self.body)));
        parts.extensions.insert(self.cookies.clone());
        parts.extensions.insert(self.request_id.clone());
        if let Some(identity) = &self.identity {
            parts.extensions.insert(identity.clone());
        }
    }
}
