//! HTTP request metrics, recorded by the pipeline tail once per response

use axum::http::{Method, StatusCode};
use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Tracks one in-flight request; decrements the gauge when dropped so
/// abandoned requests are not left counted.
pub struct InFlight;

impl InFlight {
    pub fn start() -> Self {
        gauge!("mesto_http_requests_in_flight").increment(1.0);
        InFlight
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        gauge!("mesto_http_requests_in_flight").decrement(1.0);
    }
}

pub fn record_request(method: &Method, path: &str, status: StatusCode, elapsed: Duration) {
    let method = method.to_string();
    let path = normalize_path(path);
    counter!(
        "mesto_http_requests_total",
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => status.as_u16().to_string()
    )
    .increment(1);
    histogram!(
        "mesto_http_request_duration_seconds",
        "method" => method,
        "path" => path
    )
    .record(elapsed.as_secs_f64());
}

/// Collapse id-like path segments to `:id` to keep label cardinality bounded
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|seg| if looks_like_id(seg) { ":id" } else { seg })
        .collect::<Vec<_>>()
        .join("/")
}

fn looks_like_id(s: &str) -> bool {
    let uuid = s.len() == 36 && s.chars().all(|c| c.is_ascii_hexdigit() || c == '-');
    let numeric = !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    uuid || numeric
}
