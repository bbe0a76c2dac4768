//! Security response headers
//!
//! Applied by the pipeline to every response it emits, successful or not,
//! after the handler and the error translator have run.

use axum::http::{header, HeaderMap, HeaderValue};

use crate::config::SecurityHeadersConfig;

/// Whether this request should receive HSTS.
///
/// Only HTTPS responses get HSTS; sending it over plain HTTP (or in local
/// dev) causes long-lived usability issues in browsers.
pub fn wants_hsts(config: &SecurityHeadersConfig, request_headers: &HeaderMap) -> bool {
    if !config.hsts_enabled {
        return false;
    }
    if !config.hsts_https_only {
        return true;
    }
    config.hsts_trust_x_forwarded_proto
        && request_headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("https"))
            .unwrap_or(false)
}

/// Set the fixed security header policy on a response:
/// - X-Content-Type-Options: nosniff
/// - X-Frame-Options: DENY
/// - X-XSS-Protection: 0 (the legacy auditor is disabled, CSP covers it)
/// - Referrer-Policy, Cache-Control, Permissions-Policy
/// - Content-Security-Policy, Cross-Origin-Opener-Policy, Cross-Origin-Resource-Policy
/// - Strict-Transport-Security when `hsts` is set
///
/// `Server` and `X-Powered-By` are removed.
pub fn apply(config: &SecurityHeadersConfig, headers: &mut HeaderMap, hsts: bool) {
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert("x-xss-protection", HeaderValue::from_static("0"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("no-referrer"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache, must-revalidate, private"),
    );
    headers.insert(
        "permissions-policy",
        HeaderValue::from_static("geolocation=(), microphone=(), camera=()"),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );
    headers.insert(
        "cross-origin-opener-policy",
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        "cross-origin-resource-policy",
        HeaderValue::from_static("same-origin"),
    );

    if hsts {
        let mut value = format!("max-age={}", config.hsts_max_age_secs);
        if config.hsts_include_subdomains {
            value.push_str("; includeSubDomains");
        }
        if config.hsts_preload {
            value.push_str("; preload");
        }
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(header::STRICT_TRANSPORT_SECURITY, value);
        }
    }

    headers.remove(header::SERVER);
    headers.remove("x-powered-by");
}
