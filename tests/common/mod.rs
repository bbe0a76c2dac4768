//! Shared test infrastructure: the production router over in-memory stores,
//! driven in-process with `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use mesto_api::config::{Config, JwtConfig, RateLimitConfig};
use mesto_api::middleware::RateLimiter;
use mesto_api::server::{build_pipeline, build_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "test-secret-key-for-api-testing-purposes";
pub const TEST_PASSWORD: &str = "secret123";

pub fn test_config() -> Config {
    Config {
        jwt: JwtConfig {
            secret: TEST_SECRET.to_string(),
            ..JwtConfig::default()
        },
        rate_limit: RateLimitConfig {
            max_requests: 10_000,
            ..RateLimitConfig::default()
        },
        ..Config::default()
    }
}

/// The production router plus a handle on its state
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let state = AppState::new(config);
        let limiter = Arc::new(RateLimiter::from_config(&state.config.rate_limit));
        let pipeline = Arc::new(build_pipeline(&state, limiter));
        let router = build_router(state.clone(), pipeline);
        Self { router, state }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap_or_default();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.send(request(Method::GET, path, None, token)).await
    }

    pub async fn post(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        self.send(request(Method::POST, path, Some(body), token)).await
    }

    pub async fn signup(&self, email: &str) -> TestResponse {
        self.post(
            "/signup",
            json!({"email": email, "password": TEST_PASSWORD, "name": "A"}),
            None,
        )
        .await
    }

    /// Register and sign in; returns the bearer token
    pub async fn login_new_user(&self, email: &str) -> String {
        let created = self.signup(email).await;
        assert_eq!(created.status, StatusCode::CREATED, "{:?}", created.body);
        let signed_in = self
            .post(
                "/signin",
                json!({"email": email, "password": TEST_PASSWORD}),
                None,
            )
            .await;
        assert_eq!(signed_in.status, StatusCode::OK, "{:?}", signed_in.body);
        signed_in.body["token"].as_str().unwrap().to_string()
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn message(&self) -> &str {
        self.body["message"].as_str().unwrap_or_default()
    }
}

/// JSON request with an optional bearer token
pub fn request(method: Method, path: &str, body: Option<Value>, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Assert the fixed security header set is present
pub fn assert_security_headers(response: &TestResponse) {
    assert_eq!(response.header("x-content-type-options"), Some("nosniff"));
    assert_eq!(response.header("x-frame-options"), Some("DENY"));
    assert_eq!(response.header("x-xss-protection"), Some("0"));
    assert!(response.header("referrer-policy").is_some());
    assert!(response.header("cache-control").is_some());
    assert!(response.header("permissions-policy").is_some());
    assert!(response.header("content-security-policy").is_some());
    assert_eq!(
        response.header("cross-origin-opener-policy"),
        Some("same-origin")
    );
    assert_eq!(
        response.header("cross-origin-resource-policy"),
        Some("same-origin")
    );
    assert!(response.header("server").is_none());
    assert!(response.header("x-powered-by").is_none());
}
