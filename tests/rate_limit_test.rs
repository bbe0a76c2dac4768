//! Rate limiting through the production router

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{request, test_config, TestApp};
use mesto_api::config::Config;
use pretty_assertions::assert_eq;

fn limited_config(max_requests: u64) -> Config {
    let mut config = test_config();
    config.rate_limit.max_requests = max_requests;
    config
}

#[tokio::test]
async fn test_request_after_limit_is_429() {
    let app = TestApp::with_config(limited_config(3));

    for remaining in ["2", "1", "0"] {
        let response = app.get("/users/me", None).await;
        // The N-th request still gets its normal result
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.header("x-ratelimit-limit"), Some("3"));
        assert_eq!(response.header("x-ratelimit-remaining"), Some(remaining));
    }

    let throttled = app.get("/users/me", None).await;
    assert_eq!(throttled.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(throttled.message(), "Please try again later");
    let retry_after: u64 = throttled.header("retry-after").unwrap().parse().unwrap();
    assert!(retry_after >= 1 && retry_after <= 900);
}

#[tokio::test]
async fn test_throttled_request_never_reaches_authentication_or_handler() {
    // signup, signin, then one card creation exhaust the budget
    let app = TestApp::with_config(limited_config(3));
    let token = app.login_new_user("a@b.com").await;

    let created = app
        .post(
            "/cards",
            serde_json::json!({"name": "Baikal", "link": "https://example.com/b.jpg"}),
            Some(&token),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);

    // A valid credential would pass authentication; an invalid one would be 401
    let valid = app.get("/users/me", Some(&token)).await;
    assert_eq!(valid.status, StatusCode::TOO_MANY_REQUESTS);
    let invalid = app.get("/users/me", Some("garbage")).await;
    assert_eq!(invalid.status, StatusCode::TOO_MANY_REQUESTS);

    let write = app
        .post(
            "/cards",
            serde_json::json!({"name": "Elbrus", "link": "https://example.com/e.jpg"}),
            Some(&token),
        )
        .await;
    assert_eq!(write.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(app.state.card_service.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_malformed_body_still_counts() {
    let app = TestApp::with_config(limited_config(1));

    let bad = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/signin")
                .header("content-type", "application/json")
                .body(Body::from("{"))
                .unwrap(),
        )
        .await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);

    let next = app.send(request(Method::GET, "/cards", None, None)).await;
    assert_eq!(next.status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_forwarded_clients_counted_separately_when_trusted() {
    let mut config = limited_config(1);
    config.rate_limit.trust_proxy_headers = true;
    let app = TestApp::with_config(config);

    let from = |ip: &str| {
        Request::builder()
            .uri("/cards")
            .header("x-forwarded-for", format!("{ip}, 10.0.0.1"))
            .body(Body::empty())
            .unwrap()
    };

    assert_eq!(app.send(from("203.0.113.7")).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.send(from("198.51.100.2")).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        app.send(from("203.0.113.7")).await.status,
        StatusCode::TOO_MANY_REQUESTS
    );
}

#[tokio::test]
async fn test_forwarded_header_ignored_when_untrusted() {
    let app = TestApp::with_config(limited_config(1));

    let from = |ip: &str| {
        Request::builder()
            .uri("/cards")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    };

    assert_eq!(app.send(from("203.0.113.7")).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        app.send(from("198.51.100.2")).await.status,
        StatusCode::TOO_MANY_REQUESTS
    );
}

#[tokio::test]
async fn test_disabled_limiter_passes_through() {
    let mut config = limited_config(1);
    config.rate_limit.enabled = false;
    let app = TestApp::with_config(config);

    for _ in 0..5 {
        let response = app.get("/cards", None).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert!(response.header("x-ratelimit-limit").is_none());
    }
}
