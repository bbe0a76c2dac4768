//! Pipeline behaviour through the production router

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use common::{assert_security_headers, request, test_config, TestApp};
use pretty_assertions::assert_eq;
use serde_json::json;

fn raw_json(method: Method, path: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_security_headers_on_every_outcome() {
    let app = TestApp::new();
    let token = app.login_new_user("a@b.com").await;

    let ok = app.get("/users/me", Some(&token)).await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_security_headers(&ok);

    let unauthorized = app.get("/users/me", None).await;
    assert_eq!(unauthorized.status, StatusCode::UNAUTHORIZED);
    assert_security_headers(&unauthorized);

    let invalid = app.post("/signin", json!({}), None).await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    assert_security_headers(&invalid);

    let missing = app.get("/no/such/path", Some(&token)).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_security_headers(&missing);
}

#[tokio::test]
async fn test_hsts_only_behind_https_proxy() {
    let app = TestApp::new();

    let plain = app.get("/cards", None).await;
    assert!(plain.header("strict-transport-security").is_none());

    let proxied = app
        .send(
            Request::builder()
                .uri("/cards")
                .header("x-forwarded-proto", "https")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(
        proxied.header("strict-transport-security"),
        Some("max-age=15552000; includeSubDomains")
    );
}

#[tokio::test]
async fn test_unknown_path_requires_authentication_first() {
    let app = TestApp::new();

    let anonymous = app.get("/no/such/path", None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let token = app.login_new_user("a@b.com").await;
    let authenticated = app.get("/no/such/path", Some(&token)).await;
    assert_eq!(authenticated.status, StatusCode::NOT_FOUND);
    assert_eq!(authenticated.message(), "Requested resource not found");
}

#[tokio::test]
async fn test_wrong_method_is_not_found() {
    let app = TestApp::new();
    let token = app.login_new_user("a@b.com").await;

    let response = app
        .send(request(Method::DELETE, "/users", None, Some(&token)))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(
        response.header("content-type"),
        Some("application/json")
    );
}

#[tokio::test]
async fn test_malformed_json_rejected_the_same_way_twice() {
    let app = TestApp::new();

    let first = app
        .send(raw_json(Method::POST, "/signin", r#"{"email": "a@b.com", "#))
        .await;
    let second = app
        .send(raw_json(Method::POST, "/signin", r#"{"email": "a@b.com", "#))
        .await;

    assert_eq!(first.status, StatusCode::BAD_REQUEST);
    assert_eq!(first.body, json!({"message": "Malformed request body"}));
    assert_eq!(second.status, first.status);
    assert_eq!(second.body, first.body);
}

#[tokio::test]
async fn test_non_object_json_is_malformed() {
    let app = TestApp::new();
    let response = app
        .send(raw_json(Method::POST, "/signin", r#"["a@b.com"]"#))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.message(), "Malformed request body");
}

#[tokio::test]
async fn test_unsupported_content_type_is_malformed() {
    let app = TestApp::new();
    let response = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/signin")
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from("email=a@b.com"))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_oversized_body_is_413() {
    let mut config = test_config();
    config.body.max_bytes = 64;
    let app = TestApp::with_config(config);

    let padding = "x".repeat(200);
    let response = app
        .post(
            "/signup",
            json!({"email": "a@b.com", "password": padding}),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_handler_panic_is_500() {
    let app = TestApp::new();
    let token = app.login_new_user("a@b.com").await;

    let response = app.get("/crash-test", Some(&token)).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.body,
        json!({"message": "An error occurred on the server"})
    );
    assert_security_headers(&response);

    // The server keeps serving after the fault
    let after = app.get("/users/me", Some(&token)).await;
    assert_eq!(after.status, StatusCode::OK);
}

#[tokio::test]
async fn test_request_id_echoed_or_generated() {
    let app = TestApp::new();

    let echoed = app
        .send(
            Request::builder()
                .uri("/cards")
                .header("x-request-id", "client-trace-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(echoed.header("x-request-id"), Some("client-trace-1"));

    let generated = app.get("/cards", None).await;
    let id = generated.header("x-request-id").unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());
}

#[tokio::test]
async fn test_invalid_path_id_is_client_error() {
    let app = TestApp::new();
    let token = app.login_new_user("a@b.com").await;

    let response = app.get("/users/not-a-uuid", Some(&token)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.header("content-type"), Some("application/json"));
}
