//! Card endpoints behind the authentication gate

mod common;

use axum::http::{Method, StatusCode};
use common::{request, TestApp};
use pretty_assertions::assert_eq;
use serde_json::json;

async fn create_card(app: &TestApp, token: &str, name: &str) -> String {
    let response = app
        .post(
            "/cards",
            json!({"name": name, "link": "https://example.com/card.jpg"}),
            Some(token),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
    response.body["data"]["_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_create_and_list_cards() {
    let app = TestApp::new();
    let token = app.login_new_user("a@b.com").await;
    let me = app.get("/users/me", Some(&token)).await;

    let id = create_card(&app, &token, "Baikal").await;

    let list = app.get("/cards", Some(&token)).await;
    assert_eq!(list.status, StatusCode::OK);
    let cards = list.body["data"].as_array().unwrap();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0]["_id"], id.as_str());
    assert_eq!(cards[0]["owner"], me.body["data"]["_id"]);
    assert_eq!(cards[0]["likes"], json!([]));
}

#[tokio::test]
async fn test_create_card_validation_lists_every_field() {
    let app = TestApp::new();
    let token = app.login_new_user("a@b.com").await;

    let response = app
        .post(
            "/cards",
            json!({"name": "B", "link": "ftp://example.com/x", "owner": "me"}),
            Some(&token),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let details: Vec<(String, String)> = response.body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| {
            (
                d["field"].as_str().unwrap().to_string(),
                d["reason"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    assert_eq!(
        details,
        vec![
            ("name".to_string(), "length".to_string()),
            ("link".to_string(), "url".to_string()),
            ("owner".to_string(), "unknown".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_only_owner_can_delete() {
    let app = TestApp::new();
    let owner = app.login_new_user("owner@b.com").await;
    let other = app.login_new_user("other@b.com").await;
    let id = create_card(&app, &owner, "Baikal").await;
    let path = format!("/cards/{id}");

    let forbidden = app
        .send(request(Method::DELETE, &path, None, Some(&other)))
        .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
    assert_eq!(forbidden.message(), "You can only delete your own cards");

    let deleted = app
        .send(request(Method::DELETE, &path, None, Some(&owner)))
        .await;
    assert_eq!(deleted.status, StatusCode::OK);

    let gone = app
        .send(request(Method::DELETE, &path, None, Some(&owner)))
        .await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_like_and_unlike() {
    let app = TestApp::new();
    let owner = app.login_new_user("owner@b.com").await;
    let fan = app.login_new_user("fan@b.com").await;
    let fan_id = app.get("/users/me", Some(&fan)).await.body["data"]["_id"].clone();
    let id = create_card(&app, &owner, "Baikal").await;
    let path = format!("/cards/{id}/likes");

    for _ in 0..2 {
        let liked = app.send(request(Method::PUT, &path, None, Some(&fan))).await;
        assert_eq!(liked.status, StatusCode::OK);
        assert_eq!(liked.body["data"]["likes"], json!([fan_id]));
    }

    let unliked = app
        .send(request(Method::DELETE, &path, None, Some(&fan)))
        .await;
    assert_eq!(unliked.status, StatusCode::OK);
    assert_eq!(unliked.body["data"]["likes"], json!([]));
}

#[tokio::test]
async fn test_like_missing_card_is_404() {
    let app = TestApp::new();
    let token = app.login_new_user("a@b.com").await;
    let path = format!("/cards/{}/likes", uuid::Uuid::new_v4());

    let response = app.send(request(Method::PUT, &path, None, Some(&token))).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
