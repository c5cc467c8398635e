//! Shared test utilities
#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use tower::ServiceExt;
use voxtask_gateway::api::{ApiServerBuilder, USER_ID_HEADER};
use voxtask_gateway::{DbPool, db};

/// Bearer key the test server requires
pub const TEST_API_KEY: &str = "test-api-key";

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Create a test user in the database
pub fn create_test_user(db: &DbPool, id: &str) -> voxtask_gateway::db::User {
    let repo = voxtask_gateway::db::UserRepo::new(db.clone());
    repo.find_or_create(id).expect("failed to create test user")
}

/// Server builder with the test key set
#[must_use]
pub fn test_server(db: DbPool) -> ApiServerBuilder {
    ApiServerBuilder::new(db, 0).api_key(Some(TEST_API_KEY.to_string().into()))
}

/// Authenticated request acting for `user`
pub fn request(method: &str, uri: &str, user: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {TEST_API_KEY}"))
        .header(USER_ID_HEADER, user)
        .header("content-type", "application/json");

    match body {
        Some(json) => builder.body(Body::from(json.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Send one request and decode the JSON body
pub async fn send(app: &axum::Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}
