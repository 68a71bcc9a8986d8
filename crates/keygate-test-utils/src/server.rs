use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use keygate_core::config::{DatabaseConfig, KeygateConfig};
use keygate_server::{AppState, build_router};

use crate::stores::{TestStores, create_test_stores};

pub const TEST_ADMIN_EMAIL: &str = "admin@test.local";
pub const TEST_PASSWORD: &str = "hunter2-test-password";

pub fn create_test_config() -> KeygateConfig {
    KeygateConfig {
        port: 0,
        public_url: "http://test.keygate.local".to_string(),
        database: DatabaseConfig {
            url: String::new(), // not used; stores are pre-connected
        },
        admin_email: Some(TEST_ADMIN_EMAIL.to_string()),
    }
}

pub fn create_test_router(stores: &TestStores) -> Router {
    let state = AppState {
        user_store: Arc::new(stores.user_store.clone()),
        app_store: Arc::new(stores.app_store.clone()),
        key_store: Arc::new(stores.key_store.clone()),
        config: Arc::new(create_test_config()),
    };
    build_router(state)
}

pub async fn create_test_router_and_stores() -> (Router, TestStores) {
    let stores = create_test_stores().await;
    let router = create_test_router(&stores);
    (router, stores)
}

/// Register an account via the API and return (user_id, secret).
/// Registering with `TEST_ADMIN_EMAIL` as the username part produces the
/// admin account; any other username gets a free-tier user.
pub async fn register_via_api(router: &Router, username: &str) -> (String, String) {
    let email = if username == "admin" {
        TEST_ADMIN_EMAIL.to_string()
    } else {
        format!("{username}@test.local")
    };
    let body = serde_json::json!({
        "username": username,
        "email": email,
        "password": TEST_PASSWORD,
    });

    let (status, json) = send_request(router, "POST", "/api/register", None, Some(body)).await;
    assert_eq!(status, 200, "register failed: {json}");

    let user_id = json["userId"].as_str().unwrap().to_string();
    let secret = json["secret"].as_str().unwrap().to_string();
    (user_id, secret)
}

/// Send a request through the router and return (status, body_json).
/// The secret travels in the `X-Auth-Secret` header when given.
pub async fn send_request(
    router: &Router,
    method: &str,
    uri: &str,
    secret: Option<&str>,
    body: Option<Value>,
) -> (u16, Value) {
    let mut builder = axum::http::Request::builder().method(method).uri(uri);

    if let Some(secret) = secret {
        builder = builder.header("x-auth-secret", secret);
    }

    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }

    let req_body = match body {
        Some(b) => Body::from(serde_json::to_vec(&b).unwrap()),
        None => Body::empty(),
    };

    let req = builder.body(req_body).unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status().as_u16();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();

    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or(Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, json)
}
