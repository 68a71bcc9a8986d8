use axum::Router;
use keygate_test_utils::*;
use serde_json::json;

async fn create_app(router: &Router, secret: &str, name: &str) -> String {
    let (status, body) = send_request(
        router,
        "POST",
        "/api/create-app",
        Some(secret),
        Some(json!({"name": name})),
    )
    .await;
    assert_envelope_ok(status, &body);
    body["app"]["appId"].as_str().unwrap().to_string()
}

async fn create_key(router: &Router, secret: &str, app_id: &str, duration: &str) -> String {
    let (status, body) = send_request(
        router,
        "POST",
        "/api/create-key",
        Some(secret),
        Some(json!({"appId": app_id, "duration": duration, "name": "test key"})),
    )
    .await;
    assert_envelope_ok(status, &body);
    body["key"].as_str().unwrap().to_string()
}

async fn validate(router: &Router, secret: &str, app_id: &str, key: &str, hwid: &str) -> (u16, serde_json::Value) {
    let uri = format!("/api/validate?appId={app_id}&key={key}&hwid={hwid}");
    send_request(router, "GET", &uri, Some(secret), None).await
}

#[tokio::test]
async fn missing_hwid_is_required() {
    let (router, _stores) = create_test_router_and_stores().await;
    let (_id, secret) = register_via_api(&router, "owner").await;
    let app_id = create_app(&router, &secret, "app").await;
    let key = create_key(&router, &secret, &app_id, "1d").await;

    let (status, body) = validate(&router, &secret, &app_id, &key, "").await;
    assert_envelope_code(status, &body, "HWID_REQUIRED");
}

#[tokio::test]
async fn first_validation_binds_and_starts() {
    let (router, stores) = create_test_router_and_stores().await;
    let (_id, secret) = register_via_api(&router, "owner").await;
    let app_id = create_app(&router, &secret, "app").await;
    let key = create_key(&router, &secret, &app_id, "1d").await;

    let (status, body) = validate(&router, &secret, &app_id, &key, "machine-a").await;
    assert_envelope_ok(status, &body);
    assert_eq!(body["remaining"], 86_400);

    use keygate_core::KeyStore;
    let stored = stores.key_store.get_key_by_token(&key).await.unwrap().unwrap();
    assert_eq!(stored.hwid.as_deref(), Some("machine-a"));
    assert!(stored.started_at.is_some());
    assert!(stored.last_tick_at.is_some());
    assert!(stored.first_used_at.is_some());
}

#[tokio::test]
async fn second_device_gets_mismatch() {
    let (router, _stores) = create_test_router_and_stores().await;
    let (_id, secret) = register_via_api(&router, "owner").await;
    let app_id = create_app(&router, &secret, "app").await;
    let key = create_key(&router, &secret, &app_id, "1d").await;

    validate(&router, &secret, &app_id, &key, "machine-a").await;
    let (status, body) = validate(&router, &secret, &app_id, &key, "machine-b").await;
    assert_envelope_code(status, &body, "HWID_MISMATCH");
}

#[tokio::test]
async fn same_device_revalidates_ok() {
    let (router, _stores) = create_test_router_and_stores().await;
    let (_id, secret) = register_via_api(&router, "owner").await;
    let app_id = create_app(&router, &secret, "app").await;
    let key = create_key(&router, &secret, &app_id, "1d").await;

    validate(&router, &secret, &app_id, &key, "machine-a").await;
    let (status, body) = validate(&router, &secret, &app_id, &key, "machine-a").await;
    assert_envelope_ok(status, &body);
}

#[tokio::test]
async fn unknown_key_reports_key_not_found() {
    let (router, _stores) = create_test_router_and_stores().await;
    let (_id, secret) = register_via_api(&router, "owner").await;
    let app_id = create_app(&router, &secret, "app").await;

    let (status, body) =
        validate(&router, &secret, &app_id, "KG-XXXX-XXXX-XXXX-XXXX", "machine-a").await;
    assert_envelope_code(status, &body, "KEY_NOT_FOUND");
}

#[tokio::test]
async fn key_in_foreign_app_does_not_leak() {
    let (router, _stores) = create_test_router_and_stores().await;
    let (_id, owner_secret) = register_via_api(&router, "owner").await;
    let (_id2, other_secret) = register_via_api(&router, "other").await;

    let owner_app = create_app(&router, &owner_secret, "owner app").await;
    let key = create_key(&router, &owner_secret, &owner_app, "1d").await;
    let other_app = create_app(&router, &other_secret, "other app").await;

    // Existing token, but looked up inside an app the key does not live
    // in: same code as a bad token.
    let (status, body) = validate(&router, &other_secret, &other_app, &key, "machine-a").await;
    assert_envelope_code(status, &body, "KEY_NOT_FOUND");
}

#[tokio::test]
async fn foreign_app_id_reports_mismatch() {
    let (router, _stores) = create_test_router_and_stores().await;
    let (_id, owner_secret) = register_via_api(&router, "owner").await;
    let (_id2, other_secret) = register_via_api(&router, "other").await;

    let owner_app = create_app(&router, &owner_secret, "owner app").await;
    let key = create_key(&router, &owner_secret, &owner_app, "1d").await;

    let (status, body) = validate(&router, &other_secret, &owner_app, &key, "machine-a").await;
    assert_envelope_code(status, &body, "SECRET_APP_MISMATCH");
}

#[tokio::test]
async fn unknown_app_reports_app_not_found() {
    let (router, _stores) = create_test_router_and_stores().await;
    let (_id, secret) = register_via_api(&router, "owner").await;

    let (status, body) = validate(&router, &secret, "app_nope", "KG-AAAA", "machine-a").await;
    assert_envelope_code(status, &body, "APP_NOT_FOUND");
}

#[tokio::test]
async fn paused_key_blocks_validation() {
    let (router, _stores) = create_test_router_and_stores().await;
    let (_id, secret) = register_via_api(&router, "owner").await;
    let app_id = create_app(&router, &secret, "app").await;
    let key = create_key(&router, &secret, &app_id, "1d").await;
    validate(&router, &secret, &app_id, &key, "machine-a").await;

    let (status, body) = send_request(
        &router,
        "POST",
        "/api/pause-key",
        Some(&secret),
        Some(json!({"key": key, "paused": true})),
    )
    .await;
    assert_envelope_ok(status, &body);

    let (status, body) = validate(&router, &secret, &app_id, &key, "machine-a").await;
    assert_envelope_code(status, &body, "KEY_PAUSED");

    // Resume and validate again.
    send_request(
        &router,
        "POST",
        "/api/pause-key",
        Some(&secret),
        Some(json!({"key": key, "paused": false})),
    )
    .await;
    let (status, body) = validate(&router, &secret, &app_id, &key, "machine-a").await;
    assert_envelope_ok(status, &body);
}

#[tokio::test]
async fn app_off_blocks_validation_and_pause_wins_over_key_state() {
    let (router, _stores) = create_test_router_and_stores().await;
    let (_id, secret) = register_via_api(&router, "owner").await;
    let app_id = create_app(&router, &secret, "app").await;
    let key = create_key(&router, &secret, &app_id, "1d").await;
    validate(&router, &secret, &app_id, &key, "machine-a").await;

    let (status, body) = send_request(
        &router,
        "POST",
        "/api/toggle-app",
        Some(&secret),
        Some(json!({"appId": app_id})),
    )
    .await;
    assert_envelope_ok(status, &body);
    assert_eq!(body["status"], "off");

    let (status, body) = validate(&router, &secret, &app_id, &key, "machine-a").await;
    assert_envelope_code(status, &body, "APP_PAUSED");

    // Toggle back on: countdown resumes and validation succeeds.
    send_request(
        &router,
        "POST",
        "/api/toggle-app",
        Some(&secret),
        Some(json!({"appId": app_id})),
    )
    .await;
    let (status, body) = validate(&router, &secret, &app_id, &key, "machine-a").await;
    assert_envelope_ok(status, &body);
}

#[tokio::test]
async fn expired_key_reports_expiry_before_mismatch() {
    let (router, _stores) = create_test_router_and_stores().await;
    let (_id, secret) = register_via_api(&router, "owner").await;
    let app_id = create_app(&router, &secret, "app").await;
    let key = create_key(&router, &secret, &app_id, "1s").await;

    validate(&router, &secret, &app_id, &key, "machine-a").await;
    tokio::time::sleep(std::time::Duration::from_millis(1200)).await;

    // A different device: expiry still wins over the binding mismatch.
    let (status, body) = validate(&router, &secret, &app_id, &key, "machine-b").await;
    assert_envelope_code(status, &body, "KEY_EXPIRED");

    // And the balance is frozen at zero.
    let (status, body) = send_request(
        &router,
        "GET",
        &format!("/api/key-status?key={key}"),
        Some(&secret),
        None,
    )
    .await;
    assert_envelope_ok(status, &body);
    assert_eq!(body["status"]["remaining"], 0);
}

#[tokio::test]
async fn secret_accepted_via_query_parameter() {
    let (router, _stores) = create_test_router_and_stores().await;
    let (_id, secret) = register_via_api(&router, "owner").await;
    let app_id = create_app(&router, &secret, "app").await;
    let key = create_key(&router, &secret, &app_id, "1d").await;

    let uri = format!("/api/validate?appId={app_id}&key={key}&hwid=machine-a&secret={secret}");
    let (status, body) = send_request(&router, "GET", &uri, None, None).await;
    assert_envelope_ok(status, &body);
}
