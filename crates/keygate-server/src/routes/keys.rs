use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::{Value, json};

use keygate_core::traits::*;
use keygate_core::credential;
use keygate_core::types::{App, CreateKeyInput, LicenseKey, User};
use keygate_engine::duration::parse_duration_ms;
use keygate_engine::protocol::{self, ResultCode};
use keygate_engine::{access, accountant};

use crate::auth::AuthSecret;
use crate::error::ApiError;
use crate::service;
use crate::state::AppState;

/// Locate a key by token across all apps and authorize management on it.
/// The inner `Err` carries the ready-made domain failure response.
async fn locate_managed<U, A, K>(
    state: &AppState<U, A, K>,
    actor: &User,
    token: &str,
) -> Result<Result<(App, LicenseKey), Json<Value>>, ApiError>
where
    U: UserStore,
    A: AppStore,
    K: KeyStore,
{
    let Some((app, key)) =
        service::locate_key(state.app_store.as_ref(), state.key_store.as_ref(), token).await?
    else {
        return Ok(Err(service::fail(ResultCode::KeyNotFound)));
    };
    if !access::can_manage_key(actor, &app, &key) {
        return Ok(Err(service::fail(ResultCode::NoPermission)));
    }
    Ok(Ok((app, key)))
}

fn key_json(key: &LicenseKey, app: &App, now: chrono::DateTime<chrono::Utc>) -> Value {
    let app_paused = app.status != keygate_core::AppStatus::On;
    let remaining_ms = accountant::compute_remaining_ms(key, now, app_paused);
    json!({
        "key": key.token,
        "keyId": key.id,
        "name": key.name,
        "duration": key.duration_input,
        "durationMs": key.duration_ms,
        "remaining": accountant::remaining_secs(remaining_ms),
        "state": protocol::key_state(key, now, app_paused),
        "paused": key.paused,
        "pausedByApp": key.paused_by_app,
        "hwidBound": key.hwid.is_some(),
        "startedAt": key.started_at,
        "lastTickAt": key.last_tick_at,
        "firstUsedAt": key.first_used_at,
        "createdAt": key.created_at,
    })
}

// ---------------------------------------------------------------------------
// create-key
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateKeyRequest {
    pub app_id: String,
    pub duration: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
}

pub async fn create_key<U, A, K>(
    State(state): State<AppState<U, A, K>>,
    AuthSecret(header_secret): AuthSecret,
    Json(body): Json<CreateKeyRequest>,
) -> Result<Json<Value>, ApiError>
where
    U: UserStore,
    A: AppStore,
    K: KeyStore,
{
    let now = chrono::Utc::now();
    let secret = header_secret.or(body.secret);
    let Some(actor) =
        service::resolve_actor(state.user_store.as_ref(), secret.as_deref(), now).await?
    else {
        return Ok(service::fail(ResultCode::InvalidSecret));
    };

    let Some(app) = state.app_store.get_app(body.app_id.trim()).await? else {
        return Ok(service::fail(ResultCode::AppNotFound));
    };
    let grants = state.app_store.list_grants_for_app(&app.id).await?;
    if !access::app_access(&actor, &app, &grants).can_view {
        return Ok(service::fail(ResultCode::NoPermission));
    }

    // Rejecting the duration must leave the store untouched.
    let Some(duration_ms) = parse_duration_ms(&body.duration) else {
        return Ok(service::fail(ResultCode::InvalidDuration));
    };

    if let Some(max) = access::plan_limits(&actor).max_keys_per_app {
        let count = state.key_store.count_keys_for_app(&app.id).await?;
        if count >= max {
            return Ok(service::fail(ResultCode::NoPermission));
        }
    }

    let token = format!(
        "{}{}",
        access::key_prefix_for(&actor),
        credential::generate_key_token()
    );
    let input = CreateKeyInput {
        id: format!("key_{}", uuid::Uuid::new_v4().simple()),
        app_id: app.id.clone(),
        name: body.name.unwrap_or_default().trim().to_string(),
        token,
        duration_input: body.duration.trim().to_string(),
        duration_ms,
        created_by_user_id: actor.id.clone(),
    };
    let key = state.key_store.create_key(&input).await?;

    tracing::info!(key_id = %key.id, app_id = %app.id, "created key");

    let mut resp = service::envelope(ResultCode::Ok);
    resp["message"] = json!("key created");
    resp["key"] = json!(key.token);
    resp["keyId"] = json!(key.id);
    resp["remaining"] = json!(accountant::remaining_secs(key.remaining_ms));
    Ok(Json(resp))
}

// ---------------------------------------------------------------------------
// key-status
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyStatusParams {
    pub key: String,
    #[serde(default)]
    pub secret: Option<String>,
}

pub async fn key_status<U, A, K>(
    State(state): State<AppState<U, A, K>>,
    AuthSecret(header_secret): AuthSecret,
    Query(params): Query<KeyStatusParams>,
) -> Result<Json<Value>, ApiError>
where
    U: UserStore,
    A: AppStore,
    K: KeyStore,
{
    let now = chrono::Utc::now();
    let secret = header_secret.or(params.secret);
    let Some(actor) =
        service::resolve_actor(state.user_store.as_ref(), secret.as_deref(), now).await?
    else {
        return Ok(service::fail(ResultCode::InvalidSecret));
    };

    let Some((app, key)) = service::locate_key(
        state.app_store.as_ref(),
        state.key_store.as_ref(),
        &params.key,
    )
    .await?
    else {
        return Ok(service::fail(ResultCode::KeyNotFound));
    };

    // Status is a read: view access on the app suffices, as does being
    // allowed to manage the key itself.
    let grants = state.app_store.list_grants_for_app(&app.id).await?;
    let viewable = access::app_access(&actor, &app, &grants).can_view
        || access::can_manage_key(&actor, &app, &key);
    if !viewable {
        return Ok(service::fail(ResultCode::NoPermission));
    }

    let (key, _outcome) = service::commit_key(state.key_store.as_ref(), key, |k| {
        protocol::status(&app, k, now)
    })
    .await?;

    let mut resp = service::envelope(ResultCode::Ok);
    resp["status"] = key_json(&key, &app, now);
    Ok(Json(resp))
}

// ---------------------------------------------------------------------------
// pause-key
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseKeyRequest {
    pub key: String,
    pub paused: bool,
    #[serde(default)]
    pub secret: Option<String>,
}

pub async fn pause_key<U, A, K>(
    State(state): State<AppState<U, A, K>>,
    AuthSecret(header_secret): AuthSecret,
    Json(body): Json<PauseKeyRequest>,
) -> Result<Json<Value>, ApiError>
where
    U: UserStore,
    A: AppStore,
    K: KeyStore,
{
    let now = chrono::Utc::now();
    let secret = header_secret.or(body.secret);
    let Some(actor) =
        service::resolve_actor(state.user_store.as_ref(), secret.as_deref(), now).await?
    else {
        return Ok(service::fail(ResultCode::InvalidSecret));
    };
    let (app, key) = match locate_managed(&state, &actor, &body.key).await? {
        Ok(pair) => pair,
        Err(resp) => return Ok(resp),
    };

    let (key, outcome) = service::commit_key(state.key_store.as_ref(), key, |k| {
        protocol::set_paused(&app, k, body.paused, now)
    })
    .await?;

    let mut resp = service::envelope(outcome.code);
    resp["message"] = json!(if body.paused { "key paused" } else { "key resumed" });
    resp["paused"] = json!(key.paused);
    resp["remaining"] = json!(outcome.remaining_secs);
    Ok(Json(resp))
}

// ---------------------------------------------------------------------------
// extend-key
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendKeyRequest {
    pub key: String,
    pub duration: String,
    #[serde(default)]
    pub secret: Option<String>,
}

pub async fn extend_key<U, A, K>(
    State(state): State<AppState<U, A, K>>,
    AuthSecret(header_secret): AuthSecret,
    Json(body): Json<ExtendKeyRequest>,
) -> Result<Json<Value>, ApiError>
where
    U: UserStore,
    A: AppStore,
    K: KeyStore,
{
    let now = chrono::Utc::now();
    let secret = header_secret.or(body.secret);
    let Some(actor) =
        service::resolve_actor(state.user_store.as_ref(), secret.as_deref(), now).await?
    else {
        return Ok(service::fail(ResultCode::InvalidSecret));
    };
    let (app, key) = match locate_managed(&state, &actor, &body.key).await? {
        Ok(pair) => pair,
        Err(resp) => return Ok(resp),
    };

    let Some(grant_ms) = parse_duration_ms(&body.duration) else {
        return Ok(service::fail(ResultCode::InvalidDuration));
    };

    let (_key, outcome) = service::commit_key(state.key_store.as_ref(), key, |k| {
        protocol::extend(&app, k, grant_ms, now)
    })
    .await?;

    let mut resp = service::envelope(outcome.code);
    resp["message"] = json!("key extended");
    resp["remaining"] = json!(outcome.remaining_secs);
    Ok(Json(resp))
}

// ---------------------------------------------------------------------------
// reset-key / reset-hwid / delete-key
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRequest {
    pub key: String,
    #[serde(default)]
    pub secret: Option<String>,
}

pub async fn reset_key<U, A, K>(
    State(state): State<AppState<U, A, K>>,
    AuthSecret(header_secret): AuthSecret,
    Json(body): Json<KeyRequest>,
) -> Result<Json<Value>, ApiError>
where
    U: UserStore,
    A: AppStore,
    K: KeyStore,
{
    let now = chrono::Utc::now();
    let secret = header_secret.or(body.secret);
    let Some(actor) =
        service::resolve_actor(state.user_store.as_ref(), secret.as_deref(), now).await?
    else {
        return Ok(service::fail(ResultCode::InvalidSecret));
    };
    let (app, key) = match locate_managed(&state, &actor, &body.key).await? {
        Ok(pair) => pair,
        Err(resp) => return Ok(resp),
    };

    let (key, _outcome) = service::commit_key(state.key_store.as_ref(), key, |k| {
        protocol::reset(&app, k, now)
    })
    .await?;

    let mut resp = service::envelope(ResultCode::Ok);
    resp["message"] = json!("key reset");
    resp["remaining"] = json!(accountant::remaining_secs(key.remaining_ms));
    Ok(Json(resp))
}

pub async fn reset_hwid<U, A, K>(
    State(state): State<AppState<U, A, K>>,
    AuthSecret(header_secret): AuthSecret,
    Json(body): Json<KeyRequest>,
) -> Result<Json<Value>, ApiError>
where
    U: UserStore,
    A: AppStore,
    K: KeyStore,
{
    let now = chrono::Utc::now();
    let secret = header_secret.or(body.secret);
    let Some(actor) =
        service::resolve_actor(state.user_store.as_ref(), secret.as_deref(), now).await?
    else {
        return Ok(service::fail(ResultCode::InvalidSecret));
    };
    let (app, key) = match locate_managed(&state, &actor, &body.key).await? {
        Ok(pair) => pair,
        Err(resp) => return Ok(resp),
    };

    let (_key, outcome) = service::commit_key(state.key_store.as_ref(), key, |k| {
        protocol::reset_hwid(&app, k, now)
    })
    .await?;

    let mut resp = service::envelope(outcome.code);
    resp["message"] = json!("device binding cleared");
    resp["remaining"] = json!(outcome.remaining_secs);
    Ok(Json(resp))
}

pub async fn delete_key<U, A, K>(
    State(state): State<AppState<U, A, K>>,
    AuthSecret(header_secret): AuthSecret,
    Json(body): Json<KeyRequest>,
) -> Result<Json<Value>, ApiError>
where
    U: UserStore,
    A: AppStore,
    K: KeyStore,
{
    let now = chrono::Utc::now();
    let secret = header_secret.or(body.secret);
    let Some(actor) =
        service::resolve_actor(state.user_store.as_ref(), secret.as_deref(), now).await?
    else {
        return Ok(service::fail(ResultCode::InvalidSecret));
    };
    let (_app, key) = match locate_managed(&state, &actor, &body.key).await? {
        Ok(pair) => pair,
        Err(resp) => return Ok(resp),
    };

    state.key_store.delete_key(&key.id).await?;
    tracing::info!(key_id = %key.id, "deleted key");

    let mut resp = service::envelope(ResultCode::Ok);
    resp["message"] = json!("key deleted");
    Ok(Json(resp))
}

// ---------------------------------------------------------------------------
// list-keys
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListKeysParams {
    pub app_id: String,
    #[serde(default)]
    pub secret: Option<String>,
}

pub async fn list_keys<U, A, K>(
    State(state): State<AppState<U, A, K>>,
    AuthSecret(header_secret): AuthSecret,
    Query(params): Query<ListKeysParams>,
) -> Result<Json<Value>, ApiError>
where
    U: UserStore,
    A: AppStore,
    K: KeyStore,
{
    let now = chrono::Utc::now();
    let secret = header_secret.or(params.secret);
    let Some(actor) =
        service::resolve_actor(state.user_store.as_ref(), secret.as_deref(), now).await?
    else {
        return Ok(service::fail(ResultCode::InvalidSecret));
    };

    let Some(app) = state.app_store.get_app(params.app_id.trim()).await? else {
        return Ok(service::fail(ResultCode::AppNotFound));
    };
    let grants = state.app_store.list_grants_for_app(&app.id).await?;
    if !access::app_access(&actor, &app, &grants).can_view {
        return Ok(service::fail(ResultCode::NoPermission));
    }

    // Listing computes remaining lazily but never persists a tick; only
    // validation and status calls advance the anchor.
    let keys = state.key_store.list_keys_for_app(&app.id).await?;
    let listed: Vec<Value> = access::visible_keys(&actor, &app, &keys)
        .into_iter()
        .map(|k| key_json(k, &app, now))
        .collect();

    let mut resp = service::envelope(ResultCode::Ok);
    resp["keys"] = json!(listed);
    Ok(Json(resp))
}
