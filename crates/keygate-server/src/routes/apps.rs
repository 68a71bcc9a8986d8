use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use serde_json::{Value, json};

use keygate_core::traits::*;
use keygate_core::types::{App, AppStatus};
use keygate_engine::protocol::ResultCode;
use keygate_engine::{access, accountant};

use crate::auth::AuthSecret;
use crate::error::ApiError;
use crate::service;
use crate::state::AppState;

fn app_json(app: &App) -> Value {
    json!({
        "appId": app.id,
        "name": app.name,
        "status": app.status,
        "ownerUserId": app.owner_user_id,
        "createdAt": app.created_at,
    })
}

// ---------------------------------------------------------------------------
// create-app
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppRequest {
    pub name: String,
    #[serde(default)]
    pub secret: Option<String>,
}

pub async fn create_app<U, A, K>(
    State(state): State<AppState<U, A, K>>,
    AuthSecret(header_secret): AuthSecret,
    Json(body): Json<CreateAppRequest>,
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

    let name = body.name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("INVALID_REQUEST", "app name is required"));
    }

    if let Some(max) = access::plan_limits(&actor).max_apps {
        let owned = state.app_store.count_apps_owned_by(&actor.id).await?;
        if owned >= max {
            return Ok(service::fail(ResultCode::NoPermission));
        }
    }

    let app = App {
        id: format!("app_{}", uuid::Uuid::new_v4().simple()),
        name: name.to_string(),
        owner_user_id: actor.id.clone(),
        status: AppStatus::On,
        created_at: now,
    };
    state.app_store.create_app(&app).await?;

    tracing::info!(app_id = %app.id, "created app");

    let mut resp = service::envelope(ResultCode::Ok);
    resp["message"] = json!("app created");
    resp["app"] = app_json(&app);
    Ok(Json(resp))
}

// ---------------------------------------------------------------------------
// toggle-app
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppRequest {
    pub app_id: String,
    #[serde(default)]
    pub secret: Option<String>,
}

pub async fn toggle_app<U, A, K>(
    State(state): State<AppState<U, A, K>>,
    AuthSecret(header_secret): AuthSecret,
    Json(body): Json<AppRequest>,
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
    if !access::app_access(&actor, &app, &grants).can_manage {
        return Ok(service::fail(ResultCode::NoPermission));
    }

    let new_status = match app.status {
        AppStatus::On => AppStatus::Off,
        AppStatus::Off => AppStatus::On,
    };
    state.app_store.update_app_status(&app.id, new_status).await?;

    // Cascade the status change over every key in the app. Each key goes
    // through the optimistic commit loop so a concurrent validation does
    // not lose its tick.
    let keys = state.key_store.list_keys_for_app(&app.id).await?;
    for key in keys {
        let app_paused_after = new_status != AppStatus::On;
        service::commit_key(state.key_store.as_ref(), key, |k| {
            if new_status == AppStatus::Off {
                accountant::cascade_app_off(std::slice::from_mut(k), now);
            } else {
                accountant::cascade_app_on(std::slice::from_mut(k), now);
            }
            keygate_engine::protocol::Outcome {
                code: ResultCode::Ok,
                remaining_secs: accountant::remaining_secs(accountant::compute_remaining_ms(
                    k,
                    now,
                    app_paused_after,
                )),
                changed: true,
            }
        })
        .await?;
    }

    tracing::info!(app_id = %app.id, status = ?new_status, "toggled app");

    let mut resp = service::envelope(ResultCode::Ok);
    resp["message"] = json!("app status updated");
    resp["status"] = json!(new_status);
    Ok(Json(resp))
}

// ---------------------------------------------------------------------------
// delete-app
// ---------------------------------------------------------------------------

pub async fn delete_app<U, A, K>(
    State(state): State<AppState<U, A, K>>,
    AuthSecret(header_secret): AuthSecret,
    Json(body): Json<AppRequest>,
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
    if !access::app_access(&actor, &app, &grants).can_manage {
        return Ok(service::fail(ResultCode::NoPermission));
    }

    state.app_store.delete_app(&app.id).await?;
    tracing::info!(app_id = %app.id, "deleted app");

    let mut resp = service::envelope(ResultCode::Ok);
    resp["message"] = json!("app deleted");
    Ok(Json(resp))
}

// ---------------------------------------------------------------------------
// list-apps
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAppsParams {
    #[serde(default)]
    pub secret: Option<String>,
}

pub async fn list_apps<U, A, K>(
    State(state): State<AppState<U, A, K>>,
    AuthSecret(header_secret): AuthSecret,
    axum::extract::Query(params): axum::extract::Query<ListAppsParams>,
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

    let apps = state.app_store.list_apps_visible_to(&actor).await?;
    let mut listed = Vec::with_capacity(apps.len());
    for app in &apps {
        let mut entry = app_json(app);
        entry["keyCount"] = json!(state.key_store.count_keys_for_app(&app.id).await?);
        listed.push(entry);
    }

    let mut resp = service::envelope(ResultCode::Ok);
    resp["apps"] = json!(listed);
    Ok(Json(resp))
}
