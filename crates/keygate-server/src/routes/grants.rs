use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::{Value, json};

use keygate_core::traits::*;
use keygate_core::types::ResellerGrant;
use keygate_engine::access;
use keygate_engine::protocol::ResultCode;

use crate::auth::AuthSecret;
use crate::error::ApiError;
use crate::service;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResellerRequest {
    pub app_id: String,
    pub username: String,
    #[serde(default)]
    pub secret: Option<String>,
}

// ---------------------------------------------------------------------------
// add-reseller
// ---------------------------------------------------------------------------

pub async fn add_reseller<U, A, K>(
    State(state): State<AppState<U, A, K>>,
    AuthSecret(header_secret): AuthSecret,
    Json(body): Json<ResellerRequest>,
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
    if !access::app_access(&actor, &app, &grants).can_manage_grants {
        return Ok(service::fail(ResultCode::NoPermission));
    }

    let Some(reseller) = state
        .user_store
        .get_user_by_username(body.username.trim())
        .await?
    else {
        return Err(ApiError::bad_request("USER_NOT_FOUND", "no such user"));
    };
    if reseller.id == app.owner_user_id {
        return Err(ApiError::bad_request(
            "INVALID_REQUEST",
            "the app owner cannot be their own reseller",
        ));
    }

    // Granting twice is a no-op.
    if !state.app_store.grant_exists(&reseller.id, &app.id).await? {
        let grant = ResellerGrant {
            id: format!("grant_{}", uuid::Uuid::new_v4().simple()),
            reseller_user_id: reseller.id.clone(),
            app_id: app.id.clone(),
            created_by_user_id: actor.id.clone(),
            created_at: now,
        };
        state.app_store.create_grant(&grant).await?;
        tracing::info!(app_id = %app.id, reseller = %reseller.id, "added reseller");
    }

    let mut resp = service::envelope(ResultCode::Ok);
    resp["message"] = json!("reseller added");
    Ok(Json(resp))
}

// ---------------------------------------------------------------------------
// remove-reseller
// ---------------------------------------------------------------------------

pub async fn remove_reseller<U, A, K>(
    State(state): State<AppState<U, A, K>>,
    AuthSecret(header_secret): AuthSecret,
    Json(body): Json<ResellerRequest>,
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
    if !access::app_access(&actor, &app, &grants).can_manage_grants {
        return Ok(service::fail(ResultCode::NoPermission));
    }

    let Some(reseller) = state
        .user_store
        .get_user_by_username(body.username.trim())
        .await?
    else {
        return Err(ApiError::bad_request("USER_NOT_FOUND", "no such user"));
    };

    if let Some(grant) = grants.iter().find(|g| g.reseller_user_id == reseller.id) {
        state.app_store.delete_grant(&grant.id).await?;
        tracing::info!(app_id = %app.id, reseller = %reseller.id, "removed reseller");
    }

    let mut resp = service::envelope(ResultCode::Ok);
    resp["message"] = json!("reseller removed");
    Ok(Json(resp))
}

// ---------------------------------------------------------------------------
// list-resellers
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResellersParams {
    pub app_id: String,
    #[serde(default)]
    pub secret: Option<String>,
}

pub async fn list_resellers<U, A, K>(
    State(state): State<AppState<U, A, K>>,
    AuthSecret(header_secret): AuthSecret,
    Query(params): Query<ListResellersParams>,
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
    if !access::app_access(&actor, &app, &grants).can_manage_grants {
        return Ok(service::fail(ResultCode::NoPermission));
    }

    let mut listed = Vec::with_capacity(grants.len());
    for grant in &grants {
        let username = state
            .user_store
            .get_user_by_id(&grant.reseller_user_id)
            .await?
            .map(|u| u.username);
        listed.push(json!({
            "grantId": grant.id,
            "userId": grant.reseller_user_id,
            "username": username,
            "createdAt": grant.created_at,
        }));
    }

    let mut resp = service::envelope(ResultCode::Ok);
    resp["resellers"] = json!(listed);
    Ok(Json(resp))
}
