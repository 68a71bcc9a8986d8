use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::{Value, json};

use keygate_core::traits::*;
use keygate_engine::protocol::{self, ResultCode};

use crate::auth::AuthSecret;
use crate::error::ApiError;
use crate::service;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateParams {
    pub app_id: String,
    pub key: String,
    #[serde(default)]
    pub hwid: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
}

/// The validation protocol: actor, app visibility, key lookup, then the
/// engine's bind/tick/expiry step, persisted with optimistic retry.
pub async fn validate<U, A, K>(
    State(state): State<AppState<U, A, K>>,
    AuthSecret(header_secret): AuthSecret,
    Query(params): Query<ValidateParams>,
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

    // Visibility, not management: resellers validate against granted apps.
    let visible = state.app_store.list_apps_visible_to(&actor).await?;
    if !visible.iter().any(|a| a.id == app.id) {
        return Ok(service::fail(ResultCode::SecretAppMismatch));
    }

    // Exact token match, scoped to the requested app. A key living in an
    // app outside the actor's visibility reports the same code as a bad
    // token so nothing leaks across scopes.
    let Some(key) = state
        .key_store
        .get_key_by_token_within(&app.id, params.key.trim())
        .await?
    else {
        return Ok(service::fail(ResultCode::KeyNotFound));
    };

    let hwid = params.hwid.unwrap_or_default();
    let (key, outcome) = service::commit_key(state.key_store.as_ref(), key, |k| {
        protocol::validate(&app, k, &hwid, now)
    })
    .await?;

    let mut resp = service::envelope(outcome.code);
    if outcome.code.is_ok() {
        resp["remaining"] = json!(outcome.remaining_secs);
        resp["startedAt"] = json!(key.started_at);
    }
    Ok(Json(resp))
}
