use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use keygate_core::traits::*;
use keygate_core::types::{CreateUserInput, Plan, Role};
use keygate_core::{credential, error::KeygateError};
use keygate_engine::access;
use keygate_engine::protocol::ResultCode;

use crate::auth::AuthSecret;
use crate::error::ApiError;
use crate::service;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// register
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

pub async fn register<U, A, K>(
    State(state): State<AppState<U, A, K>>,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<Value>, ApiError>
where
    U: UserStore,
    A: AppStore,
    K: KeyStore,
{
    let username = body.username.trim();
    let email = body.email.trim().to_ascii_lowercase();
    if username.is_empty() || !email.contains('@') {
        return Err(ApiError::bad_request(
            "INVALID_REQUEST",
            "username and a valid email are required",
        ));
    }
    if body.password.len() < 8 {
        return Err(ApiError::bad_request(
            "INVALID_REQUEST",
            "password must be at least 8 characters",
        ));
    }

    if state.user_store.get_user_by_username(username).await?.is_some() {
        return Err(ApiError::bad_request("USERNAME_TAKEN", "username is already in use"));
    }
    if state.user_store.get_user_by_email(&email).await?.is_some() {
        return Err(ApiError::bad_request("EMAIL_TAKEN", "email is already registered"));
    }

    // The configured admin address registers straight into the admin role.
    let is_admin = state
        .config
        .admin_email
        .as_deref()
        .is_some_and(|admin| admin.eq_ignore_ascii_case(&email));
    let (role, plan) = if is_admin {
        (Role::Admin, Plan::PremiumLifetime)
    } else {
        (Role::User, Plan::Free)
    };

    let input = CreateUserInput {
        id: format!("user_{}", uuid::Uuid::new_v4().simple()),
        username: username.to_string(),
        email,
        password_hash: credential::hash_password(&body.password)?,
        role,
        plan,
        secret: credential::generate_secret(),
    };
    let user = state.user_store.create_user(&input).await?;

    tracing::info!(user_id = %user.id, "registered new account");

    let mut resp = service::envelope(ResultCode::Ok);
    resp["message"] = json!("account created");
    resp["userId"] = json!(user.id);
    resp["secret"] = json!(user.secret);
    Ok(Json(resp))
}

// ---------------------------------------------------------------------------
// login
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login<U, A, K>(
    State(state): State<AppState<U, A, K>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError>
where
    U: UserStore,
    A: AppStore,
    K: KeyStore,
{
    let email = body.email.trim().to_ascii_lowercase();
    let invalid = || {
        ApiError::new(
            StatusCode::UNAUTHORIZED,
            "INVALID_CREDENTIALS",
            "email or password is incorrect",
        )
    };

    let user = state
        .user_store
        .get_user_by_email(&email)
        .await?
        .ok_or_else(invalid)?;
    if !credential::verify_password(&body.password, &user.password_hash)? {
        return Err(invalid());
    }

    let mut resp = service::envelope(ResultCode::Ok);
    resp["message"] = json!("logged in");
    resp["userId"] = json!(user.id);
    resp["username"] = json!(user.username);
    resp["role"] = json!(user.role);
    resp["plan"] = json!(user.plan);
    resp["secret"] = json!(user.secret);
    Ok(Json(resp))
}

// ---------------------------------------------------------------------------
// set-key-prefix
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetKeyPrefixRequest {
    pub prefix: String,
    pub secret: Option<String>,
}

pub async fn set_key_prefix<U, A, K>(
    State(state): State<AppState<U, A, K>>,
    AuthSecret(header_secret): AuthSecret,
    Json(body): Json<SetKeyPrefixRequest>,
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

    if !access::is_premium(&actor) {
        return Ok(service::fail(ResultCode::NoPermission));
    }

    let Some(prefix) = access::sanitize_prefix(&body.prefix) else {
        return Err(KeygateError::InvalidRequest(
            "prefix must be non-empty and contain no whitespace".to_string(),
        )
        .into());
    };
    state.user_store.set_key_prefix(&actor.id, Some(&prefix)).await?;

    let mut resp = service::envelope(ResultCode::Ok);
    resp["message"] = json!("key prefix updated");
    resp["keyPrefix"] = json!(prefix);
    Ok(Json(resp))
}
