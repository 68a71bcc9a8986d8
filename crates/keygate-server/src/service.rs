//! Shared request plumbing: actor resolution, key location and the
//! optimistic-concurrency commit loop that every mutating handler uses.

use axum::Json;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use keygate_core::traits::*;
use keygate_core::{App, KeygateError, LicenseKey, User};
use keygate_engine::protocol::{Outcome, ResultCode};

use crate::error::ApiError;

/// Bounded retries for compare-and-swap key writes before giving up.
const CAS_ATTEMPTS: usize = 3;

/// The standard response envelope every domain outcome travels in.
pub fn envelope(code: ResultCode) -> Value {
    json!({
        "success": code.is_ok(),
        "code": code,
        "message": code.message(),
    })
}

pub fn fail(code: ResultCode) -> Json<Value> {
    Json(envelope(code))
}

/// Resolve the acting user from a presented secret and stamp its use.
/// `None` means the caller gets `INVALID_SECRET`.
pub async fn resolve_actor<U: UserStore>(
    user_store: &U,
    secret: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Option<User>, ApiError> {
    let Some(secret) = secret.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let Some(user) = user_store.get_user_by_secret(secret).await? else {
        return Ok(None);
    };
    user_store.touch_secret_last_used(&user.id, now).await?;
    Ok(Some(user))
}

/// Locate a key by exact token across all apps, paired with its app.
/// A key whose app has vanished mid-request is treated as absent.
pub async fn locate_key<A: AppStore, K: KeyStore>(
    app_store: &A,
    key_store: &K,
    token: &str,
) -> Result<Option<(App, LicenseKey)>, ApiError> {
    let Some(key) = key_store.get_key_by_token(token.trim()).await? else {
        return Ok(None);
    };
    match app_store.get_app(&key.app_id).await? {
        Some(app) => Ok(Some((app, key))),
        None => Ok(None),
    }
}

/// Apply an engine step to a key and persist it, retrying on version
/// conflicts by re-fetching and re-applying. Returns the persisted key
/// and the outcome of the applied step.
pub async fn commit_key<K, F>(
    key_store: &K,
    key: LicenseKey,
    apply: F,
) -> Result<(LicenseKey, Outcome), ApiError>
where
    K: KeyStore,
    F: Fn(&mut LicenseKey) -> Outcome,
{
    let mut current = key;
    for _ in 0..CAS_ATTEMPTS {
        let mut candidate = current.clone();
        let outcome = apply(&mut candidate);
        if !outcome.changed {
            return Ok((candidate, outcome));
        }
        if key_store.update_key(&candidate).await? {
            candidate.version += 1;
            return Ok((candidate, outcome));
        }
        current = key_store
            .get_key_by_id(&candidate.id)
            .await?
            .ok_or_else(|| {
                ApiError::new(
                    StatusCode::NOT_FOUND,
                    "KEY_NOT_FOUND",
                    "key was deleted concurrently",
                )
            })?;
    }
    Err(KeygateError::Conflict("key update kept losing the version race".to_string()).into())
}
