//! The validation protocol: device binding, tick, expiry and outcome
//! rendering composed into single-step functions over resolved records.
//!
//! Every transport (HTTP handlers, tests, future offline clients) calls
//! these functions rather than re-deriving the rules, so the state
//! machine exists exactly once.

use chrono::{DateTime, Utc};
use keygate_core::{App, AppStatus, LicenseKey};
use serde::{Deserialize, Serialize};

use crate::accountant;

/// Canonical result vocabulary for every engine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultCode {
    Ok,
    InvalidSecret,
    SecretAppMismatch,
    AppNotFound,
    AppPaused,
    KeyNotFound,
    KeyPaused,
    KeyExpired,
    HwidRequired,
    HwidMismatch,
    NoPermission,
    InvalidDuration,
}

impl ResultCode {
    pub fn is_ok(self) -> bool {
        self == ResultCode::Ok
    }

    /// Human-readable message accompanying the code on the wire.
    pub fn message(self) -> &'static str {
        match self {
            ResultCode::Ok => "key is valid",
            ResultCode::InvalidSecret => "invalid access secret",
            ResultCode::SecretAppMismatch => "secret has no access to this app",
            ResultCode::AppNotFound => "app not found",
            ResultCode::AppPaused => "app is paused",
            ResultCode::KeyNotFound => "key not found",
            ResultCode::KeyPaused => "key is paused",
            ResultCode::KeyExpired => "key has expired",
            ResultCode::HwidRequired => "a device id is required",
            ResultCode::HwidMismatch => "key is already in use on another device",
            ResultCode::NoPermission => "no permission for this operation",
            ResultCode::InvalidDuration => "invalid duration, use e.g. 1s, 1m, 1h, 1d, 1w",
        }
    }
}

/// Lifecycle state of a key at one instant, for listings and status calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyState {
    NotStarted,
    Active,
    PausedManual,
    PausedByApp,
    Expired,
}

pub fn key_state(key: &LicenseKey, now: DateTime<Utc>, app_paused: bool) -> KeyState {
    if app_paused {
        return KeyState::PausedByApp;
    }
    if key.paused {
        if key.paused_by_app {
            return KeyState::PausedByApp;
        }
        return KeyState::PausedManual;
    }
    if key.started_at.is_none() {
        return KeyState::NotStarted;
    }
    if accountant::is_expired(key, now, app_paused) {
        return KeyState::Expired;
    }
    KeyState::Active
}

/// Outcome of one validation (or management) step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub code: ResultCode,
    /// Remaining balance in whole seconds, floored.
    pub remaining_secs: i64,
    /// True iff the key record was mutated and must be persisted.
    pub changed: bool,
}

impl Outcome {
    fn new(code: ResultCode, key: &LicenseKey, now: DateTime<Utc>, app_paused: bool, changed: bool) -> Self {
        Outcome {
            code,
            remaining_secs: accountant::remaining_secs(accountant::compute_remaining_ms(
                key, now, app_paused,
            )),
            changed,
        }
    }
}

/// One validation attempt against a resolved (app, key) pair.
///
/// Check order: app status, manual pause, device id presence, first-use
/// binding, tick + expiry, device match. Expiry is evaluated before the
/// device match so an expired key reports expiry rather than mismatch.
pub fn validate(
    app: &App,
    key: &mut LicenseKey,
    hwid: &str,
    now: DateTime<Utc>,
) -> Outcome {
    let app_paused = app.status != AppStatus::On;
    if app_paused {
        return Outcome::new(ResultCode::AppPaused, key, now, app_paused, false);
    }
    if key.paused {
        return Outcome::new(ResultCode::KeyPaused, key, now, app_paused, false);
    }

    let hwid = hwid.trim();
    if hwid.is_empty() {
        return Outcome::new(ResultCode::HwidRequired, key, now, app_paused, false);
    }

    // First successful hwid-carrying validation: bind the device and, if
    // the key has never run, start the countdown. This is the only path
    // that starts a key.
    if key.hwid.is_none() {
        key.hwid = Some(hwid.to_string());
        key.first_used_at = Some(now);
        if key.started_at.is_none() {
            key.started_at = Some(now);
            key.last_tick_at = Some(now);
        }
        return Outcome::new(ResultCode::Ok, key, now, app_paused, true);
    }

    let ticked = accountant::persist_tick(key, now, app_paused);

    if accountant::is_expired(key, now, app_paused) {
        accountant::expire(key);
        return Outcome::new(ResultCode::KeyExpired, key, now, app_paused, true);
    }

    if key.hwid.as_deref() != Some(hwid) {
        return Outcome::new(ResultCode::HwidMismatch, key, now, app_paused, ticked);
    }

    Outcome::new(ResultCode::Ok, key, now, app_paused, ticked)
}

/// Set or clear the manual pause flag, freezing or re-anchoring the
/// balance accordingly.
pub fn set_paused(
    app: &App,
    key: &mut LicenseKey,
    paused: bool,
    now: DateTime<Utc>,
) -> Outcome {
    let app_paused = app.status != AppStatus::On;
    if paused {
        accountant::pause(key, now, app_paused);
    } else {
        accountant::resume(key, now, app_paused);
    }
    Outcome::new(ResultCode::Ok, key, now, app_paused, true)
}

/// Add a parsed grant to the key's balance (freeze-then-add, see the
/// accountant for the ordering rationale).
pub fn extend(
    app: &App,
    key: &mut LicenseKey,
    grant_ms: i64,
    now: DateTime<Utc>,
) -> Outcome {
    let app_paused = app.status != AppStatus::On;
    accountant::extend(key, grant_ms, now, app_paused);
    Outcome::new(ResultCode::Ok, key, now, app_paused, true)
}

/// Full reset back to an unstarted key: balance restored to the original
/// grant, binding and pause state cleared.
pub fn reset(app: &App, key: &mut LicenseKey, now: DateTime<Utc>) -> Outcome {
    let app_paused = app.status != AppStatus::On;
    accountant::reset(key);
    Outcome::new(ResultCode::Ok, key, now, app_paused, true)
}

/// Charge elapsed time, then clear the device binding. The countdown
/// keeps running; only `hwid` and `first_used_at` are dropped.
pub fn reset_hwid(app: &App, key: &mut LicenseKey, now: DateTime<Utc>) -> Outcome {
    let app_paused = app.status != AppStatus::On;
    accountant::persist_tick(key, now, app_paused);
    accountant::reset_hwid(key);
    Outcome::new(ResultCode::Ok, key, now, app_paused, true)
}

/// Tick then report the balance, for status and listing calls.
pub fn status(app: &App, key: &mut LicenseKey, now: DateTime<Utc>) -> Outcome {
    let app_paused = app.status != AppStatus::On;
    let ticked = accountant::persist_tick(key, now, app_paused);
    Outcome::new(ResultCode::Ok, key, now, app_paused, ticked)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_codes_serialize_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&ResultCode::HwidMismatch).unwrap(),
            "\"HWID_MISMATCH\""
        );
        assert_eq!(serde_json::to_string(&ResultCode::Ok).unwrap(), "\"OK\"");
    }
}
