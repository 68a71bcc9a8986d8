//! Elapsed-time accounting for license keys.
//!
//! The balance is stored as `(remaining_ms, last_tick_at)` and elapsed
//! wall-clock time is folded in lazily on every read or mutation; nothing
//! counts down in the background. Callers supply a single `now` per
//! logical operation so the arithmetic stays consistent within a request.
//!
//! Invariant preserved by every function here: `last_tick_at` is non-null
//! iff the key is started, not manually paused, and its app is on.

use chrono::{DateTime, Utc};
use keygate_core::LicenseKey;

/// A key is effectively paused when either its own pause flag or the
/// app-level pause is set.
pub fn effectively_paused(key: &LicenseKey, app_paused: bool) -> bool {
    key.paused || app_paused
}

/// Remaining balance at `now`, without mutating the key.
///
/// Frozen (stored) balance when the key has not started or is effectively
/// paused; otherwise the stored balance minus time elapsed since the tick
/// anchor, floored at zero.
pub fn compute_remaining_ms(key: &LicenseKey, now: DateTime<Utc>, app_paused: bool) -> i64 {
    if key.started_at.is_none() || effectively_paused(key, app_paused) {
        return key.remaining_ms.max(0);
    }
    match key.last_tick_at {
        None => key.remaining_ms.max(0),
        Some(last) => {
            let elapsed = (now - last).num_milliseconds().max(0);
            (key.remaining_ms - elapsed).max(0)
        }
    }
}

/// Fold elapsed time into the stored balance and advance the tick anchor.
///
/// Returns true iff the key changed. No-op for unstarted or effectively
/// paused keys. A missing anchor on a running key is recovered by setting
/// it to `now` without charging any time. Idempotent for a repeated `now`.
pub fn persist_tick(key: &mut LicenseKey, now: DateTime<Utc>, app_paused: bool) -> bool {
    if key.started_at.is_none() || effectively_paused(key, app_paused) {
        return false;
    }
    let Some(last) = key.last_tick_at else {
        key.last_tick_at = Some(now);
        return true;
    };
    let elapsed = (now - last).num_milliseconds().max(0);
    if elapsed <= 0 {
        return false;
    }
    let next = (key.remaining_ms - elapsed).max(0);
    if next == key.remaining_ms {
        return false;
    }
    key.remaining_ms = next;
    key.last_tick_at = Some(now);
    true
}

/// Bank any in-flight elapsed time, then clear the tick anchor so no
/// further time accrues. Called on every transition into a paused state.
pub fn freeze(key: &mut LicenseKey, now: DateTime<Utc>, app_paused: bool) -> bool {
    let changed = persist_tick(key, now, app_paused);
    key.last_tick_at = None;
    changed
}

/// Add `grant_ms` to the balance. Freezes first so the addition cannot
/// mask elapsed-but-unbanked time, then re-anchors the clock iff the key
/// is running.
pub fn extend(key: &mut LicenseKey, grant_ms: i64, now: DateTime<Utc>, app_paused: bool) {
    freeze(key, now, app_paused);
    key.remaining_ms = key.remaining_ms.saturating_add(grant_ms).max(0);
    if key.started_at.is_some() && !effectively_paused(key, app_paused) {
        key.last_tick_at = Some(now);
    }
}

/// A key is expired iff it has started and its computed balance is gone.
pub fn is_expired(key: &LicenseKey, now: DateTime<Utc>, app_paused: bool) -> bool {
    key.started_at.is_some() && compute_remaining_ms(key, now, app_paused) <= 0
}

/// Freeze the key at a zero balance.
pub fn expire(key: &mut LicenseKey) {
    key.remaining_ms = 0;
    key.last_tick_at = None;
}

/// Manual pause: bank elapsed time, stop the clock, set the flag.
pub fn pause(key: &mut LicenseKey, now: DateTime<Utc>, app_paused: bool) {
    if !key.paused {
        freeze(key, now, app_paused);
        key.paused = true;
    }
}

/// Manual resume: clear both pause flags and re-anchor the clock iff the
/// key had started and the app is on. Never starts an unstarted key —
/// only the first bound validation does that.
pub fn resume(key: &mut LicenseKey, now: DateTime<Utc>, app_paused: bool) {
    key.paused = false;
    key.paused_by_app = false;
    if key.started_at.is_some() && !app_paused {
        key.last_tick_at = Some(now);
    }
}

/// App turned off: freeze every key. Keys running until now are marked
/// paused-by-app; keys already manually paused stay paused but the reason
/// of record becomes the manual flag alone.
pub fn cascade_app_off(keys: &mut [LicenseKey], now: DateTime<Utc>) {
    for key in keys.iter_mut() {
        if !key.paused {
            freeze(key, now, false);
            key.paused = true;
            key.paused_by_app = true;
        } else {
            freeze(key, now, false);
            key.paused_by_app = false;
        }
    }
}

/// App turned back on: resume only the keys the off-transition paused.
/// Manually-paused keys are left untouched.
pub fn cascade_app_on(keys: &mut [LicenseKey], now: DateTime<Utc>) {
    for key in keys.iter_mut() {
        if !key.paused_by_app {
            continue;
        }
        key.paused = false;
        key.paused_by_app = false;
        if key.started_at.is_some() {
            key.last_tick_at = Some(now);
        }
    }
}

/// Full reset back to NOT_STARTED: balance restored to the original
/// grant, binding and clock state cleared.
pub fn reset(key: &mut LicenseKey) {
    key.remaining_ms = key.duration_ms;
    key.started_at = None;
    key.last_tick_at = None;
    key.paused = false;
    key.paused_by_app = false;
    key.hwid = None;
    key.first_used_at = None;
}

/// Clear the device binding only. The time balance, started/paused state
/// and tick anchor are untouched.
pub fn reset_hwid(key: &mut LicenseKey) {
    key.hwid = None;
    key.first_used_at = None;
}

/// Remaining time as reported to callers: whole seconds, floored.
pub fn remaining_secs(remaining_ms: i64) -> i64 {
    remaining_ms.max(0) / 1_000
}
