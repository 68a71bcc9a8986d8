pub mod app;
pub mod key;
pub mod user;

pub use app::SqliteAppStore;
pub use key::SqliteKeyStore;
pub use user::SqliteUserStore;

use chrono::{NaiveDateTime, SecondsFormat, TimeZone, Utc};
use keygate_core::KeygateError;

/// Wrap a driver failure as a storage error, logging it at the point of
/// failure so callers only see the typed error.
pub(crate) fn storage_err<E: std::fmt::Display>(err: E) -> KeygateError {
    tracing::warn!("sqlite operation failed: {err}");
    KeygateError::Storage(err.to_string())
}

/// Render a datetime for a TEXT column, millisecond precision with a
/// trailing Z, matching the strftime default in the migrations.
pub(crate) fn fmt_datetime(dt: chrono::DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn fmt_datetime_opt(dt: Option<chrono::DateTime<Utc>>) -> Option<String> {
    dt.map(fmt_datetime)
}

/// Parse a SQLite datetime text string into a chrono DateTime<Utc>.
///
/// Accepts RFC 3339 and the naive `%Y-%m-%dT%H:%M:%S%.fZ` forms produced
/// by `strftime('%Y-%m-%dT%H:%M:%fZ', 'now')`.
pub(crate) fn parse_datetime(s: &str) -> Result<chrono::DateTime<Utc>, KeygateError> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.fZ") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%SZ") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    Err(KeygateError::Storage(format!("failed to parse datetime: {s}")))
}

pub(crate) fn parse_datetime_opt(
    s: Option<&str>,
) -> Result<Option<chrono::DateTime<Utc>>, KeygateError> {
    match s {
        Some(s) => Ok(Some(parse_datetime(s)?)),
        None => Ok(None),
    }
}
