use serde::{Deserialize, Serialize};

/// Advisory role label. Real authority over apps and keys is computed by
/// the access resolver, not read off this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    Reseller,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Free,
    Premium,
    PremiumLifetime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppStatus {
    On,
    Off,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub plan: Plan,
    /// Flat access credential presented on every API call.
    pub secret: String,
    pub secret_last_used_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Custom key-token prefix; honored only for premium actors.
    pub key_prefix: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub plan: Plan,
    pub secret: String,
}

#[derive(Debug, Clone)]
pub struct App {
    pub id: String,
    pub name: String,
    pub owner_user_id: String,
    pub status: AppStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Delegated, non-ownership authorization: lets a user manage the keys
/// they create within one app, without authority over the app itself.
#[derive(Debug, Clone)]
pub struct ResellerGrant {
    pub id: String,
    pub reseller_user_id: String,
    pub app_id: String,
    pub created_by_user_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// The unit of entitlement: a device-bound, time-limited key.
///
/// `remaining_ms` is the authoritative balance; elapsed time is folded in
/// lazily from `last_tick_at` — no background process ever runs. The
/// central invariant: `last_tick_at` is non-null iff the key is started,
/// not manually paused, and its app is on.
#[derive(Debug, Clone)]
pub struct LicenseKey {
    pub id: String,
    pub app_id: String,
    pub name: String,
    /// Opaque key token presented by validating clients.
    pub token: String,
    /// Original duration string, e.g. "1d".
    pub duration_input: String,
    pub duration_ms: i64,
    pub remaining_ms: i64,
    /// Set on the first successful hwid-carrying validation.
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_tick_at: Option<chrono::DateTime<chrono::Utc>>,
    pub paused: bool,
    /// True iff the current pause was induced by the app being turned
    /// off rather than by an explicit manual pause.
    pub paused_by_app: bool,
    pub hwid: Option<String>,
    pub first_used_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_by_user_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Optimistic-concurrency stamp; bumped on every persisted update.
    pub version: i64,
}

#[derive(Debug, Clone)]
pub struct CreateKeyInput {
    pub id: String,
    pub app_id: String,
    pub name: String,
    pub token: String,
    pub duration_input: String,
    pub duration_ms: i64,
    pub created_by_user_id: String,
}
