//! Computed authority over apps and keys.
//!
//! The stored role is advisory; every decision here derives from the
//! ownership chain: admin, app owner, reseller grant, key creator. The
//! capability set is computed once per request and threaded through
//! instead of re-checking the chain at each call site.

use keygate_core::{App, LicenseKey, Plan, ResellerGrant, Role, User};

/// Key tokens start with this when the actor has no custom prefix.
pub const DEFAULT_KEY_PREFIX: &str = "KG-";

/// What an actor may do with one app, computed from the ownership chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppAccess {
    /// See the app and the keys it is allowed to list.
    pub can_view: bool,
    /// Toggle status, delete the app.
    pub can_manage: bool,
    /// Add/remove reseller grants. Resellers never hold this, even for
    /// apps they are granted on.
    pub can_manage_grants: bool,
}

pub fn is_admin(user: &User) -> bool {
    user.role == Role::Admin
}

fn has_grant(user: &User, app: &App, grants: &[ResellerGrant]) -> bool {
    grants
        .iter()
        .any(|g| g.reseller_user_id == user.id && g.app_id == app.id)
}

/// Compute the capability set for (actor, app). `grants` are the app's
/// reseller grants (or any superset containing them).
pub fn app_access(actor: &User, app: &App, grants: &[ResellerGrant]) -> AppAccess {
    let admin = is_admin(actor);
    let owner = app.owner_user_id == actor.id;
    AppAccess {
        can_view: admin || owner || has_grant(actor, app, grants),
        can_manage: admin || owner,
        can_manage_grants: admin || owner,
    }
}

/// Key management (pause/resume/extend/reset/delete): admin, the app
/// owner, or the key's own creator. A reseller manages only the keys
/// they personally created.
pub fn can_manage_key(actor: &User, app: &App, key: &LicenseKey) -> bool {
    is_admin(actor) || app.owner_user_id == actor.id || key.created_by_user_id == actor.id
}

/// Filter an app's keys down to what the actor may list: everything for
/// admin and the owner, own-created keys for any other authorized viewer.
pub fn visible_keys<'a>(
    actor: &User,
    app: &App,
    keys: &'a [LicenseKey],
) -> Vec<&'a LicenseKey> {
    if is_admin(actor) || app.owner_user_id == actor.id {
        keys.iter().collect()
    } else {
        keys.iter()
            .filter(|k| k.created_by_user_id == actor.id)
            .collect()
    }
}

/// Creation-time quota for an actor's plan. `None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanLimits {
    pub max_apps: Option<i64>,
    pub max_keys_per_app: Option<i64>,
}

pub const FREE_MAX_APPS: i64 = 2;
pub const FREE_MAX_KEYS_PER_APP: i64 = 15;

pub fn plan_limits(user: &User) -> PlanLimits {
    if is_admin(user) || is_premium(user) {
        PlanLimits {
            max_apps: None,
            max_keys_per_app: None,
        }
    } else {
        PlanLimits {
            max_apps: Some(FREE_MAX_APPS),
            max_keys_per_app: Some(FREE_MAX_KEYS_PER_APP),
        }
    }
}

pub fn is_premium(user: &User) -> bool {
    matches!(user.plan, Plan::Premium | Plan::PremiumLifetime) || is_admin(user)
}

/// Sanitize a custom prefix: reject whitespace, force a trailing dash.
/// Returns None when the prefix is unusable.
pub fn sanitize_prefix(prefix: &str) -> Option<String> {
    let raw = prefix.trim();
    if raw.is_empty() || raw.chars().any(char::is_whitespace) {
        return None;
    }
    let mut out = raw.to_string();
    if !out.ends_with('-') {
        out.push('-');
    }
    Some(out)
}

/// The prefix prepended to generated key tokens for this actor. Custom
/// prefixes are honored only for premium-tier actors.
pub fn key_prefix_for(user: &User) -> String {
    if !is_premium(user) {
        return DEFAULT_KEY_PREFIX.to_string();
    }
    user.key_prefix
        .as_deref()
        .and_then(sanitize_prefix)
        .unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use keygate_core::AppStatus;

    fn user(id: &str, role: Role, plan: Plan) -> User {
        User {
            id: id.into(),
            username: id.into(),
            email: format!("{id}@test.local"),
            password_hash: "x".into(),
            role,
            plan,
            secret: format!("secret-{id}"),
            secret_last_used_at: None,
            key_prefix: None,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn app(id: &str, owner: &str) -> App {
        App {
            id: id.into(),
            name: id.into(),
            owner_user_id: owner.into(),
            status: AppStatus::On,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn grant(reseller: &str, app_id: &str) -> ResellerGrant {
        ResellerGrant {
            id: format!("res_{reseller}_{app_id}"),
            reseller_user_id: reseller.into(),
            app_id: app_id.into(),
            created_by_user_id: "owner".into(),
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn key(id: &str, app_id: &str, creator: &str) -> LicenseKey {
        LicenseKey {
            id: id.into(),
            app_id: app_id.into(),
            name: id.into(),
            token: format!("KG-{id}"),
            duration_input: "1d".into(),
            duration_ms: 86_400_000,
            remaining_ms: 86_400_000,
            started_at: None,
            last_tick_at: None,
            paused: false,
            paused_by_app: false,
            hwid: None,
            first_used_at: None,
            created_by_user_id: creator.into(),
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            version: 0,
        }
    }

    #[test]
    fn owner_holds_all_capabilities() {
        let owner = user("owner", Role::User, Plan::Free);
        let a = app("app1", "owner");
        let access = app_access(&owner, &a, &[]);
        assert!(access.can_view && access.can_manage && access.can_manage_grants);
    }

    #[test]
    fn admin_holds_all_capabilities_everywhere() {
        let admin = user("boss", Role::Admin, Plan::PremiumLifetime);
        let a = app("app1", "someone-else");
        let access = app_access(&admin, &a, &[]);
        assert!(access.can_view && access.can_manage && access.can_manage_grants);
    }

    #[test]
    fn reseller_views_but_never_manages() {
        let reseller = user("res", Role::Reseller, Plan::Free);
        let a = app("app1", "owner");
        let grants = [grant("res", "app1")];
        let access = app_access(&reseller, &a, &grants);
        assert!(access.can_view);
        assert!(!access.can_manage);
        assert!(!access.can_manage_grants);
    }

    #[test]
    fn stranger_sees_nothing() {
        let other = user("other", Role::User, Plan::Free);
        let a = app("app1", "owner");
        let access = app_access(&other, &a, &[grant("res", "app1")]);
        assert!(!access.can_view && !access.can_manage && !access.can_manage_grants);
    }

    #[test]
    fn reseller_manages_only_own_keys() {
        let reseller = user("res", Role::Reseller, Plan::Free);
        let a = app("app1", "owner");
        let mine = key("k1", "app1", "res");
        let theirs = key("k2", "app1", "owner");
        assert!(can_manage_key(&reseller, &a, &mine));
        assert!(!can_manage_key(&reseller, &a, &theirs));
    }

    #[test]
    fn key_visibility_is_creator_scoped_for_resellers() {
        let reseller = user("res", Role::Reseller, Plan::Free);
        let owner = user("owner", Role::User, Plan::Free);
        let a = app("app1", "owner");
        let keys = vec![key("k1", "app1", "res"), key("k2", "app1", "owner")];
        assert_eq!(visible_keys(&reseller, &a, &keys).len(), 1);
        assert_eq!(visible_keys(&owner, &a, &keys).len(), 2);
    }

    #[test]
    fn free_plan_is_bounded_premium_is_not() {
        let free = user("f", Role::User, Plan::Free);
        let premium = user("p", Role::User, Plan::Premium);
        assert_eq!(plan_limits(&free).max_apps, Some(FREE_MAX_APPS));
        assert_eq!(plan_limits(&free).max_keys_per_app, Some(FREE_MAX_KEYS_PER_APP));
        assert_eq!(plan_limits(&premium).max_apps, None);
    }

    #[test]
    fn prefix_ignored_for_free_tier() {
        let mut free = user("f", Role::User, Plan::Free);
        free.key_prefix = Some("ACME".into());
        assert_eq!(key_prefix_for(&free), DEFAULT_KEY_PREFIX);
    }

    #[test]
    fn prefix_sanitized_for_premium() {
        let mut premium = user("p", Role::User, Plan::Premium);
        premium.key_prefix = Some("ACME".into());
        assert_eq!(key_prefix_for(&premium), "ACME-");

        premium.key_prefix = Some("has space".into());
        assert_eq!(key_prefix_for(&premium), DEFAULT_KEY_PREFIX);

        premium.key_prefix = None;
        assert_eq!(key_prefix_for(&premium), DEFAULT_KEY_PREFIX);
    }
}
