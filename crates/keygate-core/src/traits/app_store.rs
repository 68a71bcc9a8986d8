use async_trait::async_trait;

use crate::error::KeygateResult;
use crate::types::{App, AppStatus, ResellerGrant, User};

#[async_trait]
pub trait AppStore: Send + Sync + 'static {
    async fn create_app(&self, app: &App) -> KeygateResult<()>;
    async fn get_app(&self, id: &str) -> KeygateResult<Option<App>>;
    /// Apps the actor may see: all for admins, otherwise owned apps plus
    /// apps with a reseller grant for the actor.
    async fn list_apps_visible_to(&self, user: &User) -> KeygateResult<Vec<App>>;
    async fn count_apps_owned_by(&self, user_id: &str) -> KeygateResult<i64>;
    async fn update_app_status(&self, id: &str, status: AppStatus) -> KeygateResult<()>;
    /// Delete the app and cascade its keys and reseller grants.
    async fn delete_app(&self, id: &str) -> KeygateResult<()>;

    // Reseller grant management
    async fn create_grant(&self, grant: &ResellerGrant) -> KeygateResult<()>;
    async fn delete_grant(&self, id: &str) -> KeygateResult<()>;
    async fn list_grants_for_app(&self, app_id: &str) -> KeygateResult<Vec<ResellerGrant>>;
    async fn list_grants_for_user(&self, user_id: &str) -> KeygateResult<Vec<ResellerGrant>>;
    async fn grant_exists(&self, user_id: &str, app_id: &str) -> KeygateResult<bool>;
}
