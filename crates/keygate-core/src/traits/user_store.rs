use async_trait::async_trait;

use crate::error::KeygateResult;
use crate::types::{CreateUserInput, User};

#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    async fn create_user(&self, input: &CreateUserInput) -> KeygateResult<User>;
    async fn get_user_by_id(&self, id: &str) -> KeygateResult<Option<User>>;
    /// Fetch the actor owning an access secret (exact match).
    async fn get_user_by_secret(&self, secret: &str) -> KeygateResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> KeygateResult<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> KeygateResult<Option<User>>;
    /// Stamp the credential's last-used timestamp after a validated action.
    async fn touch_secret_last_used(
        &self,
        id: &str,
        at: chrono::DateTime<chrono::Utc>,
    ) -> KeygateResult<()>;
    async fn set_key_prefix(&self, id: &str, prefix: Option<&str>) -> KeygateResult<()>;
}
