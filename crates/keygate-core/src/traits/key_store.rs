use async_trait::async_trait;

use crate::error::KeygateResult;
use crate::types::{CreateKeyInput, LicenseKey};

#[async_trait]
pub trait KeyStore: Send + Sync + 'static {
    async fn create_key(&self, input: &CreateKeyInput) -> KeygateResult<LicenseKey>;
    async fn get_key_by_id(&self, id: &str) -> KeygateResult<Option<LicenseKey>>;
    /// Exact token match across all apps (management operations).
    async fn get_key_by_token(&self, token: &str) -> KeygateResult<Option<LicenseKey>>;
    /// Exact token match scoped to one app (validation lookup).
    async fn get_key_by_token_within(
        &self,
        app_id: &str,
        token: &str,
    ) -> KeygateResult<Option<LicenseKey>>;
    async fn list_keys_for_app(&self, app_id: &str) -> KeygateResult<Vec<LicenseKey>>;
    async fn count_keys_for_app(&self, app_id: &str) -> KeygateResult<i64>;
    /// Compare-and-swap write: persists `key` only if the stored `version`
    /// still matches `key.version`, bumping it by one. Returns false on
    /// conflict; callers re-fetch and re-apply.
    async fn update_key(&self, key: &LicenseKey) -> KeygateResult<bool>;
    async fn delete_key(&self, id: &str) -> KeygateResult<()>;
}
