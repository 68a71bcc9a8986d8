use std::sync::Arc;

use keygate_core::config::KeygateConfig;
use keygate_core::traits::*;

#[derive(Clone)]
pub struct AppState<U, A, K>
where
    U: UserStore,
    A: AppStore,
    K: KeyStore,
{
    pub user_store: Arc<U>,
    pub app_store: Arc<A>,
    pub key_store: Arc<K>,
    pub config: Arc<KeygateConfig>,
}
