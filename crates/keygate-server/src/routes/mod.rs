pub mod apps;
pub mod grants;
pub mod health;
pub mod keys;
pub mod users;
pub mod validate;

use crate::state::AppState;
use keygate_core::traits::*;

pub fn build_router<U, A, K>(state: AppState<U, A, K>) -> axum::Router
where
    U: UserStore + Clone,
    A: AppStore + Clone,
    K: KeyStore + Clone,
{
    axum::Router::new()
        // Health
        .route("/health", axum::routing::get(health::health_check))
        // Accounts
        .route("/api/register", axum::routing::post(users::register::<U, A, K>))
        .route("/api/login", axum::routing::post(users::login::<U, A, K>))
        .route(
            "/api/set-key-prefix",
            axum::routing::post(users::set_key_prefix::<U, A, K>),
        )
        // Validation
        .route("/api/validate", axum::routing::get(validate::validate::<U, A, K>))
        // Keys
        .route("/api/create-key", axum::routing::post(keys::create_key::<U, A, K>))
        .route("/api/key-status", axum::routing::get(keys::key_status::<U, A, K>))
        .route("/api/pause-key", axum::routing::post(keys::pause_key::<U, A, K>))
        .route("/api/extend-key", axum::routing::post(keys::extend_key::<U, A, K>))
        .route("/api/reset-key", axum::routing::post(keys::reset_key::<U, A, K>))
        .route("/api/reset-hwid", axum::routing::post(keys::reset_hwid::<U, A, K>))
        .route("/api/delete-key", axum::routing::post(keys::delete_key::<U, A, K>))
        .route("/api/list-keys", axum::routing::get(keys::list_keys::<U, A, K>))
        // Apps
        .route("/api/create-app", axum::routing::post(apps::create_app::<U, A, K>))
        .route("/api/toggle-app", axum::routing::post(apps::toggle_app::<U, A, K>))
        .route("/api/delete-app", axum::routing::post(apps::delete_app::<U, A, K>))
        .route("/api/list-apps", axum::routing::get(apps::list_apps::<U, A, K>))
        // Reseller grants
        .route(
            "/api/add-reseller",
            axum::routing::post(grants::add_reseller::<U, A, K>),
        )
        .route(
            "/api/remove-reseller",
            axum::routing::post(grants::remove_reseller::<U, A, K>),
        )
        .route(
            "/api/list-resellers",
            axum::routing::get(grants::list_resellers::<U, A, K>),
        )
        // CORS: the validate endpoint is called from arbitrary clients.
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        // Request body size limit: 1 MiB; every payload here is small JSON.
        .layer(tower_http::limit::RequestBodyLimitLayer::new(1024 * 1024))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
