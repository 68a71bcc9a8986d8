use std::sync::Arc;

use keygate_core::config::KeygateConfig;
use keygate_server::{AppState, build_router};
use keygate_storage_sqlite::{SqliteAppStore, SqliteKeyStore, SqliteUserStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/keygated.toml".to_string());
    let config = KeygateConfig::load(&config_path)?;

    // Ensure the data directory exists for the default sqlite location.
    std::fs::create_dir_all("data")?;

    let user_store = SqliteUserStore::connect(&config.database.url).await?;
    let app_store = SqliteAppStore::connect(&config.database.url).await?;
    let key_store = SqliteKeyStore::connect(&config.database.url).await?;

    let addr = format!("0.0.0.0:{}", config.port);

    let state = AppState {
        user_store: Arc::new(user_store),
        app_store: Arc::new(app_store),
        key_store: Arc::new(key_store),
        config: Arc::new(config),
    };

    let router = build_router(state);

    tracing::info!("keygated starting on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
