use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct KeygateConfig {
    pub port: u16,
    pub public_url: String,
    pub database: DatabaseConfig,
    /// Registrations with this email become admin (premium lifetime).
    #[serde(default)]
    pub admin_email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

impl KeygateConfig {
    pub fn load(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("KEYGATE_").split("__"))
            .extract()
    }
}
