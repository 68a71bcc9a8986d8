pub mod config;
pub mod credential;
pub mod error;
pub mod traits;
pub mod types;

pub use config::KeygateConfig;
pub use credential::{generate_key_token, generate_secret, hash_password, verify_password};
pub use error::{KeygateError, KeygateResult};
pub use traits::{AppStore, KeyStore, UserStore};
pub use types::{
    App, AppStatus, CreateKeyInput, CreateUserInput, LicenseKey, Plan, ResellerGrant, Role, User,
};
