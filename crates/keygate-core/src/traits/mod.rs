pub mod app_store;
pub mod key_store;
pub mod user_store;

pub use app_store::AppStore;
pub use key_store::KeyStore;
pub use user_store::UserStore;
