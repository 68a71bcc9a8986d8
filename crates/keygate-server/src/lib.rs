pub mod auth;
pub mod error;
pub mod routes;
pub mod service;
pub mod state;

pub use auth::AuthSecret;
pub use error::ApiError;
pub use routes::build_router;
pub use state::AppState;
