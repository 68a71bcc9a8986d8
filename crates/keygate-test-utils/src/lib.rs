pub mod assertions;
pub mod server;
pub mod stores;

pub use assertions::{assert_envelope_code, assert_envelope_ok};
pub use server::{
    TEST_ADMIN_EMAIL, TEST_PASSWORD, create_test_config, create_test_router,
    create_test_router_and_stores, register_via_api, send_request,
};
pub use stores::{TestStores, create_test_stores};
