use tempfile::TempDir;

use keygate_storage_sqlite::{SqliteAppStore, SqliteKeyStore, SqliteUserStore};

pub struct TestStores {
    pub user_store: SqliteUserStore,
    pub app_store: SqliteAppStore,
    pub key_store: SqliteKeyStore,
    /// Hold the TempDir to keep it alive for the test's duration.
    pub _tempdir: TempDir,
}

/// Create a fresh set of test stores backed by a tempdir.
///
/// All stores share the same file-backed SQLite database so cascades are
/// observable across them.
pub async fn create_test_stores() -> TestStores {
    let tempdir = TempDir::new().expect("failed to create tempdir");
    let db_path = tempdir.path().join("test.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    let user_store = SqliteUserStore::connect(&db_url)
        .await
        .expect("failed to connect user store");
    let app_store = SqliteAppStore::connect(&db_url)
        .await
        .expect("failed to connect app store");
    let key_store = SqliteKeyStore::connect(&db_url)
        .await
        .expect("failed to connect key store");

    TestStores {
        user_store,
        app_store,
        key_store,
        _tempdir: tempdir,
    }
}
