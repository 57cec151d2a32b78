#![allow(dead_code)]

use issue_store::SqliteIssueStore;
use std::sync::Once;
use tempfile::TempDir;

pub mod fixtures;

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();
    });
}

/// In-memory store for fast unit-level tests.
pub fn test_store() -> SqliteIssueStore {
    SqliteIssueStore::open_memory().expect("open in-memory store")
}

/// File-backed store; the returned `TempDir` keeps the database alive.
pub fn test_store_with_dir() -> (SqliteIssueStore, TempDir) {
    let dir = TempDir::new().expect("create temp dir");
    let store = SqliteIssueStore::open(&dir.path().join("issues.db")).expect("open store");
    (store, dir)
}
