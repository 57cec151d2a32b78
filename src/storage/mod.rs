//! `SQLite`-backed persistence for issue records.

pub mod schema;
pub mod sqlite;

pub use sqlite::SqliteIssueStore;
