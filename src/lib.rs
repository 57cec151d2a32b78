//! Durable multi-index storage for ontology project issue records.
//!
//! An issue record is a unit of tracked discussion attached to entities in an
//! ontology-authoring project. Each record belongs to exactly one project and
//! may reference any number of ontology entities, by IRI and/or by OBO-style
//! identifier. This crate owns the persistence contract for those records:
//! upsert, point and project-cascading deletes, and exact-equality finders
//! over the project / IRI / OBO-ID indices (including the compound
//! project-scoped forms).
//!
//! Storage is SQLite. The entity-reference indices are join tables kept
//! consistent with the primary table inside a single transaction on every
//! mutation, so readers never observe a record without its index entries or
//! index entries without their record.
//!
//! ```no_run
//! use issue_store::{Iri, IssueRecord, ProjectId, SqliteIssueStore};
//!
//! # fn main() -> issue_store::Result<()> {
//! let mut store = SqliteIssueStore::open(std::path::Path::new("issues.db"))?;
//! let record = IssueRecord::new("rec-1", ProjectId::new("project-alpha"), "Broken subclass axiom");
//! store.upsert(&record)?;
//! let hits = store.find_all_by_project(&ProjectId::new("project-alpha"))?;
//! assert_eq!(hits.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod model;
pub mod storage;

pub use error::{Result, StoreError};
pub use model::{Iri, IssueRecord, IssueStatus, OboId, ProjectId, TrackerRef};
pub use storage::SqliteIssueStore;
