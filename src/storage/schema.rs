//! Database schema definitions.

use rusqlite::{Connection, Result};

/// The complete SQL schema for the issue store.
///
/// `issue_records` is the primary table. The entity-reference indices are
/// join tables with `ON DELETE CASCADE`, so point deletes and project
/// cascades drop index entries in the same statement. Compound queries
/// (project + IRI, project + OBO id) are joins over `project_id` and the
/// relevant join table; no materialized compound index is kept.
pub const SCHEMA_SQL: &str = r"
    -- Issue records
    CREATE TABLE IF NOT EXISTS issue_records (
        id TEXT PRIMARY KEY,
        project_id TEXT NOT NULL,
        title TEXT NOT NULL DEFAULT '',
        body TEXT,
        status TEXT NOT NULL,
        tracker_json TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        CHECK (length(id) >= 1),
        CHECK (length(project_id) >= 1)
    );

    CREATE INDEX IF NOT EXISTS idx_issue_records_project_id ON issue_records(project_id);

    -- IRI references (index: IRI -> record ids)
    CREATE TABLE IF NOT EXISTS record_iris (
        record_id TEXT NOT NULL,
        iri TEXT NOT NULL,
        PRIMARY KEY (record_id, iri),
        FOREIGN KEY (record_id) REFERENCES issue_records(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_record_iris_iri ON record_iris(iri);
    CREATE INDEX IF NOT EXISTS idx_record_iris_record_id ON record_iris(record_id);

    -- OBO id references (index: OBO id -> record ids)
    CREATE TABLE IF NOT EXISTS record_obo_ids (
        record_id TEXT NOT NULL,
        obo_id TEXT NOT NULL,
        PRIMARY KEY (record_id, obo_id),
        FOREIGN KEY (record_id) REFERENCES issue_records(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_record_obo_ids_obo_id ON record_obo_ids(obo_id);
    CREATE INDEX IF NOT EXISTS idx_record_obo_ids_record_id ON record_obo_ids(record_id);
";

/// Apply the schema to the database.
///
/// This uses `execute_batch` to run the entire DDL script.
/// It is idempotent because all statements use `IF NOT EXISTS`.
///
/// # Errors
///
/// Returns an error if the SQL execution fails or pragmas cannot be set.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    // Set journal mode to WAL for concurrency
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // Enable foreign keys so join-table rows cascade with their record
    conn.pragma_update(None, "foreign_keys", "ON")?;

    Ok(())
}
