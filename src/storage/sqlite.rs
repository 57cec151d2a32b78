//! `SQLite` storage implementation.

use crate::error::{Result, StoreError};
use crate::model::{Iri, IssueRecord, IssueStatus, OboId, ProjectId};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

const SELECT_RECORD_COLUMNS: &str =
    "SELECT id, project_id, title, body, status, tracker_json, created_at, updated_at
     FROM issue_records";

/// `SQLite`-backed issue record store.
///
/// Owns its connection: construct one at service startup and pass it to the
/// service layer explicitly. Mutations take `&mut self` and run inside an
/// immediate transaction, so the primary table and the entity-reference
/// join tables always move together. Multi-connection concurrency (separate
/// handles on the same database file) is serialized by `SQLite` itself via
/// WAL journaling and the busy timeout.
#[derive(Debug)]
pub struct SqliteIssueStore {
    conn: Connection,
}

impl SqliteIssueStore {
    /// Open a new connection to the database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema
    /// application fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a new connection with an optional busy timeout (ms).
    ///
    /// Use a timeout when several connections share the database file;
    /// writers then wait for the lock instead of failing with `SQLITE_BUSY`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema
    /// application fails.
    pub fn open_with_timeout(path: &Path, lock_timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;
        if let Some(timeout) = lock_timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))?;
        }
        crate::storage::schema::apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        crate::storage::schema::apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Run a mutation inside an immediate transaction.
    ///
    /// Rolled back on error, so a failed multi-table update leaves prior
    /// state intact.
    fn with_tx<F, R>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Insert or fully replace a record, keyed by `record.id`.
    ///
    /// On replacement every payload field is overwritten and both
    /// entity-reference sets are rewritten: associations no longer present
    /// are dropped from the indices, new ones are added. The row update and
    /// both join-table rewrites commit together.
    ///
    /// The project association is immutable: upserting an existing id with
    /// a different `project_id` fails with [`StoreError::ProjectChanged`]
    /// and leaves the stored record untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] for an empty `id` or `project_id`,
    /// [`StoreError::ProjectChanged`] for a project move, or a database
    /// error if the write fails. No partial state survives an error.
    pub fn upsert(&mut self, record: &IssueRecord) -> Result<()> {
        if record.id.trim().is_empty() {
            return Err(StoreError::validation("id", "must not be empty"));
        }
        if record.project_id.as_str().trim().is_empty() {
            return Err(StoreError::validation("project_id", "must not be empty"));
        }

        let tracker_json = record
            .tracker
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.with_tx(|tx| {
            let existing: Option<String> = tx
                .query_row(
                    "SELECT project_id FROM issue_records WHERE id = ?",
                    [record.id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(existing) = existing {
                if existing != record.project_id.as_str() {
                    return Err(StoreError::ProjectChanged {
                        id: record.id.clone(),
                        existing: ProjectId::new(existing),
                        requested: record.project_id.clone(),
                    });
                }
            }

            tx.execute(
                "INSERT INTO issue_records (
                    id, project_id, title, body, status, tracker_json, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    body = excluded.body,
                    status = excluded.status,
                    tracker_json = excluded.tracker_json,
                    created_at = excluded.created_at,
                    updated_at = excluded.updated_at",
                rusqlite::params![
                    record.id,
                    record.project_id.as_str(),
                    record.title,
                    record.body,
                    record.status.as_str(),
                    tracker_json,
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )?;

            // Rewrite both reference sets wholesale; stale entries must not
            // survive a replacement.
            tx.execute(
                "DELETE FROM record_iris WHERE record_id = ?",
                [record.id.as_str()],
            )?;
            for iri in &record.iris {
                tx.execute(
                    "INSERT INTO record_iris (record_id, iri) VALUES (?, ?)",
                    rusqlite::params![record.id, iri.as_str()],
                )?;
            }

            tx.execute(
                "DELETE FROM record_obo_ids WHERE record_id = ?",
                [record.id.as_str()],
            )?;
            for obo_id in &record.obo_ids {
                tx.execute(
                    "INSERT INTO record_obo_ids (record_id, obo_id) VALUES (?, ?)",
                    rusqlite::params![record.id, obo_id.as_str()],
                )?;
            }

            Ok(())
        })?;

        tracing::debug!(
            id = %record.id,
            project_id = %record.project_id,
            iris = record.iris.len(),
            obo_ids = record.obo_ids.len(),
            "Upserted issue record"
        );

        Ok(())
    }

    /// Get a single record by id, fully hydrated.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn get(&self, id: &str) -> Result<Option<IssueRecord>> {
        let sql = format!("{SELECT_RECORD_COLUMNS} WHERE id = ?");
        Ok(self.select_records(&sql, [id])?.pop())
    }

    /// Check whether a record with the given id exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn id_exists(&self, id: &str) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare("SELECT 1 FROM issue_records WHERE id = ?")?;
        Ok(stmt.exists([id])?)
    }

    /// Total number of stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn count_records(&self) -> Result<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT count(*) FROM issue_records", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Delete a single record by id.
    ///
    /// Join-table entries cascade with the row. Returns `false` when no
    /// such record existed; absence is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub fn delete(&mut self, id: &str) -> Result<bool> {
        let deleted = self.with_tx(|tx| {
            let n = tx.execute("DELETE FROM issue_records WHERE id = ?", [id])?;
            Ok(n > 0)
        })?;

        if deleted {
            tracing::debug!(id, "Deleted issue record");
        }

        Ok(deleted)
    }

    /// Delete every record owned by the given project.
    ///
    /// Runs as one transaction: concurrent readers see the full pre-delete
    /// set or the full post-delete set, never a partial view. Idempotent;
    /// deleting a project with no records is a no-op. Returns the number of
    /// records removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub fn delete_all_by_project(&mut self, project_id: &ProjectId) -> Result<usize> {
        let deleted = self.with_tx(|tx| {
            let n = tx.execute(
                "DELETE FROM issue_records WHERE project_id = ?",
                [project_id.as_str()],
            )?;
            Ok(n)
        })?;

        tracing::debug!(project_id = %project_id, deleted, "Deleted project issue records");

        Ok(deleted)
    }

    /// All records owned by the given project. Result order is unspecified.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn find_all_by_project(&self, project_id: &ProjectId) -> Result<Vec<IssueRecord>> {
        let sql = format!("{SELECT_RECORD_COLUMNS} WHERE project_id = ?");
        self.select_records(&sql, rusqlite::params![project_id.as_str()])
    }

    /// All records referencing the given IRI, across all projects.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn find_all_by_iri(&self, iri: &Iri) -> Result<Vec<IssueRecord>> {
        let sql = format!(
            "{SELECT_RECORD_COLUMNS} WHERE id IN
             (SELECT record_id FROM record_iris WHERE iri = ?)"
        );
        self.select_records(&sql, rusqlite::params![iri.as_str()])
    }

    /// All records referencing the given OBO id, across all projects.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn find_all_by_obo_id(&self, obo_id: &OboId) -> Result<Vec<IssueRecord>> {
        let sql = format!(
            "{SELECT_RECORD_COLUMNS} WHERE id IN
             (SELECT record_id FROM record_obo_ids WHERE obo_id = ?)"
        );
        self.select_records(&sql, rusqlite::params![obo_id.as_str()])
    }

    /// Records for the project that reference the given IRI.
    ///
    /// Semantically the intersection of [`Self::find_all_by_project`] and
    /// [`Self::find_all_by_iri`], computed as one constrained query.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn find_all_by_project_and_iri(
        &self,
        project_id: &ProjectId,
        iri: &Iri,
    ) -> Result<Vec<IssueRecord>> {
        let sql = format!(
            "{SELECT_RECORD_COLUMNS} WHERE project_id = ? AND id IN
             (SELECT record_id FROM record_iris WHERE iri = ?)"
        );
        self.select_records(&sql, rusqlite::params![project_id.as_str(), iri.as_str()])
    }

    /// Records for the project that reference the given OBO id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn find_all_by_project_and_obo_id(
        &self,
        project_id: &ProjectId,
        obo_id: &OboId,
    ) -> Result<Vec<IssueRecord>> {
        let sql = format!(
            "{SELECT_RECORD_COLUMNS} WHERE project_id = ? AND id IN
             (SELECT record_id FROM record_obo_ids WHERE obo_id = ?)"
        );
        self.select_records(&sql, rusqlite::params![project_id.as_str(), obo_id.as_str()])
    }

    /// Run a finder query and hydrate the results inside one read snapshot.
    ///
    /// The primary-row select and the join-table hydration are separate
    /// statements; a deferred read transaction pins them to the same
    /// database snapshot, so a write committed on another connection in
    /// between cannot tear a result (a record returned for an IRI whose
    /// hydrated set no longer contains that IRI).
    fn select_records<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<IssueRecord>> {
        let tx = self.conn.unchecked_transaction()?;

        let mut stmt = tx.prepare(sql)?;
        let records = stmt
            .query_map(params, |row| Self::record_from_row(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        drop(stmt);

        let records = Self::hydrate(&tx, records)?;
        tx.commit()?;
        Ok(records)
    }

    /// Populate the entity-reference sets for a batch of records.
    fn hydrate(conn: &Connection, mut records: Vec<IssueRecord>) -> Result<Vec<IssueRecord>> {
        if records.is_empty() {
            return Ok(records);
        }

        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        let mut iris = Self::refs_for_records(conn, &ids, "record_iris", "iri")?;
        let mut obo_ids = Self::refs_for_records(conn, &ids, "record_obo_ids", "obo_id")?;

        for record in &mut records {
            if let Some(values) = iris.remove(&record.id) {
                record.iris = values.into_iter().map(Iri::new).collect();
            }
            if let Some(values) = obo_ids.remove(&record.id) {
                record.obo_ids = values.into_iter().map(OboId::new).collect();
            }
        }

        Ok(records)
    }

    /// Fetch join-table values for multiple records efficiently.
    fn refs_for_records(
        conn: &Connection,
        record_ids: &[String],
        table: &str,
        column: &str,
    ) -> Result<HashMap<String, Vec<String>>> {
        const SQLITE_VAR_LIMIT: usize = 900;

        let mut map: HashMap<String, Vec<String>> = HashMap::new();

        // SQLite has a finite variable limit (default 999). Chunk to avoid
        // query failures on large result sets.
        for chunk in record_ids.chunks(SQLITE_VAR_LIMIT) {
            let placeholders: Vec<&str> = chunk.iter().map(|_| "?").collect();
            let sql = format!(
                "SELECT record_id, {column} FROM {table} WHERE record_id IN ({})",
                placeholders.join(",")
            );

            let params: Vec<&dyn rusqlite::ToSql> =
                chunk.iter().map(|s| s as &dyn rusqlite::ToSql).collect();

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params.as_slice(), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;

            for row in rows {
                let (record_id, value) = row?;
                map.entry(record_id).or_default().push(value);
            }
        }

        Ok(map)
    }

    fn record_from_row(row: &rusqlite::Row) -> rusqlite::Result<IssueRecord> {
        let tracker = match row.get::<_, Option<String>>(5)? {
            Some(json) => Some(serde_json::from_str(&json).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    5,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?),
            None => None,
        };

        Ok(IssueRecord {
            id: row.get(0)?,
            project_id: ProjectId::new(row.get::<_, String>(1)?),
            // Loaded separately by hydrate()
            iris: std::collections::BTreeSet::new(),
            obo_ids: std::collections::BTreeSet::new(),
            title: row.get(2)?,
            body: row.get::<_, Option<String>>(3)?,
            status: parse_status(row.get::<_, Option<String>>(4)?.as_deref()),
            tracker,
            created_at: parse_datetime(&row.get::<_, String>(6)?),
            updated_at: parse_datetime(&row.get::<_, String>(7)?),
        })
    }
}

fn parse_status(s: Option<&str>) -> IssueStatus {
    match s {
        Some("open") | None => IssueStatus::Open,
        Some("closed") => IssueStatus::Closed,
        Some(other) => IssueStatus::Custom(other.to_string()),
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Utc.from_utc_datetime(&naive);
    }

    tracing::warn!(value = s, "Unparseable timestamp column, substituting current time");
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_status_handles_unknown_values() {
        assert_eq!(parse_status(Some("open")), IssueStatus::Open);
        assert_eq!(parse_status(None), IssueStatus::Open);
        assert_eq!(parse_status(Some("closed")), IssueStatus::Closed);
        assert_eq!(
            parse_status(Some("merged")),
            IssueStatus::Custom("merged".to_string())
        );
    }

    #[test]
    fn parse_datetime_roundtrips_rfc3339() {
        let now = Utc::now();
        let parsed = parse_datetime(&now.to_rfc3339());
        assert_eq!(parsed, now);
    }

    #[test]
    fn parse_datetime_accepts_sqlite_format() {
        let parsed = parse_datetime("2026-01-01 12:30:00");
        assert_eq!(parsed.to_rfc3339(), "2026-01-01T12:30:00+00:00");
    }

    #[test]
    fn parse_datetime_falls_back_to_now_on_garbage() {
        let before = Utc::now();
        let parsed = parse_datetime("not a timestamp");
        assert!(parsed >= before);
        assert!(parsed <= Utc::now());
    }
}
