//! Job repository — CRUD operations for the `jobs` table.
//!
//! State-transition updates carry their expected-state guard in the
//! `WHERE` clause and report via the returned `bool` whether a row
//! actually changed. Interpreting a `false` (wrong state, progress
//! regression) is the store's job.

use rusqlite::{params, Connection, Row};

use super::{Database, DatabaseError};

/// A raw job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub owner_id: String,
    pub status: String,
    pub progress: i64,
    pub status_message: String,
    pub baseline_key: String,
    pub renewal_key: String,
    pub baseline_filename: Option<String>,
    pub renewal_filename: Option<String>,
    pub company_name: Option<String>,
    pub policy_type: Option<String>,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            owner_id: row.get("owner_id")?,
            status: row.get("status")?,
            progress: row.get("progress")?,
            status_message: row.get("status_message")?,
            baseline_key: row.get("baseline_key")?,
            renewal_key: row.get("renewal_key")?,
            baseline_filename: row.get("baseline_filename")?,
            renewal_filename: row.get("renewal_filename")?,
            company_name: row.get("company_name")?,
            policy_type: row.get("policy_type")?,
            error_kind: row.get("error_kind")?,
            error_message: row.get("error_message")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            started_at: row.get("started_at")?,
            completed_at: row.get("completed_at")?,
        })
    }
}

/// Inserts a new job row.
pub fn insert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (id, owner_id, status, progress, status_message, baseline_key,
             renewal_key, baseline_filename, renewal_filename, company_name, policy_type,
             error_kind, error_message, created_at, updated_at, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                job.id,
                job.owner_id,
                job.status,
                job.progress,
                job.status_message,
                job.baseline_key,
                job.renewal_key,
                job.baseline_filename,
                job.renewal_filename,
                job.company_name,
                job.policy_type,
                job.error_kind,
                job.error_message,
                job.created_at,
                job.updated_at,
                job.started_at,
                job.completed_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Finds a job by ID, scoped to an owner. A job owned by someone else is
/// indistinguishable from a missing one.
pub fn find_for_owner(
    db: &Database,
    id: &str,
    owner_id: &str,
) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs WHERE id = ?1 AND owner_id = ?2")?;
        let mut rows = stmt.query_map(params![id, owner_id], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists an owner's jobs newest-first, returning (rows, total_count).
pub fn list_for_owner(
    db: &Database,
    owner_id: &str,
    limit: u64,
    offset: u64,
) -> Result<(Vec<JobRow>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let total: u64 = conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE owner_id = ?1",
            params![owner_id],
            |r| r.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT * FROM jobs WHERE owner_id = ?1
             ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
        )?;
        let rows: Vec<JobRow> = stmt
            .query_map(
                params![owner_id, limit as i64, offset as i64],
                JobRow::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })
}

/// Returns the IDs of all jobs with the given status, oldest first.
pub fn ids_by_status(db: &Database, status: &str) -> Result<Vec<String>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT id FROM jobs WHERE status = ?1 ORDER BY created_at ASC")?;
        let ids: Vec<String> = stmt
            .query_map(params![status], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    })
}

/// `pending → processing`. Returns false if the job was not pending.
pub fn mark_processing(
    db: &Database,
    id: &str,
    started_at: &str,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET status = 'processing', started_at = ?2, updated_at = ?3
             WHERE id = ?1 AND status = 'pending'",
            params![id, started_at, updated_at],
        )?;
        Ok(changed > 0)
    })
}

/// Updates progress and message. The guard enforces both the
/// processing-only and the monotonicity invariants; returns false if
/// either would be violated.
pub fn update_progress(
    db: &Database,
    id: &str,
    progress: i64,
    message: &str,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET progress = ?2, status_message = ?3, updated_at = ?4
             WHERE id = ?1 AND status = 'processing' AND progress <= ?2",
            params![id, progress, message, updated_at],
        )?;
        Ok(changed > 0)
    })
}

/// `{pending, processing} → failed`. Returns false if the job was
/// already terminal.
pub fn mark_failed(
    db: &Database,
    id: &str,
    error_kind: &str,
    error_message: &str,
    completed_at: &str,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET status = 'failed', status_message = 'analysis failed',
             error_kind = ?2, error_message = ?3, completed_at = ?4, updated_at = ?5
             WHERE id = ?1 AND status IN ('pending', 'processing')",
            params![id, error_kind, error_message, completed_at, updated_at],
        )?;
        Ok(changed > 0)
    })
}

/// `processing → completed`, forcing progress to 100. Takes a bare
/// connection so the store can pair it with the result insert in one
/// transaction. Returns false if the job was not processing.
pub fn mark_completed(
    conn: &Connection,
    id: &str,
    completed_at: &str,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE jobs SET status = 'completed', progress = 100,
         status_message = 'analysis complete', completed_at = ?2, updated_at = ?3
         WHERE id = ?1 AND status = 'processing'",
        params![id, completed_at, updated_at],
    )?;
    Ok(changed > 0)
}

/// Deletes a job row. Result rows cascade. Returns false if no such job.
pub fn delete(conn: &Connection, id: &str) -> Result<bool, DatabaseError> {
    let changed = conn.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}
