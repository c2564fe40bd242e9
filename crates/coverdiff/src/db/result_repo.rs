//! Result repository — rows for the `comparison_results` table.
//!
//! Structured fields (changes, breakdown, actions) are stored as JSON
//! text columns; decoding back into domain types happens in the store.

use rusqlite::{params, Connection, Row};

use super::{Database, DatabaseError};

/// A raw comparison result row from the database.
#[derive(Debug, Clone)]
pub struct ResultRow {
    pub job_id: String,
    pub total_changes: i64,
    pub change_categories: String,
    pub changes: String,
    pub premium_comparison: String,
    pub suggested_actions: String,
    pub educational_insights: String,
    pub confidence_score: Option<f64>,
    pub analysis_version: String,
    pub model_version: Option<String>,
    pub processing_time_seconds: Option<i64>,
    pub created_at: String,
}

impl ResultRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            job_id: row.get("job_id")?,
            total_changes: row.get("total_changes")?,
            change_categories: row.get("change_categories")?,
            changes: row.get("changes")?,
            premium_comparison: row.get("premium_comparison")?,
            suggested_actions: row.get("suggested_actions")?,
            educational_insights: row.get("educational_insights")?,
            confidence_score: row.get("confidence_score")?,
            analysis_version: row.get("analysis_version")?,
            model_version: row.get("model_version")?,
            processing_time_seconds: row.get("processing_time_seconds")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Inserts a result row. Takes a bare connection so the store can pair it
/// with the job's completed transition in one transaction.
pub fn insert(conn: &Connection, result: &ResultRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO comparison_results (job_id, total_changes, change_categories, changes,
         premium_comparison, suggested_actions, educational_insights, confidence_score,
         analysis_version, model_version, processing_time_seconds, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            result.job_id,
            result.total_changes,
            result.change_categories,
            result.changes,
            result.premium_comparison,
            result.suggested_actions,
            result.educational_insights,
            result.confidence_score,
            result.analysis_version,
            result.model_version,
            result.processing_time_seconds,
            result.created_at,
        ],
    )?;
    Ok(())
}

/// Finds the result row for a job, if one exists.
pub fn find_by_job_id(db: &Database, job_id: &str) -> Result<Option<ResultRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM comparison_results WHERE job_id = ?1")?;
        let mut rows = stmt.query_map(params![job_id], ResultRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}
