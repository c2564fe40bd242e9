//! Persistence-backed job store.
//!
//! `JobStore` is the only writer of job state. It re-checks every
//! transition guard at the row level (`WHERE status = ...`) so that a
//! stale in-memory view can never overwrite a terminal job, and it maps
//! a refused guard back to the precise [`JobError`].

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::comparison::{ComparisonResult, ResultSummary, StoredResult, ANALYSIS_VERSION};
use crate::db::{job_repo, result_repo, Database, DatabaseError};
use crate::error::{CoverdiffError, Result};
use crate::job::{ErrorKind, Job, JobError, JobState, NewJob};

/// Storage keys travel in URLs and filesystem paths; keep them tame.
const MAX_KEY_LENGTH: usize = 512;

/// Outcome of a delete request, for the API to map onto status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    /// The job has not reached a terminal state yet.
    InFlight,
}

#[derive(Clone)]
pub struct JobStore {
    db: Database,
}

impl JobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Validates the keys and persists a new job in `pending`.
    pub fn create(&self, new: NewJob) -> Result<Job> {
        validate_key("baseline_key", &new.baseline_key)?;
        validate_key("renewal_key", &new.renewal_key)?;

        let job = Job::new(new);
        job_repo::insert(&self.db, &job_to_row(&job))?;
        Ok(job)
    }

    /// Loads a job by ID without owner scoping. For pipeline use.
    pub fn get(&self, id: &str) -> Result<Job> {
        match job_repo::find_by_id(&self.db, id)? {
            Some(row) => Ok(row_to_job(row)?),
            None => Err(JobError::NotFound(id.to_string()).into()),
        }
    }

    /// Loads a job scoped to an owner. An unowned job is indistinguishable
    /// from a missing one.
    pub fn get_for_owner(&self, id: &str, owner_id: &str) -> Result<Option<Job>> {
        match job_repo::find_for_owner(&self.db, id, owner_id)? {
            Some(row) => Ok(Some(row_to_job(row)?)),
            None => Ok(None),
        }
    }

    /// Lists an owner's jobs newest-first, returning (jobs, total_count).
    pub fn list_for_owner(
        &self,
        owner_id: &str,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<Job>, u64)> {
        let (rows, total) = job_repo::list_for_owner(&self.db, owner_id, limit, offset)?;
        let jobs = rows
            .into_iter()
            .map(row_to_job)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok((jobs, total))
    }

    /// IDs of jobs still waiting for a worker, oldest first.
    pub fn pending_job_ids(&self) -> Result<Vec<String>> {
        Ok(job_repo::ids_by_status(&self.db, JobState::Pending.as_str())?)
    }

    /// Claims a pending job for processing and returns its fresh state.
    pub fn begin_processing(&self, id: &str) -> Result<Job> {
        let ts = fmt_ts(Utc::now());
        if !job_repo::mark_processing(&self.db, id, &ts, &ts)? {
            return Err(self.transition_refused(id, JobState::Processing)?);
        }
        self.get(id)
    }

    /// Records progress. Valid only while processing; progress must be
    /// within 0-100 and never decrease.
    pub fn advance(&self, id: &str, progress: u8, message: &str) -> Result<()> {
        if progress > 100 {
            return Err(JobError::ProgressOutOfRange(progress).into());
        }
        let ts = fmt_ts(Utc::now());
        if job_repo::update_progress(&self.db, id, progress as i64, message, &ts)? {
            return Ok(());
        }

        // Guard refused; report which invariant would have broken.
        let row = job_repo::find_by_id(&self.db, id)?
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;
        let state = parse_state(&row.status)?;
        if state != JobState::Processing {
            return Err(JobError::NotProcessing {
                id: id.to_string(),
                state,
            }
            .into());
        }
        Err(JobError::ProgressRegression {
            id: id.to_string(),
            current: row.progress.clamp(0, 100) as u8,
            requested: progress,
        }
        .into())
    }

    /// Completes a job, attaching its result in the same transaction so a
    /// reader can never observe `completed` without a stored result.
    pub fn succeed(
        &self,
        id: &str,
        result: &ComparisonResult,
        model_version: Option<&str>,
        processing_time_seconds: Option<i64>,
    ) -> Result<()> {
        let ts = fmt_ts(Utc::now());
        let row = result_to_row(id, result, model_version, processing_time_seconds, &ts)?;

        let committed = self.db.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            if !job_repo::mark_completed(&tx, id, &ts, &ts)? {
                return Ok(false);
            }
            result_repo::insert(&tx, &row)?;
            tx.commit()?;
            Ok(true)
        })?;

        if !committed {
            return Err(self.transition_refused(id, JobState::Completed)?);
        }
        Ok(())
    }

    /// Fails a job with a recorded error kind and short message. Permitted
    /// from `pending` (precondition failures) as well as `processing`.
    pub fn fail(&self, id: &str, kind: ErrorKind, message: &str) -> Result<()> {
        let ts = fmt_ts(Utc::now());
        if !job_repo::mark_failed(&self.db, id, kind.as_str(), message, &ts, &ts)? {
            return Err(self.transition_refused(id, JobState::Failed)?);
        }
        Ok(())
    }

    /// Fetches the stored result for a job, if one exists.
    pub fn result(&self, job_id: &str) -> Result<Option<StoredResult>> {
        match result_repo::find_by_job_id(&self.db, job_id)? {
            Some(row) => Ok(Some(row_to_stored(row)?)),
            None => Ok(None),
        }
    }

    /// Deletes a terminal job (and its result, via cascade). Non-terminal
    /// jobs are refused; the status check and delete run under the same
    /// connection lock.
    pub fn delete_for_owner(&self, id: &str, owner_id: &str) -> Result<DeleteOutcome> {
        let outcome = self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT status FROM jobs WHERE id = ?1 AND owner_id = ?2")?;
            let mut rows =
                stmt.query_map(rusqlite::params![id, owner_id], |r| r.get::<_, String>(0))?;
            let status = match rows.next() {
                Some(Ok(status)) => status,
                Some(Err(e)) => return Err(DatabaseError::Sqlite(e)),
                None => return Ok(DeleteOutcome::NotFound),
            };

            let state = JobState::parse(&status).ok_or(DatabaseError::Corrupt {
                column: "status",
                value: status,
            })?;
            if !state.is_terminal() {
                return Ok(DeleteOutcome::InFlight);
            }

            job_repo::delete(conn, id)?;
            Ok(DeleteOutcome::Deleted)
        })?;
        Ok(outcome)
    }

    /// Builds the error for a transition whose row guard matched nothing.
    fn transition_refused(&self, id: &str, to: JobState) -> Result<CoverdiffError> {
        let row = job_repo::find_by_id(&self.db, id)?;
        Ok(match row {
            None => JobError::NotFound(id.to_string()).into(),
            Some(row) => JobError::InvalidTransition {
                id: id.to_string(),
                from: parse_state(&row.status)?,
                to,
            }
            .into(),
        })
    }
}

fn validate_key(field: &'static str, key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CoverdiffError::Validation(format!(
            "{} must not be empty",
            field
        )));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CoverdiffError::Validation(format!(
            "{} exceeds {} characters",
            field, MAX_KEY_LENGTH
        )));
    }
    if key.starts_with('/') {
        return Err(CoverdiffError::Validation(format!(
            "{} must be a relative key, not an absolute path",
            field
        )));
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | '-'))
    {
        return Err(CoverdiffError::Validation(format!(
            "{} contains characters outside [A-Za-z0-9._/-]",
            field
        )));
    }
    if key.split('/').any(|segment| segment.is_empty() || segment == "..") {
        return Err(CoverdiffError::Validation(format!(
            "{} contains an empty or parent-directory segment",
            field
        )));
    }
    Ok(())
}

fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(value: &str, column: &'static str) -> std::result::Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| DatabaseError::Corrupt {
            column,
            value: value.to_string(),
        })
}

fn parse_opt_ts(
    value: Option<&str>,
    column: &'static str,
) -> std::result::Result<Option<DateTime<Utc>>, DatabaseError> {
    value.map(|v| parse_ts(v, column)).transpose()
}

fn parse_state(status: &str) -> std::result::Result<JobState, DatabaseError> {
    JobState::parse(status).ok_or(DatabaseError::Corrupt {
        column: "status",
        value: status.to_string(),
    })
}

fn job_to_row(job: &Job) -> job_repo::JobRow {
    job_repo::JobRow {
        id: job.id.clone(),
        owner_id: job.owner_id.clone(),
        status: job.state.as_str().to_string(),
        progress: job.progress as i64,
        status_message: job.status_message.clone(),
        baseline_key: job.baseline_key.clone(),
        renewal_key: job.renewal_key.clone(),
        baseline_filename: job.baseline_filename.clone(),
        renewal_filename: job.renewal_filename.clone(),
        company_name: job.company_name.clone(),
        policy_type: job.policy_type.clone(),
        error_kind: job.error_kind.map(|k| k.as_str().to_string()),
        error_message: job.error_message.clone(),
        created_at: fmt_ts(job.created_at),
        updated_at: fmt_ts(job.updated_at),
        started_at: job.started_at.map(fmt_ts),
        completed_at: job.completed_at.map(fmt_ts),
    }
}

fn row_to_job(row: job_repo::JobRow) -> std::result::Result<Job, DatabaseError> {
    let state = parse_state(&row.status)?;
    let error_kind = row
        .error_kind
        .as_deref()
        .map(|s| {
            ErrorKind::parse(s).ok_or_else(|| DatabaseError::Corrupt {
                column: "error_kind",
                value: s.to_string(),
            })
        })
        .transpose()?;
    let progress = u8::try_from(row.progress).map_err(|_| DatabaseError::Corrupt {
        column: "progress",
        value: row.progress.to_string(),
    })?;

    Ok(Job {
        id: row.id,
        owner_id: row.owner_id,
        state,
        progress,
        status_message: row.status_message,
        baseline_key: row.baseline_key,
        renewal_key: row.renewal_key,
        baseline_filename: row.baseline_filename,
        renewal_filename: row.renewal_filename,
        company_name: row.company_name,
        policy_type: row.policy_type,
        error_kind,
        error_message: row.error_message,
        created_at: parse_ts(&row.created_at, "created_at")?,
        updated_at: parse_ts(&row.updated_at, "updated_at")?,
        started_at: parse_opt_ts(row.started_at.as_deref(), "started_at")?,
        completed_at: parse_opt_ts(row.completed_at.as_deref(), "completed_at")?,
    })
}

fn encode_json<T: Serialize>(
    column: &'static str,
    value: &T,
) -> std::result::Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::Json {
        column,
        reason: e.to_string(),
    })
}

fn decode_json<T: serde::de::DeserializeOwned>(
    column: &'static str,
    value: &str,
) -> std::result::Result<T, DatabaseError> {
    serde_json::from_str(value).map_err(|e| DatabaseError::Json {
        column,
        reason: e.to_string(),
    })
}

fn result_to_row(
    job_id: &str,
    result: &ComparisonResult,
    model_version: Option<&str>,
    processing_time_seconds: Option<i64>,
    created_at: &str,
) -> std::result::Result<result_repo::ResultRow, DatabaseError> {
    Ok(result_repo::ResultRow {
        job_id: job_id.to_string(),
        total_changes: result.summary.total_changes as i64,
        change_categories: encode_json("change_categories", &result.summary.change_categories)?,
        changes: encode_json("changes", &result.changes)?,
        premium_comparison: encode_json("premium_comparison", &result.premium_comparison)?,
        suggested_actions: encode_json("suggested_actions", &result.suggested_actions)?,
        educational_insights: encode_json("educational_insights", &result.educational_insights)?,
        confidence_score: result.confidence_score,
        analysis_version: ANALYSIS_VERSION.to_string(),
        model_version: model_version.map(str::to_string),
        processing_time_seconds,
        created_at: created_at.to_string(),
    })
}

fn row_to_stored(row: result_repo::ResultRow) -> std::result::Result<StoredResult, DatabaseError> {
    let total_changes = u32::try_from(row.total_changes).map_err(|_| DatabaseError::Corrupt {
        column: "total_changes",
        value: row.total_changes.to_string(),
    })?;

    let result = ComparisonResult {
        summary: ResultSummary {
            total_changes,
            change_categories: decode_json("change_categories", &row.change_categories)?,
        },
        changes: decode_json("changes", &row.changes)?,
        premium_comparison: decode_json("premium_comparison", &row.premium_comparison)?,
        suggested_actions: decode_json("suggested_actions", &row.suggested_actions)?,
        educational_insights: decode_json("educational_insights", &row.educational_insights)?,
        confidence_score: row.confidence_score,
    };

    Ok(StoredResult {
        job_id: row.job_id,
        result,
        analysis_version: row.analysis_version,
        model_version: row.model_version,
        processing_time_seconds: row.processing_time_seconds,
        created_at: parse_ts(&row.created_at, "created_at")?,
    })
}
