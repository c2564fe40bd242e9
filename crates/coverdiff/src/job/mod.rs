//! Comparison job lifecycle.
//!
//! A job tracks one baseline/renewal comparison from submission to a
//! terminal state. Transitions are pure functions on the `Job` value;
//! persistence and concurrency guards live in [`crate::store`].

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle states: `pending → processing → {completed, failed}`.
///
/// `completed` and `failed` are terminal. Once entered, state, progress
/// and error detail are frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a job failed. Recorded verbatim for diagnostics; callers see only
/// the coarser [`ErrorKind::surface`] grouping and a short message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A source document could not be fetched from storage.
    Storage,
    /// A source document was not a readable PDF.
    Document,
    /// A PDF parsed but yielded no extractable text.
    InsufficientContent,
    /// The model collaborator was unreachable or returned a transient error.
    ModelUnavailable,
    /// The model collaborator exceeded its deadline.
    ModelTimeout,
    /// The model collaborator explicitly declined the request.
    ModelRefused,
    /// The model responded but its output failed validation.
    MalformedModelOutput,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Storage => "storage",
            Self::Document => "document",
            Self::InsufficientContent => "insufficient_content",
            Self::ModelUnavailable => "model_unavailable",
            Self::ModelTimeout => "model_timeout",
            Self::ModelRefused => "model_refused",
            Self::MalformedModelOutput => "malformed_model_output",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "storage" => Some(Self::Storage),
            "document" => Some(Self::Document),
            "insufficient_content" => Some(Self::InsufficientContent),
            "model_unavailable" => Some(Self::ModelUnavailable),
            "model_timeout" => Some(Self::ModelTimeout),
            "model_refused" => Some(Self::ModelRefused),
            "malformed_model_output" => Some(Self::MalformedModelOutput),
            _ => None,
        }
    }

    /// Coarse error class exposed through the API. Model-side failures all
    /// present as `analysis_error`; the precise kind stays in the job record
    /// and logs.
    pub fn surface(&self) -> &'static str {
        match self {
            Self::Storage => "storage_error",
            Self::Document | Self::InsufficientContent => "document_error",
            Self::ModelUnavailable
            | Self::ModelTimeout
            | Self::ModelRefused
            | Self::MalformedModelOutput => "analysis_error",
        }
    }

    /// Short caller-facing message. Never includes collaborator error text.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Storage => "One or both policy documents could not be retrieved.",
            Self::Document => "One or both files could not be read as PDF documents.",
            Self::InsufficientContent => "No readable text could be extracted from the documents.",
            Self::ModelUnavailable | Self::ModelTimeout | Self::ModelRefused => {
                "The comparison analysis could not be completed."
            }
            Self::MalformedModelOutput => {
                "The comparison analysis produced an unusable result."
            }
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job '{id}' cannot transition from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: JobState,
        to: JobState,
    },

    #[error("Job '{id}' is {state}, not processing")]
    NotProcessing { id: String, state: JobState },

    #[error("Job '{id}' progress cannot decrease from {current} to {requested}")]
    ProgressRegression {
        id: String,
        current: u8,
        requested: u8,
    },

    #[error("Progress {0} is out of range (0-100)")]
    ProgressOutOfRange(u8),

    #[error("Job '{0}' not found")]
    NotFound(String),
}

/// Caller-supplied fields for a new job.
#[derive(Debug, Clone, Default)]
pub struct NewJob {
    pub owner_id: String,
    pub baseline_key: String,
    pub renewal_key: String,
    pub baseline_filename: Option<String>,
    pub renewal_filename: Option<String>,
    pub company_name: Option<String>,
    pub policy_type: Option<String>,
}

/// One tracked unit of comparison work between two documents.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub owner_id: String,
    pub state: JobState,
    pub progress: u8,
    pub status_message: String,
    pub baseline_key: String,
    pub renewal_key: String,
    pub baseline_filename: Option<String>,
    pub renewal_filename: Option<String>,
    pub company_name: Option<String>,
    pub policy_type: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Creates a job in `pending` with a fresh identifier.
    pub fn new(new: NewJob) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: new.owner_id,
            state: JobState::Pending,
            progress: 0,
            status_message: "queued for processing".to_string(),
            baseline_key: new.baseline_key,
            renewal_key: new.renewal_key,
            baseline_filename: new.baseline_filename,
            renewal_filename: new.renewal_filename,
            company_name: new.company_name,
            policy_type: new.policy_type,
            error_kind: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// `pending → processing`. Stamps the started-processing time.
    pub fn begin_processing(&mut self) -> Result<(), JobError> {
        if self.state != JobState::Pending {
            return Err(JobError::InvalidTransition {
                id: self.id.clone(),
                from: self.state,
                to: JobState::Processing,
            });
        }
        let now = Utc::now();
        self.state = JobState::Processing;
        self.started_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Updates progress and status message. Valid only in `processing`;
    /// progress must be within 0-100 and never decrease.
    pub fn advance(&mut self, progress: u8, message: &str) -> Result<(), JobError> {
        if progress > 100 {
            return Err(JobError::ProgressOutOfRange(progress));
        }
        if self.state != JobState::Processing {
            return Err(JobError::NotProcessing {
                id: self.id.clone(),
                state: self.state,
            });
        }
        if progress < self.progress {
            return Err(JobError::ProgressRegression {
                id: self.id.clone(),
                current: self.progress,
                requested: progress,
            });
        }
        self.progress = progress;
        self.status_message = message.to_string();
        self.updated_at = Utc::now();
        Ok(())
    }

    /// `processing → completed`. Progress is forced to 100 and the
    /// completed time is stamped. The result itself is attached by the
    /// store in the same transaction.
    pub fn succeed(&mut self) -> Result<(), JobError> {
        if self.state != JobState::Processing {
            return Err(JobError::InvalidTransition {
                id: self.id.clone(),
                from: self.state,
                to: JobState::Completed,
            });
        }
        let now = Utc::now();
        self.state = JobState::Completed;
        self.progress = 100;
        self.status_message = "analysis complete".to_string();
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// `{pending, processing} → failed`. A precondition check may fail a
    /// job before any processing step began, so the pending origin is
    /// allowed. Progress is left where it was.
    pub fn fail(&mut self, kind: ErrorKind, message: impl Into<String>) -> Result<(), JobError> {
        if self.state.is_terminal() {
            return Err(JobError::InvalidTransition {
                id: self.id.clone(),
                from: self.state,
                to: JobState::Failed,
            });
        }
        let now = Utc::now();
        self.state = JobState::Failed;
        self.status_message = "analysis failed".to_string();
        self.error_kind = Some(kind);
        self.error_message = Some(message.into());
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job() -> Job {
        Job::new(NewJob {
            owner_id: "user-1".to_string(),
            baseline_key: "uploads/user-1/baseline.pdf".to_string(),
            renewal_key: "uploads/user-1/renewal.pdf".to_string(),
            baseline_filename: Some("baseline.pdf".to_string()),
            renewal_filename: Some("renewal.pdf".to_string()),
            company_name: Some("Acme Widgets".to_string()),
            policy_type: Some("general_liability".to_string()),
        })
    }

    #[test]
    fn test_new_job_starts_pending() {
        let job = sample_job();

        assert_eq!(job.state, JobState::Pending);
        assert_eq!(job.progress, 0);
        assert_eq!(job.status_message, "queued for processing");
        assert!(job.error_kind.is_none());
        assert!(job.started_at.is_none());
        assert!(job.completed_at.is_none());
        assert!(!job.id.is_empty());
    }

    #[test]
    fn test_new_jobs_get_unique_ids() {
        let a = sample_job();
        let b = sample_job();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_begin_processing_from_pending() {
        let mut job = sample_job();
        job.begin_processing().unwrap();

        assert_eq!(job.state, JobState::Processing);
        assert!(job.started_at.is_some());
    }

    #[test]
    fn test_begin_processing_twice_rejected() {
        let mut job = sample_job();
        job.begin_processing().unwrap();

        let result = job.begin_processing();
        assert!(matches!(result, Err(JobError::InvalidTransition { .. })));
    }

    #[test]
    fn test_advance_requires_processing() {
        let mut job = sample_job();
        let result = job.advance(15, "retrieving documents");
        assert!(matches!(result, Err(JobError::NotProcessing { .. })));
    }

    #[test]
    fn test_advance_monotonic() {
        let mut job = sample_job();
        job.begin_processing().unwrap();

        job.advance(15, "retrieving documents").unwrap();
        job.advance(35, "extracting document text").unwrap();
        assert_eq!(job.progress, 35);
        assert_eq!(job.status_message, "extracting document text");

        // Equal progress is allowed (message-only update)
        job.advance(35, "still extracting").unwrap();
        assert_eq!(job.status_message, "still extracting");

        let result = job.advance(20, "going backwards");
        assert!(matches!(
            result,
            Err(JobError::ProgressRegression {
                current: 35,
                requested: 20,
                ..
            })
        ));
        assert_eq!(job.progress, 35);
    }

    #[test]
    fn test_advance_rejects_out_of_range() {
        let mut job = sample_job();
        job.begin_processing().unwrap();

        let result = job.advance(101, "too far");
        assert!(matches!(result, Err(JobError::ProgressOutOfRange(101))));
    }

    #[test]
    fn test_succeed_forces_progress_100() {
        let mut job = sample_job();
        job.begin_processing().unwrap();
        job.advance(90, "saving results").unwrap();

        job.succeed().unwrap();
        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.progress, 100);
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_succeed_from_pending_rejected() {
        let mut job = sample_job();
        let result = job.succeed();
        assert!(matches!(result, Err(JobError::InvalidTransition { .. })));
    }

    #[test]
    fn test_fail_from_pending_allowed() {
        let mut job = sample_job();
        job.fail(ErrorKind::Storage, "baseline document missing")
            .unwrap();

        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.error_kind, Some(ErrorKind::Storage));
        assert_eq!(
            job.error_message.as_deref(),
            Some("baseline document missing")
        );
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_fail_keeps_progress() {
        let mut job = sample_job();
        job.begin_processing().unwrap();
        job.advance(50, "comparing policies").unwrap();
        job.fail(ErrorKind::ModelTimeout, "deadline exceeded").unwrap();

        assert_eq!(job.progress, 50);
    }

    #[test]
    fn test_terminal_states_frozen() {
        let mut job = sample_job();
        job.begin_processing().unwrap();
        job.succeed().unwrap();

        assert!(job.advance(100, "more").is_err());
        assert!(job.begin_processing().is_err());
        assert!(job.fail(ErrorKind::Storage, "late failure").is_err());
        assert!(job.succeed().is_err());

        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.progress, 100);
        assert!(job.error_kind.is_none());
    }

    #[test]
    fn test_failed_job_frozen() {
        let mut job = sample_job();
        job.begin_processing().unwrap();
        job.fail(ErrorKind::ModelRefused, "declined").unwrap();

        assert!(job.fail(ErrorKind::Storage, "second failure").is_err());
        assert_eq!(job.error_kind, Some(ErrorKind::ModelRefused));
    }

    #[test]
    fn test_state_round_trip() {
        for state in [
            JobState::Pending,
            JobState::Processing,
            JobState::Completed,
            JobState::Failed,
        ] {
            assert_eq!(JobState::parse(state.as_str()), Some(state));
        }
        assert_eq!(JobState::parse("queued"), None);
    }

    #[test]
    fn test_error_kind_round_trip() {
        for kind in [
            ErrorKind::Storage,
            ErrorKind::Document,
            ErrorKind::InsufficientContent,
            ErrorKind::ModelUnavailable,
            ErrorKind::ModelTimeout,
            ErrorKind::ModelRefused,
            ErrorKind::MalformedModelOutput,
        ] {
            assert_eq!(ErrorKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ErrorKind::parse("unknown"), None);
    }

    #[test]
    fn test_error_surface_grouping() {
        assert_eq!(ErrorKind::Storage.surface(), "storage_error");
        assert_eq!(ErrorKind::Document.surface(), "document_error");
        assert_eq!(ErrorKind::InsufficientContent.surface(), "document_error");
        assert_eq!(ErrorKind::ModelTimeout.surface(), "analysis_error");
        assert_eq!(ErrorKind::ModelRefused.surface(), "analysis_error");
        assert_eq!(ErrorKind::MalformedModelOutput.surface(), "analysis_error");
    }

    #[test]
    fn test_user_messages_never_empty() {
        for kind in [
            ErrorKind::Storage,
            ErrorKind::Document,
            ErrorKind::InsufficientContent,
            ErrorKind::ModelUnavailable,
            ErrorKind::ModelTimeout,
            ErrorKind::ModelRefused,
            ErrorKind::MalformedModelOutput,
        ] {
            assert!(!kind.user_message().is_empty());
        }
    }
}
