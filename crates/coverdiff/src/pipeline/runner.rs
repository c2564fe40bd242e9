use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::sleep;
use tracing::{error, info, info_span, warn, Instrument};

use crate::comparison::ComparisonResult;
use crate::config::Config;
use crate::document::{self, PreparedDocument};
use crate::job::{ErrorKind, Job};
use crate::model::{ModelClient, ModelError, ModelResponse};
use crate::normalize;
use crate::sanitize;
use crate::storage::ObjectStore;
use crate::store::JobStore;

/// The slice of application config the pipeline needs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_file_size_bytes: usize,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_file_size_bytes: config.max_file_size_bytes(),
            max_retries: config.model.max_retries,
            retry_backoff: Duration::from_millis(config.model.retry_backoff_ms),
        }
    }
}

/// Drives one comparison job end to end. Collaborators are injected so
/// tests can script storage and model behavior.
pub struct Orchestrator {
    store: JobStore,
    objects: Arc<dyn ObjectStore>,
    model: Arc<dyn ModelClient>,
    config: PipelineConfig,
}

struct StepSuccess {
    result: ComparisonResult,
    model_version: String,
}

struct StepFailure {
    kind: ErrorKind,
    detail: String,
}

impl Orchestrator {
    pub fn new(
        store: JobStore,
        objects: Arc<dyn ObjectStore>,
        model: Arc<dyn ModelClient>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            objects,
            model,
            config,
        }
    }

    /// Runs the pipeline for one job. Never returns an error: every
    /// failure is recorded on the job itself.
    pub async fn execute(&self, job_id: &str) {
        let span = info_span!("comparison_job", job_id = %job_id);
        self.execute_inner(job_id).instrument(span).await
    }

    async fn execute_inner(&self, job_id: &str) {
        // Claiming enforces at-most-one-worker-per-job: a second claim
        // refuses at the row level.
        let job = match self.store.begin_processing(job_id) {
            Ok(job) => job,
            Err(e) => {
                warn!(error = %e, "could not claim job for processing; skipping");
                return;
            }
        };

        let mut fetched_any = false;
        let outcome = self.run_steps(&job, &mut fetched_any).await;

        match outcome {
            Ok(success) => {
                let elapsed = job.started_at.map(|s| (Utc::now() - s).num_seconds());
                if let Err(e) = self.store.succeed(
                    &job.id,
                    &success.result,
                    Some(success.model_version.as_str()),
                    elapsed,
                ) {
                    error!(error = %e, "failed to persist completed result");
                } else {
                    info!(
                        total_changes = success.result.summary.total_changes,
                        model_version = %success.model_version,
                        "comparison job completed"
                    );
                }
            }
            Err(failure) => {
                warn!(
                    kind = %failure.kind,
                    detail = %failure.detail,
                    "comparison job failed"
                );
                // Callers only ever see the kind's short message; the
                // collaborator detail stays in the log line above.
                if let Err(e) = self
                    .store
                    .fail(&job.id, failure.kind, failure.kind.user_message())
                {
                    error!(error = %e, "failed to record job failure");
                }
            }
        }

        // Privacy cleanup runs on every branch, success included, as long
        // as at least one document was actually fetched.
        if fetched_any {
            self.cleanup(&job).await;
        }
    }

    async fn run_steps(
        &self,
        job: &Job,
        fetched_any: &mut bool,
    ) -> Result<StepSuccess, StepFailure> {
        self.advance(&job.id, 15, "retrieving documents");
        let (baseline_bytes, renewal_bytes) = self.fetch_documents(job, fetched_any).await?;

        self.advance(&job.id, 35, "extracting document text");
        let (baseline, renewal) = {
            let _span = info_span!("prepare_documents").entered();
            let baseline = self.prepare_one("baseline", &baseline_bytes)?;
            let renewal = self.prepare_one("renewal", &renewal_bytes)?;
            (baseline, renewal)
        };

        self.advance(&job.id, 50, "comparing policies");
        let response = self
            .invoke_with_retry(&baseline.text, &renewal.text)
            .instrument(info_span!("invoke_model"))
            .await
            .map_err(|e| StepFailure {
                kind: match &e {
                    ModelError::Timeout(_) => ErrorKind::ModelTimeout,
                    ModelError::Unavailable(_) => ErrorKind::ModelUnavailable,
                    ModelError::Refused(_) => ErrorKind::ModelRefused,
                },
                detail: e.to_string(),
            })?;

        self.advance(&job.id, 75, "validating analysis");
        let result = {
            let _span = info_span!("normalize_result").entered();
            normalize::normalize(&response.text).map_err(|e| StepFailure {
                kind: ErrorKind::MalformedModelOutput,
                detail: e.to_string(),
            })?
        };

        self.advance(&job.id, 90, "saving results");
        Ok(StepSuccess {
            result,
            model_version: response.model_version,
        })
    }

    async fn fetch_documents(
        &self,
        job: &Job,
        fetched_any: &mut bool,
    ) -> Result<(Vec<u8>, Vec<u8>), StepFailure> {
        let span = info_span!(
            "fetch_documents",
            baseline = %sanitize::redact_key(&job.baseline_key),
            renewal = %sanitize::redact_key(&job.renewal_key),
        );
        async {
            let baseline = self
                .objects
                .fetch(&job.baseline_key)
                .await
                .map_err(|e| StepFailure {
                    kind: ErrorKind::Storage,
                    detail: format!("baseline document: {}", e),
                })?;
            *fetched_any = true;

            let renewal = self
                .objects
                .fetch(&job.renewal_key)
                .await
                .map_err(|e| StepFailure {
                    kind: ErrorKind::Storage,
                    detail: format!("renewal document: {}", e),
                })?;

            Ok((baseline, renewal))
        }
        .instrument(span)
        .await
    }

    fn prepare_one(&self, which: &str, bytes: &[u8]) -> Result<PreparedDocument, StepFailure> {
        let prepared = document::prepare(bytes, self.config.max_file_size_bytes).map_err(|e| {
            StepFailure {
                kind: ErrorKind::Document,
                detail: format!("{} document: {}", which, e),
            }
        })?;
        if !prepared.has_text() {
            return Err(StepFailure {
                kind: ErrorKind::InsufficientContent,
                detail: format!(
                    "{} document: {} pages, no extractable text",
                    which, prepared.page_count
                ),
            });
        }
        Ok(prepared)
    }

    /// Calls the model, retrying transient failures up to the configured
    /// bound with a fixed backoff. A refusal returns immediately.
    async fn invoke_with_retry(
        &self,
        baseline_text: &str,
        renewal_text: &str,
    ) -> Result<ModelResponse, ModelError> {
        let mut attempt = 0;
        loop {
            match self.model.compare(baseline_text, renewal_text).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(
                        error = %e,
                        attempt,
                        max_retries = self.config.max_retries,
                        "model call failed; retrying after backoff"
                    );
                    sleep(self.config.retry_backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Best-effort deletion of both source documents. A failed delete is
    /// logged and never alters the job's terminal state.
    async fn cleanup(&self, job: &Job) {
        let span = info_span!("cleanup_documents");
        async {
            for key in [&job.baseline_key, &job.renewal_key] {
                if let Err(e) = self.objects.delete(key).await {
                    warn!(
                        key = %sanitize::redact_key(key),
                        error = %e,
                        "source document deletion failed"
                    );
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Progress reporting is informational; a refused update (e.g. a
    /// guard race) is logged and never aborts the analysis.
    fn advance(&self, job_id: &str, progress: u8, message: &str) {
        if let Err(e) = self.store.advance(job_id, progress, message) {
            warn!(progress, error = %e, "progress update refused");
        }
    }
}
