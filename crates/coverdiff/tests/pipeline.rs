//! End-to-end pipeline runs against fake collaborators.
//!
//! Each test builds real PDF bytes, scripts the model's responses, and
//! drives one job through the orchestrator, asserting the terminal job
//! state, the stored result, and the privacy cleanup.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lopdf::{dictionary, Document, Object, Stream};

use coverdiff::db::Database;
use coverdiff::{
    ErrorKind, Job, JobState, JobStore, ModelClient, ModelError, ModelResponse, NewJob,
    ObjectStore, Orchestrator, PipelineConfig, StorageError,
};

const BASELINE_KEY: &str = "uploads/user-1/baseline.pdf";
const RENEWAL_KEY: &str = "uploads/user-1/renewal.pdf";

/// Builds a minimal single-page PDF containing the given text, or an
/// empty page when `text` is None.
fn build_pdf(text: Option<&str>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let page_id = match text {
        Some(text) => {
            let font_id = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Courier",
            });
            let resources_id = doc.add_object(dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            });
            let content = format!("BT /F1 12 Tf 50 700 Td ({}) Tj ET", text);
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => resources_id,
                "Contents" => content_id,
            })
        }
        None => doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    };

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

struct FakeObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    deleted: Mutex<Vec<String>>,
}

impl FakeObjectStore {
    fn new(objects: Vec<(&str, Vec<u8>)>) -> Self {
        Self {
            objects: Mutex::new(
                objects
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
            ),
            deleted: Mutex::new(Vec::new()),
        }
    }

    fn with_both_documents() -> Self {
        Self::new(vec![
            (
                BASELINE_KEY,
                build_pdf(Some("General Liability Limit 1000000 Premium 15000")),
            ),
            (
                RENEWAL_KEY,
                build_pdf(Some("General Liability Limit 500000 Premium 16500")),
            ),
        ])
    }

    fn deleted_keys(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.deleted.lock().unwrap().push(key.to_string());
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Plays back a fixed sequence of responses, one per `compare` call.
struct ScriptedModel {
    responses: Mutex<Vec<Result<ModelResponse, ModelError>>>,
    calls: Mutex<u32>,
}

impl ScriptedModel {
    fn new(responses: Vec<Result<ModelResponse, ModelError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: Mutex::new(0),
        }
    }

    fn replying(text: &str) -> Self {
        Self::new(vec![Ok(ModelResponse {
            text: text.to_string(),
            model_version: "claude-sonnet-4-20250514".to_string(),
        })])
    }

    fn call_count(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn compare(&self, _: &str, _: &str) -> Result<ModelResponse, ModelError> {
        *self.calls.lock().unwrap() += 1;
        let mut responses = self.responses.lock().unwrap();
        assert!(!responses.is_empty(), "model called more times than scripted");
        responses.remove(0)
    }
}

fn valid_model_output() -> String {
    r#"```json
{
    "summary": "Premium rose 10% and the liability limit was halved.",
    "coverage_changes": [
        {
            "category": "premium",
            "change_type": "increased",
            "title": "Annual premium increased",
            "description": "The annual premium rose from $15,000 to $16,500.",
            "baseline_value": "$15,000",
            "renewal_value": "$16,500",
            "change_amount": "+$1,500",
            "percentage_change": 10.0,
            "confidence": 0.95
        },
        {
            "category": "coverage_limit",
            "change_type": "decreased",
            "title": "General liability limit reduced",
            "description": "The per-occurrence limit dropped from $1,000,000 to $500,000.",
            "baseline_value": "$1,000,000",
            "renewal_value": "$500,000",
            "confidence": 0.9
        },
        {
            "category": "exclusion",
            "change_type": "added",
            "title": "Cyber liability exclusion added",
            "description": "The renewal excludes cyber liability claims.",
            "baseline_value": "Not present",
            "renewal_value": "Excluded",
            "confidence": 0.85
        },
        {
            "category": "deductible",
            "change_type": "increased",
            "title": "Deductible increased",
            "description": "The deductible rose from $500 to $1,000.",
            "baseline_value": "$500",
            "renewal_value": "$1,000",
            "confidence": 0.8
        }
    ],
    "premium_comparison": {
        "baseline_premium": 15000,
        "renewal_premium": 16500
    },
    "broker_questions": [
        "Why was the liability limit halved?",
        "Is the cyber exclusion negotiable?",
        "Are alternative carriers available without this exclusion?"
    ]
}
```"#
        .to_string()
}

fn model_output_with_change(category: &str, confidence: f64) -> String {
    format!(
        r#"{{
            "coverage_changes": [{{
                "category": "{}",
                "change_type": "added",
                "title": "A change",
                "description": "Something changed.",
                "baseline_value": "old",
                "renewal_value": "new",
                "confidence": {}
            }}],
            "premium_comparison": {{}}
        }}"#,
        category, confidence
    )
}

fn test_config() -> PipelineConfig {
    PipelineConfig {
        max_file_size_bytes: 25 * 1024 * 1024,
        max_retries: 2,
        retry_backoff: Duration::from_millis(1),
    }
}

fn test_store() -> JobStore {
    JobStore::new(Database::open_in_memory().expect("Failed to create test database"))
}

fn create_job(store: &JobStore) -> Job {
    store
        .create(NewJob {
            owner_id: "user-1".to_string(),
            baseline_key: BASELINE_KEY.to_string(),
            renewal_key: RENEWAL_KEY.to_string(),
            baseline_filename: Some("baseline.pdf".to_string()),
            renewal_filename: Some("renewal.pdf".to_string()),
            company_name: Some("Acme Widgets".to_string()),
            policy_type: Some("general_liability".to_string()),
        })
        .unwrap()
}

async fn run_job(
    store: &JobStore,
    objects: Arc<FakeObjectStore>,
    model: Arc<ScriptedModel>,
    config: PipelineConfig,
) -> Job {
    let job = create_job(store);
    let orchestrator = Orchestrator::new(store.clone(), objects, model, config);
    orchestrator.execute(&job.id).await;
    store.get(&job.id).unwrap()
}

#[tokio::test]
async fn test_happy_path_produces_stored_result() {
    let store = test_store();
    let objects = Arc::new(FakeObjectStore::with_both_documents());
    let model = Arc::new(ScriptedModel::replying(&valid_model_output()));

    let job = run_job(&store, objects.clone(), model.clone(), test_config()).await;

    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.progress, 100);
    assert!(job.error_kind.is_none());
    assert!(job.started_at.is_some());
    assert!(job.completed_at.is_some());
    assert_eq!(model.call_count(), 1);

    let stored = store.result(&job.id).unwrap().unwrap();
    assert_eq!(stored.result.summary.total_changes, 4);
    assert_eq!(stored.result.summary.change_categories.premium, 1);
    assert_eq!(stored.result.summary.change_categories.coverage_limit, 1);
    assert_eq!(stored.result.summary.change_categories.exclusion, 1);
    assert_eq!(stored.result.summary.change_categories.deductible, 1);

    // Premium deltas are recomputed from the two source amounts.
    assert_eq!(stored.result.premium_comparison.difference, Some(1500.0));
    assert_eq!(
        stored.result.premium_comparison.percentage_change,
        Some(10.0)
    );

    // Broker questions became prioritized suggested actions.
    assert_eq!(stored.result.suggested_actions.len(), 3);
    assert_eq!(stored.result.suggested_actions[0].category, "broker_review");

    assert_eq!(stored.analysis_version, "1.0");
    assert_eq!(
        stored.model_version.as_deref(),
        Some("claude-sonnet-4-20250514")
    );
    assert!(stored.processing_time_seconds.is_some());

    // Both source documents were deleted exactly once.
    assert_eq!(
        objects.deleted_keys(),
        vec![BASELINE_KEY.to_string(), RENEWAL_KEY.to_string()]
    );
}

#[tokio::test]
async fn test_transient_timeouts_are_retried_to_success() {
    let store = test_store();
    let objects = Arc::new(FakeObjectStore::with_both_documents());
    let model = Arc::new(ScriptedModel::new(vec![
        Err(ModelError::Timeout(Duration::from_secs(120))),
        Err(ModelError::Unavailable("503 from upstream".to_string())),
        Ok(ModelResponse {
            text: valid_model_output(),
            model_version: "claude-sonnet-4-20250514".to_string(),
        }),
    ]));

    let job = run_job(&store, objects.clone(), model.clone(), test_config()).await;

    assert_eq!(job.state, JobState::Completed);
    assert_eq!(model.call_count(), 3);
    assert_eq!(objects.deleted_keys().len(), 2);
}

#[tokio::test]
async fn test_retries_exhausted_fails_with_last_kind() {
    let store = test_store();
    let objects = Arc::new(FakeObjectStore::with_both_documents());
    let model = Arc::new(ScriptedModel::new(vec![
        Err(ModelError::Timeout(Duration::from_secs(120))),
        Err(ModelError::Timeout(Duration::from_secs(120))),
        Err(ModelError::Timeout(Duration::from_secs(120))),
    ]));

    let job = run_job(&store, objects.clone(), model.clone(), test_config()).await;

    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.error_kind, Some(ErrorKind::ModelTimeout));
    assert_eq!(
        job.error_message.as_deref(),
        Some(ErrorKind::ModelTimeout.user_message())
    );
    // Initial attempt plus max_retries.
    assert_eq!(model.call_count(), 3);
    // Documents are still cleaned up on failure.
    assert_eq!(objects.deleted_keys().len(), 2);
}

#[tokio::test]
async fn test_refusal_is_never_retried() {
    let store = test_store();
    let objects = Arc::new(FakeObjectStore::with_both_documents());
    let model = Arc::new(ScriptedModel::new(vec![Err(ModelError::Refused(
        "request declined by content policy".to_string(),
    ))]));

    let job = run_job(&store, objects.clone(), model.clone(), test_config()).await;

    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.error_kind, Some(ErrorKind::ModelRefused));
    assert_eq!(model.call_count(), 1);
    // The raw refusal text never reaches the job record.
    assert!(!job.error_message.unwrap().contains("content policy"));
}

#[tokio::test]
async fn test_unknown_category_rejects_whole_result() {
    let store = test_store();
    let objects = Arc::new(FakeObjectStore::with_both_documents());
    let model = Arc::new(ScriptedModel::replying(&model_output_with_change(
        "dental", 0.9,
    )));

    let job = run_job(&store, objects.clone(), model, test_config()).await;

    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.error_kind, Some(ErrorKind::MalformedModelOutput));
    assert!(store.result(&job.id).unwrap().is_none());
    assert_eq!(objects.deleted_keys().len(), 2);
}

#[tokio::test]
async fn test_out_of_range_confidence_fails_the_job() {
    let store = test_store();
    let objects = Arc::new(FakeObjectStore::with_both_documents());
    let model = Arc::new(ScriptedModel::replying(&model_output_with_change(
        "exclusion", 1.5,
    )));

    let job = run_job(&store, objects, model, test_config()).await;

    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.error_kind, Some(ErrorKind::MalformedModelOutput));
}

#[tokio::test]
async fn test_textless_pdf_is_insufficient_content() {
    let store = test_store();
    let objects = Arc::new(FakeObjectStore::new(vec![
        (BASELINE_KEY, build_pdf(None)),
        (RENEWAL_KEY, build_pdf(Some("Premium 16500"))),
    ]));
    let model = Arc::new(ScriptedModel::new(Vec::new()));

    let job = run_job(&store, objects.clone(), model.clone(), test_config()).await;

    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.error_kind, Some(ErrorKind::InsufficientContent));
    // The model was never invoked.
    assert_eq!(model.call_count(), 0);
    assert_eq!(objects.deleted_keys().len(), 2);
}

#[tokio::test]
async fn test_missing_renewal_fails_but_still_cleans_up() {
    let store = test_store();
    let objects = Arc::new(FakeObjectStore::new(vec![(
        BASELINE_KEY,
        build_pdf(Some("Premium 15000")),
    )]));
    let model = Arc::new(ScriptedModel::new(Vec::new()));

    let job = run_job(&store, objects.clone(), model, test_config()).await;

    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.error_kind, Some(ErrorKind::Storage));
    // Baseline was fetched before the failure, so cleanup attempted both.
    assert_eq!(
        objects.deleted_keys(),
        vec![BASELINE_KEY.to_string(), RENEWAL_KEY.to_string()]
    );
}

#[tokio::test]
async fn test_nothing_fetched_means_nothing_deleted() {
    let store = test_store();
    let objects = Arc::new(FakeObjectStore::new(Vec::new()));
    let model = Arc::new(ScriptedModel::new(Vec::new()));

    let job = run_job(&store, objects.clone(), model, test_config()).await;

    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.error_kind, Some(ErrorKind::Storage));
    assert!(objects.deleted_keys().is_empty());
}

#[tokio::test]
async fn test_zero_changes_completes_successfully() {
    let store = test_store();
    let objects = Arc::new(FakeObjectStore::with_both_documents());
    let model = Arc::new(ScriptedModel::replying(
        r#"{"coverage_changes": [], "premium_comparison": {}}"#,
    ));

    let job = run_job(&store, objects, model, test_config()).await;

    assert_eq!(job.state, JobState::Completed);
    let stored = store.result(&job.id).unwrap().unwrap();
    assert_eq!(stored.result.summary.total_changes, 0);
    assert_eq!(stored.result.confidence_score, None);
}
