pub mod comparison;
pub mod config;
pub mod db;
pub mod document;
pub mod error;
pub mod job;
pub mod legal;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod sanitize;
pub mod secrets;
pub mod storage;
pub mod store;
pub mod worker;

pub use comparison::{ComparisonResult, StoredResult, ANALYSIS_VERSION};
pub use config::{load_config, Config, ModelConfig, ServerConfig, StorageConfig};
pub use error::{ConfigError, CoverdiffError, DocumentError, Result, StorageError, WorkerError};
pub use job::{ErrorKind, Job, JobError, JobState, NewJob};
pub use model::{AnthropicClient, ModelClient, ModelError, ModelResponse};
pub use pipeline::{Orchestrator, PipelineConfig};
pub use storage::{build_store, ObjectStore};
pub use store::{DeleteOutcome, JobStore};
pub use worker::WorkerPool;
