use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoverdiffError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Model error: {0}")]
    Model(#[from] crate::model::ModelError),

    #[error("Normalization error: {0}")]
    Normalize(#[from] crate::normalize::NormalizeError),

    #[error("Job error: {0}")]
    Job(#[from] crate::job::JobError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Secret resolution failed: {0}")]
    Secret(#[from] crate::secrets::SecretError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Document is empty")]
    Empty,

    #[error("Document is {size} bytes, exceeding the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },

    #[error("Failed to parse PDF: {0}")]
    InvalidPdf(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: {key}")]
    NotFound { key: String },

    #[error("Invalid storage key: {key}")]
    InvalidKey { key: String },

    #[error("Failed to fetch object '{key}': {reason}")]
    Fetch { key: String, reason: String },

    #[error("Failed to delete object '{key}': {reason}")]
    Delete { key: String, reason: String },
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, CoverdiffError>;
