use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
    pub storage: StorageConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

fn default_database_path() -> String {
    "coverdiff.db".to_string()
}

fn default_worker_count() -> usize {
    2
}

fn default_max_file_size_mb() -> u64 {
    25
}

impl Config {
    /// Upload size cap in bytes, derived from `max_file_size_mb`.
    pub fn max_file_size_bytes(&self) -> usize {
        (self.max_file_size_mb as usize) * 1024 * 1024
    }
}

/// Where uploaded policy documents live.
///
/// Jobs reference documents by storage key; the backend decides how a key
/// is resolved to bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Keys are paths relative to a local root directory.
    Filesystem { root: String },
    /// Keys are fetched as `{base_url}/{key}` over HTTP.
    Http {
        base_url: String,
        #[serde(default)]
        auth_token_env: Option<String>,
    },
}

/// Model endpoint configuration for the comparison call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_endpoint")]
    pub endpoint: String,
    pub model: String,
    /// Direct API key value. Prefer `api_key_file` or `api_key_env` outside
    /// of local testing.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: Option<String>,
    /// Deadline for a single model call, in seconds.
    #[serde(default = "default_model_timeout")]
    pub timeout_seconds: u64,
    /// Additional attempts after the first call fails with a retryable error.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Fixed delay between retry attempts, in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_model_endpoint() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_api_key_env() -> Option<String> {
    Some("ANTHROPIC_API_KEY".to_string())
}

fn default_model_timeout() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    2000
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f64 {
    0.2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allow-list. Empty means any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: Vec::new(),
        }
    }
}
