use std::path::Path;

use crate::config::schema::{Config, StorageConfig};
use crate::error::ConfigError;
use crate::secrets;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Validate version
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    if config.max_file_size_mb == 0 {
        return Err(ConfigError::Validation {
            message: "max_file_size_mb must be at least 1".to_string(),
        });
    }

    match &config.storage {
        StorageConfig::Filesystem { root } => {
            if root.is_empty() {
                return Err(ConfigError::Validation {
                    message: "storage.root must not be empty".to_string(),
                });
            }
        }
        StorageConfig::Http { base_url, .. } => {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err(ConfigError::Validation {
                    message: format!("storage.base_url is not an HTTP URL: {}", base_url),
                });
            }
        }
    }

    if config.model.model.is_empty() {
        return Err(ConfigError::Validation {
            message: "model.model must not be empty".to_string(),
        });
    }

    if config.model.timeout_seconds == 0 {
        return Err(ConfigError::Validation {
            message: "model.timeout_seconds must be at least 1".to_string(),
        });
    }

    if !secrets::has_secret_source(
        config.model.api_key.as_deref(),
        config.model.api_key_file.as_deref(),
        config.model.api_key_env.as_deref(),
    ) {
        return Err(ConfigError::Validation {
            message: "model requires one of api_key, api_key_file, or api_key_env".to_string(),
        });
    }

    Ok(())
}
