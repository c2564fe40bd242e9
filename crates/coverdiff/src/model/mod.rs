//! Model collaborator interface.
//!
//! The comparison call is a black box: two prepared text bodies in, raw
//! text out. [`ModelClient`] is the seam used to substitute scripted
//! doubles in tests; [`AnthropicClient`] is the production implementation.
//! Retry policy does not live here — the pipeline decides what to do with
//! a transient failure so job-state visibility stays accurate.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

mod anthropic;
pub mod prompt;

pub use anthropic::AnthropicClient;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model endpoint unreachable: {0}")]
    Unavailable(String),

    #[error("Model call exceeded the {}s deadline", .0.as_secs())]
    Timeout(Duration),

    #[error("Model declined the request: {0}")]
    Refused(String),
}

impl ModelError {
    /// Whether a retry could plausibly succeed. A refusal is a decision,
    /// not a glitch, and is never retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

/// Raw output of one comparison call, plus the model identifier the
/// endpoint reported for auditability.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub text: String,
    pub model_version: String,
}

/// The single operation the pipeline needs from the model collaborator.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn compare(
        &self,
        baseline_text: &str,
        renewal_text: &str,
    ) -> Result<ModelResponse, ModelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ModelError::Unavailable("connect refused".to_string()).is_transient());
        assert!(ModelError::Timeout(Duration::from_secs(120)).is_transient());
        assert!(!ModelError::Refused("policy violation".to_string()).is_transient());
    }
}
