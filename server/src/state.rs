use std::sync::Arc;

use coverdiff::{JobStore, WorkerPool};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: JobStore,
    pub pool: Arc<WorkerPool>,
    /// Single-call model budget, used to extrapolate the remaining-time
    /// estimate in status payloads.
    pub model_timeout_seconds: u64,
}
