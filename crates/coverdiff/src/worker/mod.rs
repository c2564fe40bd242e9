//! Background workers.
//!
//! Comparison jobs run off the request path. The API enqueues a job ID
//! and returns immediately; a fixed pool of workers drains the queue and
//! hands each ID to the [`crate::pipeline::Orchestrator`].

mod pool;

pub use pool::WorkerPool;
