//! Job orchestration.
//!
//! The [`Orchestrator`] drives one job from `pending` to a terminal
//! state: fetch documents, extract text, invoke the model, normalize,
//! persist, clean up. Every failure path converts into a terminal
//! `failed` job — nothing escapes and leaves a job stuck in
//! `processing`.

mod runner;

pub use runner::{Orchestrator, PipelineConfig};
