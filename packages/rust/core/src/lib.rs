//! Core content pipeline for contentgen.
//!
//! This crate ties the logic blocks and generation backends into an
//! end-to-end run: typed pipeline state, fragment schemas, the retry
//! supervisor, stage workers, the executor ([`Pipeline`]) and the
//! asynchronous [`JobManager`].

pub mod cancel;
pub mod fragments;
pub mod jobs;
pub mod pipeline;
pub mod prompts;
pub mod retry;
pub mod schema;
pub mod stages;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use cancel::CancellationToken;
pub use fragments::{
    ComparisonPage, ContentBundle, FaqEntry, FaqPage, ProductPage, Question, QuestionCategory,
    QuestionSet, RunMeta, StageDiagnostic, StageStatus,
};
pub use jobs::{JobManager, JobRecord, JobStatus};
pub use pipeline::{
    Pipeline, PlanStep, ProgressReporter, RunRequest, SilentProgress, plan, render_plan,
    validate_plan,
};
pub use retry::{BackoffStrategy, ExponentialBackoff, FixedBackoff, RetryPolicy, Supervisor};
pub use schema::{Schema, SchemaSet, ValidationResult, Violation};
pub use state::{PipelineState, StageId, StageOutput};
