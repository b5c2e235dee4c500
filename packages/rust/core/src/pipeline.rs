//! Pipeline executor: parse → logic → questions → faq → description →
//! comparison → assembly.
//!
//! The order is fixed and total. Every stage reads only what strictly earlier
//! stages recorded in a fresh [`PipelineState`]; the executor itself keeps
//! nothing between runs.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, instrument};

use contentgen_generation::{BackendKey, ClientRegistry, GenerationBackend};
use contentgen_shared::{ContentGenError, PipelineConfig, ProductModel, Provider, Result};

use crate::cancel::CancellationToken;
use crate::fragments::{ContentBundle, RunMeta, StageDiagnostic};
use crate::retry::{RetryPolicy, Supervisor};
use crate::schema::SchemaSet;
use crate::stages::{
    ComparisonWorker, DescriptionWorker, FaqWorker, QuestionsWorker, StageWorker, assembly, logic,
    parse,
};
use crate::state::{PipelineState, StageId, StageOutput};

/// Input for one run: the product, plus an optional product to compare against.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub primary: Arc<ProductModel>,
    pub secondary: Option<Arc<ProductModel>>,
}

impl RunRequest {
    pub fn new(primary: ProductModel) -> Self {
        Self {
            primary: Arc::new(primary),
            secondary: None,
        }
    }

    pub fn compare_with(mut self, secondary: ProductModel) -> Self {
        self.secondary = Some(Arc::new(secondary));
        self
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called before a stage starts.
    fn stage_started(&self, stage: StageId);
    /// Called when a stage has recorded its output, or was skipped.
    fn stage_finished(&self, diagnostic: &StageDiagnostic);
    /// Called once the bundle is assembled.
    fn done(&self, bundle: &ContentBundle);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage_started(&self, _stage: StageId) {}
    fn stage_finished(&self, _diagnostic: &StageDiagnostic) {}
    fn done(&self, _bundle: &ContentBundle) {}
}

// ---------------------------------------------------------------------------
// Static plan
// ---------------------------------------------------------------------------

/// One entry of the static execution plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanStep {
    pub stage: StageId,
    pub reads: &'static [StageId],
    /// State key written. Assembly writes the bundle instead.
    pub writes: Option<StageId>,
    pub supervised: bool,
}

/// The stage order every run follows.
pub fn plan() -> Vec<PlanStep> {
    StageId::ORDER
        .iter()
        .map(|&stage| PlanStep {
            stage,
            reads: stage.reads(),
            writes: (stage != StageId::Assembly).then_some(stage),
            supervised: stage.is_supervised(),
        })
        .collect()
}

/// Check that every stage appears once and reads only from stages before it.
pub fn validate_plan(steps: &[PlanStep]) -> Result<()> {
    for (i, step) in steps.iter().enumerate() {
        if steps[..i].iter().any(|s| s.stage == step.stage) {
            return Err(ContentGenError::state(format!(
                "stage '{}' appears twice in the plan",
                step.stage
            )));
        }
        for read in step.reads {
            let earlier = steps[..i].iter().any(|s| s.writes == Some(*read));
            if !earlier {
                return Err(ContentGenError::state(format!(
                    "stage '{}' reads '{read}', which is not written by an earlier stage",
                    step.stage
                )));
            }
        }
    }
    Ok(())
}

/// Plain-text table of the plan.
pub fn render_plan(steps: &[PlanStep]) -> String {
    let mut out = format!("{:<4}{:<13}{:<40}{:<13}{}\n", "#", "STAGE", "READS", "WRITES", "RETRY");
    for (i, step) in steps.iter().enumerate() {
        let reads = if step.reads.is_empty() {
            "-".to_string()
        } else {
            step.reads
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        let writes = step.writes.map(StageId::as_str).unwrap_or("(bundle)");
        out.push_str(&format!(
            "{:<4}{:<13}{:<40}{:<13}{}\n",
            i + 1,
            step.stage.as_str(),
            reads,
            writes,
            if step.supervised { "yes" } else { "no" }
        ));
    }
    out
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

pub struct Pipeline {
    config: PipelineConfig,
    registry: Arc<ClientRegistry>,
    supervisor: Supervisor,
    schemas: SchemaSet,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, registry: Arc<ClientRegistry>) -> Self {
        let supervisor = Supervisor::new(RetryPolicy::from(&config));
        let schemas = SchemaSet::from_config(&config);
        Self {
            config,
            registry,
            supervisor,
            schemas,
        }
    }

    /// Replace the retry policy derived from config.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.supervisor = Supervisor::new(policy);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage for `request` and assemble the bundle.
    ///
    /// Returns a bundle whenever no fatal error occurs, even if some stages
    /// degraded. Cancellation is honored between stages.
    #[instrument(
        skip_all,
        fields(product = %request.primary.product_name, provider = %self.config.provider)
    )]
    pub async fn run(
        &self,
        request: &RunRequest,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<ContentBundle> {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut state = PipelineState::new(request.primary.clone(), request.secondary.clone());
        let mut diagnostics = Vec::with_capacity(StageId::ORDER.len());

        info!(compare = request.secondary.is_some(), "starting content pipeline");

        // --- Phase 1: Parse + logic blocks ---
        let pure: [(StageId, fn(&PipelineState) -> Result<StageOutput>); 2] =
            [(StageId::Parse, parse::run), (StageId::Logic, logic::run)];
        for (stage, run) in pure {
            checkpoint(cancel, stage)?;
            progress.stage_started(stage);
            let t = Instant::now();
            state.record(run(&state)?)?;
            let diagnostic = StageDiagnostic::succeeded(stage, 1, t.elapsed().as_millis() as u64);
            progress.stage_finished(&diagnostic);
            diagnostics.push(diagnostic);
        }

        // --- Phase 2: Content stages ---
        let backend = self.backend().await?;
        let config = &self.config;

        let questions = QuestionsWorker::new(backend.clone(), config.min_questions);
        self.supervise(
            &questions,
            StageOutput::Questions,
            &mut state,
            &mut diagnostics,
            progress,
            cancel,
        )
        .await?;

        let faq = FaqWorker::new(backend.clone(), config.min_faqs);
        self.supervise(
            &faq,
            StageOutput::Faq,
            &mut state,
            &mut diagnostics,
            progress,
            cancel,
        )
        .await?;

        let description = DescriptionWorker::new(backend.clone());
        self.supervise(
            &description,
            StageOutput::Description,
            &mut state,
            &mut diagnostics,
            progress,
            cancel,
        )
        .await?;

        if state.secondary().is_some() {
            let comparison = ComparisonWorker::new(backend);
            self.supervise(
                &comparison,
                StageOutput::Comparison,
                &mut state,
                &mut diagnostics,
                progress,
                cancel,
            )
            .await?;
        } else {
            debug!("no second product; skipping comparison");
            let diagnostic = StageDiagnostic::skipped(StageId::Comparison);
            progress.stage_finished(&diagnostic);
            diagnostics.push(diagnostic);
        }

        // --- Phase 3: Assembly ---
        checkpoint(cancel, StageId::Assembly)?;
        progress.stage_started(StageId::Assembly);
        let meta = RunMeta {
            provider: self.config.provider.as_str().to_string(),
            model: (!self.config.model.is_empty()).then(|| self.config.model.clone()),
            started_at,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        let bundle = assembly::run(&state, diagnostics, meta)?;

        info!(
            elapsed_ms = bundle.meta.elapsed_ms,
            degraded = bundle.degraded_stages().len(),
            questions = bundle.questions.questions.len(),
            faqs = bundle.faq.faqs.len(),
            "content pipeline complete"
        );
        progress.done(&bundle);
        Ok(bundle)
    }

    /// Resolve the shared backend for this config. `None` for rules.
    async fn backend(&self) -> Result<Option<Arc<dyn GenerationBackend>>> {
        if self.config.provider == Provider::Rules {
            return Ok(None);
        }
        let key = BackendKey::from(&self.config);
        Ok(Some(self.registry.get(&key).await?))
    }

    async fn supervise<W: StageWorker>(
        &self,
        worker: &W,
        wrap: fn(W::Output) -> StageOutput,
        state: &mut PipelineState,
        diagnostics: &mut Vec<StageDiagnostic>,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let stage = worker.id();
        checkpoint(cancel, stage)?;
        progress.stage_started(stage);

        let schema = self.schemas.for_stage(stage).ok_or_else(|| {
            ContentGenError::state(format!("no schema registered for stage '{stage}'"))
        })?;
        let input = worker.prepare(state)?;
        let outcome = self.supervisor.run(worker, &input, schema, cancel).await?;

        state.record(wrap(outcome.output))?;
        progress.stage_finished(&outcome.diagnostic);
        diagnostics.push(outcome.diagnostic);
        Ok(())
    }
}

fn checkpoint(cancel: &CancellationToken, stage: StageId) -> Result<()> {
    if cancel.is_cancelled() {
        info!(%stage, "run cancelled before stage");
        return Err(ContentGenError::Cancelled);
    }
    Ok(())
}
