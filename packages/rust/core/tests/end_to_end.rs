//! Cross-crate runs: shared config → generation registry → core pipeline and jobs.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use contentgen_blocks::ProductSlot;
use contentgen_core::{
    CancellationToken, JobManager, JobStatus, Pipeline, RetryPolicy, RunRequest, SilentProgress,
    StageId, StageStatus,
};
use contentgen_generation::{
    BackendFactory, BackendKey, ClientRegistry, GenerationBackend, GenerationRequest,
    GenerationResponse, ThrottleLimits,
};
use contentgen_shared::{
    AppConfig, Currency, PipelineConfig, Price, ProductModel, Provider, Result,
};

fn glowboost() -> ProductModel {
    ProductModel {
        product_name: "GlowBoost Vitamin C Serum".into(),
        concentration: "10% Vitamin C".into(),
        skin_type: vec!["Oily".into(), "Combination".into()],
        key_ingredients: vec!["Vitamin C".into(), "Hyaluronic Acid".into()],
        benefits: vec!["Brightening".into(), "Fades dark spots".into()],
        how_to_use: "Apply 2–3 drops in the morning before sunscreen".into(),
        side_effects: "Mild tingling for sensitive skin".into(),
        price: Price::new(699.0, Currency::Inr),
    }
}

fn clearglow() -> ProductModel {
    ProductModel {
        product_name: "ClearGlow Niacinamide Serum".into(),
        concentration: "5% Niacinamide".into(),
        skin_type: vec!["Oily".into(), "Acne-prone".into()],
        key_ingredients: vec!["Niacinamide".into(), "Zinc".into(), "Hyaluronic Acid".into()],
        benefits: vec!["Controls oil".into(), "Brightening".into()],
        how_to_use: "Apply 3 drops morning and evening after cleansing".into(),
        side_effects: "Rare redness".into(),
        price: Price::new(799.0, Currency::Inr),
    }
}

/// Answers each stage by the shape its request asks for.
struct Routed {
    calls: AtomicUsize,
    delay: Duration,
}

impl Routed {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
        })
    }
}

#[async_trait]
impl GenerationBackend for Routed {
    fn name(&self) -> &str {
        "routed"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let hint = request
            .schema_hint
            .as_ref()
            .map(|h| h.to_string())
            .unwrap_or_default();

        let body = if hint.contains("\"questions\"") {
            let questions: Vec<_> = (1..=15)
                .map(|i| json!({"category": "informational", "question": format!("Question {i}?")}))
                .collect();
            json!({ "questions": questions })
        } else if hint.contains("\"faqs\"") {
            let faqs: Vec<_> = (1..=6)
                .map(|i| {
                    json!({"category": "usage", "question": format!("Q{i}?"), "answer": "Apply daily."})
                })
                .collect();
            json!({ "faqs": faqs })
        } else if hint.contains("\"summary\"") {
            json!({ "summary": "A brightening vitamin C serum." })
        } else {
            json!({ "recommendation": "Pick ClearGlow for oily, acne-prone skin." })
        };

        Ok(GenerationResponse {
            text: format!("```json\n{body}\n```"),
            model: "routed".into(),
        })
    }
}

struct Counting {
    backend: Arc<Routed>,
    builds: AtomicUsize,
}

impl BackendFactory for Counting {
    fn build(&self, _key: &BackendKey) -> Result<Arc<dyn GenerationBackend>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(self.backend.clone() as Arc<dyn GenerationBackend>)
    }
}

fn pipeline_with(
    backend: Arc<Routed>,
    max_in_flight: usize,
    policy: RetryPolicy,
) -> (Pipeline, Arc<Counting>) {
    let factory = Arc::new(Counting {
        backend,
        builds: AtomicUsize::new(0),
    });
    let registry = Arc::new(ClientRegistry::new(
        factory.clone(),
        ThrottleLimits {
            max_in_flight,
            min_interval: Duration::ZERO,
        },
    ));
    let config = PipelineConfig::default().with_provider(Provider::Ollama, &AppConfig::default());
    let pipeline = Pipeline::new(config, registry).with_policy(policy);
    (pipeline, factory)
}

fn generated_pipeline() -> (Pipeline, Arc<Counting>) {
    pipeline_with(
        Routed::new(Duration::ZERO),
        2,
        RetryPolicy::immediate(2, Duration::from_secs(5)),
    )
}

#[tokio::test]
async fn generated_comparison_keeps_computed_facts() {
    let (pipeline, factory) = generated_pipeline();
    let request = RunRequest::new(glowboost()).compare_with(clearglow());
    let bundle = pipeline
        .run(&request, &SilentProgress, &CancellationToken::new())
        .await
        .unwrap();

    assert!(!bundle.is_degraded());
    let page = bundle.comparison_page.unwrap();
    assert_eq!(page.comparison.price_difference, 100.0);
    assert_eq!(page.comparison.cheaper_product, ProductSlot::ProductA);
    assert_eq!(
        page.comparison.recommendation,
        "Pick ClearGlow for oily, acne-prone skin."
    );
    assert_eq!(bundle.faq.faqs.len(), 6);
    assert_eq!(factory.backend.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn concurrent_jobs_share_one_backend() {
    let (pipeline, factory) = generated_pipeline();
    let jobs = JobManager::new(Arc::new(pipeline), 50, 4);

    let mut ids = Vec::new();
    for _ in 0..8 {
        ids.push(
            jobs.submit(RunRequest::new(glowboost()).compare_with(clearglow()))
                .await,
        );
    }
    for id in &ids {
        let record = jobs.wait(*id).await.unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        let bundle = record.result.unwrap();
        let comparison = bundle
            .diagnostics
            .iter()
            .find(|d| d.stage == StageId::Comparison)
            .unwrap();
        assert_eq!(comparison.status, StageStatus::Succeeded);
    }

    assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
    assert_eq!(jobs.list().await.len(), 8);
}

#[tokio::test]
async fn waiting_on_a_busy_backend_does_not_time_out_stages() {
    // One call in flight at a time, each call well inside the stage timeout.
    let (pipeline, factory) = pipeline_with(
        Routed::new(Duration::from_millis(150)),
        1,
        RetryPolicy::immediate(0, Duration::from_millis(200)),
    );
    let jobs = JobManager::new(Arc::new(pipeline), 10, 2);

    let first = jobs.submit(RunRequest::new(glowboost())).await;
    let second = jobs.submit(RunRequest::new(clearglow())).await;

    for id in [first, second] {
        let record = jobs.wait(id).await.unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        let bundle = record.result.unwrap();
        assert!(
            !bundle.is_degraded(),
            "degraded: {:?}",
            bundle.diagnostics
        );
    }
    assert_eq!(factory.backend.calls.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn rules_run_needs_no_backend() {
    let registry = Arc::new(ClientRegistry::from_config(&AppConfig::default()));
    let pipeline = Pipeline::new(PipelineConfig::default(), registry.clone());
    let bundle = pipeline
        .run(
            &RunRequest::new(glowboost()).compare_with(clearglow()),
            &SilentProgress,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(registry.is_empty());
    assert!(bundle.questions.questions.len() >= 15);
    assert!(bundle.faq.faqs.len() >= 5);
    assert!(!bundle.product_page.summary.is_empty());
}
