//! Customer question generation.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use contentgen_blocks::ProductFacts;
use contentgen_generation::{CallSlot, GenerationBackend};
use contentgen_shared::{ProductModel, Result};

use crate::fragments::{QuestionCategory, QuestionSet};
use crate::prompts;
use crate::stages::{StageWorker, generate_json, reserve_on};
use crate::state::{PipelineState, StageId};

pub struct QuestionsInput {
    pub product: Arc<ProductModel>,
    pub facts: ProductFacts,
    pub other: Option<Arc<ProductModel>>,
}

pub struct QuestionsWorker {
    backend: Option<Arc<dyn GenerationBackend>>,
    min_questions: usize,
}

#[derive(Deserialize)]
struct Generated {
    questions: Vec<GeneratedQuestion>,
}

#[derive(Deserialize)]
struct GeneratedQuestion {
    category: QuestionCategory,
    question: String,
}

impl QuestionsWorker {
    pub fn new(backend: Option<Arc<dyn GenerationBackend>>, min_questions: usize) -> Self {
        Self {
            backend,
            min_questions,
        }
    }
}

#[async_trait]
impl StageWorker for QuestionsWorker {
    type Input = QuestionsInput;
    type Output = QuestionSet;

    fn id(&self) -> StageId {
        StageId::Questions
    }

    fn prepare(&self, state: &PipelineState) -> Result<QuestionsInput> {
        let parsed = state.parsed()?;
        Ok(QuestionsInput {
            product: parsed.primary.clone(),
            facts: state.logic()?.primary.clone(),
            other: parsed.secondary.clone(),
        })
    }

    async fn reserve(&self) -> Result<Option<CallSlot>> {
        reserve_on(self.backend.as_ref()).await
    }

    fn is_deterministic(&self) -> bool {
        self.backend.is_none()
    }

    async fn produce(
        &self,
        input: &QuestionsInput,
        slot: Option<&CallSlot>,
    ) -> Result<QuestionSet> {
        let name = input.product.product_name.clone();
        let Some(backend) = &self.backend else {
            return Ok(QuestionSet::numbered(name, rule_questions(input)));
        };

        let request = prompts::questions_request(
            &input.product,
            &input.facts,
            input.other.as_deref(),
            self.min_questions,
        );
        let generated: Generated = generate_json(backend, slot, &request).await?;
        Ok(QuestionSet::numbered(
            name,
            generated
                .questions
                .into_iter()
                .map(|q| (q.category, q.question.trim().to_string())),
        ))
    }

    fn degraded(&self, input: &QuestionsInput) -> QuestionSet {
        QuestionSet {
            product_name: input.product.product_name.clone(),
            questions: Vec::new(),
        }
    }
}

/// Templated questions across every category.
fn rule_questions(input: &QuestionsInput) -> Vec<(QuestionCategory, String)> {
    use QuestionCategory::*;

    let name = &input.product.product_name;
    let active = &input.facts.ingredients.primary_active;

    let mut out = vec![
        (Informational, format!("What is {name}?")),
        (Informational, format!("What are the key ingredients in {name}?")),
        match &input.facts.ingredients.concentration {
            Some(pct) => (
                Informational,
                format!("What is the concentration of {active} in {name} ({pct})?"),
            ),
            None => (Informational, format!("What does {active} do in {name}?")),
        },
        (Informational, format!("What are the main benefits of {name}?")),
        (Informational, format!("Which skin types is {name} suitable for?")),
        (Safety, format!("Are there any side effects of using {name}?")),
        (Safety, format!("Is {name} safe for sensitive skin?")),
        (Safety, format!("Can I use {name} with other active ingredients?")),
        (Usage, format!("How do I use {name}?")),
        (Usage, format!("How often should I apply {name}?")),
        (Usage, format!("How much {name} should I use per application?")),
        (Usage, format!("When should I apply {name} in my routine?")),
        (Purchase, format!("What is the price of {name}?")),
        (Purchase, format!("Is {name} worth the price?")),
        (Purchase, format!("What results can I expect from {name}?")),
    ];

    match &input.other {
        Some(other) => {
            let other = &other.product_name;
            out.push((Comparison, format!("How does {name} compare to {other}?")));
            out.push((
                Comparison,
                format!("Which is more affordable, {name} or {other}?"),
            ));
            out.push((
                Comparison,
                format!("What ingredients do {name} and {other} have in common?"),
            ));
        }
        None => out.push((
            Comparison,
            format!("How does {name} compare to other {active} products?"),
        )),
    }

    out
}
