//! FAQ answers for the generated questions.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use contentgen_blocks::{ComparisonFacts, ProductFacts, ProductSlot};
use contentgen_generation::{CallSlot, GenerationBackend};
use contentgen_shared::{Price, ProductModel, Result};

use crate::fragments::{FaqPage, QuestionCategory, QuestionSet};
use crate::prompts;
use crate::stages::{
    StageWorker, description, generate_json, lower_first, natural_join, reserve_on,
};
use crate::state::{PipelineState, StageId};

pub struct FaqInput {
    pub product: Arc<ProductModel>,
    pub facts: ProductFacts,
    pub comparison: Option<ComparisonFacts>,
    pub questions: QuestionSet,
}

pub struct FaqWorker {
    backend: Option<Arc<dyn GenerationBackend>>,
    min_faqs: usize,
}

#[derive(Deserialize)]
struct Generated {
    faqs: Vec<GeneratedFaq>,
}

#[derive(Deserialize)]
struct GeneratedFaq {
    category: QuestionCategory,
    question: String,
    #[serde(default)]
    answer: String,
}

impl FaqWorker {
    pub fn new(backend: Option<Arc<dyn GenerationBackend>>, min_faqs: usize) -> Self {
        Self { backend, min_faqs }
    }
}

#[async_trait]
impl StageWorker for FaqWorker {
    type Input = FaqInput;
    type Output = FaqPage;

    fn id(&self) -> StageId {
        StageId::Faq
    }

    fn prepare(&self, state: &PipelineState) -> Result<FaqInput> {
        let logic = state.logic()?;
        Ok(FaqInput {
            product: state.parsed()?.primary.clone(),
            facts: logic.primary.clone(),
            comparison: logic.comparison.clone(),
            questions: state.questions()?.clone(),
        })
    }

    async fn reserve(&self) -> Result<Option<CallSlot>> {
        reserve_on(self.backend.as_ref()).await
    }

    fn is_deterministic(&self) -> bool {
        self.backend.is_none()
    }

    async fn produce(&self, input: &FaqInput, slot: Option<&CallSlot>) -> Result<FaqPage> {
        let name = input.product.product_name.clone();
        let Some(backend) = &self.backend else {
            let answered = input.questions.questions.iter().filter_map(|q| {
                answer_for(&q.question, input).map(|a| (q.category, q.question.clone(), a))
            });
            return Ok(FaqPage::numbered(name, answered));
        };

        let request = prompts::faq_request(
            &input.product,
            &input.facts,
            input.comparison.as_ref(),
            &input.questions,
            self.min_faqs,
        );
        let generated: Generated = generate_json(backend, slot, &request).await?;
        Ok(FaqPage::numbered(
            name,
            generated
                .faqs
                .into_iter()
                .filter(|f| !f.answer.trim().is_empty())
                .map(|f| (f.category, f.question.trim().to_string(), f.answer.trim().to_string())),
        ))
    }

    fn degraded(&self, input: &FaqInput) -> FaqPage {
        FaqPage {
            product_name: input.product.product_name.clone(),
            faqs: Vec::new(),
        }
    }
}

/// Answer a question from known facts only. `None` when the data cannot
/// support an answer; such questions are left out of the page.
fn answer_for(question: &str, input: &FaqInput) -> Option<String> {
    let q = question.to_lowercase();
    let product = &input.product;
    let name = &product.product_name;
    let facts = &input.facts;

    if q.contains("in common") {
        let cmp = input.comparison.as_ref()?;
        return Some(if cmp.common_ingredients.is_empty() {
            format!("{} and {} share no key ingredients.", cmp.product_a, cmp.product_b)
        } else {
            format!(
                "Both contain {}.",
                natural_join(&cmp.common_ingredients)
            )
        });
    }
    if q.contains("more affordable") {
        let cmp = input.comparison.as_ref()?;
        return Some(affordability(cmp));
    }
    if q.contains("compare") {
        let cmp = input.comparison.as_ref()?;
        let mut answer = affordability(cmp);
        if !cmp.unique_to_b.is_empty() {
            answer.push_str(&format!(
                " {} adds {}.",
                cmp.product_b,
                natural_join(&cmp.unique_to_b)
            ));
        }
        return Some(answer);
    }
    if q.contains("side effect") {
        return non_empty(&product.side_effects).map(|s| format!("{s}."));
    }
    if q.contains("sensitive") {
        return non_empty(&product.side_effects).map(|s| {
            format!("Listed side effects: {}. Patch test before first use.", lower_first(s))
        });
    }
    if q.contains("concentration") {
        return non_empty(&product.concentration)
            .map(|c| format!("{name} contains {c}."));
    }
    if q.contains("key ingredients") {
        return Some(format!(
            "{name} contains {}.",
            natural_join(&facts.ingredients.ingredient_list)
        ));
    }
    if q.contains("benefits") {
        let benefits: Vec<String> = facts.benefits.benefit_list.iter().map(|b| lower_first(b)).collect();
        return Some(format!("The main benefits of {name} are {}.", natural_join(&benefits)));
    }
    if q.contains("skin type") {
        return (!product.skin_type.is_empty()).then(|| {
            format!("{name} is suitable for {} skin.", natural_join(&product.skin_type).to_lowercase())
        });
    }
    if q.contains("how often") {
        return facts
            .usage
            .frequency
            .as_deref()
            .map(|f| format!("Apply {name} {}.", frequency_phrase(f)));
    }
    if q.contains("how much") {
        return facts
            .usage
            .quantity
            .as_ref()
            .map(|qty| format!("Use {qty} per application."));
    }
    if q.starts_with("when should") {
        return facts
            .usage
            .timing
            .as_ref()
            .map(|t| format!("Apply it {t}."));
    }
    if q.starts_with("how do i use") {
        return non_empty(&facts.usage.usage_instructions).map(ensure_period);
    }
    if q.contains("price") && q.starts_with("what is") {
        return Some(format!("{name} costs {}.", product.price));
    }
    if q.contains("worth") {
        let benefits: Vec<String> = facts.benefits.benefit_list.iter().map(|b| lower_first(b)).collect();
        return Some(format!(
            "At {}, {name} targets {}.",
            product.price,
            natural_join(&benefits)
        ));
    }
    if q.contains("what does") {
        return Some(format!(
            "{} is the primary active in {name} and supports {}.",
            facts.ingredients.primary_active,
            lower_first(&facts.benefits.primary_benefit)
        ));
    }
    if q.starts_with("what is") && q.contains(&name.to_lowercase()) {
        return Some(description::rule_summary(product, facts));
    }
    None
}

fn affordability(cmp: &ComparisonFacts) -> String {
    if cmp.prices_equal {
        return format!("Both products cost {}.", cmp.price_a);
    }
    let diff = Price::new(cmp.price_difference, cmp.price_a.currency);
    let (cheaper, other) = match cmp.cheaper_product {
        ProductSlot::ProductA => (&cmp.product_a, &cmp.product_b),
        ProductSlot::ProductB => (&cmp.product_b, &cmp.product_a),
    };
    format!("{cheaper} is more affordable than {other} by {diff}.")
}

fn frequency_phrase(frequency: &str) -> String {
    match frequency {
        "night" => "at night".into(),
        other => format!("every {other}"),
    }
}

fn non_empty(s: &str) -> Option<&str> {
    let trimmed = s.trim().trim_end_matches('.');
    (!trimmed.is_empty()).then_some(trimmed)
}

fn ensure_period(s: &str) -> String {
    format!("{s}.")
}
