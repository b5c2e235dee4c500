//! Two-product comparison page.
//!
//! Ingredient sets, price difference and the cheaper product always come
//! from [`ComparisonFacts`]. Only the recommendation text is generated.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use contentgen_blocks::ComparisonFacts;
use contentgen_generation::{CallSlot, GenerationBackend};
use contentgen_shared::{ContentGenError, Price, ProductModel, Result};

use crate::fragments::{ComparisonPage, ComparisonSection, ProductSummary};
use crate::prompts;
use crate::stages::{StageWorker, generate_json, lower_first, natural_join, reserve_on};
use crate::state::{PipelineState, StageId};

pub struct ComparisonInput {
    pub a: Arc<ProductModel>,
    pub b: Arc<ProductModel>,
    pub facts: ComparisonFacts,
}

pub struct ComparisonWorker {
    backend: Option<Arc<dyn GenerationBackend>>,
}

#[derive(Deserialize)]
struct Generated {
    recommendation: String,
}

impl ComparisonWorker {
    pub fn new(backend: Option<Arc<dyn GenerationBackend>>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl StageWorker for ComparisonWorker {
    type Input = ComparisonInput;
    type Output = ComparisonPage;

    fn id(&self) -> StageId {
        StageId::Comparison
    }

    fn prepare(&self, state: &PipelineState) -> Result<ComparisonInput> {
        let parsed = state.parsed()?;
        let (Some(b), Some(facts)) = (&parsed.secondary, &state.logic()?.comparison) else {
            return Err(ContentGenError::state(
                "comparison stage needs a second product",
            ));
        };
        Ok(ComparisonInput {
            a: parsed.primary.clone(),
            b: b.clone(),
            facts: facts.clone(),
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
        input: &ComparisonInput,
        slot: Option<&CallSlot>,
    ) -> Result<ComparisonPage> {
        let recommendation = match &self.backend {
            Some(backend) => {
                let request = prompts::comparison_request(&input.a, &input.b, &input.facts);
                let generated: Generated = generate_json(backend, slot, &request).await?;
                generated.recommendation.trim().to_string()
            }
            None => rule_recommendation(&input.facts),
        };
        Ok(page(input, recommendation))
    }

    fn degraded(&self, input: &ComparisonInput) -> ComparisonPage {
        page(input, String::new())
    }
}

fn page(input: &ComparisonInput, recommendation: String) -> ComparisonPage {
    ComparisonPage {
        product_a: ProductSummary::from(input.a.as_ref()),
        product_b: ProductSummary::from(input.b.as_ref()),
        comparison: ComparisonSection::from_facts(&input.facts, recommendation),
    }
}

fn rule_recommendation(facts: &ComparisonFacts) -> String {
    let mut sentences = Vec::with_capacity(3);

    if facts.prices_equal {
        sentences.push(format!("Both products are priced at {}.", facts.price_a));
    } else {
        let diff = Price::new(facts.price_difference, facts.price_a.currency);
        sentences.push(format!(
            "{} is more affordable by {diff}.",
            facts.cheaper_name()
        ));
    }

    let focus = |unique: &[String]| -> Option<String> {
        let lowered: Vec<String> = unique.iter().map(|b| lower_first(b)).collect();
        (!lowered.is_empty()).then(|| natural_join(&lowered))
    };
    match (focus(&facts.unique_benefits_a), focus(&facts.unique_benefits_b)) {
        (Some(a), Some(b)) => sentences.push(format!(
            "Choose {} for {a}, or {} for {b}.",
            facts.product_a, facts.product_b
        )),
        (Some(a), None) => sentences.push(format!("Only {} also targets {a}.", facts.product_a)),
        (None, Some(b)) => sentences.push(format!("Only {} also targets {b}.", facts.product_b)),
        (None, None) => sentences.push("Both target the same concerns.".to_string()),
    }

    if !facts.common_ingredients.is_empty() {
        sentences.push(format!(
            "They share {}.",
            natural_join(&facts.common_ingredients)
        ));
    }

    sentences.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use contentgen_blocks::ProductSlot;

    use crate::schema::comparison_page_schema;
    use crate::testing::{ScriptedBackend, clearglow, glowboost};

    fn input() -> ComparisonInput {
        let (a, b) = (glowboost(), clearglow());
        ComparisonInput {
            facts: contentgen_blocks::compare(&a, &b).unwrap(),
            a: Arc::new(a),
            b: Arc::new(b),
        }
    }

    #[tokio::test]
    async fn rules_page_carries_facts() {
        let page = ComparisonWorker::new(None).produce(&input(), None).await.unwrap();
        assert_eq!(page.comparison.price_difference, 100.0);
        assert_eq!(page.comparison.cheaper_product, ProductSlot::ProductA);
        assert_eq!(page.comparison.common_ingredients, vec!["Hyaluronic Acid"]);
        assert_eq!(
            page.comparison.recommendation,
            "GlowBoost Vitamin C Serum is more affordable by ₹100. Choose GlowBoost Vitamin C \
             Serum for fades dark spots, or ClearGlow Niacinamide Serum for controls oil. They \
             share Hyaluronic Acid."
        );
        assert!(comparison_page_schema().validate_fragment(&page).unwrap().passed());
    }

    #[tokio::test]
    async fn equal_prices_say_so() {
        let mut b = clearglow();
        b.price.amount = 699.0;
        let a = glowboost();
        let input = ComparisonInput {
            facts: contentgen_blocks::compare(&a, &b).unwrap(),
            a: Arc::new(a),
            b: Arc::new(b),
        };
        let page = ComparisonWorker::new(None).produce(&input, None).await.unwrap();
        assert!(
            page.comparison
                .recommendation
                .starts_with("Both products are priced at ₹699.")
        );
    }

    #[tokio::test]
    async fn generated_text_cannot_change_prices() {
        let backend = ScriptedBackend::new(vec![Ok(r#"{
            "recommendation": "Pick ClearGlow for oily skin.",
            "priceDifference": 5,
            "cheaperProduct": "productB"
        }"#
        .to_string())]);
        let page = ComparisonWorker::new(Some(backend))
            .produce(&input(), None)
.await
            .unwrap();
        assert_eq!(page.comparison.recommendation, "Pick ClearGlow for oily skin.");
        assert_eq!(page.comparison.price_difference, 100.0);
        assert_eq!(page.comparison.cheaper_product, ProductSlot::ProductA);
    }

    #[test]
    fn degraded_has_empty_recommendation() {
        let page = ComparisonWorker::new(None).degraded(&input());
        let result = comparison_page_schema().validate_fragment(&page).unwrap();
        assert!(result.structurally_valid());
        assert_eq!(
            result.messages(),
            vec!["comparison.recommendation: empty".to_string()]
        );
    }
}
