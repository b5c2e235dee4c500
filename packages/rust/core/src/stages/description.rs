//! Product page: deterministic facts plus a summary paragraph.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use contentgen_blocks::ProductFacts;
use contentgen_generation::{CallSlot, GenerationBackend};
use contentgen_shared::{ProductModel, Result};

use crate::fragments::{BenefitSection, ProductPage, UsageSection};
use crate::prompts;
use crate::stages::{StageWorker, generate_json, lower_first, natural_join, reserve_on};
use crate::state::{PipelineState, StageId};

pub struct DescriptionInput {
    pub product: Arc<ProductModel>,
    pub facts: ProductFacts,
}

pub struct DescriptionWorker {
    backend: Option<Arc<dyn GenerationBackend>>,
}

#[derive(Deserialize)]
struct Generated {
    summary: String,
}

impl DescriptionWorker {
    pub fn new(backend: Option<Arc<dyn GenerationBackend>>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl StageWorker for DescriptionWorker {
    type Input = DescriptionInput;
    type Output = ProductPage;

    fn id(&self) -> StageId {
        StageId::Description
    }

    fn prepare(&self, state: &PipelineState) -> Result<DescriptionInput> {
        Ok(DescriptionInput {
            product: state.parsed()?.primary.clone(),
            facts: state.logic()?.primary.clone(),
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
        input: &DescriptionInput,
        slot: Option<&CallSlot>,
    ) -> Result<ProductPage> {
        let summary = match &self.backend {
            Some(backend) => {
                let request = prompts::description_request(&input.product, &input.facts);
                let generated: Generated = generate_json(backend, slot, &request).await?;
                generated.summary.trim().to_string()
            }
            None => rule_summary(&input.product, &input.facts),
        };
        Ok(page(input, summary))
    }

    fn degraded(&self, input: &DescriptionInput) -> ProductPage {
        page(input, String::new())
    }
}

fn page(input: &DescriptionInput, summary: String) -> ProductPage {
    let product = &input.product;
    ProductPage {
        product_name: product.product_name.clone(),
        summary,
        concentration: product.concentration.clone(),
        skin_type: product.skin_type.clone(),
        key_ingredients: input.facts.ingredients.ingredient_list.clone(),
        primary_active: input.facts.ingredients.primary_active.clone(),
        benefits: BenefitSection::from(&input.facts.benefits),
        usage: UsageSection::from(&input.facts.usage),
        side_effects: product.side_effects.clone(),
        price: product.price,
    }
}

/// Templated summary built from facts.
pub(crate) fn rule_summary(product: &ProductModel, facts: &ProductFacts) -> String {
    let name = &product.product_name;
    let mut sentences = Vec::with_capacity(3);

    if product.concentration.trim().is_empty() {
        sentences.push(format!(
            "{name} is built around {}.",
            facts.ingredients.primary_active
        ));
    } else {
        sentences.push(format!(
            "{name} is formulated with {}.",
            product.concentration.trim()
        ));
    }

    let benefits: Vec<String> = facts
        .benefits
        .benefit_list
        .iter()
        .map(|b| lower_first(b))
        .collect();
    sentences.push(format!(
        "It combines {} to help with {}.",
        natural_join(&facts.ingredients.ingredient_list),
        natural_join(&benefits)
    ));

    if !product.skin_type.is_empty() {
        sentences.push(format!(
            "Suited to {} skin.",
            natural_join(&product.skin_type).to_lowercase()
        ));
    }

    sentences.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::product_page_schema;
    use crate::testing::{ScriptedBackend, glowboost};

    fn input() -> DescriptionInput {
        let product = glowboost();
        DescriptionInput {
            facts: contentgen_blocks::analyze(&product).unwrap(),
            product: Arc::new(product),
        }
    }

    #[test]
    fn rule_summary_reads_naturally() {
        let input = input();
        assert_eq!(
            rule_summary(&input.product, &input.facts),
            "GlowBoost Vitamin C Serum is formulated with 10% Vitamin C. It combines Vitamin C and \
             Hyaluronic Acid to help with brightening and fades dark spots. Suited to oily and \
             combination skin."
        );
    }

    #[tokio::test]
    async fn facts_come_from_logic_blocks() {
        let page = DescriptionWorker::new(None).produce(&input(), None).await.unwrap();
        assert_eq!(page.benefits.primary, "Brightening");
        assert_eq!(page.usage.quantity.as_deref(), Some("2–3 drops"));
        assert_eq!(page.price.amount, 699.0);
        assert!(product_page_schema().validate_fragment(&page).unwrap().passed());
    }

    #[tokio::test]
    async fn generated_summary_only_replaces_summary() {
        let backend = ScriptedBackend::new(vec![Ok(
            r#"{"summary": "A bright daily serum.", "price": 1}"#.to_string(),
        )]);
        let page = DescriptionWorker::new(Some(backend))
            .produce(&input(), None)
.await
            .unwrap();
        assert_eq!(page.summary, "A bright daily serum.");
        assert_eq!(page.price.amount, 699.0);
    }

    #[test]
    fn degraded_keeps_facts_but_fails_threshold() {
        let page = DescriptionWorker::new(None).degraded(&input());
        assert!(page.summary.is_empty());
        let result = product_page_schema().validate_fragment(&page).unwrap();
        assert!(result.structurally_valid());
        assert_eq!(result.messages(), vec!["summary: empty".to_string()]);
    }
}
