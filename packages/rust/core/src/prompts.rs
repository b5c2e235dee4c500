//! System prompts and request builders for generated stages.
//!
//! Every prompt embeds the product data and logic-block facts as JSON and
//! asks for a JSON reply. Prices, ingredient sets and the cheaper product are
//! never taken from generated text.

use serde::Serialize;
use serde_json::json;

use contentgen_blocks::{ComparisonFacts, ProductFacts};
use contentgen_generation::GenerationRequest;
use contentgen_shared::ProductModel;

use crate::fragments::QuestionSet;

const QUESTIONS_SYSTEM: &str = "You are a skincare content strategist. You write the questions \
shoppers ask about a product. Cover these categories: informational, safety, usage, purchase, \
comparison. Use only the product data you are given. Reply with JSON only.";

const FAQ_SYSTEM: &str = "You are a skincare FAQ writer. Answer each question in one to three \
sentences using only the product data you are given. Never invent ingredients, prices or \
clinical claims. Reply with JSON only.";

const DESCRIPTION_SYSTEM: &str = "You are a product copywriter. Write a factual, engaging \
summary paragraph for a product page using only the data you are given. Reply with JSON only.";

const COMPARISON_SYSTEM: &str = "You are a skincare advisor comparing two products. Write a \
short, balanced recommendation grounded in the comparison facts you are given. Do not restate \
prices differently from the facts. Reply with JSON only.";

fn pretty<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".into())
}

pub fn questions_request(
    product: &ProductModel,
    facts: &ProductFacts,
    other: Option<&ProductModel>,
    min_questions: usize,
) -> GenerationRequest {
    let mut prompt = format!(
        "Write at least {min_questions} distinct customer questions about this product.\n\n\
         Product:\n{}\n\nFacts:\n{}",
        pretty(product),
        pretty(facts)
    );
    if let Some(other) = other {
        prompt.push_str(&format!(
            "\n\nInclude comparison questions against:\n{}",
            pretty(other)
        ));
    }

    GenerationRequest::new(QUESTIONS_SYSTEM, prompt).with_schema_hint(json!({
        "questions": [
            {"category": "informational|safety|usage|purchase|comparison", "question": "string"}
        ]
    }))
}

pub fn faq_request(
    product: &ProductModel,
    facts: &ProductFacts,
    comparison: Option<&ComparisonFacts>,
    questions: &QuestionSet,
    min_faqs: usize,
) -> GenerationRequest {
    let mut prompt = format!(
        "Answer these questions for a FAQ page. Return at least {min_faqs} answered entries and \
         skip questions the data cannot answer.\n\nQuestions:\n{}\n\nProduct:\n{}\n\nFacts:\n{}",
        pretty(&questions.questions),
        pretty(product),
        pretty(facts)
    );
    if let Some(comparison) = comparison {
        prompt.push_str(&format!("\n\nComparison facts:\n{}", pretty(comparison)));
    }

    GenerationRequest::new(FAQ_SYSTEM, prompt).with_schema_hint(json!({
        "faqs": [
            {
                "category": "informational|safety|usage|purchase|comparison",
                "question": "string",
                "answer": "string"
            }
        ]
    }))
}

pub fn description_request(product: &ProductModel, facts: &ProductFacts) -> GenerationRequest {
    let prompt = format!(
        "Write the summary paragraph (2 to 4 sentences) for this product page.\n\n\
         Product:\n{}\n\nFacts:\n{}",
        pretty(product),
        pretty(facts)
    );
    GenerationRequest::new(DESCRIPTION_SYSTEM, prompt)
        .with_schema_hint(json!({ "summary": "string" }))
}

pub fn comparison_request(
    a: &ProductModel,
    b: &ProductModel,
    facts: &ComparisonFacts,
) -> GenerationRequest {
    let prompt = format!(
        "Recommend which shopper each product suits better.\n\n\
         Product A:\n{}\n\nProduct B:\n{}\n\nComparison facts:\n{}",
        pretty(a),
        pretty(b),
        pretty(facts)
    );
    GenerationRequest::new(COMPARISON_SYSTEM, prompt)
        .with_schema_hint(json!({ "recommendation": "string" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{clearglow, glowboost};

    #[test]
    fn questions_prompt_embeds_product_and_minimum() {
        let product = glowboost();
        let facts = contentgen_blocks::analyze(&product).unwrap();
        let req = questions_request(&product, &facts, None, 15);
        assert!(req.prompt.contains("at least 15"));
        assert!(req.prompt.contains("GlowBoost Vitamin C Serum"));
        assert!(!req.prompt.contains("comparison questions against"));
        assert!(req.schema_hint.is_some());
    }

    #[test]
    fn comparison_prompt_carries_facts() {
        let (a, b) = (glowboost(), clearglow());
        let facts = contentgen_blocks::compare(&a, &b).unwrap();
        let req = comparison_request(&a, &b, &facts);
        assert!(req.prompt.contains("\"priceDifference\": 100.0"));
        assert!(req.system.contains("comparing two products"));
    }
}
