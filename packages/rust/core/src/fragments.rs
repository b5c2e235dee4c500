//! Typed output fragments produced by content stages, and the assembled bundle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use contentgen_blocks::{BenefitFacts, ComparisonFacts, ProductSlot, UsageFacts};
use contentgen_shared::{Price, ProductModel};

use crate::state::StageId;

// ---------------------------------------------------------------------------
// Questions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionCategory {
    Informational,
    Safety,
    Usage,
    Purchase,
    Comparison,
}

impl QuestionCategory {
    pub const ALL: [QuestionCategory; 5] = [
        Self::Informational,
        Self::Safety,
        Self::Usage,
        Self::Purchase,
        Self::Comparison,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Informational => "informational",
            Self::Safety => "safety",
            Self::Usage => "usage",
            Self::Purchase => "purchase",
            Self::Comparison => "comparison",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// `q-001`, `q-002`, ...
    pub id: String,
    pub category: QuestionCategory,
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSet {
    pub product_name: String,
    pub questions: Vec<Question>,
}

impl QuestionSet {
    /// Build a set from raw (category, text) pairs, numbering them in order.
    pub fn numbered(
        product_name: impl Into<String>,
        raw: impl IntoIterator<Item = (QuestionCategory, String)>,
    ) -> Self {
        let questions = raw
            .into_iter()
            .enumerate()
            .map(|(i, (category, question))| Question {
                id: format!("q-{:03}", i + 1),
                category,
                question,
            })
            .collect();
        Self {
            product_name: product_name.into(),
            questions,
        }
    }
}

// ---------------------------------------------------------------------------
// FAQ
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaqEntry {
    /// `faq-001`, `faq-002`, ...
    pub id: String,
    pub category: QuestionCategory,
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaqPage {
    pub product_name: String,
    pub faqs: Vec<FaqEntry>,
}

impl FaqPage {
    pub fn numbered(
        product_name: impl Into<String>,
        raw: impl IntoIterator<Item = (QuestionCategory, String, String)>,
    ) -> Self {
        let faqs = raw
            .into_iter()
            .enumerate()
            .map(|(i, (category, question, answer))| FaqEntry {
                id: format!("faq-{:03}", i + 1),
                category,
                question,
                answer,
            })
            .collect();
        Self {
            product_name: product_name.into(),
            faqs,
        }
    }
}

// ---------------------------------------------------------------------------
// Product page
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenefitSection {
    pub list: Vec<String>,
    pub primary: String,
    pub count: usize,
}

impl From<&BenefitFacts> for BenefitSection {
    fn from(facts: &BenefitFacts) -> Self {
        Self {
            list: facts.benefit_list.clone(),
            primary: facts.primary_benefit.clone(),
            count: facts.benefit_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSection {
    pub instructions: String,
    pub frequency: Option<String>,
    pub quantity: Option<String>,
    pub timing: Option<String>,
}

impl From<&UsageFacts> for UsageSection {
    fn from(facts: &UsageFacts) -> Self {
        Self {
            instructions: facts.usage_instructions.clone(),
            frequency: facts.frequency.clone(),
            quantity: facts.quantity.clone(),
            timing: facts.timing.clone(),
        }
    }
}

/// Structured product description. Everything except `summary` comes from
/// logic-block facts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    pub product_name: String,
    pub summary: String,
    pub concentration: String,
    pub skin_type: Vec<String>,
    pub key_ingredients: Vec<String>,
    pub primary_active: String,
    pub benefits: BenefitSection,
    pub usage: UsageSection,
    pub side_effects: String,
    pub price: Price,
}

// ---------------------------------------------------------------------------
// Comparison page
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub name: String,
    pub concentration: String,
    pub key_ingredients: Vec<String>,
    pub benefits: Vec<String>,
    pub price: Price,
}

impl From<&ProductModel> for ProductSummary {
    fn from(product: &ProductModel) -> Self {
        Self {
            name: product.product_name.clone(),
            concentration: product.concentration.clone(),
            key_ingredients: product.key_ingredients.clone(),
            benefits: product.benefits.clone(),
            price: product.price,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonSection {
    pub common_ingredients: Vec<String>,
    pub unique_to_a: Vec<String>,
    pub unique_to_b: Vec<String>,
    pub common_benefits: Vec<String>,
    pub price_difference: f64,
    pub cheaper_product: ProductSlot,
    pub recommendation: String,
}

impl ComparisonSection {
    pub fn from_facts(facts: &ComparisonFacts, recommendation: String) -> Self {
        Self {
            common_ingredients: facts.common_ingredients.clone(),
            unique_to_a: facts.unique_to_a.clone(),
            unique_to_b: facts.unique_to_b.clone(),
            common_benefits: facts.common_benefits.clone(),
            price_difference: facts.price_difference,
            cheaper_product: facts.cheaper_product,
            recommendation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonPage {
    pub product_a: ProductSummary,
    pub product_b: ProductSummary,
    pub comparison: ComparisonSection,
}

// ---------------------------------------------------------------------------
// Diagnostics and the assembled bundle
// ---------------------------------------------------------------------------

/// How a stage ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Succeeded,
    /// Retries exhausted; a minimal placeholder fragment was recorded.
    Degraded,
    /// The stage had nothing to do (e.g. no second product to compare).
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageDiagnostic {
    pub stage: StageId,
    pub status: StageStatus,
    pub attempts: u32,
    /// Violations of the recorded fragment (business thresholds for degraded stages).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub elapsed_ms: u64,
}

impl StageDiagnostic {
    pub fn succeeded(stage: StageId, attempts: u32, elapsed_ms: u64) -> Self {
        Self {
            stage,
            status: StageStatus::Succeeded,
            attempts,
            violations: Vec::new(),
            last_error: None,
            elapsed_ms,
        }
    }

    pub fn skipped(stage: StageId) -> Self {
        Self {
            stage,
            status: StageStatus::Skipped,
            attempts: 0,
            violations: Vec::new(),
            last_error: None,
            elapsed_ms: 0,
        }
    }
}

/// Run metadata recorded alongside the fragments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMeta {
    /// `rules`, `openrouter` or `ollama`.
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// Final result of one pipeline run. May contain degraded fragments; check
/// [`ContentBundle::is_degraded`] or the diagnostics rather than assuming
/// completeness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBundle {
    pub product_page: ProductPage,
    pub faq: FaqPage,
    pub questions: QuestionSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison_page: Option<ComparisonPage>,
    pub diagnostics: Vec<StageDiagnostic>,
    pub meta: RunMeta,
}

impl ContentBundle {
    pub fn is_degraded(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.status == StageStatus::Degraded)
    }

    pub fn degraded_stages(&self) -> Vec<StageId> {
        self.diagnostics
            .iter()
            .filter(|d| d.status == StageStatus::Degraded)
            .map(|d| d.stage)
            .collect()
    }
}
