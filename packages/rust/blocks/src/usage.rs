//! Usage-instruction decomposition into quantity, frequency and timing facets.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use contentgen_shared::ProductModel;

/// Facets that could not be found are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageFacts {
    pub usage_instructions: String,
    pub quantity: Option<String>,
    pub frequency: Option<String>,
    pub timing: Option<String>,
}

/// Frequency phrases, most specific first.
const FREQUENCIES: &[&str] = &["morning and evening", "morning", "evening", "night"];

pub fn extract_usage(product: &ProductModel) -> UsageFacts {
    let text = product.how_to_use.trim();

    UsageFacts {
        usage_instructions: text.to_string(),
        quantity: extract_quantity(text),
        frequency: extract_frequency(text),
        timing: extract_timing(text),
    }
}

/// `3 drops`, `2-3 drops`, `2–3 drops`.
fn extract_quantity(text: &str) -> Option<String> {
    static QUANTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)(\d+\s*[–-]\s*\d+\s+drops?|\d+\s+drops?)").expect("valid regex")
    });

    QUANTITY_RE.find(text).map(|m| m.as_str().to_string())
}

fn extract_frequency(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    FREQUENCIES
        .iter()
        .find(|f| lower.contains(*f))
        .map(|f| (*f).to_string())
}

/// `before sunscreen`, `after cleansing`.
fn extract_timing(text: &str) -> Option<String> {
    static TIMING_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)\b(before|after)\s+(\w+)").expect("valid regex")
    });

    TIMING_RE
        .captures(text)
        .map(|caps| format!("{} {}", caps[1].to_lowercase(), &caps[2]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{clearglow, glowboost};

    #[test]
    fn decomposes_ranged_quantity() {
        let facts = extract_usage(&glowboost());
        assert_eq!(facts.quantity.as_deref(), Some("2–3 drops"));
        assert_eq!(facts.frequency.as_deref(), Some("morning"));
        assert_eq!(facts.timing.as_deref(), Some("before sunscreen"));
    }

    #[test]
    fn prefers_combined_frequency() {
        let facts = extract_usage(&clearglow());
        assert_eq!(facts.quantity.as_deref(), Some("3 drops"));
        assert_eq!(facts.frequency.as_deref(), Some("morning and evening"));
        assert_eq!(facts.timing.as_deref(), Some("after cleansing"));
    }

    #[test]
    fn ascii_hyphen_and_case() {
        let mut product = glowboost();
        product.how_to_use = "Use 4-5 Drops at NIGHT".into();
        let facts = extract_usage(&product);
        assert_eq!(facts.quantity.as_deref(), Some("4-5 Drops"));
        assert_eq!(facts.frequency.as_deref(), Some("night"));
        assert_eq!(facts.timing, None);
    }

    #[test]
    fn empty_instructions_yield_no_facets() {
        let mut product = glowboost();
        product.how_to_use = String::new();
        let facts = extract_usage(&product);
        assert!(facts.usage_instructions.is_empty());
        assert_eq!(facts.quantity, None);
        assert_eq!(facts.frequency, None);
        assert_eq!(facts.timing, None);
    }
}
