//! Benefit extraction.

use serde::{Deserialize, Serialize};

use contentgen_shared::{ContentGenError, ProductModel, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenefitFacts {
    /// Benefits in input order.
    pub benefit_list: Vec<String>,
    pub benefit_count: usize,
    pub primary_benefit: String,
}

/// Extract the benefit list and its headline benefit.
pub fn extract_benefits(product: &ProductModel) -> Result<BenefitFacts> {
    let benefit_list: Vec<String> = product
        .benefits
        .iter()
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .collect();

    let primary_benefit = benefit_list.first().cloned().ok_or_else(|| {
        ContentGenError::structural(format!("{}: no benefits to extract", product.product_name))
    })?;

    Ok(BenefitFacts {
        benefit_count: benefit_list.len(),
        primary_benefit,
        benefit_list,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::glowboost;

    #[test]
    fn first_benefit_is_primary() {
        let facts = extract_benefits(&glowboost()).unwrap();
        assert_eq!(facts.primary_benefit, "Brightening");
        assert_eq!(facts.benefit_count, 2);
        assert_eq!(facts.benefit_list[1], "Fades dark spots");
    }

    #[test]
    fn blank_entries_are_dropped() {
        let mut product = glowboost();
        product.benefits = vec!["  ".into(), "Hydration ".into()];
        let facts = extract_benefits(&product).unwrap();
        assert_eq!(facts.benefit_list, vec!["Hydration".to_string()]);
    }

    #[test]
    fn empty_benefits_are_structural() {
        let mut product = glowboost();
        product.benefits.clear();
        let err = extract_benefits(&product).unwrap_err();
        assert!(matches!(err, ContentGenError::Structural { .. }));
    }
}
