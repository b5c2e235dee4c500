//! Two-product comparison facts.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use contentgen_shared::{ContentGenError, Price, ProductModel, Result};

/// Which side of a comparison a product sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProductSlot {
    ProductA,
    ProductB,
}

impl ProductSlot {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProductA => "productA",
            Self::ProductB => "productB",
        }
    }
}

/// Deterministic comparison facts. Set-valued fields are sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonFacts {
    pub product_a: String,
    pub product_b: String,
    pub common_ingredients: Vec<String>,
    pub unique_to_a: Vec<String>,
    pub unique_to_b: Vec<String>,
    pub common_benefits: Vec<String>,
    pub unique_benefits_a: Vec<String>,
    pub unique_benefits_b: Vec<String>,
    pub price_a: Price,
    pub price_b: Price,
    /// `|price_a - price_b|`
    pub price_difference: f64,
    /// Ties resolve to [`ProductSlot::ProductA`].
    pub cheaper_product: ProductSlot,
    pub prices_equal: bool,
}

impl ComparisonFacts {
    /// Name of the cheaper product.
    pub fn cheaper_name(&self) -> &str {
        match self.cheaper_product {
            ProductSlot::ProductA => &self.product_a,
            ProductSlot::ProductB => &self.product_b,
        }
    }
}

/// Compare two products.
///
/// Prices in different currencies cannot be compared and are a structural
/// fault.
pub fn compare(a: &ProductModel, b: &ProductModel) -> Result<ComparisonFacts> {
    if a.price.currency != b.price.currency {
        return Err(ContentGenError::structural(format!(
            "cannot compare prices in {} and {}",
            a.price.currency, b.price.currency
        )));
    }

    let (common_ingredients, unique_to_a, unique_to_b) =
        partition(&a.key_ingredients, &b.key_ingredients);
    let (common_benefits, unique_benefits_a, unique_benefits_b) =
        partition(&a.benefits, &b.benefits);

    let price_difference = (a.price.amount - b.price.amount).abs();
    let cheaper_product = if b.price.amount < a.price.amount {
        ProductSlot::ProductB
    } else {
        ProductSlot::ProductA
    };

    Ok(ComparisonFacts {
        product_a: a.product_name.clone(),
        product_b: b.product_name.clone(),
        common_ingredients,
        unique_to_a,
        unique_to_b,
        common_benefits,
        unique_benefits_a,
        unique_benefits_b,
        price_a: a.price,
        price_b: b.price,
        price_difference,
        cheaper_product,
        prices_equal: price_difference == 0.0,
    })
}

/// Split two lists into sorted (common, only-left, only-right).
fn partition(left: &[String], right: &[String]) -> (Vec<String>, Vec<String>, Vec<String>) {
    let left: BTreeSet<&str> = left.iter().map(|s| s.trim()).filter(|s| !s.is_empty()).collect();
    let right: BTreeSet<&str> = right.iter().map(|s| s.trim()).filter(|s| !s.is_empty()).collect();

    (
        left.intersection(&right).map(|s| s.to_string()).collect(),
        left.difference(&right).map(|s| s.to_string()).collect(),
        right.difference(&left).map(|s| s.to_string()).collect(),
    )
}
