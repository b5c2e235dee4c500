//! Logic blocks: pure, deterministic facts derived from product models.
//!
//! Nothing in this crate performs I/O or keeps state. Every function either
//! returns the same facts for the same input or fails with a structural
//! error when the input breaks its contract.

pub mod benefits;
pub mod comparison;
pub mod ingredients;
pub mod usage;

use serde::{Deserialize, Serialize};
use tracing::debug;

use contentgen_shared::{ProductModel, Result};

pub use benefits::{BenefitFacts, extract_benefits};
pub use comparison::{ComparisonFacts, ProductSlot, compare};
pub use ingredients::{IngredientFacts, extract_ingredients};
pub use usage::{UsageFacts, extract_usage};

/// All single-product facts, computed together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFacts {
    pub benefits: BenefitFacts,
    pub usage: UsageFacts,
    pub ingredients: IngredientFacts,
}

/// Run every single-product block over `product`.
pub fn analyze(product: &ProductModel) -> Result<ProductFacts> {
    let facts = ProductFacts {
        benefits: extract_benefits(product)?,
        usage: extract_usage(product),
        ingredients: extract_ingredients(product)?,
    };
    debug!(
        product = %product.product_name,
        benefits = facts.benefits.benefit_count,
        primary_active = %facts.ingredients.primary_active,
        "derived product facts"
    );
    Ok(facts)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use contentgen_shared::{Currency, Price, ProductModel};

    pub fn glowboost() -> ProductModel {
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

    pub fn clearglow() -> ProductModel {
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyze_collects_all_blocks() {
        let facts = analyze(&fixtures::glowboost()).unwrap();
        assert_eq!(facts.benefits.benefit_count, 2);
        assert_eq!(facts.usage.quantity.as_deref(), Some("2–3 drops"));
        assert_eq!(facts.ingredients.primary_active, "Vitamin C");
    }

    #[test]
    fn analyze_is_deterministic() {
        let product = fixtures::clearglow();
        assert_eq!(analyze(&product).unwrap(), analyze(&product).unwrap());
    }
}
