//! Product JSON loading.
//!
//! Accepts the loose shapes product feeds tend to use: a single string where
//! a list is expected, and a bare number for the price.

use std::path::Path;

use serde::Deserialize;

use contentgen_shared::{ContentGenError, Currency, Price, ProductModel, Result};

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_list(self) -> Vec<String> {
        let items = match self {
            Self::One(item) => vec![item],
            Self::Many(items) => items,
        };
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPrice {
    Amount(f64),
    Full {
        #[serde(default)]
        amount: f64,
        #[serde(default)]
        currency: Currency,
    },
}

impl From<RawPrice> for Price {
    fn from(raw: RawPrice) -> Self {
        match raw {
            RawPrice::Amount(amount) => Price::new(amount, Currency::default()),
            RawPrice::Full { amount, currency } => Price::new(amount, currency),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProduct {
    product_name: String,
    #[serde(default)]
    concentration: String,
    #[serde(default)]
    skin_type: Option<OneOrMany>,
    key_ingredients: OneOrMany,
    benefits: OneOrMany,
    #[serde(default)]
    how_to_use: String,
    #[serde(default)]
    side_effects: String,
    price: RawPrice,
}

impl From<RawProduct> for ProductModel {
    fn from(raw: RawProduct) -> Self {
        ProductModel {
            product_name: raw.product_name.trim().to_string(),
            concentration: raw.concentration.trim().to_string(),
            skin_type: raw.skin_type.map(OneOrMany::into_list).unwrap_or_default(),
            key_ingredients: raw.key_ingredients.into_list(),
            benefits: raw.benefits.into_list(),
            how_to_use: raw.how_to_use.trim().to_string(),
            side_effects: raw.side_effects.trim().to_string(),
            price: raw.price.into(),
        }
    }
}

/// Parse and check one product from JSON text.
pub(crate) fn parse_product(json: &str) -> Result<ProductModel> {
    let raw: RawProduct = serde_json::from_str(json)
        .map_err(|e| ContentGenError::structural(format!("invalid product JSON: {e}")))?;
    let product = ProductModel::from(raw);
    product.check()?;
    Ok(product)
}

/// Read a product file.
pub(crate) fn load_product(path: &Path) -> Result<ProductModel> {
    let content = std::fs::read_to_string(path).map_err(|e| ContentGenError::io(path, e))?;
    parse_product(&content).map_err(|e| match e {
        ContentGenError::Structural { message } => {
            ContentGenError::structural(format!("{}: {message}", path.display()))
        }
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_product_parses() {
        let product = parse_product(
            r#"{
                "productName": "GlowBoost Vitamin C Serum",
                "concentration": "10% Vitamin C",
                "skinType": ["Oily", "Combination"],
                "keyIngredients": ["Vitamin C", "Hyaluronic Acid"],
                "benefits": ["Brightening", "Fades dark spots"],
                "howToUse": "Apply 2–3 drops in the morning before sunscreen",
                "sideEffects": "Mild tingling for sensitive skin",
                "price": {"amount": 699, "currency": "INR"}
            }"#,
        )
        .unwrap();
        assert_eq!(product.skin_type, vec!["Oily", "Combination"]);
        assert_eq!(product.price, Price::new(699.0, Currency::Inr));
    }

    #[test]
    fn loose_shapes_are_normalized() {
        let product = parse_product(
            r#"{
                "productName": " ClearGlow ",
                "skinType": "Oily",
                "keyIngredients": "Niacinamide",
                "benefits": ["Controls oil", "  "],
                "price": 799
            }"#,
        )
        .unwrap();
        assert_eq!(product.product_name, "ClearGlow");
        assert_eq!(product.skin_type, vec!["Oily"]);
        assert_eq!(product.key_ingredients, vec!["Niacinamide"]);
        assert_eq!(product.benefits, vec!["Controls oil"]);
        assert_eq!(product.price.currency, Currency::Inr);
        assert!(product.how_to_use.is_empty());
    }

    #[test]
    fn missing_required_field_is_structural() {
        let err = parse_product(r#"{"productName": "X", "benefits": ["a"], "price": 1}"#)
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("keyIngredients"));
    }

    #[test]
    fn negative_price_is_rejected() {
        let err = parse_product(
            r#"{"productName": "X", "keyIngredients": "a", "benefits": "b", "price": -5}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("non-negative"));
    }
}
