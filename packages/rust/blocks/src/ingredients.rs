//! Ingredient and concentration extraction.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use contentgen_shared::{ContentGenError, ProductModel, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngredientFacts {
    pub ingredient_list: Vec<String>,
    pub ingredient_count: usize,
    /// The first ingredient, else the active named by the concentration (`10% Vitamin C`).
    pub primary_active: String,
    /// Leading percentage of the concentration string, e.g. `10%`.
    pub concentration: Option<String>,
}

static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?%)").expect("valid regex"));

static ACTIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?%\s+(.+)").expect("valid regex"));

pub fn extract_ingredients(product: &ProductModel) -> Result<IngredientFacts> {
    let ingredient_list: Vec<String> = product
        .key_ingredients
        .iter()
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .collect();

    let concentration = PERCENT_RE
        .captures(&product.concentration)
        .map(|caps| caps[1].to_string());

    let primary_active = ingredient_list
        .first()
        .cloned()
        .or_else(|| {
            ACTIVE_RE
                .captures(&product.concentration)
                .map(|caps| caps[1].trim().to_string())
                .filter(|active| !active.is_empty())
        })
        .ok_or_else(|| {
            ContentGenError::structural(format!(
                "{}: no key ingredients and no active named in the concentration",
                product.product_name
            ))
        })?;

    Ok(IngredientFacts {
        ingredient_count: ingredient_list.len(),
        ingredient_list,
        primary_active,
        concentration,
    })
}
