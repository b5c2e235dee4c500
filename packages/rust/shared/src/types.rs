//! Core domain types: the product input model and job identifiers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ContentGenError, Result};

// ---------------------------------------------------------------------------
// JobId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for job identifiers (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Generate a new time-sortable job identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Price
// ---------------------------------------------------------------------------

/// Supported price currencies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Inr,
    Usd,
    Eur,
}

impl Currency {
    /// Display symbol used in generated copy.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Inr => "₹",
            Self::Usd => "$",
            Self::Eur => "€",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            Self::Inr => "INR",
            Self::Usd => "USD",
            Self::Eur => "EUR",
        };
        f.write_str(code)
    }
}

/// A priced amount.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub amount: f64,
    #[serde(default)]
    pub currency: Currency,
}

impl Price {
    pub fn new(amount: f64, currency: Currency) -> Self {
        Self { amount, currency }
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.currency.symbol(), format_amount(self.amount))
    }
}

/// Render an amount without a trailing `.00` when it is whole.
pub fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{amount:.0}")
    } else {
        format!("{amount:.2}")
    }
}

// ---------------------------------------------------------------------------
// ProductModel
// ---------------------------------------------------------------------------

/// Normalized representation of one product.
///
/// Constructed once by the input collaborator and shared read-only (behind an
/// `Arc`) with every stage of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductModel {
    pub product_name: String,
    #[serde(default)]
    pub concentration: String,
    #[serde(default)]
    pub skin_type: Vec<String>,
    pub key_ingredients: Vec<String>,
    pub benefits: Vec<String>,
    #[serde(default)]
    pub how_to_use: String,
    #[serde(default)]
    pub side_effects: String,
    pub price: Price,
}

impl ProductModel {
    /// Check the input contract. Violations are structural and never retried.
    pub fn check(&self) -> Result<()> {
        if self.product_name.trim().is_empty() {
            return Err(ContentGenError::structural("productName must not be empty"));
        }
        if self.key_ingredients.is_empty() {
            return Err(ContentGenError::structural(format!(
                "{}: keyIngredients must contain at least one item",
                self.product_name
            )));
        }
        if self.benefits.is_empty() {
            return Err(ContentGenError::structural(format!(
                "{}: benefits must contain at least one item",
                self.product_name
            )));
        }
        if !self.price.amount.is_finite() || self.price.amount < 0.0 {
            return Err(ContentGenError::structural(format!(
                "{}: price must be a non-negative number, got {}",
                self.product_name, self.price.amount
            )));
        }
        Ok(())
    }
}
