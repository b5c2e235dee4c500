//! Declarative fragment schemas and the validator.
//!
//! A schema lists fields with a [`FieldKind`]; arrays carry a minimum length
//! and an optional item kind, objects carry a nested [`Schema`]. Violations
//! are split into structural ones (missing, null, wrong type, value outside
//! an enum) and threshold ones (too few items, empty text). A degraded
//! placeholder fragment is structurally sound but breaks thresholds.

use serde::Serialize;
use serde_json::Value;

use contentgen_shared::{ContentGenError, PipelineConfig, Result};

use crate::fragments::QuestionCategory;
use crate::state::StageId;

#[derive(Debug, Clone)]
pub enum FieldKind {
    /// Any string, including empty.
    String,
    /// String with at least one non-whitespace character.
    Text,
    Number,
    Integer,
    /// String restricted to a fixed set of values.
    OneOf(Vec<String>),
    Array {
        min_items: usize,
        items: Option<Box<FieldKind>>,
    },
    Object(Schema),
}

impl FieldKind {
    pub fn array(min_items: usize, items: FieldKind) -> Self {
        Self::Array {
            min_items,
            items: Some(Box::new(items)),
        }
    }

    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::OneOf(values.into_iter().map(Into::into).collect())
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::String | Self::Text | Self::OneOf(_) => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Array { .. } => "array",
            Self::Object(_) => "object",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldRule {
    pub name: String,
    pub kind: FieldKind,
    /// Whether `null` is acceptable. Absent fields are always violations.
    pub nullable: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub name: String,
    pub fields: Vec<FieldRule>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add a required, non-null field.
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldRule {
            name: name.into(),
            kind,
            nullable: false,
        });
        self
    }

    /// Add a required field that may be `null`.
    pub fn nullable(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldRule {
            name: name.into(),
            kind,
            nullable: true,
        });
        self
    }

    /// Validate a JSON value against this schema.
    pub fn validate(&self, value: &Value) -> ValidationResult {
        let mut violations = Vec::new();
        check_object(self, value, "", &mut violations);
        ValidationResult { violations }
    }

    /// Serialize `fragment` and validate it.
    pub fn validate_fragment<T: Serialize>(&self, fragment: &T) -> Result<ValidationResult> {
        let value = serde_json::to_value(fragment).map_err(|e| {
            ContentGenError::state(format!("{} fragment is not serializable: {e}", self.name))
        })?;
        Ok(self.validate(&value))
    }
}

// ---------------------------------------------------------------------------
// Violations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    Missing,
    Null,
    WrongType { expected: &'static str },
    NotAllowed { value: String },
    TooFew { min: usize, found: usize },
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Dotted path, e.g. `faqs[2].answer`.
    pub path: String,
    pub kind: ViolationKind,
}

impl Violation {
    /// Shape problems, as opposed to business thresholds.
    pub fn is_structural(&self) -> bool {
        matches!(
            self.kind,
            ViolationKind::Missing
                | ViolationKind::Null
                | ViolationKind::WrongType { .. }
                | ViolationKind::NotAllowed { .. }
        )
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ViolationKind::Missing => write!(f, "{}: missing", self.path),
            ViolationKind::Null => write!(f, "{}: null", self.path),
            ViolationKind::WrongType { expected } => {
                write!(f, "{}: expected {expected}", self.path)
            }
            ViolationKind::NotAllowed { value } => {
                write!(f, "{}: '{value}' is not an allowed value", self.path)
            }
            ViolationKind::TooFew { min, found } => {
                write!(f, "{}: {found} items, need at least {min}", self.path)
            }
            ViolationKind::Empty => write!(f, "{}: empty", self.path),
        }
    }
}

/// Outcome of one validation. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    violations: Vec<Violation>,
}

impl ValidationResult {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// No structural violations (thresholds may still fail).
    pub fn structurally_valid(&self) -> bool {
        self.violations.iter().all(|v| !v.is_structural())
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn messages(&self) -> Vec<String> {
        self.violations.iter().map(ToString::to_string).collect()
    }

    /// Collapse into a retryable validation error.
    pub fn into_error(self, schema: &str) -> ContentGenError {
        ContentGenError::validation(format!("{schema}: {}", self.messages().join("; ")))
    }
}

// ---------------------------------------------------------------------------
// Checking
// ---------------------------------------------------------------------------

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn check_object(schema: &Schema, value: &Value, path: &str, out: &mut Vec<Violation>) {
    let Some(map) = value.as_object() else {
        out.push(Violation {
            path: if path.is_empty() { "$".into() } else { path.into() },
            kind: ViolationKind::WrongType { expected: "object" },
        });
        return;
    };

    for rule in &schema.fields {
        let field_path = join(path, &rule.name);
        match map.get(&rule.name) {
            None => out.push(Violation {
                path: field_path,
                kind: ViolationKind::Missing,
            }),
            Some(Value::Null) if rule.nullable => {}
            Some(Value::Null) => out.push(Violation {
                path: field_path,
                kind: ViolationKind::Null,
            }),
            Some(v) => check_value(&rule.kind, v, &field_path, out),
        }
    }
}

fn check_value(kind: &FieldKind, value: &Value, path: &str, out: &mut Vec<Violation>) {
    let wrong_type = |out: &mut Vec<Violation>| {
        out.push(Violation {
            path: path.to_string(),
            kind: ViolationKind::WrongType {
                expected: kind.type_name(),
            },
        })
    };

    match kind {
        FieldKind::String => {
            if !value.is_string() {
                wrong_type(out);
            }
        }
        FieldKind::Text => match value.as_str() {
            Some(s) if s.trim().is_empty() => out.push(Violation {
                path: path.to_string(),
                kind: ViolationKind::Empty,
            }),
            Some(_) => {}
            None => wrong_type(out),
        },
        FieldKind::Number => {
            if !value.is_number() {
                wrong_type(out);
            }
        }
        FieldKind::Integer => {
            if !(value.is_u64() || value.is_i64()) {
                wrong_type(out);
            }
        }
        FieldKind::OneOf(allowed) => match value.as_str() {
            Some(s) if allowed.iter().any(|a| a == s) => {}
            Some(s) => out.push(Violation {
                path: path.to_string(),
                kind: ViolationKind::NotAllowed { value: s.to_string() },
            }),
            None => wrong_type(out),
        },
        FieldKind::Array { min_items, items } => {
            let Some(array) = value.as_array() else {
                wrong_type(out);
                return;
            };
            if array.len() < *min_items {
                out.push(Violation {
                    path: path.to_string(),
                    kind: ViolationKind::TooFew {
                        min: *min_items,
                        found: array.len(),
                    },
                });
            }
            if let Some(item_kind) = items {
                for (i, item) in array.iter().enumerate() {
                    let item_path = format!("{path}[{i}]");
                    if item.is_null() {
                        out.push(Violation {
                            path: item_path,
                            kind: ViolationKind::Null,
                        });
                    } else {
                        check_value(item_kind, item, &item_path, out);
                    }
                }
            }
        }
        FieldKind::Object(schema) => check_object(schema, value, path, out),
    }
}

// ---------------------------------------------------------------------------
// Fragment schemas
// ---------------------------------------------------------------------------

/// The schema for every supervised stage, built from configured thresholds.
#[derive(Debug, Clone)]
pub struct SchemaSet {
    pub questions: Schema,
    pub faq: Schema,
    pub product_page: Schema,
    pub comparison_page: Schema,
}

impl SchemaSet {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            questions: questions_schema(config.min_questions),
            faq: faq_schema(config.min_faqs),
            product_page: product_page_schema(),
            comparison_page: comparison_page_schema(),
        }
    }

    pub fn for_stage(&self, stage: StageId) -> Option<&Schema> {
        match stage {
            StageId::Questions => Some(&self.questions),
            StageId::Faq => Some(&self.faq),
            StageId::Description => Some(&self.product_page),
            StageId::Comparison => Some(&self.comparison_page),
            _ => None,
        }
    }
}

fn categories() -> FieldKind {
    FieldKind::one_of(QuestionCategory::ALL.iter().map(|c| c.as_str()))
}

fn price_schema() -> Schema {
    Schema::new("price")
        .field("amount", FieldKind::Number)
        .field("currency", FieldKind::one_of(["INR", "USD", "EUR"]))
}

pub fn questions_schema(min_questions: usize) -> Schema {
    let question = Schema::new("question")
        .field("id", FieldKind::Text)
        .field("category", categories())
        .field("question", FieldKind::Text);

    Schema::new("questions")
        .field("productName", FieldKind::Text)
        .field(
            "questions",
            FieldKind::array(min_questions, FieldKind::Object(question)),
        )
}

pub fn faq_schema(min_faqs: usize) -> Schema {
    let entry = Schema::new("faq")
        .field("id", FieldKind::Text)
        .field("category", categories())
        .field("question", FieldKind::Text)
        .field("answer", FieldKind::Text);

    Schema::new("faq")
        .field("productName", FieldKind::Text)
        .field("faqs", FieldKind::array(min_faqs, FieldKind::Object(entry)))
}

pub fn product_page_schema() -> Schema {
    let benefits = Schema::new("benefits")
        .field("list", FieldKind::array(1, FieldKind::Text))
        .field("primary", FieldKind::Text)
        .field("count", FieldKind::Integer);

    let usage = Schema::new("usage")
        .field("instructions", FieldKind::String)
        .nullable("frequency", FieldKind::String)
        .nullable("quantity", FieldKind::String)
        .nullable("timing", FieldKind::String);

    Schema::new("product_page")
        .field("productName", FieldKind::Text)
        .field("summary", FieldKind::Text)
        .field("concentration", FieldKind::String)
        .field("skinType", FieldKind::array(0, FieldKind::String))
        .field("keyIngredients", FieldKind::array(1, FieldKind::Text))
        .field("primaryActive", FieldKind::Text)
        .field("benefits", FieldKind::Object(benefits))
        .field("usage", FieldKind::Object(usage))
        .field("sideEffects", FieldKind::String)
        .field("price", FieldKind::Object(price_schema()))
}

pub fn comparison_page_schema() -> Schema {
    let summary = || {
        Schema::new("product")
            .field("name", FieldKind::Text)
            .field("concentration", FieldKind::String)
            .field("keyIngredients", FieldKind::array(1, FieldKind::Text))
            .field("benefits", FieldKind::array(1, FieldKind::Text))
            .field("price", FieldKind::Object(price_schema()))
    };

    let strings = || FieldKind::array(0, FieldKind::String);
    let comparison = Schema::new("comparison")
        .field("commonIngredients", strings())
        .field("uniqueToA", strings())
        .field("uniqueToB", strings())
        .field("commonBenefits", strings())
        .field("priceDifference", FieldKind::Number)
        .field("cheaperProduct", FieldKind::one_of(["productA", "productB"]))
        .field("recommendation", FieldKind::Text);

    Schema::new("comparison_page")
        .field("productA", FieldKind::Object(summary()))
        .field("productB", FieldKind::Object(summary()))
        .field("comparison", FieldKind::Object(comparison))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn faq_entry(i: usize) -> Value {
        json!({
            "id": format!("faq-{i:03}"),
            "category": "usage",
            "question": "How do I use it?",
            "answer": "Apply two drops."
        })
    }

    #[test]
    fn complete_fragment_passes() {
        let schema = faq_schema(5);
        let value = json!({
            "productName": "GlowBoost",
            "faqs": (1..=5).map(faq_entry).collect::<Vec<_>>()
        });
        let result = schema.validate(&value);
        assert!(result.passed(), "{:?}", result.messages());
    }

    #[test]
    fn short_list_fails_threshold_only() {
        let schema = faq_schema(5);
        let value = json!({
            "productName": "GlowBoost",
            "faqs": (1..=3).map(faq_entry).collect::<Vec<_>>()
        });
        let result = schema.validate(&value);
        assert!(!result.passed());
        assert!(result.structurally_valid());
        assert_eq!(
            result.violations()[0].kind,
            ViolationKind::TooFew { min: 5, found: 3 }
        );
    }

    #[test]
    fn empty_list_is_structurally_valid() {
        let result = faq_schema(5).validate(&json!({"productName": "X", "faqs": []}));
        assert!(result.structurally_valid());
        assert!(!result.passed());
    }

    #[test]
    fn missing_and_wrong_type_are_structural() {
        let result = faq_schema(0).validate(&json!({"faqs": "nope"}));
        let messages = result.messages();
        assert!(!result.structurally_valid());
        assert!(messages.contains(&"productName: missing".to_string()));
        assert!(messages.contains(&"faqs: expected array".to_string()));
    }

    #[test]
    fn nested_paths_point_at_the_item() {
        let value = json!({
            "productName": "GlowBoost",
            "faqs": [faq_entry(1), {"id": "faq-002", "category": "gossip", "question": "Q", "answer": " "}]
        });
        let result = faq_schema(1).validate(&value);
        let messages = result.messages();
        assert!(messages.contains(&"faqs[1].category: 'gossip' is not an allowed value".to_string()));
        assert!(messages.contains(&"faqs[1].answer: empty".to_string()));
    }

    #[test]
    fn nullable_fields_accept_null() {
        let schema = Schema::new("t")
            .nullable("timing", FieldKind::String)
            .field("count", FieldKind::Integer);
        assert!(schema.validate(&json!({"timing": null, "count": 2})).passed());

        let result = schema.validate(&json!({"timing": null, "count": null}));
        assert_eq!(result.violations()[0].kind, ViolationKind::Null);
    }

    #[test]
    fn non_object_root() {
        let result = questions_schema(1).validate(&json!([1, 2]));
        assert_eq!(result.messages(), vec!["$: expected object".to_string()]);
    }

    #[test]
    fn thresholds_come_from_config() {
        let mut config = PipelineConfig::default();
        config.min_questions = 2;
        let set = SchemaSet::from_config(&config);
        let value = json!({
            "productName": "X",
            "questions": [
                {"id": "q-001", "category": "safety", "question": "Safe?"},
                {"id": "q-002", "category": "usage", "question": "How?"}
            ]
        });
        assert!(set.questions.validate(&value).passed());
        assert!(set.for_stage(StageId::Parse).is_none());
    }
}
