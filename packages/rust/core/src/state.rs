//! Append-only, per-run pipeline state.
//!
//! Each stage writes exactly one [`StageOutput`] under its own [`StageId`].
//! Writes are final: a second write for the same stage is a fatal state
//! error. Readers use the typed getters and name exactly the variant they
//! expect.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use contentgen_blocks::{ComparisonFacts, ProductFacts};
use contentgen_shared::{ContentGenError, ProductModel, Result};

use crate::fragments::{ComparisonPage, FaqPage, ProductPage, QuestionSet};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageId {
    Parse,
    Logic,
    Questions,
    Faq,
    Description,
    Comparison,
    Assembly,
}

impl StageId {
    /// Every stage in execution order.
    pub const ORDER: [StageId; 7] = [
        Self::Parse,
        Self::Logic,
        Self::Questions,
        Self::Faq,
        Self::Description,
        Self::Comparison,
        Self::Assembly,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::Logic => "logic",
            Self::Questions => "questions",
            Self::Faq => "faq",
            Self::Description => "description",
            Self::Comparison => "comparison",
            Self::Assembly => "assembly",
        }
    }

    /// State keys this stage reads.
    pub fn reads(self) -> &'static [StageId] {
        match self {
            Self::Parse => &[],
            Self::Logic => &[Self::Parse],
            Self::Questions => &[Self::Parse, Self::Logic],
            Self::Faq => &[Self::Parse, Self::Logic, Self::Questions],
            Self::Description => &[Self::Parse, Self::Logic],
            Self::Comparison => &[Self::Parse, Self::Logic],
            Self::Assembly => &[
                Self::Questions,
                Self::Faq,
                Self::Description,
                Self::Comparison,
            ],
        }
    }

    /// Whether this stage goes through the retry supervisor.
    pub fn is_supervised(self) -> bool {
        matches!(
            self,
            Self::Questions | Self::Faq | Self::Description | Self::Comparison
        )
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated input models.
#[derive(Debug, Clone)]
pub struct ParsedInput {
    pub primary: Arc<ProductModel>,
    pub secondary: Option<Arc<ProductModel>>,
}

/// Logic-block facts for the run.
#[derive(Debug, Clone)]
pub struct LogicFacts {
    pub primary: ProductFacts,
    pub secondary: Option<ProductFacts>,
    pub comparison: Option<ComparisonFacts>,
}

/// One stage's recorded output.
#[derive(Debug, Clone)]
pub enum StageOutput {
    Parsed(ParsedInput),
    Logic(LogicFacts),
    Questions(QuestionSet),
    Faq(FaqPage),
    Description(ProductPage),
    Comparison(ComparisonPage),
}

impl StageOutput {
    pub fn stage(&self) -> StageId {
        match self {
            Self::Parsed(_) => StageId::Parse,
            Self::Logic(_) => StageId::Logic,
            Self::Questions(_) => StageId::Questions,
            Self::Faq(_) => StageId::Faq,
            Self::Description(_) => StageId::Description,
            Self::Comparison(_) => StageId::Comparison,
        }
    }
}

/// State for exactly one run. Never shared between runs.
#[derive(Debug)]
pub struct PipelineState {
    primary: Arc<ProductModel>,
    secondary: Option<Arc<ProductModel>>,
    outputs: BTreeMap<StageId, StageOutput>,
}

impl PipelineState {
    pub fn new(primary: Arc<ProductModel>, secondary: Option<Arc<ProductModel>>) -> Self {
        Self {
            primary,
            secondary,
            outputs: BTreeMap::new(),
        }
    }

    /// Seeded primary model.
    pub fn primary(&self) -> &Arc<ProductModel> {
        &self.primary
    }

    /// Seeded comparison model, if any.
    pub fn secondary(&self) -> Option<&Arc<ProductModel>> {
        self.secondary.as_ref()
    }

    /// Record `output` under its stage. Fails if the stage already wrote.
    pub fn record(&mut self, output: StageOutput) -> Result<()> {
        let stage = output.stage();
        if self.outputs.contains_key(&stage) {
            return Err(ContentGenError::state(format!(
                "stage '{stage}' already wrote its output"
            )));
        }
        self.outputs.insert(stage, output);
        Ok(())
    }

    pub fn contains(&self, stage: StageId) -> bool {
        self.outputs.contains_key(&stage)
    }

    /// Stages written so far, in execution order.
    pub fn written(&self) -> Vec<StageId> {
        self.outputs.keys().copied().collect()
    }

    pub fn parsed(&self) -> Result<&ParsedInput> {
        match self.outputs.get(&StageId::Parse) {
            Some(StageOutput::Parsed(p)) => Ok(p),
            _ => Err(missing(StageId::Parse)),
        }
    }

    pub fn logic(&self) -> Result<&LogicFacts> {
        match self.outputs.get(&StageId::Logic) {
            Some(StageOutput::Logic(l)) => Ok(l),
            _ => Err(missing(StageId::Logic)),
        }
    }

    pub fn questions(&self) -> Result<&QuestionSet> {
        match self.outputs.get(&StageId::Questions) {
            Some(StageOutput::Questions(q)) => Ok(q),
            _ => Err(missing(StageId::Questions)),
        }
    }

    pub fn faq(&self) -> Result<&FaqPage> {
        match self.outputs.get(&StageId::Faq) {
            Some(StageOutput::Faq(f)) => Ok(f),
            _ => Err(missing(StageId::Faq)),
        }
    }

    pub fn description(&self) -> Result<&ProductPage> {
        match self.outputs.get(&StageId::Description) {
            Some(StageOutput::Description(d)) => Ok(d),
            _ => Err(missing(StageId::Description)),
        }
    }

    /// The comparison page, absent when the stage was skipped.
    pub fn comparison(&self) -> Option<&ComparisonPage> {
        match self.outputs.get(&StageId::Comparison) {
            Some(StageOutput::Comparison(c)) => Some(c),
            _ => None,
        }
    }
}

fn missing(stage: StageId) -> ContentGenError {
    ContentGenError::state(format!("stage '{stage}' has not written its output"))
}
