//! Logic-block stage: derive every deterministic fact once per run.

use contentgen_blocks::{analyze, compare};
use contentgen_shared::Result;

use crate::state::{LogicFacts, PipelineState, StageOutput};

pub fn run(state: &PipelineState) -> Result<StageOutput> {
    let parsed = state.parsed()?;

    let primary = analyze(&parsed.primary)?;
    let (secondary, comparison) = match &parsed.secondary {
        Some(other) => (
            Some(analyze(other)?),
            Some(compare(&parsed.primary, other)?),
        ),
        None => (None, None),
    };

    Ok(StageOutput::Logic(LogicFacts {
        primary,
        secondary,
        comparison,
    }))
}
