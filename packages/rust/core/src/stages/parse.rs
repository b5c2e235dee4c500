//! Input-contract check for the seeded product models.

use tracing::debug;

use contentgen_shared::Result;

use crate::state::{ParsedInput, PipelineState, StageOutput};

/// Validate the seeded models. Any violation is structural and ends the run.
pub fn run(state: &PipelineState) -> Result<StageOutput> {
    state.primary().check()?;
    if let Some(secondary) = state.secondary() {
        secondary.check()?;
    }

    debug!(
        product = %state.primary().product_name,
        compare = state.secondary().is_some(),
        "input models accepted"
    );

    Ok(StageOutput::Parsed(ParsedInput {
        primary: state.primary().clone(),
        secondary: state.secondary().cloned(),
    }))
}
