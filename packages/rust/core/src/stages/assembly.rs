//! Bundle the recorded fragments into the run's final output.

use contentgen_shared::Result;

use crate::fragments::{ContentBundle, RunMeta, StageDiagnostic};
use crate::state::PipelineState;

/// Collect every content fragment from `state`.
///
/// Fails with a state error if a required stage never wrote. The comparison
/// page is optional.
pub fn run(
    state: &PipelineState,
    diagnostics: Vec<StageDiagnostic>,
    meta: RunMeta,
) -> Result<ContentBundle> {
    Ok(ContentBundle {
        product_page: state.description()?.clone(),
        faq: state.faq()?.clone(),
        questions: state.questions()?.clone(),
        comparison_page: state.comparison().cloned(),
        diagnostics,
        meta,
    })
}
