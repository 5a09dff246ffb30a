pub mod diagnostics;
pub mod satisfiability;

use crate::error::{FederationError, MultipleFederationErrors, SingleFederationError};
use crate::merge::{merge, MergeFailure, MergeSuccess};
use crate::subgraph::SourceSchema;
use crate::Supergraph;
use diagnostics::CompositionHint;
use satisfiability::validate_satisfiability;
use std::fmt::{Display, Formatter};
use tracing::{info, instrument, warn};

/// Composition failed: the schema must not be served.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionFailure {
    pub errors: Vec<SingleFederationError>,
    pub hints: Vec<CompositionHint>,
}

impl Display for CompositionFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let errors: MultipleFederationErrors = self.errors.iter().cloned().collect();
        write!(f, "Composition failed. {errors}")
    }
}

impl std::error::Error for CompositionFailure {}

impl From<MergeFailure> for CompositionFailure {
    fn from(failure: MergeFailure) -> Self {
        Self {
            errors: failure.errors,
            hints: failure.hints,
        }
    }
}

impl From<CompositionFailure> for FederationError {
    fn from(failure: CompositionFailure) -> Self {
        failure
            .errors
            .into_iter()
            .collect::<MultipleFederationErrors>()
            .into()
    }
}

/// Merges the source schemas and validates that the result is satisfiable.
#[instrument(skip_all, fields(source_schemas = sources.len()))]
pub fn compose(sources: &[SourceSchema]) -> Result<Supergraph, CompositionFailure> {
    let MergeSuccess { schema, hints } = merge(sources)?;
    for hint in &hints {
        warn!(code = %hint.code, "{}", hint.message);
    }
    if let Err(errors) = validate_satisfiability(&schema) {
        return Err(CompositionFailure {
            errors: errors.into_iter().map(Into::into).collect(),
            hints,
        });
    }
    info!(
        types = schema.types().count(),
        hints = hints.len(),
        version = schema.version(),
        "composed schema"
    );
    Ok(Supergraph::new(schema, hints))
}
