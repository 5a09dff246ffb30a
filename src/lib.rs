//! Composition, satisfiability validation, query planning and execution for federated GraphQL.
//!
//! Independently owned source schemas are merged into one [`FusionSchema`] by [`compose`],
//! which fails closed unless every field clients can select is resolvable. A
//! [`QueryPlanner`](query_plan::query_planner::QueryPlanner) splits client operations into
//! per-source-schema steps, and an [`Executor`](execution::Executor) runs those steps and
//! stitches their results together.

pub mod composition;
pub mod config;
pub mod error;
pub mod execution;
pub mod merge;
pub mod query_plan;
pub mod schema;
pub mod subgraph;
pub(crate) mod utils;

use crate::composition::diagnostics::CompositionHint;
use crate::composition::CompositionFailure;
use crate::query_plan::caching_query_planner::CachingQueryPlanner;
use crate::query_plan::query_planner::{QueryPlanner, QueryPlannerConfig};
use crate::schema::FusionSchema;
use crate::subgraph::SourceSchema;
use std::sync::Arc;

pub use crate::composition::compose;

/// A composed and validated schema.
#[derive(Debug, Clone)]
pub struct Supergraph {
    schema: Arc<FusionSchema>,
    hints: Vec<CompositionHint>,
}

impl Supergraph {
    pub(crate) fn new(schema: FusionSchema, hints: Vec<CompositionHint>) -> Self {
        Self {
            schema: Arc::new(schema),
            hints,
        }
    }

    /// Shorthand for [`compose`].
    pub fn compose(sources: &[SourceSchema]) -> Result<Self, CompositionFailure> {
        compose(sources)
    }

    pub fn schema(&self) -> &Arc<FusionSchema> {
        &self.schema
    }

    /// Non-fatal observations made while composing.
    pub fn hints(&self) -> &[CompositionHint] {
        &self.hints
    }

    /// The client-facing SDL.
    pub fn to_api_schema(&self) -> String {
        self.schema.print_api_schema()
    }

    pub fn query_planner(&self, config: QueryPlannerConfig) -> QueryPlanner {
        QueryPlanner::new(self.schema.clone(), config)
    }

    pub fn caching_query_planner(&self, config: QueryPlannerConfig) -> CachingQueryPlanner {
        CachingQueryPlanner::new(self.schema.clone(), config)
    }
}
