use crate::error::FederationError;
use crate::query_plan::fetch_dependency_graph::FetchDependencyGraph;
use crate::query_plan::operation::{Operation, OperationKind};
use crate::query_plan::ExecutionPlan;
use crate::schema::FusionSchema;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, instrument};

const DEFAULT_CACHE_CAPACITY: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryPlannerConfig {
    /// Maximum number of plans kept by the [`CachingQueryPlanner`].
    ///
    /// Defaults to 512.
    ///
    /// [`CachingQueryPlanner`]: crate::query_plan::caching_query_planner::CachingQueryPlanner
    pub cache_capacity: NonZeroUsize,

    /// Whether independent steps that target the same source schema at the same response path
    /// are merged into one request.
    ///
    /// Defaults to true.
    pub coalesce_sibling_steps: bool,
}

impl Default for QueryPlannerConfig {
    fn default() -> Self {
        Self {
            cache_capacity: NonZeroUsize::new(DEFAULT_CACHE_CAPACITY)
                .unwrap_or(NonZeroUsize::MIN),
            coalesce_sibling_steps: true,
        }
    }
}

/// Builds execution plans for operations against a composed schema.
#[derive(Debug, Clone)]
pub struct QueryPlanner {
    schema: Arc<FusionSchema>,
    config: QueryPlannerConfig,
}

impl QueryPlanner {
    pub fn new(schema: Arc<FusionSchema>, config: QueryPlannerConfig) -> Self {
        Self { schema, config }
    }

    pub fn schema(&self) -> &Arc<FusionSchema> {
        &self.schema
    }

    pub fn config(&self) -> &QueryPlannerConfig {
        &self.config
    }

    /// Validates and normalizes `operation`, then plans it.
    ///
    /// Fails with an `INVALID_OPERATION` error when the operation does not match the client-facing
    /// schema, and with `PLANNING_INVARIANT_VIOLATION` when the schema admits no plan for it,
    /// which satisfiability validation rules out.
    #[instrument(level = "debug", skip_all, fields(operation = ?operation.name))]
    pub fn build_execution_plan(
        &self,
        operation: &Operation,
    ) -> Result<ExecutionPlan, FederationError> {
        let normalized = operation.normalize(&self.schema)?;
        self.plan_normalized(Arc::new(normalized))
    }

    /// Plans an operation already returned by [`Operation::normalize`] for this schema.
    pub(crate) fn plan_normalized(
        &self,
        operation: Arc<Operation>,
    ) -> Result<ExecutionPlan, FederationError> {
        if operation.kind == OperationKind::Subscription {
            return Err(FederationError::invalid_operation(
                "Subscriptions are not supported",
            ));
        }
        let mut graph = FetchDependencyGraph::new(&self.schema, operation.kind);
        graph.plan_operation(&operation)?;
        let steps = graph.into_steps(self.config.coalesce_sibling_steps)?;
        debug!(steps = steps.len(), "built execution plan");
        Ok(ExecutionPlan::new(operation, steps))
    }
}
