use crate::error::FederationError;
use crate::query_plan::operation::Operation;
use crate::query_plan::query_planner::{QueryPlanner, QueryPlannerConfig};
use crate::query_plan::ExecutionPlan;
use crate::schema::FusionSchema;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// A query planner wrapper that caches plans.
///
/// Plans are keyed by the schema version and the normalized operation, so operations differing
/// only in formatting, field order of merged selections or unused fragments share a plan. The
/// cache is LRU with the capacity of [`QueryPlannerConfig::cache_capacity`]. Planning errors are
/// not cached.
pub struct CachingQueryPlanner {
    planner: RwLock<QueryPlanner>,
    cache: Mutex<LruCache<String, Arc<ExecutionPlan>>>,
}

impl fmt::Debug for CachingQueryPlanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingQueryPlanner")
            .field("len", &self.len())
            .finish()
    }
}

impl CachingQueryPlanner {
    pub fn new(schema: Arc<FusionSchema>, config: QueryPlannerConfig) -> Self {
        let capacity = config.cache_capacity;
        Self {
            planner: RwLock::new(QueryPlanner::new(schema, config)),
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns the cached plan for `operation`, planning it on a miss.
    pub fn plan(&self, operation: &Operation) -> Result<Arc<ExecutionPlan>, FederationError> {
        let planner = self.planner.read().clone();
        let normalized = operation.normalize(planner.schema())?;
        let key = cache_key(planner.schema().version(), &normalized);
        if let Some(plan) = self.cache.lock().get(&key).cloned() {
            trace!(%key, "query plan cache hit");
            return Ok(plan);
        }
        trace!(%key, "query plan cache miss");
        let plan = Arc::new(planner.plan_normalized(Arc::new(normalized))?);
        self.cache.lock().put(key, plan.clone());
        Ok(plan)
    }

    /// Replaces the schema plans are built for. Cached plans are dropped.
    pub fn update_schema(&self, schema: Arc<FusionSchema>) {
        let mut planner = self.planner.write();
        *planner = QueryPlanner::new(schema, planner.config().clone());
        self.cache.lock().clear();
    }

    pub fn schema(&self) -> Arc<FusionSchema> {
        self.planner.read().schema().clone()
    }

    /// Number of cached plans.
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn cache_key(schema_version: &str, operation: &Operation) -> String {
    let mut hasher = Sha256::new();
    hasher.update(schema_version.as_bytes());
    hasher.update([0]);
    hasher.update(operation.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_plan::operation::{Field, SelectionSet};

    #[test]
    fn keys_depend_on_schema_version_and_operation() {
        let operation =
            Operation::query(SelectionSet::new([Field::new("product").into()])).named("Q");
        let other = Operation::query(SelectionSet::new([Field::new("products").into()]));
        assert_eq!(cache_key("v1", &operation), cache_key("v1", &operation.clone()));
        assert_ne!(cache_key("v1", &operation), cache_key("v2", &operation));
        assert_ne!(cache_key("v1", &operation), cache_key("v1", &other));
    }
}
