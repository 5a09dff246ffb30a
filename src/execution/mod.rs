//! Runs execution plans against source schemas.
//!
//! The executor keeps the composed data of one request in a single JSON tree owned by the
//! driving task. A step is prepared from that tree once all of its dependencies have been
//! merged into it, then sent on its own future; up to `max_concurrent_steps` futures are polled
//! at once. Responses are merged back as they arrive, so no locking is involved.

mod complete;
mod fetch;
pub mod response;
pub mod transport;

use crate::error::FederationError;
use crate::execution::complete::ResponseCompleter;
use crate::execution::fetch::PreparedStep;
use crate::query_plan::{ExecutionPlan, StepId};
use crate::schema::FusionSchema;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn, Instrument};

pub use response::{GraphQLError, Object, Path, PathElement, Response};
pub use transport::{SubgraphRequest, SubgraphTransport, TransportError};

const DEFAULT_SUBGRAPH_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_CONCURRENT_STEPS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutorConfig {
    /// Time allowed for one request to a source schema. A timed out step is reported as an
    /// error at its path.
    ///
    /// Defaults to 30s.
    #[serde(with = "humantime_serde")]
    pub subgraph_timeout: Duration,

    /// Maximum number of steps of one plan in flight at once.
    ///
    /// Defaults to 16.
    pub max_concurrent_steps: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            subgraph_timeout: DEFAULT_SUBGRAPH_TIMEOUT,
            max_concurrent_steps: DEFAULT_MAX_CONCURRENT_STEPS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutionError {
    /// The request was cancelled. No partial response is produced.
    #[error("the request was cancelled")]
    Cancelled,
    #[error(transparent)]
    Federation(#[from] FederationError),
}

/// Executes plans built for `schema`. Cheap to clone, and shared by concurrent requests.
#[derive(Clone)]
pub struct Executor {
    schema: Arc<FusionSchema>,
    transport: Arc<dyn SubgraphTransport>,
    config: ExecutorConfig,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("config", &self.config)
            .finish()
    }
}

impl Executor {
    pub fn new(
        schema: Arc<FusionSchema>,
        transport: Arc<dyn SubgraphTransport>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            schema,
            transport,
            config,
        }
    }

    /// Runs `plan` with the client's `variables`.
    ///
    /// Step failures become errors of the response and null the fields the step was meant to
    /// resolve. Only cancellation fails the whole request: in-flight requests are dropped and
    /// their transports are notified through a child of `cancellation`.
    #[instrument(skip_all, fields(steps = plan.len()))]
    pub async fn execute(
        &self,
        plan: &ExecutionPlan,
        variables: &Object,
        cancellation: &CancellationToken,
    ) -> Result<Response, ExecutionError> {
        let operation = plan.operation();
        let dependents = plan.dependents();
        let mut pending: Vec<usize> = plan
            .steps()
            .iter()
            .map(|step| step.depends_on.len())
            .collect();
        let mut ready: VecDeque<StepId> = plan
            .steps()
            .iter()
            .filter(|step| step.depends_on.is_empty())
            .map(|step| step.id)
            .collect();
        let mut data = Value::Object(Object::new());
        let mut errors: Vec<GraphQLError> = Vec::new();
        let mut in_flight = FuturesUnordered::new();
        let max_concurrent_steps = self.config.max_concurrent_steps.max(1);

        loop {
            while in_flight.len() < max_concurrent_steps {
                let Some(id) = ready.pop_front() else {
                    break;
                };
                let step = plan.step(id).ok_or_else(|| {
                    FederationError::internal(format!("Step {id} does not exist"))
                })?;
                match fetch::prepare(&self.schema, operation, step, &data, variables)? {
                    Some(prepared) => in_flight.push(self.send(id, prepared, cancellation)),
                    None => {
                        debug!(step = %id, "no object needs the step, skipping it");
                        release(id, &dependents, &mut pending, &mut ready);
                    }
                }
            }
            if in_flight.is_empty() {
                if ready.is_empty() {
                    break;
                }
                continue;
            }

            let (id, prepared, outcome) = tokio::select! {
                biased;
                _ = cancellation.cancelled() => {
                    debug!("request cancelled");
                    return Err(ExecutionError::Cancelled);
                }
                Some(done) = in_flight.next() => done,
            };
            if let Err(error) = &outcome {
                warn!(step = %id, %error, "step failed");
            }
            fetch::apply(&prepared, outcome, &mut data, &mut errors);
            release(id, &dependents, &mut pending, &mut ready);
        }

        if cancellation.is_cancelled() {
            return Err(ExecutionError::Cancelled);
        }
        let data = ResponseCompleter::new(&self.schema, &mut errors).complete(operation, &data)?;
        Ok(Response { data, errors })
    }

    fn send(
        &self,
        id: StepId,
        prepared: PreparedStep,
        cancellation: &CancellationToken,
    ) -> impl std::future::Future<Output = (StepId, PreparedStep, Result<Value, TransportError>)>
    {
        let transport = self.transport.clone();
        let timeout = self.config.subgraph_timeout;
        let token = cancellation.child_token();
        let span = tracing::debug_span!(
            "subgraph_request",
            step = %id,
            subgraph = %prepared.request.subgraph_name
        );
        async move {
            let subgraph = prepared.request.subgraph_name.clone();
            let outcome =
                match tokio::time::timeout(timeout, transport.send(prepared.request.clone(), token))
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => Err(TransportError::Timeout { subgraph, timeout }),
                };
            (id, prepared, outcome)
        }
        .instrument(span)
    }
}

/// Marks `id` as done and queues the dependents it was the last dependency of.
fn release(
    id: StepId,
    dependents: &[Vec<StepId>],
    pending: &mut [usize],
    ready: &mut VecDeque<StepId>,
) {
    for dependent in dependents.get(id.index()).into_iter().flatten() {
        if let Some(count) = pending.get_mut(dependent.index()) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                ready.push_back(*dependent);
            }
        }
    }
}
