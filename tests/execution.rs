use async_trait::async_trait;
use fusion_federation::execution::{
    ExecutionError, Executor, ExecutorConfig, Object, Response, SubgraphRequest,
    SubgraphTransport, TransportError,
};
use fusion_federation::query_plan::operation::{Field, Operation, SelectionSet};
use fusion_federation::query_plan::query_planner::QueryPlannerConfig;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::fixtures;

/// Answers with canned responses per source schema and records the requests it was sent.
#[derive(Default)]
struct MockTransport {
    responses: HashMap<&'static str, Result<Value, TransportError>>,
    requests: Mutex<Vec<SubgraphRequest>>,
}

impl MockTransport {
    fn respond(mut self, subgraph: &'static str, body: Value) -> Self {
        self.responses.insert(subgraph, Ok(body));
        self
    }

    fn fail(mut self, subgraph: &'static str, message: &str) -> Self {
        self.responses.insert(
            subgraph,
            Err(TransportError::Connection {
                subgraph: subgraph.to_string(),
                message: message.to_string(),
            }),
        );
        self
    }

    fn request(&self, subgraph: &str) -> SubgraphRequest {
        self.requests
            .lock()
            .iter()
            .find(|request| request.subgraph_name == subgraph)
            .cloned()
            .unwrap_or_else(|| panic!("no request was sent to {subgraph}"))
    }
}

#[async_trait]
impl SubgraphTransport for MockTransport {
    async fn send(
        &self,
        request: SubgraphRequest,
        _cancellation: CancellationToken,
    ) -> Result<Value, TransportError> {
        let response = self
            .responses
            .get(request.subgraph_name.as_str())
            .cloned()
            .unwrap_or_else(|| panic!("unexpected request to {}", request.subgraph_name));
        self.requests.lock().push(request);
        response
    }
}

/// Never answers on its own.
struct PendingTransport;

#[async_trait]
impl SubgraphTransport for PendingTransport {
    async fn send(
        &self,
        request: SubgraphRequest,
        cancellation: CancellationToken,
    ) -> Result<Value, TransportError> {
        cancellation.cancelled().await;
        Err(TransportError::Cancelled {
            subgraph: request.subgraph_name,
        })
    }
}

fn top_products(fields: impl IntoIterator<Item = Field>) -> Operation {
    let mut top_products = Field::new("topProducts");
    for field in fields {
        top_products = top_products.selection(field);
    }
    Operation::query(SelectionSet::new([top_products.into()]))
}

fn parse(source: &str) -> Operation {
    Operation::parse(fixtures::shop().schema(), source, None).unwrap()
}

fn products_response() -> Value {
    json!({"data": {"topProducts": [
        {"__typename": "Product", "name": "Table", "id": "1", "weight": 5},
        {"__typename": "Product", "name": "Chair", "id": "2", "weight": 8}
    ]}})
}

async fn execute(
    transport: Arc<dyn SubgraphTransport>,
    config: ExecutorConfig,
    operation: &Operation,
    variables: Object,
    cancellation: &CancellationToken,
) -> Result<Response, ExecutionError> {
    let supergraph = fixtures::shop();
    let plan = supergraph
        .query_planner(QueryPlannerConfig::default())
        .build_execution_plan(operation)
        .unwrap();
    Executor::new(supergraph.schema().clone(), transport, config)
        .execute(&plan, &variables, cancellation)
        .await
}

fn reviews_and_estimates() -> Operation {
    parse("{ topProducts { name reviews { body } shippingEstimate } }")
}

#[tokio::test]
async fn composes_results_from_every_source_schema() {
    let transport = Arc::new(
        MockTransport::default()
            .respond("products", products_response())
            .respond(
                "reviews",
                json!({"data": {
                    "_e0": {"reviews": [{"body": "Sturdy"}]},
                    "_e1": {"reviews": []}
                }}),
            )
            .respond(
                "inventory",
                json!({"data": {
                    "_e0": [{"shippingEstimate": 10}],
                    "_e1": [{"shippingEstimate": 20}]
                }}),
            ),
    );
    let response = execute(
        transport.clone(),
        ExecutorConfig::default(),
        &reviews_and_estimates(),
        Object::new(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(response.errors, vec![]);
    assert_eq!(
        response.data,
        Some(json!({"topProducts": [
            {"name": "Table", "reviews": [{"body": "Sturdy"}], "shippingEstimate": 10},
            {"name": "Chair", "reviews": [], "shippingEstimate": 20}
        ]}))
    );

    assert_eq!(
        transport.request("products").query,
        "{ topProducts { __typename name id weight } }"
    );
    let reviews = transport.request("reviews");
    assert_eq!(
        reviews.query,
        "query($_e0_id: ID!, $_e1_id: ID!) { _e0: productById(id: $_e0_id) { reviews { body } } \
         _e1: productById(id: $_e1_id) { reviews { body } } }"
    );
    assert_eq!(Value::Object(reviews.variables), json!({"_e0_id": "1", "_e1_id": "2"}));
    assert_eq!(
        Value::Object(transport.request("inventory").variables),
        json!({
            "_e0_r0": 5,
            "_e0_representations": [{"__typename": "Product", "id": "1"}],
            "_e1_r0": 8,
            "_e1_representations": [{"__typename": "Product", "id": "2"}]
        })
    );
}

#[tokio::test]
async fn failed_steps_null_their_fields_only() {
    let transport = Arc::new(
        MockTransport::default()
            .respond("products", products_response())
            .respond(
                "reviews",
                json!({"data": {
                    "_e0": {"reviews": [{"body": "Sturdy"}]},
                    "_e1": {"reviews": []}
                }}),
            )
            .fail("inventory", "connection refused"),
    );
    let response = execute(
        transport,
        ExecutorConfig::default(),
        &reviews_and_estimates(),
        Object::new(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(
        response.data,
        Some(json!({"topProducts": [
            {"name": "Table", "reviews": [{"body": "Sturdy"}], "shippingEstimate": null},
            {"name": "Chair", "reviews": [], "shippingEstimate": null}
        ]}))
    );
    // Every entity the step was sent for gets its own error.
    let paths: Vec<String> = response
        .errors
        .iter()
        .map(|error| error.path.as_ref().map(ToString::to_string).unwrap_or_default())
        .collect();
    assert_eq!(paths, vec!["/topProducts/0", "/topProducts/1"]);
    for error in &response.errors {
        assert_eq!(
            error.message,
            "HTTP fetch failed from 'inventory': connection refused"
        );
        assert_eq!(error.code(), Some("SUBREQUEST_HTTP_ERROR"));
        assert_eq!(error.extensions.get("service"), Some(&json!("inventory")));
    }
}

#[tokio::test]
async fn missing_non_null_fields_null_the_nearest_nullable_parent() {
    let transport = Arc::new(
        MockTransport::default()
            .respond("products", products_response())
            .fail("inventory", "connection refused"),
    );
    let response = execute(
        transport,
        ExecutorConfig::default(),
        &top_products([Field::new("name"), Field::new("inStock")]),
        Object::new(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(response.data, Some(json!({"topProducts": [null, null]})));
    let errors: Vec<(String, String)> = response
        .errors
        .iter()
        .map(|error| {
            (
                error.message.clone(),
                error.path.as_ref().map(ToString::to_string).unwrap_or_default(),
            )
        })
        .collect();
    assert_eq!(
        errors,
        vec![
            (
                "HTTP fetch failed from 'inventory': connection refused".to_string(),
                "/topProducts/0".to_string()
            ),
            (
                "HTTP fetch failed from 'inventory': connection refused".to_string(),
                "/topProducts/1".to_string()
            ),
        ]
    );
}

#[tokio::test]
async fn nulls_in_lookup_results_reach_the_nearest_nullable_field() {
    let transport = Arc::new(
        MockTransport::default()
            .respond("products", products_response())
            .respond(
                "reviews",
                json!({"data": {
                    "_e0": {"reviews": [{"body": "Sturdy"}, {"body": null}]},
                    "_e1": {"reviews": [{"body": "Wobbly"}]}
                }}),
            ),
    );
    let response = execute(
        transport,
        ExecutorConfig::default(),
        &parse("{ topProducts { name reviews { body } } }"),
        Object::new(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    // `body` is `String!` in `[Review!]`, so the whole list of the first product is nulled.
    assert_eq!(
        response.data,
        Some(json!({"topProducts": [
            {"name": "Table", "reviews": null},
            {"name": "Chair", "reviews": [{"body": "Wobbly"}]}
        ]}))
    );
    assert_eq!(response.errors.len(), 1);
    assert_eq!(
        response.errors[0].message,
        "Cannot return null for non-nullable field Review.body"
    );
    assert_eq!(
        response.errors[0].path.as_ref().map(ToString::to_string).as_deref(),
        Some("/topProducts/0/reviews/1/body")
    );
}

#[tokio::test]
async fn source_schema_errors_are_mapped_to_client_paths() {
    let transport = Arc::new(
        MockTransport::default()
            .respond("products", products_response())
            .respond(
                "reviews",
                json!({
                    "data": {"_e0": {"reviews": [{"body": "Sturdy"}]}, "_e1": {"reviews": null}},
                    "errors": [{"message": "boom", "path": ["_e1", "reviews"]}]
                }),
            ),
    );
    let operation = top_products([
        Field::new("name"),
        Field::new("reviews").selection(Field::new("body")),
    ]);
    let response = execute(
        transport,
        ExecutorConfig::default(),
        &operation,
        Object::new(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(
        response.data,
        Some(json!({"topProducts": [
            {"name": "Table", "reviews": [{"body": "Sturdy"}]},
            {"name": "Chair", "reviews": null}
        ]}))
    );
    assert_eq!(response.errors.len(), 1);
    let error = &response.errors[0];
    assert_eq!(error.message, "boom");
    assert_eq!(
        error.path.as_ref().map(ToString::to_string).as_deref(),
        Some("/topProducts/1/reviews")
    );
    assert_eq!(error.extensions.get("service"), Some(&json!("reviews")));
}

#[tokio::test]
async fn client_variables_are_forwarded() {
    let transport = Arc::new(
        MockTransport::default().respond("products", json!({"data": {"addProduct": {"name": "Lamp"}}})),
    );
    let operation = parse(
        "mutation AddProduct($name: String!) { addProduct(name: $name) { name } }",
    );
    let mut variables = Object::new();
    variables.insert("name".to_string(), json!("Lamp"));
    let response = execute(
        transport.clone(),
        ExecutorConfig::default(),
        &operation,
        variables,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(response.data, Some(json!({"addProduct": {"name": "Lamp"}})));
    let request = transport.request("products");
    assert_eq!(
        request.query,
        "mutation AddProduct($name: String!) { addProduct(name: $name) { name } }"
    );
    assert_eq!(request.operation_name.as_deref(), Some("AddProduct"));
    assert_eq!(Value::Object(request.variables), json!({"name": "Lamp"}));
}

#[tokio::test]
async fn timed_out_steps_are_reported() {
    let config = ExecutorConfig {
        subgraph_timeout: Duration::from_millis(50),
        ..Default::default()
    };
    let response = execute(
        Arc::new(PendingTransport),
        config,
        &top_products([Field::new("name")]),
        Object::new(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(response.data, None);
    assert_eq!(response.errors.len(), 1);
    assert_eq!(
        response.errors[0].message,
        "request to service 'products' timed out after 50ms"
    );
    assert_eq!(response.errors[0].code(), Some("SUBREQUEST_TIMEOUT"));
}

#[tokio::test]
async fn cancellation_aborts_the_request() {
    let cancelled = CancellationToken::new();
    cancelled.cancel();
    let result = execute(
        Arc::new(PendingTransport),
        ExecutorConfig::default(),
        &top_products([Field::new("name")]),
        Object::new(),
        &cancelled,
    )
    .await;
    assert_eq!(result, Err(ExecutionError::Cancelled));

    let cancellation = CancellationToken::new();
    let trigger = cancellation.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });
    let result = execute(
        Arc::new(PendingTransport),
        ExecutorConfig::default(),
        &top_products([Field::new("name")]),
        Object::new(),
        &cancellation,
    )
    .await;
    assert_eq!(result, Err(ExecutionError::Cancelled));
}
