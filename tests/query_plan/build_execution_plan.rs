use apollo_compiler::ast::Value;
use apollo_compiler::NodeStr;
use fusion_federation::error::{ErrorCode, FederationError};
use fusion_federation::query_plan::operation::{
    Field, InlineFragment, Operation, OperationKind, SelectionSet,
};
use fusion_federation::query_plan::query_planner::QueryPlannerConfig;
use fusion_federation::query_plan::{ExecutionPlan, StepEntry, StepId};
use fusion_federation::subgraph::{FusionDirective, SourceField, SourceSchema, SourceType};
use fusion_federation::Supergraph;
use pretty_assertions::assert_eq;

use crate::fixtures;
use crate::satisfiability::composite_key_sources;

fn plan(supergraph: &Supergraph, operation: &Operation) -> Result<ExecutionPlan, FederationError> {
    supergraph
        .query_planner(QueryPlannerConfig::default())
        .build_execution_plan(operation)
}

fn top_products(selections: impl IntoIterator<Item = Field>) -> Operation {
    let field = selections
        .into_iter()
        .fold(Field::new("topProducts"), |field, selection| {
            field.selection(selection)
        });
    Operation::query(SelectionSet::new([field.into()]))
}

fn subgraph_names(plan: &ExecutionPlan) -> Vec<&str> {
    plan.steps()
        .iter()
        .map(|step| &*step.subgraph_name)
        .collect()
}

fn first_error_code(error: &FederationError) -> ErrorCode {
    error.errors()[0].code()
}

fn shareable_sources() -> Vec<SourceSchema> {
    vec![
        SourceSchema::new("a")
            .with_type(SourceType::object("Query").field(SourceField::new("product", "Product")))
            .with_type(
                SourceType::object("Product")
                    .directive(fixtures::key("id"))
                    .field(SourceField::new("id", "ID!"))
                    .field(SourceField::new("name", "String!").directive(FusionDirective::Shareable)),
            ),
        SourceSchema::new("b").with_type(
            SourceType::object("Product")
                .directive(fixtures::key("id"))
                .field(SourceField::new("id", "ID!"))
                .field(SourceField::new("name", "String!").directive(FusionDirective::Shareable))
                .field(SourceField::new("price", "Int")),
        ),
    ]
}

#[test]
fn fetches_requirements_before_dependent_steps() {
    let supergraph = fixtures::shop();
    let operation = top_products([
        Field::new("name"),
        Field::new("shippingEstimate"),
        Field::new("reviews").selection(Field::new("body")),
    ]);
    let plan = plan(&supergraph, &operation).unwrap();
    insta::assert_snapshot!(plan.to_string(), @r###"
    Plan(query) {
      [0] products { topProducts { __typename name id weight } }
      [1] reviews via productById(id) at topProducts.@ on Product after [0] { reviews { body } }
      [2] inventory via _entities(id) at topProducts.@ on Product with $_r0: weight after [0] { shippingEstimate(weight: $_r0) }
    }
    "###);
}

#[test]
fn planning_is_deterministic() {
    let supergraph = fixtures::shop();
    let operation = top_products([
        Field::new("shippingEstimate"),
        Field::new("inStock"),
        Field::new("reviews").selection(Field::new("author")),
        Field::new("price"),
    ]);
    let first = plan(&supergraph, &operation).unwrap();
    let second = fixtures::shop()
        .query_planner(QueryPlannerConfig::default())
        .build_execution_plan(&operation)
        .unwrap();
    assert_eq!(first, second);
}

#[test]
fn fields_of_one_source_schema_share_a_step() {
    let supergraph = fixtures::shop();
    let plan = plan(
        &supergraph,
        &top_products([Field::new("name"), Field::new("price"), Field::new("id")]),
    )
    .unwrap();
    assert_eq!(plan.len(), 1);
    assert_eq!(
        plan.steps()[0].selection_set.to_string(),
        "{ topProducts { name price id } }"
    );

    // `inStock` and `shippingEstimate` both come from `inventory`.
    let plan = plan_for_inventory(&supergraph);
    assert_eq!(subgraph_names(&plan), vec!["products", "inventory"]);
    assert_eq!(
        plan.steps()[1].selection_set.to_string(),
        "{ inStock shippingEstimate(weight: $_r0) }"
    );
}

fn plan_for_inventory(supergraph: &Supergraph) -> ExecutionPlan {
    plan(
        supergraph,
        &top_products([Field::new("inStock"), Field::new("shippingEstimate")]),
    )
    .unwrap()
}

#[test]
fn shareable_fields_stay_in_the_current_step() {
    let supergraph = Supergraph::compose(&shareable_sources()).unwrap();
    let product = |selections: Vec<Field>| {
        let field = selections
            .into_iter()
            .fold(Field::new("product"), |field, selection| field.selection(selection));
        Operation::query(SelectionSet::new([field.into()]))
    };

    let name_only = plan(&supergraph, &product(vec![Field::new("name")])).unwrap();
    insta::assert_snapshot!(name_only.to_string(), @r###"
    Plan(query) {
      [0] a { product { name } }
    }
    "###);

    let with_price = plan(
        &supergraph,
        &product(vec![Field::new("name"), Field::new("price")]),
    )
    .unwrap();
    insta::assert_snapshot!(with_price.to_string(), @r###"
    Plan(query) {
      [0] a { product { __typename name id } }
      [1] b via _entities(id) at product on Product after [0] { price }
    }
    "###);
}

#[test]
fn chains_lookups_to_assemble_composite_keys() {
    let supergraph = Supergraph::compose(&composite_key_sources()).unwrap();
    let operation = Operation::query(SelectionSet::new([Field::new("productById")
        .argument("id", Value::String(NodeStr::new("1")))
        .selection(Field::new("specialField"))
        .into()]));
    let plan = plan(&supergraph, &operation).unwrap();

    assert_eq!(subgraph_names(&plan), vec!["a", "b", "c", "d"]);
    let depends_on: Vec<Vec<StepId>> = plan
        .steps()
        .iter()
        .map(|step| step.depends_on.clone())
        .collect();
    let ids: Vec<StepId> = plan.steps().iter().map(|step| step.id).collect();
    assert_eq!(
        depends_on,
        vec![vec![], vec![ids[0]], vec![ids[1]], vec![ids[2]]]
    );
    match &plan.steps()[3].entry {
        StepEntry::Lookup { field_name, .. } => assert_eq!(&**field_name, "productByKey"),
        other => panic!("unexpected entry {other:?}"),
    }
    assert_eq!(
        plan.steps()[3].selection_set.to_string(),
        "{ specialField }"
    );
}

#[test]
fn mutation_fields_run_in_order() {
    let supergraph = fixtures::shop();
    let operation = Operation::mutation(SelectionSet::new([
        Field::new("addProduct")
            .alias("first")
            .argument("name", Value::String(NodeStr::new("Table")))
            .selection(Field::new("name"))
            .into(),
        Field::new("addReview")
            .argument("body", Value::String(NodeStr::new("Sturdy")))
            .selection(Field::new("body"))
            .into(),
        Field::new("addProduct")
            .alias("second")
            .argument("name", Value::String(NodeStr::new("Chair")))
            .selection(Field::new("name"))
            .into(),
    ]));
    let plan = plan(&supergraph, &operation).unwrap();
    insta::assert_snapshot!(plan.to_string(), @r###"
    Plan(mutation) {
      [0] products { first: addProduct(name: "Table") { name } }
      [1] reviews after [0] { addReview(body: "Sturdy") { body } }
      [2] products after [1] { second: addProduct(name: "Chair") { name } }
    }
    "###);
    assert!(plan
        .steps()
        .iter()
        .all(|step| step.operation_kind == OperationKind::Mutation));
}

#[test]
fn entity_steps_of_a_mutation_are_queries() {
    let supergraph = fixtures::shop();
    let operation = Operation::mutation(SelectionSet::new([Field::new("addProduct")
        .argument("name", Value::String(NodeStr::new("Table")))
        .selection(Field::new("inStock"))
        .into()]));
    let plan = plan(&supergraph, &operation).unwrap();
    let kinds: Vec<OperationKind> = plan
        .steps()
        .iter()
        .map(|step| step.operation_kind)
        .collect();
    assert_eq!(kinds, vec![OperationKind::Mutation, OperationKind::Query]);
}

#[test]
fn abstract_types_are_planned_per_possible_type() {
    let a = SourceSchema::new("a")
        .with_type(SourceType::object("Query").field(SourceField::new("search", "[Media]")))
        .with_type(SourceType::union("Media").member("Book").member("Movie"))
        .with_type(
            SourceType::object("Book")
                .directive(fixtures::key("id"))
                .field(SourceField::new("id", "ID!")),
        )
        .with_type(
            SourceType::object("Movie")
                .directive(fixtures::key("id"))
                .field(SourceField::new("id", "ID!")),
        );
    let b = SourceSchema::new("b").with_type(
        SourceType::object("Book")
            .directive(fixtures::key("id"))
            .field(SourceField::new("id", "ID!"))
            .field(SourceField::new("title", "String")),
    );
    let supergraph = Supergraph::compose(&[a, b]).unwrap();
    let operation = Operation::query(SelectionSet::new([Field::new("search")
        .selection(InlineFragment::on("Book").selection(Field::new("title")))
        .selection(InlineFragment::on("Movie").selection(Field::new("id")))
        .into()]));
    let plan = plan(&supergraph, &operation).unwrap();
    insta::assert_snapshot!(plan.to_string(), @r###"
    Plan(query) {
      [0] a { search { __typename ... on Book { __typename id } ... on Movie { id } } }
      [1] b via _entities(id) at search.@ on Book after [0] { title }
    }
    "###);
}

#[test]
fn rejects_inaccessible_fields() {
    let supergraph = fixtures::shop();
    let operation = Operation::query(SelectionSet::new([Field::new("productById")
        .argument("id", Value::String(NodeStr::new("1")))
        .selection(Field::new("name"))
        .into()]));
    let error = plan(&supergraph, &operation).unwrap_err();
    assert_eq!(first_error_code(&error), ErrorCode::InvalidOperation);
    assert_eq!(
        error.to_string(),
        "Invalid operation: Cannot query field \"productById\" on type \"Query\""
    );
}

#[test]
fn rejects_requirement_arguments_from_clients() {
    let supergraph = fixtures::shop();
    let operation = top_products([
        Field::new("shippingEstimate").argument("weight", Value::Int(3.into()))
    ]);
    let error = plan(&supergraph, &operation).unwrap_err();
    assert_eq!(first_error_code(&error), ErrorCode::InvalidOperation);
}

#[test]
fn rejects_subscriptions() {
    let supergraph = fixtures::shop();
    let operation = Operation {
        kind: OperationKind::Subscription,
        ..top_products([Field::new("name")])
    };
    let error = plan(&supergraph, &operation).unwrap_err();
    assert_eq!(first_error_code(&error), ErrorCode::InvalidOperation);
}

#[test]
fn root_typename_is_answered_by_a_root_step() {
    let supergraph = fixtures::shop();
    let operation = Operation::query(SelectionSet::new([Field::new("__typename").into()]));
    let plan = plan(&supergraph, &operation).unwrap();
    assert_eq!(plan.len(), 1);
    assert_eq!(plan.steps()[0].selection_set.to_string(), "{ __typename }");
}
