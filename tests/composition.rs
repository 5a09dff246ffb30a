use fusion_federation::composition::diagnostics::HintCode;
use fusion_federation::error::ErrorCode;
use fusion_federation::subgraph::{FusionDirective, SourceField, SourceSchema, SourceType};
use fusion_federation::{compose, Supergraph};
use pretty_assertions::assert_eq;

use crate::fixtures;

fn query_with(field: SourceField) -> SourceType {
    SourceType::object("Query").field(field)
}

fn error_codes(sources: &[SourceSchema]) -> Vec<ErrorCode> {
    match compose(sources) {
        Ok(_) => panic!("composition should have failed"),
        Err(failure) => failure.errors.iter().map(|error| error.code()).collect(),
    }
}

#[test]
fn composition_does_not_depend_on_source_order() {
    let first = Supergraph::compose(&[
        fixtures::products(),
        fixtures::inventory(),
        fixtures::reviews(),
    ])
    .unwrap();
    let second = Supergraph::compose(&[
        fixtures::reviews(),
        fixtures::products(),
        fixtures::inventory(),
    ])
    .unwrap();
    assert_eq!(first.schema().print(), second.schema().print());
    assert_eq!(first.schema().version(), second.schema().version());
    assert_eq!(first.hints(), second.hints());
}

#[test]
fn fields_carry_one_binding_per_source_schema() {
    let supergraph = fixtures::shop();
    let schema = supergraph.schema();
    let product = schema.get_type("Product").unwrap();

    let id_sources: Vec<&str> = product
        .field("id")
        .unwrap()
        .bindings
        .iter()
        .map(|binding| &**schema.subgraph_name(binding.subgraph))
        .collect();
    assert_eq!(id_sources, vec!["inventory", "products", "reviews"]);

    // External declarations do not resolve the field.
    let weight = product.field("weight").unwrap();
    assert_eq!(weight.bindings.len(), 1);

    let estimate = product.field("shippingEstimate").unwrap();
    let binding = &estimate.bindings[0];
    assert_eq!(binding.cost, 2);
    assert_eq!(
        binding.requirement.as_ref().unwrap().fields.to_string(),
        "weight"
    );
    assert!(estimate.arguments.is_empty());

    let lookups: Vec<&str> = product
        .lookups
        .iter()
        .map(|lookup| &**schema.subgraph_name(lookup.subgraph))
        .collect();
    assert_eq!(lookups, vec!["inventory", "products", "reviews"]);
}

#[test]
fn rejects_duplicate_source_schemas() {
    let codes = error_codes(&[fixtures::products(), fixtures::products()]);
    assert_eq!(codes, vec![ErrorCode::DuplicateSubgraph]);
}

#[test]
fn rejects_missing_query_root() {
    let a = SourceSchema::new("a").with_type(
        SourceType::object("Product")
            .directive(fixtures::key("id"))
            .field(SourceField::new("id", "ID!")),
    );
    assert_eq!(error_codes(&[a]), vec![ErrorCode::MissingQueryRoot]);
}

#[test]
fn missing_query_root_is_reported_alongside_other_errors() {
    let codes = error_codes(&[fixtures::inventory()]);
    assert!(codes.contains(&ErrorCode::MissingQueryRoot));
}

#[test]
fn rejects_type_kind_mismatch() {
    let a = SourceSchema::new("a")
        .with_type(query_with(SourceField::new("node", "Node")))
        .with_type(SourceType::object("Node").field(SourceField::new("id", "ID!")));
    let b = SourceSchema::new("b")
        .with_type(SourceType::interface("Node").field(SourceField::new("id", "ID!")));
    let failure = compose(&[a, b]).unwrap_err();
    assert_eq!(failure.errors[0].code(), ErrorCode::TypeKindMismatch);
    assert_eq!(
        failure.errors[0].to_string(),
        "Type \"Node\" has mismatched kinds: it is object in \"a\" but interface in \"b\""
    );
}

#[test]
fn rejects_incompatible_field_types() {
    let a = SourceSchema::new("a").with_type(query_with(
        SourceField::new("version", "Int").directive(FusionDirective::Shareable),
    ));
    let b = SourceSchema::new("b").with_type(query_with(
        SourceField::new("version", "String").directive(FusionDirective::Shareable),
    ));
    assert_eq!(error_codes(&[a, b]), vec![ErrorCode::FieldTypeMismatch]);
}

#[test]
fn nullability_differences_compose_with_a_hint() {
    let a = SourceSchema::new("a").with_type(query_with(
        SourceField::new("version", "Int!").directive(FusionDirective::Shareable),
    ));
    let b = SourceSchema::new("b").with_type(query_with(
        SourceField::new("version", "Int").directive(FusionDirective::Shareable),
    ));
    let supergraph = compose(&[a, b]).unwrap();
    let version = supergraph.schema().query_type().unwrap().field("version").unwrap();
    assert_eq!(version.ty.to_string(), "Int");
    assert_eq!(version.bindings.len(), 2);
    assert_eq!(supergraph.hints()[0].code, HintCode::InconsistentNullability);
}

#[test]
fn rejects_fields_shared_without_shareable() {
    let a = SourceSchema::new("a").with_type(query_with(SourceField::new("hello", "String")));
    let b = SourceSchema::new("b").with_type(query_with(
        SourceField::new("hello", "String").directive(FusionDirective::Shareable),
    ));
    let failure = compose(&[a, b]).unwrap_err();
    assert_eq!(failure.errors[0].code(), ErrorCode::InvalidFieldSharing);
    assert_eq!(
        failure.errors[0].to_string(),
        "Non-shareable field \"Query.hello\" is resolved from multiple source schemas: it is resolved from \"a\" and \"b\" and defined as non-shareable in \"a\""
    );
}

#[test]
fn shareable_types_share_all_their_fields() {
    let a = SourceSchema::new("a")
        .with_type(query_with(SourceField::new("me", "User")))
        .with_type(
            SourceType::object("User")
                .directive(FusionDirective::Shareable)
                .field(SourceField::new("name", "String")),
        );
    let b = SourceSchema::new("b").with_type(
        SourceType::object("User")
            .directive(FusionDirective::Shareable)
            .field(SourceField::new("name", "String")),
    );
    let supergraph = compose(&[a, b]).unwrap();
    let name = supergraph.schema().get_type("User").unwrap().field("name").unwrap();
    assert_eq!(name.bindings.len(), 2);
}

#[test]
fn override_moves_the_field_to_the_overriding_source_schema() {
    let a = SourceSchema::new("a")
        .with_type(query_with(SourceField::new("product", "Product")))
        .with_type(
            SourceType::object("Product")
                .directive(fixtures::key("id"))
                .field(SourceField::new("id", "ID!"))
                .field(SourceField::new("price", "Int")),
        );
    let b = SourceSchema::new("b").with_type(
        SourceType::object("Product")
            .directive(fixtures::key("id"))
            .field(SourceField::new("id", "ID!"))
            .field(SourceField::new("price", "Int").directive(FusionDirective::Override {
                from: "a".to_string(),
            })),
    );
    let supergraph = compose(&[a, b]).unwrap();
    let schema = supergraph.schema();
    let price = schema.get_type("Product").unwrap().field("price").unwrap();
    assert_eq!(price.bindings.len(), 1);
    assert_eq!(&**schema.subgraph_name(price.bindings[0].subgraph), "b");
    assert_eq!(supergraph.hints()[0].code, HintCode::OverriddenField);
}

#[test]
fn rejects_overriding_its_own_field() {
    let a = SourceSchema::new("a").with_type(query_with(
        SourceField::new("hello", "String").directive(FusionDirective::Override {
            from: "a".to_string(),
        }),
    ));
    assert_eq!(error_codes(&[a]), vec![ErrorCode::InvalidOverride]);
}

#[test]
fn rejects_overriding_an_unknown_source_schema() {
    let a = SourceSchema::new("a").with_type(query_with(
        SourceField::new("hello", "String").directive(FusionDirective::Override {
            from: "missing".to_string(),
        }),
    ));
    let failure = compose(&[a]).unwrap_err();
    assert_eq!(
        failure.errors.iter().map(|error| error.code()).collect::<Vec<_>>(),
        vec![ErrorCode::InvalidOverride]
    );
    assert_eq!(
        failure.errors[0].to_string(),
        "[a] Invalid @override on \"Query.hello\": \"missing\" is not a known source schema"
    );
}

#[test]
fn rejects_external_fields_nobody_owns() {
    let a = SourceSchema::new("a")
        .with_type(query_with(SourceField::new("product", "Product")))
        .with_type(
            SourceType::object("Product")
                .field(SourceField::new("id", "ID!"))
                .field(SourceField::new("weight", "Int").directive(FusionDirective::External)),
        );
    assert_eq!(
        error_codes(&[a]),
        vec![ErrorCode::ExternalMissingDefinition]
    );
}

#[test]
fn rejects_requirements_without_a_receiving_argument() {
    let mut inventory = fixtures::inventory();
    inventory.types[0].fields[3].arguments.clear();
    let codes = error_codes(&[fixtures::products(), inventory, fixtures::reviews()]);
    assert_eq!(codes, vec![ErrorCode::InvalidRequirement]);
}

#[test]
fn rejects_lookups_returning_lists() {
    let a = SourceSchema::new("a")
        .with_type(query_with(
            SourceField::new("products", "[Product]")
                .argument("id", "ID!")
                .directive(FusionDirective::Lookup),
        ))
        .with_type(SourceType::object("Product").field(SourceField::new("id", "ID!")));
    assert_eq!(error_codes(&[a]), vec![ErrorCode::InvalidLookup]);
}

#[test]
fn rejects_keys_on_undeclared_fields() {
    let a = SourceSchema::new("a")
        .with_type(query_with(SourceField::new("product", "Product")))
        .with_type(
            SourceType::object("Product")
                .directive(fixtures::key("upc"))
                .field(SourceField::new("id", "ID!")),
        );
    assert_eq!(error_codes(&[a]), vec![ErrorCode::InvalidFieldSet]);
}

#[test]
fn failures_keep_hints() {
    let a = SourceSchema::new("a").with_type(query_with(
        SourceField::new("version", "Int!").directive(FusionDirective::Shareable),
    ));
    let b = SourceSchema::new("b").with_type(
        query_with(SourceField::new("version", "Int").directive(FusionDirective::Shareable))
            .field(SourceField::new("broken", "Unknown")),
    );
    let failure = compose(&[a, b]).unwrap_err();
    assert_eq!(failure.errors[0].code(), ErrorCode::InvalidSourceSchema);
    assert_eq!(failure.hints[0].code, HintCode::InconsistentNullability);
}
