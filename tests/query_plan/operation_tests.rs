use apollo_compiler::ast::Value;
use apollo_compiler::NodeStr;
use fusion_federation::error::ErrorCode;
use fusion_federation::query_plan::operation::{
    variable_value, Field, InlineFragment, Operation, SelectionSet,
};
use fusion_federation::schema::{FusionSchema, TypeRef};
use fusion_federation::subgraph::{SourceField, SourceSchema, SourceType};
use fusion_federation::Supergraph;
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn schema() -> Arc<FusionSchema> {
    let source = SourceSchema::new("s")
        .with_type(
            SourceType::object("Query")
                .field(SourceField::new("t", "T").argument("id", "ID")),
        )
        .with_type(
            SourceType::object("T")
                .field(SourceField::new("v1", "Int"))
                .field(SourceField::new("v2", "String")),
        );
    Supergraph::compose(&[source]).unwrap().schema().clone()
}

fn normalize_error(operation: Operation) -> String {
    operation.normalize(&schema()).unwrap_err().to_string()
}

#[test]
fn merge_same_fields() {
    let operation = Operation::query(SelectionSet::new([
        Field::new("t").selection(Field::new("v1")).into(),
        Field::new("t").selection(Field::new("v2")).into(),
    ]))
    .named("Test");
    let normalized = operation.normalize(&schema()).unwrap();
    let expected = r#"query Test {
  t {
    v1
    v2
  }
}"#;
    assert_eq!(normalized.to_string(), expected);
}

#[test]
fn different_response_keys_are_kept_apart() {
    let operation = Operation::query(SelectionSet::new([
        Field::new("t").selection(Field::new("v1")).into(),
        Field::new("t")
            .alias("other")
            .selection(Field::new("v2"))
            .into(),
        Field::new("t")
            .alias("t")
            .selection(Field::new("v2"))
            .into(),
    ]));
    let normalized = operation.normalize(&schema()).unwrap();
    assert_eq!(
        normalized.selection_set.to_string(),
        "{ t { v1 v2 } other: t { v2 } }"
    );
}

#[test]
fn fragments_that_do_not_narrow_are_flattened() {
    let operation = Operation::query(SelectionSet::new([Field::new("t")
        .selection(InlineFragment::on("T").selection(Field::new("v1")))
        .selection(InlineFragment {
            type_condition: None,
            selection_set: SelectionSet::new([Field::new("v2").into(), Field::new("v1").into()]),
        })
        .into()]));
    let normalized = operation.normalize(&schema()).unwrap();
    assert_eq!(normalized.selection_set.to_string(), "{ t { v1 v2 } }");
}

#[test]
fn equivalent_spellings_normalize_alike() {
    let first = Operation::query(SelectionSet::new([
        Field::new("t").selection(Field::new("v1")).into(),
        Field::new("t").selection(Field::new("v2")).into(),
    ]));
    let second = Operation::query(SelectionSet::new([Field::new("t")
        .selection(Field::new("v1"))
        .selection(InlineFragment::on("T").selection(Field::new("v2")))
        .into()]));
    let schema = schema();
    assert_eq!(
        first.normalize(&schema).unwrap(),
        second.normalize(&schema).unwrap()
    );
}

#[test]
fn rejects_unknown_fields() {
    let operation = Operation::query(SelectionSet::new([Field::new("t")
        .selection(Field::new("v3"))
        .into()]));
    assert_eq!(
        normalize_error(operation),
        r#"Invalid operation: Cannot query field "v3" on type "T""#
    );
}

#[test]
fn rejects_mismatched_selections() {
    let leaf_with_selection = Operation::query(SelectionSet::new([Field::new("t")
        .selection(Field::new("v1").selection(Field::new("x")))
        .into()]));
    assert_eq!(
        normalize_error(leaf_with_selection),
        r#"Invalid operation: Field "T.v1" is a leaf and cannot have a selection"#
    );

    let missing_selection = Operation::query(SelectionSet::new([Field::new("t").into()]));
    assert_eq!(
        normalize_error(missing_selection),
        r#"Invalid operation: Field "Query.t" must have a selection of subfields"#
    );
}

#[test]
fn rejects_undefined_variables_and_unknown_arguments() {
    let undefined = Operation::query(SelectionSet::new([Field::new("t")
        .argument("id", variable_value("id"))
        .selection(Field::new("v1"))
        .into()]));
    assert_eq!(
        normalize_error(undefined.clone()),
        r#"Invalid operation: Variable "$id" is not defined"#
    );
    let defined = undefined.variable("id", TypeRef::named("ID"));
    assert!(defined.normalize(&schema()).is_ok());

    let unknown = Operation::query(SelectionSet::new([Field::new("t")
        .argument("upc", Value::String(NodeStr::new("1")))
        .selection(Field::new("v1"))
        .into()]));
    assert_eq!(
        normalize_error(unknown),
        r#"Invalid operation: Unknown argument "upc" on field "Query.t""#
    );
}

fn parse_error(source: &str, operation_name: Option<&str>) -> String {
    Operation::parse(&schema(), source, operation_name)
        .unwrap_err()
        .to_string()
}

#[test]
fn parses_documents_and_inlines_named_fragments() {
    let source = r#"
        query Test($id: ID) {
          t(id: $id) {
            v1
            ...Details
          }
        }

        fragment Details on T {
          v2
        }
    "#;
    let operation = Operation::parse(&schema(), source, None).unwrap();
    let expected = Operation::query(SelectionSet::new([Field::new("t")
        .argument("id", variable_value("id"))
        .selection(Field::new("v1"))
        .selection(InlineFragment::on("T").selection(Field::new("v2")))
        .into()]))
    .named("Test")
    .variable("id", TypeRef::named("ID"));
    assert_eq!(operation, expected);

    insta::assert_snapshot!(operation.normalize(&schema()).unwrap(), @r###"
    query Test($id: ID) {
      t(id: $id) {
        v1
        v2
      }
    }
    "###);
}

#[test]
fn keeps_variable_defaults() {
    let operation =
        Operation::parse(&schema(), r#"query($id: ID = "1") { t(id: $id) { v1 } }"#, None)
            .unwrap();
    let id = operation.variable_definition("id").unwrap();
    assert_eq!(id.ty, TypeRef::named("ID"));
    assert_eq!(
        id.default_value.as_deref(),
        Some(&Value::String(NodeStr::new("1")))
    );
}

#[test]
fn selects_operations_by_name() {
    let source = "query A { t { v1 } } query B { t { v2 } }";
    let b = Operation::parse(&schema(), source, Some("B")).unwrap();
    assert_eq!(b.selection_set.to_string(), "{ t { v2 } }");

    assert_eq!(
        parse_error(source, None),
        "Invalid operation: An operation name is required when the document contains several operations"
    );
    assert_eq!(
        parse_error(source, Some("C")),
        r#"Invalid operation: Unknown operation named "C""#
    );
}

#[test]
fn rejects_documents_failing_validation() {
    let error = Operation::parse(&schema(), "{ t { v3 } }", None).unwrap_err();
    assert_eq!(error.errors()[0].code(), ErrorCode::InvalidOperation);
    assert!(error.to_string().contains("v3"));

    assert_eq!(
        parse_error("{ t { v1 @skip(if: true) } }", None),
        r#"Invalid operation: Directive "@skip" is not supported"#
    );
}
