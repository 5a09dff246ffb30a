//! Builds SDL documents from the composed schema and prints them with the apollo-compiler
//! serializer.

use crate::schema::{
    graphql_name, ArgumentDefinition, FieldDefinition, FusionSchema, LookupKind, TypeDefinition,
    TypeKind,
};
use apollo_compiler::ast::{self, Definition, Document};
use apollo_compiler::{name, Node, NodeStr};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Every element, annotated with the source schemas that resolve it.
    Annotated,
    /// Only what clients may query.
    Api,
}

pub(super) fn print_schema(schema: &FusionSchema) -> String {
    document(schema, Mode::Annotated).to_string()
}

pub(super) fn print_api_schema(schema: &FusionSchema) -> String {
    document(schema, Mode::Api).to_string()
}

fn document(schema: &FusionSchema, mode: Mode) -> Document {
    let mut document = Document::new();
    document.definitions.push(schema_definition(schema, mode));
    for ty in schema.types() {
        if mode == Mode::Api && ty.inaccessible {
            continue;
        }
        document.definitions.push(type_definition(schema, ty, mode));
    }
    document
}

fn directive(name: ast::Name, arguments: Vec<(ast::Name, ast::Value)>) -> Node<ast::Directive> {
    Node::new(ast::Directive {
        name,
        arguments: arguments
            .into_iter()
            .map(|(name, value)| {
                Node::new(ast::Argument {
                    name,
                    value: Node::new(value),
                })
            })
            .collect(),
    })
}

fn string(value: &str) -> ast::Value {
    ast::Value::String(NodeStr::new(value))
}

fn schema_definition(schema: &FusionSchema, mode: Mode) -> Definition {
    let mut directives = Vec::new();
    if mode == Mode::Annotated {
        for subgraph in schema.subgraphs() {
            let mut arguments = vec![(name!("name"), string(&subgraph.name))];
            if let Some(url) = &subgraph.url {
                arguments.push((name!("url"), string(url.as_str())));
            }
            directives.push(directive(name!("sourceSchema"), arguments));
        }
    }
    let mut root_operations = Vec::new();
    if let Some(query) = schema.query_type() {
        root_operations.push(Node::new((ast::OperationType::Query, graphql_name(&query.name))));
    }
    if let Some(mutation) = schema.mutation_type() {
        root_operations.push(Node::new((
            ast::OperationType::Mutation,
            graphql_name(&mutation.name),
        )));
    }
    Definition::SchemaDefinition(Node::new(ast::SchemaDefinition {
        description: None,
        directives: ast::DirectiveList(directives),
        root_operations,
    }))
}

fn type_directives(schema: &FusionSchema, ty: &TypeDefinition, mode: Mode) -> ast::DirectiveList {
    let mut directives = Vec::new();
    if mode == Mode::Api {
        return ast::DirectiveList(directives);
    }
    if ty.inaccessible {
        directives.push(directive(name!("inaccessible"), Vec::new()));
    }
    for subgraph in &ty.sources {
        directives.push(directive(
            name!("source"),
            vec![(name!("schema"), string(schema.subgraph_name(*subgraph)))],
        ));
    }
    for lookup in &ty.lookups {
        let mut arguments = vec![
            (name!("schema"), string(schema.subgraph_name(lookup.subgraph))),
            (name!("key"), string(&lookup.key.to_string())),
        ];
        match &lookup.kind {
            LookupKind::Field { field_name, .. } => {
                arguments.push((name!("field"), string(field_name)));
            }
            LookupKind::Entities => arguments.push((name!("entities"), ast::Value::Boolean(true))),
        }
        directives.push(directive(name!("lookup"), arguments));
    }
    ast::DirectiveList(directives)
}

fn type_definition(schema: &FusionSchema, ty: &TypeDefinition, mode: Mode) -> Definition {
    let visible = |name: &str| {
        mode == Mode::Annotated || schema.get_type(name).is_some_and(|ty| !ty.inaccessible)
    };
    let name = graphql_name(&ty.name);
    let directives = type_directives(schema, ty, mode);
    let implements_interfaces = ty
        .interfaces
        .iter()
        .filter(|interface| visible(interface))
        .map(|interface| graphql_name(interface))
        .collect();
    let fields = || {
        ty.fields
            .values()
            .filter(|field| mode == Mode::Annotated || !field.inaccessible)
    };
    match ty.kind {
        TypeKind::Scalar => Definition::ScalarTypeDefinition(Node::new(ast::ScalarTypeDefinition {
            description: None,
            name,
            directives,
        })),
        TypeKind::Union => Definition::UnionTypeDefinition(Node::new(ast::UnionTypeDefinition {
            description: None,
            name,
            directives,
            members: ty
                .members
                .iter()
                .filter(|member| visible(member))
                .map(|member| graphql_name(member))
                .collect(),
        })),
        TypeKind::Enum => Definition::EnumTypeDefinition(Node::new(ast::EnumTypeDefinition {
            description: None,
            name,
            directives,
            values: ty
                .enum_values
                .iter()
                .map(|value| {
                    Node::new(ast::EnumValueDefinition {
                        description: None,
                        value: graphql_name(value),
                        directives: Default::default(),
                    })
                })
                .collect(),
        })),
        TypeKind::Object => Definition::ObjectTypeDefinition(Node::new(ast::ObjectTypeDefinition {
            description: None,
            name,
            implements_interfaces,
            directives,
            fields: fields()
                .map(|field| field_definition(schema, field, mode))
                .collect(),
        })),
        TypeKind::Interface => {
            Definition::InterfaceTypeDefinition(Node::new(ast::InterfaceTypeDefinition {
                description: None,
                name,
                implements_interfaces,
                directives,
                fields: fields()
                    .map(|field| field_definition(schema, field, mode))
                    .collect(),
            }))
        }
        TypeKind::InputObject => {
            Definition::InputObjectTypeDefinition(Node::new(ast::InputObjectTypeDefinition {
                description: None,
                name,
                directives,
                fields: fields()
                    .map(|field| {
                        Node::new(ast::InputValueDefinition {
                            description: None,
                            name: graphql_name(&field.name),
                            ty: Node::new(ast::Type::from(&field.ty)),
                            default_value: None,
                            directives: field_directives(schema, field, mode),
                        })
                    })
                    .collect(),
            }))
        }
    }
}

fn field_definition(
    schema: &FusionSchema,
    field: &FieldDefinition,
    mode: Mode,
) -> Node<ast::FieldDefinition> {
    Node::new(ast::FieldDefinition {
        description: None,
        name: graphql_name(&field.name),
        arguments: field.arguments.values().map(argument_definition).collect(),
        ty: ast::Type::from(&field.ty),
        directives: field_directives(schema, field, mode),
    })
}

fn argument_definition(argument: &ArgumentDefinition) -> Node<ast::InputValueDefinition> {
    Node::new(ast::InputValueDefinition {
        description: None,
        name: graphql_name(&argument.name),
        ty: Node::new(ast::Type::from(&argument.ty)),
        default_value: argument
            .default_value
            .as_ref()
            .and_then(graphql_value)
            .map(Node::new),
        directives: Default::default(),
    })
}

fn field_directives(schema: &FusionSchema, field: &FieldDefinition, mode: Mode) -> ast::DirectiveList {
    let mut directives = Vec::new();
    if mode == Mode::Api {
        return ast::DirectiveList(directives);
    }
    if field.inaccessible {
        directives.push(directive(name!("inaccessible"), Vec::new()));
    }
    for binding in &field.bindings {
        let mut arguments = vec![(name!("schema"), string(schema.subgraph_name(binding.subgraph)))];
        if let Some(requirement) = &binding.requirement {
            arguments.push((name!("requires"), string(&requirement.fields.to_string())));
            arguments.push((name!("cost"), ast::Value::Int((binding.cost as i32).into())));
        }
        if let Some(provides) = &binding.provides {
            arguments.push((name!("provides"), string(&provides.to_string())));
        }
        directives.push(directive(name!("source"), arguments));
    }
    ast::DirectiveList(directives)
}

/// Converts a JSON default value into a GraphQL literal. Returns `None` for numbers GraphQL
/// cannot represent.
pub(crate) fn graphql_value(value: &serde_json::Value) -> Option<ast::Value> {
    Some(match value {
        serde_json::Value::Null => ast::Value::Null,
        serde_json::Value::Bool(value) => ast::Value::Boolean(*value),
        serde_json::Value::Number(number) => {
            match number.as_i64().and_then(|int| i32::try_from(int).ok()) {
                Some(int) => ast::Value::Int(int.into()),
                None => ast::Value::Float(number.as_f64()?.into()),
            }
        }
        serde_json::Value::String(value) => string(value),
        serde_json::Value::Array(items) => ast::Value::List(
            items
                .iter()
                .map(|item| graphql_value(item).map(Node::new))
                .collect::<Option<_>>()?,
        ),
        serde_json::Value::Object(object) => ast::Value::Object(
            object
                .iter()
                .map(|(key, value)| Some((graphql_name(key), Node::new(graphql_value(value)?))))
                .collect::<Option<_>>()?,
        ),
    })
}
