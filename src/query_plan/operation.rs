//! The client operation and its normalized form.
//!
//! Documents are parsed and validated against the API schema by apollo-compiler, then lowered
//! into this model with named fragments inlined. Normalization validates the operation against
//! the composed schema, flattens inline fragments that do not narrow the type, and merges
//! selections sharing a response key, so that two spellings of the same operation normalize to
//! the same value and print the same text. Printing goes back through the apollo-compiler AST.

use crate::error::FederationError;
use crate::schema::{graphql_name, FusionSchema, Name, TypeDefinition, TypeRef, TYPENAME_FIELD};
use apollo_compiler::executable::{self, ExecutableDocument};
use apollo_compiler::{ast, Node};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub kind: OperationKind,
    pub name: Option<Name>,
    pub variables: Vec<VariableDefinition>,
    pub selection_set: SelectionSet,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDefinition {
    pub name: Name,
    pub ty: TypeRef,
    pub default_value: Option<Node<ast::Value>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionSet {
    pub selections: Vec<Selection>,
}

#[derive(Debug, Clone, PartialEq, derive_more::From)]
pub enum Selection {
    Field(Field),
    InlineFragment(InlineFragment),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub alias: Option<Name>,
    pub name: Name,
    pub arguments: IndexMap<Name, Node<ast::Value>>,
    /// Empty for leaf fields.
    pub selection_set: SelectionSet,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InlineFragment {
    pub type_condition: Option<Name>,
    pub selection_set: SelectionSet,
}

impl From<ast::OperationType> for OperationKind {
    fn from(value: ast::OperationType) -> Self {
        match value {
            ast::OperationType::Query => OperationKind::Query,
            ast::OperationType::Mutation => OperationKind::Mutation,
            ast::OperationType::Subscription => OperationKind::Subscription,
        }
    }
}

impl From<OperationKind> for ast::OperationType {
    fn from(value: OperationKind) -> Self {
        match value {
            OperationKind::Query => ast::OperationType::Query,
            OperationKind::Mutation => ast::OperationType::Mutation,
            OperationKind::Subscription => ast::OperationType::Subscription,
        }
    }
}

impl Operation {
    /// Parses `source` and validates it against the API schema of `schema`. The operation to
    /// use is picked by `operation_name`, which may be omitted when the document holds a single
    /// operation.
    pub fn parse(
        schema: &FusionSchema,
        source: &str,
        operation_name: Option<&str>,
    ) -> Result<Self, FederationError> {
        let document = ExecutableDocument::parse_and_validate(
            schema.api_schema()?,
            source,
            "operation.graphql",
        )?;
        let operation = select_operation(&document, operation_name)?;
        if !operation.directives.is_empty() {
            return Err(FederationError::invalid_operation(
                "Directives on operations are not supported",
            ));
        }
        Ok(Self {
            kind: operation.operation_type.into(),
            name: operation.name.as_ref().map(|name| Name::from(name.as_str())),
            variables: operation
                .variables
                .iter()
                .map(|variable| VariableDefinition {
                    name: variable.name.as_str().into(),
                    ty: TypeRef::from(&*variable.ty),
                    default_value: variable.default_value.clone(),
                })
                .collect(),
            selection_set: lower_selection_set(&document, &operation.selection_set)?,
        })
    }

    pub fn query(selection_set: SelectionSet) -> Self {
        Self {
            kind: OperationKind::Query,
            name: None,
            variables: Vec::new(),
            selection_set,
        }
    }

    pub fn mutation(selection_set: SelectionSet) -> Self {
        Self {
            kind: OperationKind::Mutation,
            ..Self::query(selection_set)
        }
    }

    pub fn named(mut self, name: impl Into<Name>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn variable(mut self, name: impl Into<Name>, ty: TypeRef) -> Self {
        self.variables.push(VariableDefinition {
            name: name.into(),
            ty,
            default_value: None,
        });
        self
    }

    pub fn variable_definition(&self, name: &str) -> Option<&VariableDefinition> {
        self.variables
            .iter()
            .find(|variable| &*variable.name == name)
    }

    /// Validates this operation against `schema` and returns its normalized form.
    pub fn normalize(&self, schema: &FusionSchema) -> Result<Operation, FederationError> {
        let root = schema.root_type(self.kind).ok_or_else(|| {
            FederationError::invalid_operation(format!(
                "The schema does not support {} operations",
                self.kind
            ))
        })?;
        let selection_set = normalize_selection_set(schema, root, &self.selection_set)?;
        let mut used = IndexSet::new();
        selection_set.collect_variables(&mut used);
        if let Some(undefined) = used
            .iter()
            .find(|name| self.variable_definition(name).is_none())
        {
            return Err(FederationError::invalid_operation(format!(
                "Variable \"${undefined}\" is not defined"
            )));
        }
        Ok(Operation {
            kind: self.kind,
            name: self.name.clone(),
            variables: self.variables.clone(),
            selection_set,
        })
    }

    /// The operation as a document definition, for printing.
    pub fn to_ast(&self) -> ast::OperationDefinition {
        ast::OperationDefinition {
            operation_type: self.kind.into(),
            name: self.name.as_deref().map(graphql_name),
            variables: self
                .variables
                .iter()
                .map(|variable| {
                    Node::new(ast::VariableDefinition {
                        name: graphql_name(&variable.name),
                        ty: Node::new(ast::Type::from(&variable.ty)),
                        default_value: variable.default_value.clone(),
                        directives: Default::default(),
                    })
                })
                .collect(),
            directives: Default::default(),
            selection_set: self.selection_set.to_ast(),
        }
    }

    /// Prints the operation on a single line.
    pub fn to_compact_string(&self) -> String {
        self.to_ast().serialize().no_indent().to_string()
    }
}

fn select_operation<'doc>(
    document: &'doc ExecutableDocument,
    operation_name: Option<&str>,
) -> Result<&'doc Node<executable::Operation>, FederationError> {
    if let Some(operation_name) = operation_name {
        return document
            .named_operations
            .iter()
            .find(|(name, _)| name.as_str() == operation_name)
            .map(|(_, operation)| operation)
            .ok_or_else(|| {
                FederationError::invalid_operation(format!(
                    "Unknown operation named \"{operation_name}\""
                ))
            });
    }
    let mut operations = document
        .anonymous_operation
        .iter()
        .chain(document.named_operations.values());
    match (operations.next(), operations.next()) {
        (Some(operation), None) => Ok(operation),
        (None, _) => Err(FederationError::invalid_operation(
            "The document does not contain any operation",
        )),
        (Some(_), Some(_)) => Err(FederationError::invalid_operation(
            "An operation name is required when the document contains several operations",
        )),
    }
}

fn reject_directives(directives: &executable::DirectiveList) -> Result<(), FederationError> {
    match directives.first() {
        Some(directive) => Err(FederationError::invalid_operation(format!(
            "Directive \"@{}\" is not supported",
            directive.name
        ))),
        None => Ok(()),
    }
}

/// Lowers a validated selection set into the model, inlining fragment spreads.
fn lower_selection_set(
    document: &ExecutableDocument,
    selection_set: &executable::SelectionSet,
) -> Result<SelectionSet, FederationError> {
    let mut lowered = SelectionSet::default();
    for selection in &selection_set.selections {
        let selection = match selection {
            executable::Selection::Field(field) => {
                reject_directives(&field.directives)?;
                Selection::Field(Field {
                    alias: field.alias.as_ref().map(|alias| Name::from(alias.as_str())),
                    name: field.name.as_str().into(),
                    arguments: field
                        .arguments
                        .iter()
                        .map(|argument| (Name::from(argument.name.as_str()), argument.value.clone()))
                        .collect(),
                    selection_set: lower_selection_set(document, &field.selection_set)?,
                })
            }
            executable::Selection::InlineFragment(fragment) => {
                reject_directives(&fragment.directives)?;
                Selection::InlineFragment(InlineFragment {
                    type_condition: fragment
                        .type_condition
                        .as_ref()
                        .map(|condition| Name::from(condition.as_str())),
                    selection_set: lower_selection_set(document, &fragment.selection_set)?,
                })
            }
            executable::Selection::FragmentSpread(spread) => {
                reject_directives(&spread.directives)?;
                let fragment = document
                    .fragments
                    .get(&spread.fragment_name)
                    .ok_or_else(|| {
                        FederationError::invalid_operation(format!(
                            "Unknown fragment \"{}\"",
                            spread.fragment_name
                        ))
                    })?;
                Selection::InlineFragment(InlineFragment {
                    type_condition: Some(fragment.selection_set.ty.as_str().into()),
                    selection_set: lower_selection_set(document, &fragment.selection_set)?,
                })
            }
        };
        lowered.selections.push(selection);
    }
    Ok(lowered)
}

fn normalize_selection_set(
    schema: &FusionSchema,
    parent: &TypeDefinition,
    selection_set: &SelectionSet,
) -> Result<SelectionSet, FederationError> {
    let mut normalized = SelectionSet::default();
    for selection in &selection_set.selections {
        match selection {
            Selection::Field(field) => {
                normalized.merge_selection(normalize_field(schema, parent, field)?.into())?
            }
            Selection::InlineFragment(fragment) => match &fragment.type_condition {
                Some(condition) if *condition != parent.name => {
                    let condition_type = schema
                        .get_type(condition)
                        .filter(|ty| ty.kind.is_composite() && !ty.inaccessible)
                        .ok_or_else(|| {
                            FederationError::invalid_operation(format!(
                                "Unknown type \"{condition}\" in fragment condition"
                            ))
                        })?;
                    let overlaps = schema.possible_types(condition).iter().any(|object| {
                        schema.type_condition_applies(&parent.name, &object.name)
                    });
                    if !overlaps {
                        return Err(FederationError::invalid_operation(format!(
                            "Fragment on \"{condition}\" can never apply within \"{}\"",
                            parent.name
                        )));
                    }
                    let nested =
                        normalize_selection_set(schema, condition_type, &fragment.selection_set)?;
                    normalized.merge_selection(Selection::InlineFragment(InlineFragment {
                        type_condition: Some(condition.clone()),
                        selection_set: nested,
                    }))?;
                }
                _ => {
                    let nested = normalize_selection_set(schema, parent, &fragment.selection_set)?;
                    for selection in nested.selections {
                        normalized.merge_selection(selection)?;
                    }
                }
            },
        }
    }
    Ok(normalized)
}

fn normalize_field(
    schema: &FusionSchema,
    parent: &TypeDefinition,
    field: &Field,
) -> Result<Field, FederationError> {
    let alias = field.alias.clone().filter(|alias| *alias != field.name);
    if &*field.name == TYPENAME_FIELD {
        return Ok(Field {
            alias,
            name: field.name.clone(),
            arguments: IndexMap::new(),
            selection_set: SelectionSet::default(),
        });
    }
    let definition = parent
        .field(&field.name)
        .filter(|definition| !definition.inaccessible)
        .ok_or_else(|| {
            FederationError::invalid_operation(format!(
                "Cannot query field \"{}\" on type \"{}\"",
                field.name, parent.name
            ))
        })?;
    if let Some(unknown) = field
        .arguments
        .keys()
        .find(|name| !definition.arguments.contains_key(*name))
    {
        return Err(FederationError::invalid_operation(format!(
            "Unknown argument \"{unknown}\" on field \"{}.{}\"",
            parent.name, field.name
        )));
    }
    let returned = schema
        .get_type(definition.ty.inner_named_type())
        .filter(|ty| ty.kind.is_composite());
    let selection_set = match (returned, field.selection_set.is_empty()) {
        (Some(_), true) => {
            return Err(FederationError::invalid_operation(format!(
                "Field \"{}.{}\" must have a selection of subfields",
                parent.name, field.name
            )))
        }
        (None, false) => {
            return Err(FederationError::invalid_operation(format!(
                "Field \"{}.{}\" is a leaf and cannot have a selection",
                parent.name, field.name
            )))
        }
        (Some(returned), false) => normalize_selection_set(schema, returned, &field.selection_set)?,
        (None, true) => SelectionSet::default(),
    };
    Ok(Field {
        alias,
        name: field.name.clone(),
        arguments: field.arguments.clone(),
        selection_set,
    })
}

impl SelectionSet {
    pub fn new(selections: impl IntoIterator<Item = Selection>) -> Self {
        Self {
            selections: selections.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Selection> {
        self.selections.iter()
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.selections.iter().filter_map(|selection| match selection {
            Selection::Field(field) => Some(field),
            Selection::InlineFragment(_) => None,
        })
    }

    pub(crate) fn field_by_response_key(&self, key: &str) -> Option<&Field> {
        self.fields().find(|field| &**field.response_key() == key)
    }

    /// The response key of the first field, looking into fragments.
    pub(crate) fn first_response_key(&self) -> Option<&Name> {
        self.selections.iter().find_map(|selection| match selection {
            Selection::Field(field) if &*field.name != TYPENAME_FIELD => Some(field.response_key()),
            Selection::Field(_) => None,
            Selection::InlineFragment(fragment) => fragment.selection_set.first_response_key(),
        })
    }

    /// Adds `selection`, merging it into an existing selection with the same response key or
    /// type condition. Fails if two fields with the same response key select different fields
    /// or arguments.
    pub fn merge_selection(&mut self, selection: Selection) -> Result<(), FederationError> {
        match selection {
            Selection::Field(field) => {
                let key = field.response_key().clone();
                let existing = self.selections.iter_mut().find_map(|existing| match existing {
                    Selection::Field(existing) if *existing.response_key() == key => {
                        Some(existing)
                    }
                    _ => None,
                });
                match existing {
                    Some(existing) => {
                        if existing.name != field.name || existing.arguments != field.arguments {
                            return Err(FederationError::invalid_operation(format!(
                                "Fields \"{}\" and \"{}\" conflict on response key \"{key}\"",
                                existing.name, field.name
                            )));
                        }
                        existing.selection_set.merge(field.selection_set)?;
                    }
                    None => self.selections.push(Selection::Field(field)),
                }
            }
            Selection::InlineFragment(fragment) => {
                let existing = self.selections.iter_mut().find_map(|existing| match existing {
                    Selection::InlineFragment(existing)
                        if existing.type_condition == fragment.type_condition =>
                    {
                        Some(existing)
                    }
                    _ => None,
                });
                match existing {
                    Some(existing) => existing.selection_set.merge(fragment.selection_set)?,
                    None => self.selections.push(Selection::InlineFragment(fragment)),
                }
            }
        }
        Ok(())
    }

    pub fn merge(&mut self, other: SelectionSet) -> Result<(), FederationError> {
        for selection in other.selections {
            self.merge_selection(selection)?;
        }
        Ok(())
    }

    /// Whether `other` could be merged into this selection set without conflicts.
    pub(crate) fn can_merge(&self, other: &SelectionSet) -> bool {
        let mut merged = self.clone();
        merged.merge(other.clone()).is_ok()
    }

    pub(crate) fn add_typename(&mut self) {
        let present = self
            .fields()
            .any(|field| field.alias.is_none() && &*field.name == TYPENAME_FIELD);
        if !present {
            self.selections
                .insert(0, Selection::Field(Field::new(TYPENAME_FIELD)));
        }
    }

    /// Collects the names of the variables referenced by arguments.
    pub(crate) fn collect_variables(&self, variables: &mut IndexSet<Name>) {
        for selection in &self.selections {
            match selection {
                Selection::Field(field) => {
                    for value in field.arguments.values() {
                        collect_value_variables(value, variables);
                    }
                    field.selection_set.collect_variables(variables);
                }
                Selection::InlineFragment(fragment) => {
                    fragment.selection_set.collect_variables(variables)
                }
            }
        }
    }

    pub(crate) fn rename_variables(&mut self, renames: &IndexMap<Name, Name>) {
        for selection in &mut self.selections {
            match selection {
                Selection::Field(field) => {
                    for value in field.arguments.values_mut() {
                        rename_value_variables(value, renames);
                    }
                    field.selection_set.rename_variables(renames);
                }
                Selection::InlineFragment(fragment) => {
                    fragment.selection_set.rename_variables(renames)
                }
            }
        }
    }
}

impl Field {
    pub fn new(name: impl Into<Name>) -> Self {
        Self {
            alias: None,
            name: name.into(),
            arguments: IndexMap::new(),
            selection_set: SelectionSet::default(),
        }
    }

    pub fn alias(mut self, alias: impl Into<Name>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn argument(mut self, name: impl Into<Name>, value: ast::Value) -> Self {
        self.arguments.insert(name.into(), Node::new(value));
        self
    }

    pub fn selection(mut self, selection: impl Into<Selection>) -> Self {
        self.selection_set.selections.push(selection.into());
        self
    }

    /// The key under which the field's value appears in the response.
    pub fn response_key(&self) -> &Name {
        self.alias.as_ref().unwrap_or(&self.name)
    }
}

impl InlineFragment {
    pub fn on(type_condition: impl Into<Name>) -> Self {
        Self {
            type_condition: Some(type_condition.into()),
            selection_set: SelectionSet::default(),
        }
    }

    pub fn selection(mut self, selection: impl Into<Selection>) -> Self {
        self.selection_set.selections.push(selection.into());
        self
    }
}

/// A variable reference, as used in argument values.
pub fn variable_value(name: &str) -> ast::Value {
    ast::Value::Variable(graphql_name(name))
}

fn collect_value_variables(value: &ast::Value, variables: &mut IndexSet<Name>) {
    match value {
        ast::Value::Variable(name) => {
            variables.insert(name.as_str().into());
        }
        ast::Value::List(items) => items
            .iter()
            .for_each(|item| collect_value_variables(item, variables)),
        ast::Value::Object(fields) => fields
            .iter()
            .for_each(|(_, value)| collect_value_variables(value, variables)),
        _ => {}
    }
}

fn rename_value_variables(value: &mut Node<ast::Value>, renames: &IndexMap<Name, Name>) {
    let mut used = IndexSet::new();
    collect_value_variables(value, &mut used);
    if !used.iter().any(|name| renames.contains_key(name)) {
        return;
    }
    match value.make_mut() {
        ast::Value::Variable(name) => {
            if let Some(renamed) = renames.get(name.as_str()) {
                *name = graphql_name(renamed);
            }
        }
        ast::Value::List(items) => items
            .iter_mut()
            .for_each(|item| rename_value_variables(item, renames)),
        ast::Value::Object(fields) => fields
            .iter_mut()
            .for_each(|(_, value)| rename_value_variables(value, renames)),
        _ => {}
    }
}

/// The fields selected on objects of type `object_type`, with applicable fragments flattened
/// and fields sharing a response key merged.
pub(crate) fn collect_fields(
    schema: &FusionSchema,
    selection_set: &SelectionSet,
    object_type: &str,
) -> Result<SelectionSet, FederationError> {
    let mut flattened = SelectionSet::default();
    for selection in &selection_set.selections {
        match selection {
            Selection::Field(field) => flattened.merge_selection(field.clone().into())?,
            Selection::InlineFragment(fragment) => {
                let applies = fragment
                    .type_condition
                    .as_ref()
                    .map_or(true, |condition| {
                        schema.type_condition_applies(condition, object_type)
                    });
                if applies {
                    flattened.merge(collect_fields(
                        schema,
                        &fragment.selection_set,
                        object_type,
                    )?)?;
                }
            }
        }
    }
    Ok(flattened)
}

impl SelectionSet {
    pub fn to_ast(&self) -> Vec<ast::Selection> {
        self.selections.iter().map(Selection::to_ast).collect()
    }
}

impl Selection {
    fn to_ast(&self) -> ast::Selection {
        match self {
            Selection::Field(field) => ast::Selection::Field(Node::new(ast::Field {
                alias: field.alias.as_deref().map(graphql_name),
                name: graphql_name(&field.name),
                arguments: field
                    .arguments
                    .iter()
                    .map(|(name, value)| {
                        Node::new(ast::Argument {
                            name: graphql_name(name),
                            value: value.clone(),
                        })
                    })
                    .collect(),
                directives: Default::default(),
                selection_set: field.selection_set.to_ast(),
            })),
            Selection::InlineFragment(fragment) => {
                ast::Selection::InlineFragment(Node::new(ast::InlineFragment {
                    type_condition: fragment.type_condition.as_deref().map(graphql_name),
                    directives: Default::default(),
                    selection_set: fragment.selection_set.to_ast(),
                }))
            }
        }
    }
}

/// Prints on one line, as `{ a b { c } }`.
impl Display for SelectionSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Operation::query(self.clone())
            .to_ast()
            .serialize()
            .no_indent()
            .fmt(f)
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.to_ast().serialize().fmt(f)
    }
}
