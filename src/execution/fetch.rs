//! Building the request of one step from the data fetched so far, and splicing its response
//! back into the composed result.

use crate::error::FederationError;
use crate::execution::response::{
    deep_merge, value_at_mut, GraphQLError, Object, Path, PathElement, SubgraphResponse,
};
use crate::execution::transport::{SubgraphRequest, TransportError};
use crate::query_plan::operation::{
    variable_value, Field, InlineFragment, Operation, Selection, SelectionSet,
    VariableDefinition,
};
use crate::query_plan::{ExecutionStep, FetchPathElement, StepEntry};
use crate::schema::{FieldSet, FusionSchema, Name, TypeRef, ENTITIES_FIELD, TYPENAME_FIELD};
use apollo_compiler::ast;
use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value};

const REPRESENTATIONS: &str = "representations";

/// How the response of a step maps onto the objects it was sent for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResultShape {
    /// The response data is merged at the root.
    Root,
    /// Entity `i` is resolved under the alias `_e{i}`.
    Aliased,
    /// Entity `i` is resolved under the alias `_e{i}`, as the single element of an `_entities`
    /// list.
    AliasedEntities,
    /// Entity `i` is element `i` of `_entities`.
    Entities,
}

/// A step ready to be sent.
#[derive(Debug, Clone)]
pub(crate) struct PreparedStep {
    pub(crate) request: SubgraphRequest,
    pub(crate) shape: ResultShape,
    /// The response paths of the objects the step was sent for. For root steps, the root.
    pub(crate) targets: Vec<Path>,
    /// Where errors without a usable path are reported.
    pub(crate) error_path: Path,
}

/// Builds the request of `step`. Returns `None` when no object needs the step, e.g. because
/// every parent object is null or misses its key fields.
pub(crate) fn prepare(
    schema: &FusionSchema,
    operation: &Operation,
    step: &ExecutionStep,
    data: &Value,
    variables: &Object,
) -> Result<Option<PreparedStep>, FederationError> {
    let mut generated: Vec<(Name, TypeRef, Value)> = Vec::new();
    let (selection_set, shape, targets) = match &step.entry {
        StepEntry::Root => {
            for requirement in &step.requirements {
                let value = data
                    .as_object()
                    .and_then(|root| required_value(root, &requirement.fields))
                    .unwrap_or(Value::Null);
                generated.push((requirement.variable.clone(), requirement.ty.clone(), value));
            }
            (step.selection_set.clone(), ResultShape::Root, vec![Path::default()])
        }
        StepEntry::Lookup {
            field_name,
            return_type,
            arguments,
        } => {
            let mut selection_set = SelectionSet::default();
            let mut targets = Vec::new();
            for (path, entity) in entities(schema, step, data) {
                let Some(key_values) = arguments
                    .iter()
                    .map(|argument| {
                        entity
                            .get(&*argument.key_field)
                            .filter(|value| !value.is_null())
                            .map(|value| (argument, value.clone()))
                    })
                    .collect::<Option<Vec<_>>>()
                else {
                    continue;
                };
                let Some(requirements) = requirement_values(step, entity) else {
                    continue;
                };
                let i = targets.len();
                let mut field = Field::new(field_name.clone()).alias(format!("_e{i}"));
                for (argument, value) in key_values {
                    let variable: Name = format!("_e{i}_{}", argument.name).into();
                    field = field.argument(argument.name.clone(), variable_value(&variable));
                    generated.push((variable, argument.ty.clone(), value));
                }
                let entity_selections = entity_selection_set(step, i, requirements, &mut generated);
                field.selection_set = if return_type == &step.parent_type {
                    entity_selections
                } else {
                    SelectionSet::new([on_parent(step, entity_selections)])
                };
                selection_set.selections.push(field.into());
                targets.push(path);
            }
            (selection_set, ResultShape::Aliased, targets)
        }
        StepEntry::Entities { key } => {
            let mut representations = Vec::new();
            let mut targets = Vec::new();
            let mut selection_set = SelectionSet::default();
            for (path, entity) in entities(schema, step, data) {
                let Some(representation) = representation(step, key, entity) else {
                    continue;
                };
                let Some(requirements) = requirement_values(step, entity) else {
                    continue;
                };
                let i = targets.len();
                if !step.requirements.is_empty() {
                    let variable: Name = format!("_e{i}_{REPRESENTATIONS}").into();
                    let entity_selections =
                        entity_selection_set(step, i, requirements, &mut generated);
                    let field = Field::new(ENTITIES_FIELD)
                        .alias(format!("_e{i}"))
                        .argument(REPRESENTATIONS, variable_value(&variable))
                        .selection(on_parent(step, entity_selections));
                    selection_set.selections.push(field.into());
                    generated.push((
                        variable,
                        representations_type(),
                        Value::Array(vec![representation]),
                    ));
                } else {
                    representations.push(representation);
                }
                targets.push(path);
            }
            let shape = if step.requirements.is_empty() {
                if !targets.is_empty() {
                    let field = Field::new(ENTITIES_FIELD)
                        .argument(REPRESENTATIONS, variable_value(REPRESENTATIONS))
                        .selection(on_parent(step, step.selection_set.clone()));
                    selection_set.selections.push(field.into());
                    generated.push((
                        REPRESENTATIONS.into(),
                        representations_type(),
                        Value::Array(representations),
                    ));
                }
                ResultShape::Entities
            } else {
                ResultShape::AliasedEntities
            };
            (selection_set, shape, targets)
        }
    };
    if targets.is_empty() {
        return Ok(None);
    }

    let mut used = IndexSet::new();
    selection_set.collect_variables(&mut used);
    let mut definitions: Vec<VariableDefinition> = Vec::new();
    let mut request_variables = Object::new();
    for name in &used {
        if generated.iter().any(|(generated, _, _)| generated == name) {
            continue;
        }
        let definition = operation.variable_definition(name).ok_or_else(|| {
            FederationError::internal(format!("Variable \"${name}\" is not defined"))
        })?;
        definitions.push(VariableDefinition {
            name: name.clone(),
            ty: definition.ty.clone(),
            default_value: None,
        });
        let value = variables.get(&**name).cloned().or_else(|| {
            definition
                .default_value
                .as_ref()
                .and_then(|default| input_value_to_json(default))
        });
        if let Some(value) = value {
            request_variables.insert(name.to_string(), value);
        }
    }
    for (name, ty, value) in generated {
        if used.contains(&name) {
            definitions.push(VariableDefinition {
                name: name.clone(),
                ty,
                default_value: None,
            });
            request_variables.insert(name.to_string(), value);
        }
    }

    let error_path = match shape {
        ResultShape::Root => selection_set
            .first_response_key()
            .map(|key| Path(vec![PathElement::Key(key.to_string())]))
            .unwrap_or_default(),
        _ => targets.first().cloned().unwrap_or_default(),
    };
    let subgraph = schema.subgraph(step.subgraph);
    Ok(Some(PreparedStep {
        request: SubgraphRequest {
            subgraph_name: subgraph.name.to_string(),
            url: subgraph.url.clone(),
            query: Operation {
                kind: step.operation_kind,
                name: operation.name.clone(),
                variables: definitions,
                selection_set,
            }
            .to_compact_string(),
            operation_name: operation.name.as_ref().map(|name| name.to_string()),
            variables: request_variables,
        },
        shape,
        targets,
        error_path,
    }))
}

/// Splices the outcome of a step into `data`, and records its errors.
pub(crate) fn apply(
    prepared: &PreparedStep,
    outcome: Result<Value, TransportError>,
    data: &mut Value,
    errors: &mut Vec<GraphQLError>,
) {
    let service = prepared.request.subgraph_name.as_str();
    let response = outcome.and_then(|body| {
        serde_json::from_value::<SubgraphResponse>(body).map_err(|error| {
            TransportError::MalformedResponse {
                subgraph: service.to_string(),
                reason: error.to_string(),
            }
        })
    });
    let response = match response {
        Ok(response) => response,
        Err(error) => {
            let paths = match prepared.shape {
                ResultShape::Root => std::slice::from_ref(&prepared.error_path),
                _ => prepared.targets.as_slice(),
            };
            for path in paths {
                errors.push(
                    GraphQLError::new(error.to_string())
                        .with_path(path.clone())
                        .with_extension("code", error.code())
                        .with_extension("service", service),
                );
            }
            return;
        }
    };

    for mut error in response.errors {
        error.path = Some(
            error
                .path
                .as_ref()
                .and_then(|path| remap_path(prepared, path))
                .unwrap_or_else(|| prepared.error_path.clone()),
        );
        error
            .extensions
            .insert("service".to_string(), Value::String(service.to_string()));
        errors.push(error);
    }

    let Some(mut result) = response.data else {
        return;
    };
    match prepared.shape {
        ResultShape::Root => deep_merge(data, result),
        ResultShape::Aliased | ResultShape::AliasedEntities => {
            let Value::Object(mut result) = result else {
                return;
            };
            for (i, target) in prepared.targets.iter().enumerate() {
                let Some(mut entity) = result.remove(&format!("_e{i}")) else {
                    continue;
                };
                if prepared.shape == ResultShape::AliasedEntities {
                    entity = match entity {
                        Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
                        _ => Value::Null,
                    };
                }
                if let Some(existing) = value_at_mut(data, target) {
                    deep_merge(existing, entity);
                }
            }
        }
        ResultShape::Entities => {
            let Some(Value::Array(entities)) = result.get_mut(ENTITIES_FIELD).map(Value::take)
            else {
                return;
            };
            for (target, entity) in prepared.targets.iter().zip(entities) {
                if let Some(existing) = value_at_mut(data, target) {
                    deep_merge(existing, entity);
                }
            }
        }
    }
}

/// Maps the path of an error reported by the source schema to the composed response.
fn remap_path(prepared: &PreparedStep, path: &Path) -> Option<Path> {
    let elements = &path.0;
    let (target, rest) = match prepared.shape {
        ResultShape::Root => return Some(path.clone()),
        ResultShape::Aliased => {
            let (first, rest) = elements.split_first()?;
            (entity_index(first)?, rest)
        }
        ResultShape::AliasedEntities => {
            let (first, rest) = elements.split_first()?;
            (entity_index(first)?, rest.get(1..).unwrap_or_default())
        }
        ResultShape::Entities => match elements.as_slice() {
            [PathElement::Key(key), PathElement::Index(index), rest @ ..]
                if key == ENTITIES_FIELD =>
            {
                (*index, rest)
            }
            _ => return None,
        },
    };
    let target = prepared.targets.get(target)?;
    Some(target.join(rest.iter().cloned()))
}

fn entity_index(element: &PathElement) -> Option<usize> {
    match element {
        PathElement::Key(key) => key.strip_prefix("_e")?.parse().ok(),
        PathElement::Index(_) => None,
    }
}

/// The objects at the step's merge path whose type matches the step's parent type.
fn entities<'d>(
    schema: &FusionSchema,
    step: &ExecutionStep,
    data: &'d Value,
) -> Vec<(Path, &'d Map<String, Value>)> {
    let mut found = Vec::new();
    collect_objects(data, &step.merge_at, &mut Vec::new(), &mut found);
    found.retain(|(_, object)| {
        object
            .get(TYPENAME_FIELD)
            .and_then(Value::as_str)
            .map_or(true, |typename| {
                schema.type_condition_applies(&step.parent_type, typename)
            })
    });
    found
}

fn collect_objects<'d>(
    value: &'d Value,
    merge_at: &[FetchPathElement],
    current: &mut Vec<PathElement>,
    found: &mut Vec<(Path, &'d Map<String, Value>)>,
) {
    match (merge_at.split_first(), value) {
        (None, Value::Object(object)) => found.push((Path(current.clone()), object)),
        (Some((FetchPathElement::Key(key), rest)), Value::Object(object)) => {
            if let Some(child) = object.get(&**key) {
                current.push(PathElement::Key(key.to_string()));
                collect_objects(child, rest, current, found);
                current.pop();
            }
        }
        (Some((FetchPathElement::Flatten, rest)), Value::Array(items)) => {
            for (index, item) in items.iter().enumerate() {
                current.push(PathElement::Index(index));
                collect_objects(item, rest, current, found);
                current.pop();
            }
        }
        _ => {}
    }
}

/// The entity representation sent to `_entities`: its type name and key fields.
fn representation(
    step: &ExecutionStep,
    key: &FieldSet,
    entity: &Map<String, Value>,
) -> Option<Value> {
    let Value::Object(key_values) = project_object(entity, key, false)? else {
        return None;
    };
    let typename = entity
        .get(TYPENAME_FIELD)
        .cloned()
        .unwrap_or_else(|| Value::String(step.parent_type.to_string()));
    let mut representation = Map::new();
    representation.insert(TYPENAME_FIELD.to_string(), typename);
    representation.extend(key_values);
    Some(Value::Object(representation))
}

/// The values of the step's requirement variables for `entity`. `None` when a required field
/// is missing, which happens when the step producing it failed.
fn requirement_values(step: &ExecutionStep, entity: &Map<String, Value>) -> Option<Vec<Value>> {
    step.requirements
        .iter()
        .map(|requirement| required_value(entity, &requirement.fields))
        .collect()
}

/// The value of the single top-level field of `fields`, projected on its nested selections.
fn required_value(object: &Map<String, Value>, fields: &FieldSet) -> Option<Value> {
    let item = fields.items().first()?;
    let value = object.get(&*item.name)?;
    if item.selections.is_empty() {
        Some(value.clone())
    } else {
        project(value, &item.selections, true)
    }
}

/// The step's selection set for entity `i`, with its requirement variables renamed for the
/// entity and their values registered.
fn entity_selection_set(
    step: &ExecutionStep,
    i: usize,
    values: Vec<Value>,
    generated: &mut Vec<(Name, TypeRef, Value)>,
) -> SelectionSet {
    let mut selection_set = step.selection_set.clone();
    if step.requirements.is_empty() {
        return selection_set;
    }
    let renames: IndexMap<Name, Name> = step
        .requirements
        .iter()
        .map(|requirement| {
            (
                requirement.variable.clone(),
                Name::from(format!("_e{i}{}", requirement.variable)),
            )
        })
        .collect();
    selection_set.rename_variables(&renames);
    for (requirement, value) in step.requirements.iter().zip(values) {
        if let Some(renamed) = renames.get(&requirement.variable) {
            generated.push((renamed.clone(), requirement.ty.clone(), value));
        }
    }
    selection_set
}

fn on_parent(step: &ExecutionStep, selection_set: SelectionSet) -> Selection {
    Selection::InlineFragment(InlineFragment {
        type_condition: Some(step.parent_type.clone()),
        selection_set,
    })
}

fn representations_type() -> TypeRef {
    TypeRef::named("_Any").non_null().list().non_null()
}

fn project_object(object: &Map<String, Value>, fields: &FieldSet, allow_null: bool) -> Option<Value> {
    let mut projected = Map::new();
    for item in fields.items() {
        let value = object.get(&*item.name)?;
        let value = if item.selections.is_empty() {
            if value.is_null() && !allow_null {
                return None;
            }
            value.clone()
        } else {
            project(value, &item.selections, allow_null)?
        };
        projected.insert(item.name.to_string(), value);
    }
    Some(Value::Object(projected))
}

/// Projects `value` on `fields`, through lists. Returns `None` if a field is missing, or null
/// when `allow_null` is false.
fn project(value: &Value, fields: &FieldSet, allow_null: bool) -> Option<Value> {
    match value {
        Value::Null => allow_null.then_some(Value::Null),
        Value::Array(items) => items
            .iter()
            .map(|item| project(item, fields, allow_null))
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        Value::Object(object) => project_object(object, fields, allow_null),
        other => Some(other.clone()),
    }
}

/// Converts a default value literal. Variables cannot appear in default values.
fn input_value_to_json(value: &ast::Value) -> Option<Value> {
    Some(match value {
        ast::Value::Null => Value::Null,
        ast::Value::Boolean(value) => Value::Bool(*value),
        ast::Value::Int(value) => Value::from(value.to_string().parse::<i64>().ok()?),
        ast::Value::Float(value) => {
            Value::from(serde_json::Number::from_f64(value.to_string().parse().ok()?)?)
        }
        ast::Value::String(value) => Value::String(value.as_str().to_string()),
        ast::Value::Enum(value) => Value::String(value.as_str().to_string()),
        ast::Value::List(items) => Value::Array(
            items
                .iter()
                .map(|item| input_value_to_json(item))
                .collect::<Option<Vec<_>>>()?,
        ),
        ast::Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(name, value)| Some((name.as_str().to_string(), input_value_to_json(value)?)))
                .collect::<Option<Map<_, _>>>()?,
        ),
        ast::Value::Variable(_) => return None,
    })
}
