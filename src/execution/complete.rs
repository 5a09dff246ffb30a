//! Projects the composed data onto the client operation.
//!
//! Steps fetch more than the client asked for (key fields, requirements, `__typename`), and
//! fields whose step failed are missing. Completion keeps exactly the selected fields, in
//! selection order, and applies non-null propagation: a null in a non-null position nulls the
//! nearest nullable ancestor, up to `data` itself.

use crate::error::FederationError;
use crate::execution::response::{GraphQLError, Path, PathElement};
use crate::query_plan::operation::{collect_fields, Operation, SelectionSet};
use crate::schema::{FusionSchema, TypeDefinition, TypeRef, TYPENAME_FIELD};
use serde_json::{Map, Value};

/// A null reached a non-null position and must be propagated to the parent.
struct Propagate;

pub(crate) struct ResponseCompleter<'a> {
    schema: &'a FusionSchema,
    errors: &'a mut Vec<GraphQLError>,
    path: Vec<PathElement>,
}

impl<'a> ResponseCompleter<'a> {
    pub(crate) fn new(schema: &'a FusionSchema, errors: &'a mut Vec<GraphQLError>) -> Self {
        Self {
            schema,
            errors,
            path: Vec::new(),
        }
    }

    /// Completes the root of the response. Returns `None` when a non-null violation reached
    /// the root.
    pub(crate) fn complete(
        mut self,
        operation: &Operation,
        data: &Value,
    ) -> Result<Option<Value>, FederationError> {
        let root = self.schema.root_type(operation.kind).ok_or_else(|| {
            FederationError::internal(format!("No root type for {}", operation.kind))
        })?;
        let Some(data) = data.as_object() else {
            return Ok(None);
        };
        match self.complete_object(root, &operation.selection_set, data)? {
            Ok(value) => Ok(Some(value)),
            Err(Propagate) => Ok(None),
        }
    }

    fn complete_object(
        &mut self,
        ty: &'a TypeDefinition,
        selection_set: &SelectionSet,
        object: &Map<String, Value>,
    ) -> Result<Result<Value, Propagate>, FederationError> {
        let schema = self.schema;
        let concrete = match object.get(TYPENAME_FIELD).and_then(Value::as_str) {
            Some(typename) if ty.kind.is_abstract() => schema.try_get_type(typename)?,
            _ => ty,
        };
        let mut completed = Map::new();
        for field in collect_fields(schema, selection_set, &concrete.name)?.fields() {
            let key = field.response_key().to_string();
            if &*field.name == TYPENAME_FIELD {
                completed.insert(key, Value::String(concrete.name.to_string()));
                continue;
            }
            let definition = concrete.field(&field.name).ok_or_else(|| {
                FederationError::internal(format!(
                    "Unknown field \"{}.{}\"",
                    concrete.name, field.name
                ))
            })?;
            self.path.push(PathElement::Key(key.clone()));
            let value = self.complete_value(
                &definition.ty,
                &field.selection_set,
                object.get(&key),
                &concrete.name,
                &field.name,
            )?;
            self.path.pop();
            match value {
                Ok(value) => {
                    completed.insert(key, value);
                }
                Err(Propagate) => return Ok(Err(Propagate)),
            }
        }
        Ok(Ok(Value::Object(completed)))
    }

    fn complete_value(
        &mut self,
        ty: &TypeRef,
        selection_set: &SelectionSet,
        value: Option<&Value>,
        parent_type: &str,
        field_name: &str,
    ) -> Result<Result<Value, Propagate>, FederationError> {
        let completed = match ty {
            TypeRef::NonNull(inner) => {
                return Ok(
                    match self.complete_value(inner, selection_set, value, parent_type, field_name)? {
                        Ok(Value::Null) => {
                            self.report_non_null(parent_type, field_name);
                            Err(Propagate)
                        }
                        completed => completed,
                    },
                );
            }
            TypeRef::List(item_type) => match value {
                Some(Value::Array(items)) => {
                    let mut completed = Vec::with_capacity(items.len());
                    let mut propagated = false;
                    for (index, item) in items.iter().enumerate() {
                        self.path.push(PathElement::Index(index));
                        let item = self.complete_value(
                            item_type,
                            selection_set,
                            Some(item),
                            parent_type,
                            field_name,
                        )?;
                        self.path.pop();
                        match item {
                            Ok(item) => completed.push(item),
                            Err(Propagate) => {
                                propagated = true;
                                break;
                            }
                        }
                    }
                    if propagated {
                        Value::Null
                    } else {
                        Value::Array(completed)
                    }
                }
                _ => Value::Null,
            },
            TypeRef::Named(name) => {
                let schema = self.schema;
                match (schema.composite_type(name)?, value) {
                    (Some(named), Some(Value::Object(object))) => self
                        .complete_object(named, selection_set, object)?
                        .unwrap_or(Value::Null),
                    (None, Some(leaf)) => leaf.clone(),
                    _ => Value::Null,
                }
            }
        };
        Ok(Ok(completed))
    }

    /// Records a non-null violation at the current path, unless an error already explains it.
    fn report_non_null(&mut self, parent_type: &str, field_name: &str) {
        let path = Path(self.path.clone());
        let covered = self.errors.iter().any(|error| {
            error
                .path
                .as_ref()
                .is_some_and(|error_path| path.starts_with(error_path) || error_path.starts_with(&path))
        });
        if !covered {
            self.errors.push(
                GraphQLError::new(format!(
                    "Cannot return null for non-nullable field {parent_type}.{field_name}"
                ))
                .with_path(path),
            );
        }
    }
}
