//! The composed fusion schema.
//!
//! The schema is built once by the merger and is immutable afterwards. Types are stored in an
//! insertion-ordered map keyed by name, and every field carries the list of source schemas that
//! can resolve it, together with the requirements and provisions of each binding. Source schemas
//! are referred to by [`SubgraphId`], an index into the schema's sorted list of subgraphs.

use crate::error::FederationError;
use crate::query_plan::operation::OperationKind;
use apollo_compiler::validation::Valid;
use apollo_compiler::{ast, NodeStr, Schema};
use indexmap::{IndexMap, IndexSet};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use url::Url;

mod definitions;
pub(crate) mod field_set;
pub(crate) mod parser;
mod printer;

pub use definitions::{TypeKind, TypeRef};
pub use field_set::{FieldSet, FieldSetItem};

pub type Name = Arc<str>;

/// Converts a name of the model into an apollo-compiler name. Names reaching this point come
/// from validated schemas and documents.
pub(crate) fn graphql_name(name: &str) -> ast::Name {
    ast::Name::new_unchecked(NodeStr::new(name))
}

pub(crate) const TYPENAME_FIELD: &str = "__typename";
pub(crate) const ENTITIES_FIELD: &str = "_entities";
/// Scalars every schema has without declaring them. They are never stored in
/// [`FusionSchema::types`].
pub(crate) const BUILT_IN_SCALARS: [&str; 5] = ["Int", "Float", "String", "Boolean", "ID"];

/// Index of a source schema in [`FusionSchema::subgraphs`]. Subgraphs are sorted by name, so ids
/// order the same way names do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubgraphId(pub(crate) usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubgraphInfo {
    pub name: Name,
    pub url: Option<Url>,
}

/// The composed schema: the public type system plus the source bindings the planner needs.
#[derive(Debug, Clone)]
pub struct FusionSchema {
    subgraphs: Vec<SubgraphInfo>,
    types: IndexMap<Name, TypeDefinition>,
    /// Hex encoded SHA-256 of the printed schema. Changes whenever composition output changes.
    version: String,
    /// The client-facing schema that operations are validated against.
    api_schema: Result<Valid<Schema>, FederationError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDefinition {
    pub name: Name,
    pub kind: TypeKind,
    /// Fields of object, interface and input object types.
    pub fields: IndexMap<Name, FieldDefinition>,
    /// Interfaces implemented by object and interface types.
    pub interfaces: IndexSet<Name>,
    /// Member types of unions.
    pub members: IndexSet<Name>,
    pub enum_values: IndexSet<Name>,
    /// Ways of entering this type in a given source schema, ordered by source schema.
    pub lookups: Vec<Lookup>,
    /// The source schemas that declare this type, in id order.
    pub sources: IndexSet<SubgraphId>,
    pub inaccessible: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    pub name: Name,
    pub ty: TypeRef,
    /// Public arguments. Arguments bound to requirements are not part of this map.
    pub arguments: IndexMap<Name, ArgumentDefinition>,
    /// Source schemas able to resolve the field, in id order. Empty for input object fields.
    pub bindings: Vec<SourceBinding>,
    pub inaccessible: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentDefinition {
    pub name: Name,
    pub ty: TypeRef,
    pub default_value: Option<serde_json::Value>,
}

/// How one source schema resolves one field.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceBinding {
    pub subgraph: SubgraphId,
    /// Fields of the parent type that must be fetched before this binding can be used.
    pub requirement: Option<Requirement>,
    /// Fields of the returned type this source schema resolves at this position even though it
    /// does not own them.
    pub provides: Option<FieldSet>,
    /// One plus the number of required leaf fields.
    pub cost: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Requirement {
    pub fields: FieldSet,
    /// Hidden arguments that receive the requirement values when the field is called.
    pub arguments: Vec<RequirementArgument>,
}

/// An argument of a field that is fed by the value of a required field of the parent object.
#[derive(Debug, Clone, PartialEq)]
pub struct RequirementArgument {
    pub name: Name,
    pub ty: TypeRef,
    /// The top-level requirement field whose value is passed.
    pub field: Name,
}

/// A way of entering an entity type in a source schema from a set of key fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub subgraph: SubgraphId,
    pub key: FieldSet,
    pub kind: LookupKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LookupKind {
    /// A root query field taking the key fields as arguments.
    Field {
        field_name: Name,
        /// The declared return type, which may be an abstract type of the entity.
        return_type: Name,
        arguments: Vec<LookupArgument>,
    },
    /// The `_entities(representations:)` convention used by `@key` types.
    Entities,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LookupArgument {
    pub name: Name,
    pub ty: TypeRef,
    pub key_field: Name,
}

impl TypeDefinition {
    pub(crate) fn new(name: Name, kind: TypeKind) -> Self {
        Self {
            name,
            kind,
            fields: IndexMap::new(),
            interfaces: IndexSet::new(),
            members: IndexSet::new(),
            enum_values: IndexSet::new(),
            lookups: Vec::new(),
            sources: IndexSet::new(),
            inaccessible: false,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.get(name)
    }

    /// Lookups that enter this type in `subgraph`.
    pub fn lookups_in(&self, subgraph: SubgraphId) -> impl Iterator<Item = &Lookup> {
        self.lookups
            .iter()
            .filter(move |lookup| lookup.subgraph == subgraph)
    }

    pub fn is_declared_in(&self, subgraph: SubgraphId) -> bool {
        self.sources.contains(&subgraph)
    }
}

impl FieldDefinition {
    pub fn binding(&self, subgraph: SubgraphId) -> Option<&SourceBinding> {
        self.bindings
            .iter()
            .find(|binding| binding.subgraph == subgraph)
    }

    /// Whether `subgraph` resolves this field without any requirement.
    pub fn is_local_to(&self, subgraph: SubgraphId) -> bool {
        self.binding(subgraph)
            .is_some_and(|binding| binding.requirement.is_none())
    }
}

impl SourceBinding {
    pub(crate) fn new(
        subgraph: SubgraphId,
        requirement: Option<Requirement>,
        provides: Option<FieldSet>,
    ) -> Self {
        let cost = 1 + requirement
            .as_ref()
            .map_or(0, |requirement| requirement.fields.leaf_count() as u32);
        Self {
            subgraph,
            requirement,
            provides,
            cost,
        }
    }
}

impl Lookup {
    /// The top-level key fields.
    pub fn key_fields(&self) -> impl Iterator<Item = &Name> {
        self.key.top_level_names()
    }
}

impl FusionSchema {
    pub(crate) fn new(
        subgraphs: Vec<SubgraphInfo>,
        types: IndexMap<Name, TypeDefinition>,
    ) -> Self {
        let mut schema = Self {
            subgraphs,
            types,
            version: String::new(),
            api_schema: Err(FederationError::internal("The API schema is not built yet")),
        };
        let digest = Sha256::digest(printer::print_schema(&schema).as_bytes());
        schema.version = hex::encode(digest);
        schema.api_schema = Schema::parse_and_validate(
            printer::print_api_schema(&schema),
            "api_schema.graphql",
        )
        .map_err(|with_errors| {
            FederationError::internal(format!(
                "The API schema is invalid: {}",
                with_errors.errors
            ))
        });
        schema
    }

    /// The validated client-facing schema. Fails when the composed schema exposes something
    /// GraphQL validation rejects, such as a type with no accessible field.
    pub fn api_schema(&self) -> Result<&Valid<Schema>, FederationError> {
        self.api_schema.as_ref().map_err(Clone::clone)
    }

    pub fn subgraphs(&self) -> &[SubgraphInfo] {
        &self.subgraphs
    }

    pub fn subgraph_ids(&self) -> impl Iterator<Item = SubgraphId> {
        (0..self.subgraphs.len()).map(SubgraphId)
    }

    pub fn subgraph(&self, id: SubgraphId) -> &SubgraphInfo {
        &self.subgraphs[id.0]
    }

    pub fn subgraph_name(&self, id: SubgraphId) -> &Name {
        &self.subgraph(id).name
    }

    pub fn subgraph_id(&self, name: &str) -> Option<SubgraphId> {
        self.subgraphs
            .iter()
            .position(|subgraph| &*subgraph.name == name)
            .map(SubgraphId)
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeDefinition> {
        self.types.values()
    }

    pub fn get_type(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.get(name)
    }

    /// Like [`Self::get_type`], for names that composition guarantees to exist.
    pub(crate) fn try_get_type(&self, name: &str) -> Result<&TypeDefinition, FederationError> {
        self.get_type(name)
            .ok_or_else(|| FederationError::internal(format!("Type \"{name}\" does not exist")))
    }

    /// The composite type named `name`, or `None` for built-in scalars and declared leaf types.
    pub(crate) fn composite_type(
        &self,
        name: &str,
    ) -> Result<Option<&TypeDefinition>, FederationError> {
        if BUILT_IN_SCALARS.contains(&name) {
            return Ok(None);
        }
        let ty = self.try_get_type(name)?;
        Ok(ty.kind.is_composite().then_some(ty))
    }

    pub fn query_type(&self) -> Option<&TypeDefinition> {
        self.get_type("Query")
    }

    pub fn mutation_type(&self) -> Option<&TypeDefinition> {
        self.get_type("Mutation")
    }

    pub fn root_type(&self, kind: OperationKind) -> Option<&TypeDefinition> {
        match kind {
            OperationKind::Query => self.query_type(),
            OperationKind::Mutation => self.mutation_type(),
            OperationKind::Subscription => None,
        }
    }

    /// Root types can be entered in any source schema that declares them, without a lookup.
    pub fn is_root_type(&self, name: &str) -> bool {
        name == "Query" || name == "Mutation"
    }

    /// The object types a value of type `name` can have at runtime, in schema order.
    pub fn possible_types(&self, name: &str) -> Vec<&TypeDefinition> {
        let Some(ty) = self.get_type(name) else {
            return Vec::new();
        };
        match ty.kind {
            TypeKind::Object => vec![ty],
            TypeKind::Union => ty
                .members
                .iter()
                .filter_map(|member| self.get_type(member))
                .collect(),
            TypeKind::Interface => self
                .types
                .values()
                .filter(|candidate| {
                    candidate.kind == TypeKind::Object && candidate.interfaces.contains(name)
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Whether an object of type `object_type` matches a type condition on `condition`.
    pub fn type_condition_applies(&self, condition: &str, object_type: &str) -> bool {
        condition == object_type
            || self
                .possible_types(condition)
                .iter()
                .any(|ty| &*ty.name == object_type)
    }

    /// Hex encoded SHA-256 of the printed schema.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Prints the schema with its source annotations.
    pub fn print(&self) -> String {
        printer::print_schema(self)
    }

    /// Prints the client-facing schema: inaccessible elements, lookup plumbing and source
    /// annotations are left out.
    pub fn print_api_schema(&self) -> String {
        printer::print_api_schema(self)
    }
}
