//! Merges source schemas into a [`FusionSchema`].
//!
//! Source schemas are processed in name order, so the result does not depend on the order in
//! which they are handed over. Every problem found along the way is collected: a failed merge
//! reports all of its errors at once, together with the hints gathered so far.

use crate::composition::diagnostics::{human_readable_list, CompositionHint, HintCode};
use crate::error::SingleFederationError;
use crate::schema::{
    ArgumentDefinition, FieldDefinition, FieldSet, FusionSchema, Lookup, LookupArgument,
    LookupKind, Name, Requirement, RequirementArgument, SourceBinding, SubgraphId, SubgraphInfo,
    TypeDefinition, TypeKind, TypeRef, BUILT_IN_SCALARS, ENTITIES_FIELD,
};
use crate::subgraph::{FusionDirective, SourceField, SourceSchema, SourceType};
use indexmap::{IndexMap, IndexSet};
use multimap::MultiMap;
use std::collections::HashMap;
use tracing::{debug, instrument};


#[derive(Debug)]
pub struct MergeSuccess {
    pub schema: FusionSchema,
    pub hints: Vec<CompositionHint>,
}

#[derive(Debug)]
pub struct MergeFailure {
    pub errors: Vec<SingleFederationError>,
    pub hints: Vec<CompositionHint>,
}

/// Merges the given source schemas into a single fusion schema.
#[instrument(skip_all, fields(source_schemas = sources.len()))]
pub fn merge(sources: &[SourceSchema]) -> Result<MergeSuccess, MergeFailure> {
    let mut merger = Merger::default();
    merger.merge(sources);
    let Merger {
        subgraphs,
        types,
        lookups,
        errors,
        hints,
    } = merger;
    if !errors.is_empty() {
        debug!(errors = errors.len(), "merge failed");
        return Err(MergeFailure { errors, hints });
    }
    let mut definitions = IndexMap::with_capacity(types.len());
    for (name, merged) in types {
        let mut definition = merged.definition;
        if let Some(type_lookups) = lookups.get_vec(&name) {
            definition.lookups = type_lookups.clone();
            definition.lookups.sort_by_key(|lookup| lookup.subgraph);
        }
        definitions.insert(name, definition);
    }
    Ok(MergeSuccess {
        schema: FusionSchema::new(subgraphs, definitions),
        hints,
    })
}

/// A field as declared by one source schema.
#[derive(Debug)]
struct FieldDeclaration {
    subgraph: SubgraphId,
    ty: TypeRef,
    arguments: Vec<ArgumentDefinition>,
    external: bool,
    /// Set by `@shareable` on the field or on its type.
    shareable: bool,
    inaccessible: bool,
    lookup: bool,
    override_from: Option<String>,
    requires: Option<String>,
    provides: Option<String>,
}

#[derive(Debug)]
struct MergedType {
    /// Fields are filled in once every source schema has been collected.
    definition: TypeDefinition,
    /// The first source schema that declared the type, for kind mismatch reporting.
    origin: SubgraphId,
    fields: IndexMap<Name, Vec<FieldDeclaration>>,
    keys: Vec<(SubgraphId, String)>,
}

#[derive(Default)]
struct Merger {
    subgraphs: Vec<SubgraphInfo>,
    types: IndexMap<Name, MergedType>,
    /// Lookups by the type they enter.
    lookups: MultiMap<Name, Lookup>,
    errors: Vec<SingleFederationError>,
    hints: Vec<CompositionHint>,
}

impl Merger {
    fn merge(&mut self, sources: &[SourceSchema]) {
        let mut sorted: Vec<&SourceSchema> = sources.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));

        let mut accepted: Vec<&SourceSchema> = Vec::with_capacity(sorted.len());
        let mut reported = IndexSet::new();
        for source in sorted {
            if accepted.last().is_some_and(|last| last.name == source.name) {
                if reported.insert(source.name.as_str()) {
                    self.errors.push(SingleFederationError::DuplicateSubgraph {
                        name: source.name.clone(),
                    });
                }
                continue;
            }
            accepted.push(source);
        }
        self.subgraphs = accepted
            .iter()
            .map(|source| SubgraphInfo {
                name: source.name.as_str().into(),
                url: source.url.clone(),
            })
            .collect();

        for (index, source) in accepted.iter().enumerate() {
            for ty in &source.types {
                self.collect_type(SubgraphId(index), ty);
            }
        }

        if !self.types.contains_key("Query") {
            self.errors.push(SingleFederationError::MissingQueryRoot);
        }
        for root in ["Query", "Mutation"] {
            if let Some(merged) = self.types.get(root) {
                if merged.definition.kind != TypeKind::Object {
                    self.errors.push(SingleFederationError::InvalidSourceSchema {
                        subgraph: self.subgraph_name(merged.origin).to_string(),
                        message: format!("Root type \"{root}\" must be an object type"),
                    });
                }
            }
        }

        self.register_keys();
        self.register_lookup_fields();
        self.merge_fields();
        self.validate_references();
        self.validate_field_sets();
    }

    fn subgraph_name(&self, id: SubgraphId) -> &Name {
        &self.subgraphs[id.0].name
    }

    fn invalid_source(&mut self, subgraph: SubgraphId, message: String) {
        self.errors.push(SingleFederationError::InvalidSourceSchema {
            subgraph: self.subgraph_name(subgraph).to_string(),
            message,
        });
    }

    fn collect_type(&mut self, subgraph: SubgraphId, source_type: &SourceType) {
        let name: Name = source_type.name.as_str().into();
        if let Some(existing) = self.types.get(&name) {
            if existing.definition.kind != source_type.kind {
                self.errors.push(SingleFederationError::TypeKindMismatch {
                    type_name: name.to_string(),
                    first_kind: existing.definition.kind.to_string(),
                    first_subgraph: self.subgraph_name(existing.origin).to_string(),
                    second_kind: source_type.kind.to_string(),
                    second_subgraph: self.subgraph_name(subgraph).to_string(),
                });
                return;
            }
        }

        let mut type_shareable = false;
        let mut type_inaccessible = false;
        let mut keys = Vec::new();
        for directive in &source_type.directives {
            match directive {
                FusionDirective::Key { fields }
                    if matches!(source_type.kind, TypeKind::Object | TypeKind::Interface) =>
                {
                    keys.push((subgraph, fields.clone()))
                }
                FusionDirective::Shareable if source_type.kind == TypeKind::Object => {
                    type_shareable = true
                }
                FusionDirective::Inaccessible => type_inaccessible = true,
                other => self.invalid_source(
                    subgraph,
                    format!(
                        "{} is not allowed on {} type \"{name}\"",
                        <&str>::from(other),
                        source_type.kind
                    ),
                ),
            }
        }

        let mut declarations = Vec::with_capacity(source_type.fields.len());
        for field in &source_type.fields {
            if &*name == "Query" && field.name == ENTITIES_FIELD {
                continue;
            }
            if let Some(declaration) =
                self.collect_field(subgraph, source_type, field, type_shareable)
            {
                declarations.push((Name::from(field.name.as_str()), declaration));
            }
        }

        let merged = self.types.entry(name.clone()).or_insert_with(|| MergedType {
            definition: TypeDefinition::new(name, source_type.kind),
            origin: subgraph,
            fields: IndexMap::new(),
            keys: Vec::new(),
        });
        let definition = &mut merged.definition;
        definition.sources.insert(subgraph);
        definition.inaccessible |= type_inaccessible;
        definition
            .interfaces
            .extend(source_type.interfaces.iter().map(|name| Name::from(name.as_str())));
        definition
            .members
            .extend(source_type.members.iter().map(|name| Name::from(name.as_str())));
        definition
            .enum_values
            .extend(source_type.values.iter().map(|name| Name::from(name.as_str())));
        merged.keys.extend(keys);
        for (field_name, declaration) in declarations {
            merged.fields.entry(field_name).or_default().push(declaration);
        }
    }

    fn collect_field(
        &mut self,
        subgraph: SubgraphId,
        source_type: &SourceType,
        field: &SourceField,
        type_shareable: bool,
    ) -> Option<FieldDeclaration> {
        let coordinate = format!("{}.{}", source_type.name, field.name);
        let ty = match field.ty.parse::<TypeRef>() {
            Ok(ty) => ty,
            Err(message) => {
                self.invalid_source(
                    subgraph,
                    format!("Invalid type for field \"{coordinate}\": {message}"),
                );
                return None;
            }
        };
        let mut arguments = Vec::with_capacity(field.arguments.len());
        for argument in &field.arguments {
            match argument.ty.parse::<TypeRef>() {
                Ok(ty) => arguments.push(ArgumentDefinition {
                    name: argument.name.as_str().into(),
                    ty,
                    default_value: argument.default_value.clone(),
                }),
                Err(message) => self.invalid_source(
                    subgraph,
                    format!(
                        "Invalid type for argument \"{coordinate}({}:)\": {message}",
                        argument.name
                    ),
                ),
            }
        }

        let mut declaration = FieldDeclaration {
            subgraph,
            ty,
            arguments,
            external: false,
            shareable: type_shareable,
            inaccessible: false,
            lookup: false,
            override_from: None,
            requires: None,
            provides: None,
        };
        let is_input = source_type.kind == TypeKind::InputObject;
        for directive in &field.directives {
            match directive {
                FusionDirective::Inaccessible => declaration.inaccessible = true,
                FusionDirective::External if !is_input => declaration.external = true,
                FusionDirective::Shareable if !is_input => declaration.shareable = true,
                FusionDirective::Requires { fields } if !is_input => {
                    declaration.requires = Some(fields.clone())
                }
                FusionDirective::Provides { fields } if !is_input => {
                    declaration.provides = Some(fields.clone())
                }
                FusionDirective::Override { from } if !is_input => {
                    declaration.override_from = Some(from.clone())
                }
                FusionDirective::Lookup if source_type.name == "Query" => declaration.lookup = true,
                FusionDirective::Lookup => self.errors.push(SingleFederationError::InvalidLookup {
                    subgraph: self.subgraph_name(subgraph).to_string(),
                    field_name: coordinate.clone(),
                    message: "lookups must be fields of the \"Query\" type".to_string(),
                }),
                other => self.invalid_source(
                    subgraph,
                    format!(
                        "{} is not allowed on field \"{coordinate}\"",
                        <&str>::from(other)
                    ),
                ),
            }
        }
        Some(declaration)
    }

    fn register_keys(&mut self) {
        let mut registered = Vec::new();
        for merged in self.types.values() {
            for (subgraph, fields) in &merged.keys {
                let key = match FieldSet::parse(fields) {
                    Ok(key) => key,
                    Err(message) => {
                        self.errors.push(SingleFederationError::InvalidFieldSet {
                            subgraph: self.subgraph_name(*subgraph).to_string(),
                            type_name: merged.definition.name.to_string(),
                            field_set: fields.clone(),
                            message,
                        });
                        continue;
                    }
                };
                let missing = key.top_level_names().find(|name| {
                    !merged
                        .fields
                        .get(*name)
                        .is_some_and(|declarations| {
                            declarations.iter().any(|d| d.subgraph == *subgraph)
                        })
                });
                if let Some(missing) = missing {
                    self.errors.push(SingleFederationError::InvalidFieldSet {
                        subgraph: self.subgraph_name(*subgraph).to_string(),
                        type_name: merged.definition.name.to_string(),
                        field_set: fields.clone(),
                        message: format!(
                            "field \"{missing}\" is not declared on the type in this source schema"
                        ),
                    });
                    continue;
                }
                registered.push((
                    merged.definition.name.clone(),
                    Lookup {
                        subgraph: *subgraph,
                        key,
                        kind: LookupKind::Entities,
                    },
                ));
            }
        }
        for (type_name, lookup) in registered {
            self.register_lookup(&type_name, lookup);
        }
    }

    fn register_lookup_fields(&mut self) {
        let Some(query) = self.types.get("Query") else {
            return;
        };
        let mut registered = Vec::new();
        for (field_name, declarations) in &query.fields {
            for declaration in declarations.iter().filter(|d| d.lookup) {
                match self.lookup_for_field(field_name, declaration) {
                    Ok((type_name, lookup)) => registered.push((type_name, lookup)),
                    Err(message) => self.errors.push(SingleFederationError::InvalidLookup {
                        subgraph: self.subgraph_name(declaration.subgraph).to_string(),
                        field_name: format!("Query.{field_name}"),
                        message,
                    }),
                }
            }
        }
        for (type_name, lookup) in registered {
            self.register_lookup(&type_name, lookup);
        }
    }

    fn lookup_for_field(
        &self,
        field_name: &Name,
        declaration: &FieldDeclaration,
    ) -> Result<(Name, Lookup), String> {
        if declaration.ty.is_list() {
            return Err("lookups must return a single entity, not a list".to_string());
        }
        let return_type = declaration.ty.inner_named_type();
        let target = self
            .types
            .get(return_type)
            .filter(|target| {
                matches!(
                    target.definition.kind,
                    TypeKind::Object | TypeKind::Interface
                )
            })
            .ok_or_else(|| {
                format!("lookups must return an object or interface type, found \"{return_type}\"")
            })?;
        if declaration.arguments.is_empty() {
            return Err("lookups must take at least one key argument".to_string());
        }
        let mut arguments = Vec::with_capacity(declaration.arguments.len());
        let mut key = FieldSet::default();
        for argument in &declaration.arguments {
            let is_leaf_field = target.fields.get(&argument.name).is_some_and(|declarations| {
                declarations
                    .first()
                    .is_some_and(|d| !self.is_composite(d.ty.inner_named_type()))
            });
            if !is_leaf_field {
                return Err(format!(
                    "argument \"{}\" does not match a leaf field of \"{return_type}\"",
                    argument.name
                ));
            }
            key.merge(&FieldSet::leaf(argument.name.clone()));
            arguments.push(LookupArgument {
                name: argument.name.clone(),
                ty: argument.ty.clone(),
                key_field: argument.name.clone(),
            });
        }
        Ok((
            return_type.clone(),
            Lookup {
                subgraph: declaration.subgraph,
                key,
                kind: LookupKind::Field {
                    field_name: field_name.clone(),
                    return_type: return_type.clone(),
                    arguments,
                },
            },
        ))
    }

    /// Registers `lookup` on `type_name`, and on the object types implementing it in the same
    /// source schema when `type_name` is an interface.
    fn register_lookup(&mut self, type_name: &Name, lookup: Lookup) {
        if self
            .types
            .get(type_name)
            .is_some_and(|merged| merged.definition.kind == TypeKind::Interface)
        {
            let implementations: Vec<Name> = self
                .types
                .values()
                .filter(|candidate| {
                    candidate.definition.kind == TypeKind::Object
                        && candidate.definition.sources.contains(&lookup.subgraph)
                        && candidate.definition.interfaces.contains(type_name)
                })
                .map(|candidate| candidate.definition.name.clone())
                .collect();
            for implementation in implementations {
                self.lookups.insert(implementation, lookup.clone());
            }
        }
        self.lookups.insert(type_name.clone(), lookup);
    }

    fn is_composite(&self, type_name: &str) -> bool {
        self.types
            .get(type_name)
            .is_some_and(|merged| merged.definition.kind.is_composite())
    }

    /// Top-level key fields of every lookup registered on a type.
    fn key_fields(&self) -> HashMap<Name, IndexSet<Name>> {
        let mut key_fields: HashMap<Name, IndexSet<Name>> = HashMap::new();
        for (type_name, lookups) in self.lookups.iter_all() {
            let entry = key_fields.entry(type_name.clone()).or_default();
            for lookup in lookups {
                entry.extend(lookup.key_fields().cloned());
            }
        }
        key_fields
    }

    fn merge_fields(&mut self) {
        let key_fields = self.key_fields();
        let no_keys = IndexSet::new();
        let mut merged_fields = Vec::new();
        let mut reports = Vec::new();
        for merged in self.types.values() {
            let keys = key_fields.get(&merged.definition.name).unwrap_or(&no_keys);
            let mut fields = IndexMap::with_capacity(merged.fields.len());
            for (field_name, declarations) in &merged.fields {
                let (field, report) = self.merge_field(merged, field_name, declarations, keys);
                if let Some(field) = field {
                    fields.insert(field_name.clone(), field);
                }
                reports.push(report);
            }
            merged_fields.push(fields);
        }
        for (merged, fields) in self.types.values_mut().zip(merged_fields) {
            merged.definition.fields = fields;
        }
        for report in reports {
            self.errors.extend(report.errors);
            self.hints.extend(report.hints);
        }
    }

    fn merge_field(
        &self,
        merged: &MergedType,
        field_name: &Name,
        declarations: &[FieldDeclaration],
        keys: &IndexSet<Name>,
    ) -> (Option<FieldDefinition>, FieldReport) {
        let mut report = FieldReport::default();
        let type_name = &merged.definition.name;
        let coordinate = format!("{type_name}.{field_name}");
        let is_input = merged.definition.kind == TypeKind::InputObject;

        let owned: Vec<&FieldDeclaration> = declarations.iter().filter(|d| !d.external).collect();
        if owned.is_empty() {
            report.errors.push(SingleFederationError::ExternalMissingDefinition {
                type_name: type_name.to_string(),
                field_name: field_name.to_string(),
                subgraphs: human_readable_list(
                    declarations.iter().map(|d| self.subgraph_name(d.subgraph)),
                ),
            });
            return (None, report);
        }

        let ty = match self.merge_field_types(declarations, is_input) {
            Some(ty) => ty,
            None => {
                report.errors.push(SingleFederationError::FieldTypeMismatch {
                    type_name: type_name.to_string(),
                    field_name: field_name.to_string(),
                    details: self.describe_types(declarations),
                });
                return (None, report);
            }
        };
        if declarations.iter().any(|d| d.ty != ty) {
            report.hints.push(CompositionHint::new(
                HintCode::InconsistentNullability,
                format!(
                    "Field \"{coordinate}\" has inconsistent nullability across source schemas ({}), it is composed as \"{ty}\"",
                    self.describe_types(declarations)
                ),
            ));
        }

        let overridden = self.overridden_subgraphs(type_name, field_name, &owned, &mut report);
        let bound: Vec<&FieldDeclaration> = owned
            .into_iter()
            .filter(|d| !overridden.contains(&d.subgraph))
            .collect();

        let mut bindings = Vec::new();
        let mut public_arguments: Vec<IndexMap<Name, &ArgumentDefinition>> = Vec::new();
        for declaration in &bound {
            let subgraph = self.subgraph_name(declaration.subgraph).to_string();
            let requirement = match &declaration.requires {
                None => None,
                Some(fields) => match self.requirement(declaration, fields) {
                    Ok(requirement) => Some(requirement),
                    Err(message) => {
                        report.errors.push(SingleFederationError::InvalidRequirement {
                            subgraph,
                            type_name: type_name.to_string(),
                            field_name: field_name.to_string(),
                            message,
                        });
                        continue;
                    }
                },
            };
            let provides = match &declaration.provides {
                None => None,
                Some(fields) => match FieldSet::parse(fields) {
                    Ok(provides) => Some(provides),
                    Err(message) => {
                        report.errors.push(SingleFederationError::InvalidFieldSet {
                            subgraph,
                            type_name: declaration.ty.inner_named_type().to_string(),
                            field_set: fields.clone(),
                            message,
                        });
                        None
                    }
                },
            };
            let hidden: Vec<&Name> = requirement
                .iter()
                .flat_map(|requirement| requirement.arguments.iter().map(|a| &a.name))
                .collect();
            public_arguments.push(
                declaration
                    .arguments
                    .iter()
                    .filter(|argument| !hidden.contains(&&argument.name))
                    .map(|argument| (argument.name.clone(), argument))
                    .collect(),
            );
            if !is_input {
                bindings.push(SourceBinding::new(
                    declaration.subgraph,
                    requirement,
                    provides,
                ));
            }
        }

        if bindings.len() > 1
            && !keys.contains(field_name)
            && !bound.iter().any(|d| d.lookup)
        {
            let non_shareable: Vec<&Name> = bound
                .iter()
                .filter(|d| !d.shareable)
                .map(|d| self.subgraph_name(d.subgraph))
                .collect();
            if !non_shareable.is_empty() {
                report.errors.push(SingleFederationError::InvalidFieldSharing {
                    type_name: type_name.to_string(),
                    field_name: field_name.to_string(),
                    subgraphs: human_readable_list(
                        bound.iter().map(|d| self.subgraph_name(d.subgraph)),
                    ),
                    non_shareable: human_readable_list(non_shareable),
                });
            }
        }

        let arguments = merge_arguments(
            type_name,
            field_name,
            &public_arguments,
            &mut report,
        );
        let field = FieldDefinition {
            name: field_name.clone(),
            ty,
            arguments,
            bindings,
            inaccessible: declarations.iter().any(|d| d.inaccessible),
        };
        (Some(field), report)
    }

    fn merge_field_types(&self, declarations: &[FieldDeclaration], is_input: bool) -> Option<TypeRef> {
        let (first, rest) = declarations.split_first()?;
        rest.iter().try_fold(first.ty.clone(), |merged, declaration| {
            if is_input {
                merged.merge_input(&declaration.ty)
            } else {
                merged.merge_output(&declaration.ty)
            }
        })
    }

    fn describe_types(&self, declarations: &[FieldDeclaration]) -> String {
        declarations
            .iter()
            .map(|d| format!("\"{}\" in \"{}\"", d.ty, self.subgraph_name(d.subgraph)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Applies `@override` among the owning declarations and returns the source schemas that
    /// lost the field.
    fn overridden_subgraphs(
        &self,
        type_name: &Name,
        field_name: &Name,
        owned: &[&FieldDeclaration],
        report: &mut FieldReport,
    ) -> IndexSet<SubgraphId> {
        let coordinate = format!("{type_name}.{field_name}");
        let mut overridden = IndexSet::new();
        for declaration in owned {
            let Some(from) = &declaration.override_from else {
                continue;
            };
            let subgraph = self.subgraph_name(declaration.subgraph);
            let invalid = |message: String| SingleFederationError::InvalidOverride {
                subgraph: subgraph.to_string(),
                type_name: type_name.to_string(),
                field_name: field_name.to_string(),
                message,
            };
            if **subgraph == **from {
                report
                    .errors
                    .push(invalid("a source schema cannot override its own field".to_string()));
                continue;
            }
            let Some(from_id) = self
                .subgraphs
                .iter()
                .position(|info| *info.name == **from)
                .map(SubgraphId)
            else {
                report.errors.push(invalid(format!(
                    "\"{from}\" is not a known source schema"
                )));
                continue;
            };
            match owned.iter().find(|other| other.subgraph == from_id) {
                Some(other)
                    if other
                        .override_from
                        .as_deref()
                        .is_some_and(|back| back == &**subgraph) =>
                {
                    report.errors.push(invalid(format!(
                        "\"{from}\" overrides the field from \"{subgraph}\" as well"
                    )));
                }
                Some(_) => {
                    overridden.insert(from_id);
                    report.hints.push(CompositionHint::new(
                        HintCode::OverriddenField,
                        format!(
                            "Field \"{coordinate}\" is now resolved by \"{subgraph}\" instead of \"{from}\""
                        ),
                    ));
                }
                None => report.hints.push(CompositionHint::new(
                    HintCode::UselessOverride,
                    format!(
                        "Field \"{coordinate}\" in \"{subgraph}\" overrides \"{from}\", which does not resolve it"
                    ),
                )),
            }
        }
        overridden
    }

    /// Parses a `@requires` field set and binds each top-level required field to the argument
    /// of the same name.
    fn requirement(
        &self,
        declaration: &FieldDeclaration,
        fields: &str,
    ) -> Result<Requirement, String> {
        let fields = FieldSet::parse(fields)?;
        let mut arguments = Vec::new();
        for required in fields.top_level_names() {
            let argument = declaration
                .arguments
                .iter()
                .find(|argument| &argument.name == required)
                .ok_or_else(|| {
                    format!("required field \"{required}\" has no argument of the same name to receive its value")
                })?;
            arguments.push(RequirementArgument {
                name: argument.name.clone(),
                ty: argument.ty.clone(),
                field: required.clone(),
            });
        }
        Ok(Requirement { fields, arguments })
    }

    /// Checks that every type referenced by a field, union or interface list exists.
    fn validate_references(&mut self) {
        let mut unknown = Vec::new();
        for merged in self.types.values() {
            let definition = &merged.definition;
            for field in definition.fields.values() {
                let named = field.ty.inner_named_type();
                if !self.is_known_type(named) {
                    unknown.push((
                        merged.origin,
                        format!(
                            "Field \"{}.{}\" references unknown type \"{named}\"",
                            definition.name, field.name
                        ),
                    ));
                }
            }
            for member in definition.members.iter().chain(&definition.interfaces) {
                if !self.is_known_type(member) {
                    unknown.push((
                        merged.origin,
                        format!(
                            "Type \"{}\" references unknown type \"{member}\"",
                            definition.name
                        ),
                    ));
                }
            }
        }
        for (subgraph, message) in unknown {
            self.invalid_source(subgraph, message);
        }
    }

    fn is_known_type(&self, name: &str) -> bool {
        BUILT_IN_SCALARS.contains(&name) || self.types.contains_key(name)
    }

    /// Checks that the fields named by keys, requirements and provisions exist on the composed
    /// types they apply to.
    fn validate_field_sets(&mut self) {
        let mut errors = Vec::new();
        for merged in self.types.values() {
            let type_name = &merged.definition.name;
            for lookup in self.lookups.get_vec(type_name).into_iter().flatten() {
                if let Err(message) = self.check_field_set(type_name, &lookup.key) {
                    errors.push(SingleFederationError::InvalidFieldSet {
                        subgraph: self.subgraph_name(lookup.subgraph).to_string(),
                        type_name: type_name.to_string(),
                        field_set: lookup.key.to_string(),
                        message,
                    });
                }
            }
            for field in merged.definition.fields.values() {
                for binding in &field.bindings {
                    let subgraph = self.subgraph_name(binding.subgraph).to_string();
                    if let Some(requirement) = &binding.requirement {
                        if let Err(message) = self.check_field_set(type_name, &requirement.fields) {
                            errors.push(SingleFederationError::InvalidRequirement {
                                subgraph: subgraph.clone(),
                                type_name: type_name.to_string(),
                                field_name: field.name.to_string(),
                                message,
                            });
                        }
                    }
                    if let Some(provides) = &binding.provides {
                        let returned = field.ty.inner_named_type();
                        if let Err(message) = self.check_field_set(returned, provides) {
                            errors.push(SingleFederationError::InvalidFieldSet {
                                subgraph,
                                type_name: returned.to_string(),
                                field_set: provides.to_string(),
                                message,
                            });
                        }
                    }
                }
            }
        }
        self.errors.extend(errors);
    }

    fn check_field_set(&self, type_name: &str, field_set: &FieldSet) -> Result<(), String> {
        let merged = self
            .types
            .get(type_name)
            .ok_or_else(|| format!("type \"{type_name}\" does not exist"))?;
        for item in field_set.items() {
            let field = merged
                .definition
                .fields
                .get(&item.name)
                .ok_or_else(|| format!("field \"{type_name}.{}\" does not exist", item.name))?;
            let named = field.ty.inner_named_type();
            match (self.is_composite(named), item.selections.is_empty()) {
                (true, true) => {
                    return Err(format!(
                        "field \"{type_name}.{}\" returns a composite type and needs a selection",
                        item.name
                    ))
                }
                (false, false) => {
                    return Err(format!(
                        "field \"{type_name}.{}\" returns a leaf type and cannot have a selection",
                        item.name
                    ))
                }
                (true, false) => self.check_field_set(named, &item.selections)?,
                (false, true) => {}
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct FieldReport {
    errors: Vec<SingleFederationError>,
    hints: Vec<CompositionHint>,
}

/// Keeps the arguments every binding declares publicly. Arguments missing from some binding are
/// dropped with a hint.
fn merge_arguments(
    type_name: &Name,
    field_name: &Name,
    per_binding: &[IndexMap<Name, &ArgumentDefinition>],
    report: &mut FieldReport,
) -> IndexMap<Name, ArgumentDefinition> {
    let mut merged = IndexMap::new();
    let Some((first, rest)) = per_binding.split_first() else {
        return merged;
    };
    let mut all_names: IndexSet<&Name> = IndexSet::new();
    for arguments in per_binding {
        all_names.extend(arguments.keys());
    }
    for name in all_names {
        if !per_binding.iter().all(|arguments| arguments.contains_key(name)) {
            report.hints.push(CompositionHint::new(
                HintCode::InconsistentArguments,
                format!(
                    "Argument \"{name}\" of field \"{type_name}.{field_name}\" is not declared by every source schema resolving the field and is left out of the composed schema"
                ),
            ));
            continue;
        }
        let Some(base) = first.get(name) else {
            continue;
        };
        let mut ty = base.ty.clone();
        let mut default_value = base.default_value.clone();
        for arguments in rest {
            let Some(other) = arguments.get(name) else {
                continue;
            };
            match ty.merge_input(&other.ty) {
                Some(merged_ty) => ty = merged_ty,
                None => {
                    report.errors.push(SingleFederationError::ArgumentTypeMismatch {
                        type_name: type_name.to_string(),
                        field_name: field_name.to_string(),
                        argument_name: name.to_string(),
                        details: format!("\"{}\" and \"{}\"", base.ty, other.ty),
                    });
                    break;
                }
            }
            if default_value.is_none() {
                default_value = other.default_value.clone();
            }
        }
        merged.insert(
            name.clone(),
            ArgumentDefinition {
                name: name.clone(),
                ty,
                default_value,
            },
        );
    }
    merged
}
