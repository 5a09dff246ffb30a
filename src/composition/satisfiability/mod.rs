//! Proves that every field of the composed schema can be resolved wherever a client can select
//! it.
//!
//! The validator walks the schema from the root fields. Each composite type is visited once per
//! source schema that can return it, and in each of these contexts every field of the type must
//! have a usable binding: either the current source schema resolves it, or another one can be
//! entered through a lookup whose keys are themselves resolvable. Requirements are resolved
//! without the binding that needs them, and attempts are tracked on a path to cut off cycles.

mod field_resolver;
mod satisfiability_error;

use crate::schema::{FusionSchema, Name, SubgraphId, TypeDefinition, TypeKind};
use crate::utils::VisitedPath;
use std::collections::HashSet;
use tracing::{debug, instrument};

pub(crate) use field_resolver::{Entry, FieldResolver};
pub use field_resolver::{PathItem, SatisfiabilityPath};
pub use satisfiability_error::{SatisfiabilityError, UnsatisfiableReason};

/// Validates that every field reachable by clients has a resolution path.
#[instrument(skip_all)]
pub fn validate_satisfiability(schema: &FusionSchema) -> Result<(), Vec<SatisfiabilityError>> {
    let mut validator = SatisfiabilityValidator {
        schema,
        resolver: FieldResolver::new(schema),
        visited: HashSet::new(),
        reported: HashSet::new(),
        errors: Vec::new(),
    };
    validator.check_bindings_exist();
    for root in [schema.query_type(), schema.mutation_type()].into_iter().flatten() {
        validator.validate_root(root);
    }
    if validator.errors.is_empty() {
        Ok(())
    } else {
        debug!(errors = validator.errors.len(), "schema is not satisfiable");
        Err(validator.errors)
    }
}

struct SatisfiabilityValidator<'a> {
    schema: &'a FusionSchema,
    resolver: FieldResolver<'a>,
    /// Composite types already checked, by the source schema they were reached in.
    visited: HashSet<(Name, SubgraphId)>,
    reported: HashSet<(Name, Name)>,
    errors: Vec<SatisfiabilityError>,
}

impl<'a> SatisfiabilityValidator<'a> {
    fn check_bindings_exist(&mut self) {
        for ty in self.schema.types() {
            // Interface fields are resolved through the implementing objects.
            if ty.kind != TypeKind::Object {
                continue;
            }
            for field in ty.fields.values() {
                if field.bindings.is_empty() {
                    self.report(
                        ty,
                        &field.name,
                        None,
                        Vec::new(),
                        UnsatisfiableReason::NoSourceBinding,
                    );
                }
            }
        }
    }

    fn validate_root(&mut self, root: &'a TypeDefinition) {
        for field in root.fields.values() {
            if field.inaccessible {
                continue;
            }
            self.resolver.hit_cycle = false;
            let mut path = VisitedPath::new();
            let mut resolved = false;
            for binding in &field.bindings {
                if !self
                    .resolver
                    .is_usable(root, field, binding, None, &mut path)
                {
                    continue;
                }
                resolved = true;
                let trail = vec![self.trail_item(root, &field.name, binding.subgraph)];
                self.visit(field.ty.inner_named_type(), binding.subgraph, &trail);
            }
            if !resolved && !field.bindings.is_empty() {
                let reason = self.failure_reason();
                self.report(root, &field.name, None, Vec::new(), reason);
            }
        }
    }

    fn visit(&mut self, type_name: &Name, subgraph: SubgraphId, trail: &[String]) {
        let schema = self.schema;
        let Some(ty) = schema.get_type(type_name) else {
            return;
        };
        if !ty.kind.is_composite() || !self.visited.insert((type_name.clone(), subgraph)) {
            return;
        }
        if ty.kind.is_abstract() {
            for object in schema.possible_types(type_name) {
                if object.is_declared_in(subgraph) && !object.inaccessible {
                    self.visit(&object.name, subgraph, trail);
                }
            }
            return;
        }

        for field in ty.fields.values() {
            if field.inaccessible || field.bindings.is_empty() {
                continue;
            }
            self.resolver.hit_cycle = false;
            let mut path = VisitedPath::new();
            let usable: Vec<SubgraphId> = field
                .bindings
                .iter()
                .filter(|binding| {
                    self.resolver
                        .is_usable(ty, field, binding, Some(subgraph), &mut path)
                })
                .map(|binding| binding.subgraph)
                .collect();
            if usable.is_empty() {
                let reason = self.failure_reason();
                let subgraph_name = schema.subgraph_name(subgraph).clone();
                self.report(ty, &field.name, Some(subgraph_name), trail.to_vec(), reason);
                continue;
            }
            for next in usable {
                let mut next_trail = trail.to_vec();
                next_trail.push(self.trail_item(ty, &field.name, next));
                self.visit(field.ty.inner_named_type(), next, &next_trail);
            }
        }
    }

    fn trail_item(&self, ty: &TypeDefinition, field_name: &Name, subgraph: SubgraphId) -> String {
        format!(
            "{}.{}<{}>",
            ty.name,
            field_name,
            self.schema.subgraph_name(subgraph)
        )
    }

    fn failure_reason(&self) -> UnsatisfiableReason {
        if self.resolver.hit_cycle {
            UnsatisfiableReason::RequirementCycle
        } else {
            UnsatisfiableReason::Unreachable
        }
    }

    fn report(
        &mut self,
        ty: &TypeDefinition,
        field_name: &Name,
        subgraph: Option<Name>,
        path: Vec<String>,
        reason: UnsatisfiableReason,
    ) {
        if !self.reported.insert((ty.name.clone(), field_name.clone())) {
            return;
        }
        self.errors.push(SatisfiabilityError {
            type_name: ty.name.clone(),
            field_name: field_name.clone(),
            subgraph,
            path,
            reason,
        });
    }
}
