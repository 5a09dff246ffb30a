use crate::schema::{
    FieldDefinition, FieldSet, FusionSchema, Lookup, Name, SourceBinding, SubgraphId,
    TypeDefinition, TYPENAME_FIELD,
};
use crate::utils::VisitedPath;

/// One step of a resolution attempt: resolving `type_name.field_name` through `subgraph`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathItem {
    pub type_name: Name,
    pub field_name: Name,
    pub subgraph: SubgraphId,
}

pub type SatisfiabilityPath = VisitedPath<PathItem>;

/// How execution moves into the source schema of a binding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Entry<'a> {
    /// Execution is already in the source schema.
    Local,
    /// Root types are entered directly.
    Root,
    Lookup(&'a Lookup),
}

/// Decides whether fields can be resolved from a given source schema, following lookups and
/// requirements across source schemas.
///
/// `current` is the source schema execution is in when the field is needed, or `None` at the
/// root of an operation. Every attempt to use a binding is pushed on a [`SatisfiabilityPath`];
/// an attempt already on the path is a cycle and fails.
pub(crate) struct FieldResolver<'a> {
    schema: &'a FusionSchema,
    /// Set when an attempt failed because of a cycle or an excluded source schema.
    pub(crate) hit_cycle: bool,
}

impl<'a> FieldResolver<'a> {
    pub(crate) fn new(schema: &'a FusionSchema) -> Self {
        Self {
            schema,
            hit_cycle: false,
        }
    }

    /// Whether `field_name` of `ty` can be resolved from `current` without resolving it through
    /// `exclude`.
    pub(crate) fn can_resolve(
        &mut self,
        ty: &'a TypeDefinition,
        field_name: &str,
        current: Option<SubgraphId>,
        exclude: Option<SubgraphId>,
        path: &mut SatisfiabilityPath,
    ) -> bool {
        if field_name == TYPENAME_FIELD {
            return true;
        }
        let Some(field) = ty.field(field_name) else {
            return false;
        };
        for binding in &field.bindings {
            if Some(binding.subgraph) == exclude {
                self.hit_cycle = true;
                continue;
            }
            if self.is_usable(ty, field, binding, current, path) {
                return true;
            }
        }
        false
    }

    /// Whether `binding` can be used from `current`: its source schema can be entered and its
    /// requirement can be fetched from elsewhere.
    pub(crate) fn is_usable(
        &mut self,
        ty: &'a TypeDefinition,
        field: &'a FieldDefinition,
        binding: &'a SourceBinding,
        current: Option<SubgraphId>,
        path: &mut SatisfiabilityPath,
    ) -> bool {
        let item = PathItem {
            type_name: ty.name.clone(),
            field_name: field.name.clone(),
            subgraph: binding.subgraph,
        };
        if !path.push(item) {
            self.hit_cycle = true;
            return false;
        }
        let usable = self.entry(ty, binding, current, path).is_some()
            && self.requirement_is_satisfiable(ty, binding, current, path);
        path.pop();
        usable
    }

    /// Finds how to move into `binding`'s source schema from `current`. A binding with a
    /// requirement always needs an entry point that can receive the required values, even
    /// when execution is already in its source schema.
    pub(crate) fn entry(
        &mut self,
        ty: &'a TypeDefinition,
        binding: &SourceBinding,
        current: Option<SubgraphId>,
        path: &mut SatisfiabilityPath,
    ) -> Option<Entry<'a>> {
        let target = binding.subgraph;
        if current == Some(target) && binding.requirement.is_none() {
            return Some(Entry::Local);
        }
        if self.schema.is_root_type(&ty.name) {
            return Some(Entry::Root);
        }
        self.lookup_into(ty, target, current, path)
            .map(Entry::Lookup)
    }

    /// The first lookup of `target` for `ty` whose key fields can all be resolved from
    /// `current`. Each key field is checked independently, so a composite key may be assembled
    /// from several source schemas.
    pub(crate) fn lookup_into(
        &mut self,
        ty: &'a TypeDefinition,
        target: SubgraphId,
        current: Option<SubgraphId>,
        path: &mut SatisfiabilityPath,
    ) -> Option<&'a Lookup> {
        current?;
        let exclude = (current != Some(target)).then_some(target);
        ty.lookups_in(target)
            .find(|lookup| self.field_set_is_resolvable(ty, &lookup.key, current, exclude, path))
    }

    fn requirement_is_satisfiable(
        &mut self,
        ty: &'a TypeDefinition,
        binding: &SourceBinding,
        current: Option<SubgraphId>,
        path: &mut SatisfiabilityPath,
    ) -> bool {
        match &binding.requirement {
            None => true,
            Some(requirement) => self.field_set_is_resolvable(
                ty,
                &requirement.fields,
                current,
                Some(binding.subgraph),
                path,
            ),
        }
    }

    pub(crate) fn field_set_is_resolvable(
        &mut self,
        ty: &'a TypeDefinition,
        field_set: &FieldSet,
        current: Option<SubgraphId>,
        exclude: Option<SubgraphId>,
        path: &mut SatisfiabilityPath,
    ) -> bool {
        let schema = self.schema;
        field_set.items().iter().all(|item| {
            if !self.can_resolve(ty, &item.name, current, exclude, path) {
                return false;
            }
            if item.selections.is_empty() {
                return true;
            }
            let nested = ty
                .field(&item.name)
                .and_then(|field| schema.get_type(field.ty.inner_named_type()));
            match nested {
                Some(nested) => {
                    self.field_set_is_resolvable(nested, &item.selections, current, exclude, path)
                }
                None => false,
            }
        })
    }
}
