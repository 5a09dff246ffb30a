use crate::composition::satisfiability::{FieldResolver, PathItem, SatisfiabilityPath};
use crate::error::FederationError;
use crate::query_plan::operation::{
    collect_fields, variable_value, Field, InlineFragment, Operation, OperationKind, Selection,
    SelectionSet,
};
use crate::query_plan::{ExecutionStep, FetchPathElement, RequirementInput, StepEntry, StepId};
use crate::schema::{
    FieldSet, FieldSetItem, FusionSchema, LookupKind, Name, SubgraphId, TypeDefinition, TypeRef,
    TYPENAME_FIELD,
};
use apollo_compiler::Node;
use indexmap::{IndexMap, IndexSet};
use petgraph::algo::has_path_connecting;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{error, trace};

/// A step under construction.
#[derive(Debug, Clone)]
pub(crate) struct FetchDependencyGraphNode {
    /// The source schema the step is sent to.
    pub(crate) subgraph: SubgraphId,
    /// How the selection set is attached to the source schema's operation.
    pub(crate) entry: StepEntry,
    /// The response path of the objects the step applies to.
    pub(crate) merge_at: Vec<FetchPathElement>,
    /// The type of the objects at `merge_at`. For root steps, the root type.
    pub(crate) parent_type: Name,
    pub(crate) selection_set: SelectionSet,
    /// Values projected from each entity and passed to requirement arguments.
    pub(crate) requirements: Vec<RequirementInput>,
    /// Mutation root steps: their order is significant, so they are never merged.
    pub(crate) serial: bool,
}

/// A directed acyclic graph of steps, where an edge goes from a step to a step that depends on
/// it.
///
/// Selections are assigned to steps top-down. At each position the fields resolvable by the
/// step's source schema stay in the step; the others are deferred to child steps, grouped by the
/// source schema that covers most of them. A child step is entered through a lookup, and the
/// lookup's key fields and the requirements of the deferred fields are either added to the
/// parent step or fetched by further steps, which then become dependencies.
pub(crate) struct FetchDependencyGraph<'a> {
    schema: &'a FusionSchema,
    kind: OperationKind,
    graph: StableDiGraph<FetchDependencyGraphNode, ()>,
}

impl<'a> FetchDependencyGraph<'a> {
    pub(crate) fn new(schema: &'a FusionSchema, kind: OperationKind) -> Self {
        Self {
            schema,
            kind,
            graph: StableDiGraph::new(),
        }
    }

    /// Plans the root selection set of a normalized operation.
    pub(crate) fn plan_operation(&mut self, operation: &Operation) -> Result<(), FederationError> {
        let schema = self.schema;
        let root = schema.root_type(self.kind).ok_or_else(|| {
            FederationError::invalid_operation(format!(
                "The schema does not support {} operations",
                self.kind
            ))
        })?;
        let selections = collect_fields(schema, &operation.selection_set, &root.name)?;
        let (typename_fields, fields): (Vec<Field>, Vec<Field>) = selections
            .fields()
            .cloned()
            .partition(|field| &*field.name == TYPENAME_FIELD);

        let mut path = SatisfiabilityPath::new();
        let nodes = match self.kind {
            OperationKind::Mutation => self.plan_mutation_fields(root, fields, &mut path)?,
            _ if fields.is_empty() => Vec::new(),
            _ => self.plan_deferred(None, None, None, root, fields, &[], None, &mut path)?,
        };

        if !typename_fields.is_empty() {
            let node = match nodes.first() {
                Some(node) => *node,
                None => {
                    let subgraph = root.sources.first().copied().ok_or_else(|| {
                        FederationError::internal(format!(
                            "Root type \"{}\" has no source schema",
                            root.name
                        ))
                    })?;
                    self.add_node(subgraph, StepEntry::Root, &[], root, false)
                }
            };
            for field in typename_fields {
                self.graph[node].selection_set.merge_selection(field.into())?;
            }
        }
        Ok(())
    }

    /// Mutation fields are executed in order: consecutive fields that one source schema can
    /// resolve are sent together, and each group waits for every step of the previous group.
    fn plan_mutation_fields(
        &mut self,
        root: &'a TypeDefinition,
        fields: Vec<Field>,
        path: &mut SatisfiabilityPath,
    ) -> Result<Vec<NodeIndex>, FederationError> {
        let mut groups: Vec<(SubgraphId, Vec<Field>)> = Vec::new();
        for (field, candidates) in self.candidates(root, fields, None, None, path)? {
            match groups.last_mut() {
                Some((subgraph, group))
                    if candidates.iter().any(|(candidate, _)| *candidate == *subgraph) =>
                {
                    group.push(field)
                }
                _ => {
                    let best = candidates
                        .iter()
                        .min_by_key(|(subgraph, cost)| (*cost, *subgraph))
                        .map(|(subgraph, _)| *subgraph)
                        .ok_or_else(|| FederationError::internal("Field without candidates"))?;
                    groups.push((best, vec![field]));
                }
            }
        }

        let mut roots = Vec::with_capacity(groups.len());
        let mut previous: Vec<NodeIndex> = Vec::new();
        for (subgraph, group) in groups {
            let existing: IndexSet<NodeIndex> = self.graph.node_indices().collect();
            let node = self.plan_group(None, None, None, root, subgraph, group, &[], path, true)?;
            let created: Vec<NodeIndex> = self
                .graph
                .node_indices()
                .filter(|index| !existing.contains(index))
                .collect();
            for before in &previous {
                for after in &created {
                    self.graph.update_edge(*before, *after, ());
                }
            }
            roots.push(node);
            previous = created;
        }
        Ok(roots)
    }

    fn add_node(
        &mut self,
        subgraph: SubgraphId,
        entry: StepEntry,
        merge_at: &[FetchPathElement],
        parent_type: &TypeDefinition,
        serial: bool,
    ) -> NodeIndex {
        self.graph.add_node(FetchDependencyGraphNode {
            subgraph,
            entry,
            merge_at: merge_at.to_vec(),
            parent_type: parent_type.name.clone(),
            selection_set: SelectionSet::default(),
            requirements: Vec::new(),
            serial,
        })
    }

    /// Plans `selection_set` at a position of `node`, which is executed by `subgraph`. Returns
    /// the selections to send at this position; fields `subgraph` cannot resolve are assigned to
    /// child steps. `provided` are the fields the parent binding provides at this position.
    #[allow(clippy::too_many_arguments)]
    fn plan_selection_set(
        &mut self,
        node: NodeIndex,
        subgraph: SubgraphId,
        ty: &'a TypeDefinition,
        selection_set: &SelectionSet,
        merge_at: &[FetchPathElement],
        provided: Option<&FieldSet>,
    ) -> Result<SelectionSet, FederationError> {
        let schema = self.schema;
        if ty.kind.is_abstract() {
            let mut planned = SelectionSet::default();
            planned.add_typename();
            for object in schema.possible_types(&ty.name) {
                if !object.is_declared_in(subgraph) {
                    continue;
                }
                let selections = collect_fields(schema, selection_set, &object.name)?;
                let object_selections = self.plan_selection_set(
                    node,
                    subgraph,
                    object,
                    &selections,
                    merge_at,
                    provided,
                )?;
                planned.merge_selection(Selection::InlineFragment(InlineFragment {
                    type_condition: Some(object.name.clone()),
                    selection_set: object_selections,
                }))?;
            }
            return Ok(planned);
        }

        let mut local = SelectionSet::default();
        let mut deferred = Vec::new();
        for field in collect_fields(schema, selection_set, &ty.name)?
            .fields()
            .cloned()
        {
            if &*field.name == TYPENAME_FIELD {
                local.merge_selection(field.into())?;
                continue;
            }
            let definition = ty.field(&field.name).ok_or_else(|| {
                FederationError::invalid_operation(format!(
                    "Cannot query field \"{}\" on type \"{}\"",
                    field.name, ty.name
                ))
            })?;
            let provided_item = provided.and_then(|provided| provided.get(&field.name));
            let binding = definition
                .binding(subgraph)
                .filter(|binding| binding.requirement.is_none());
            if binding.is_none() && provided_item.is_none() {
                deferred.push(field);
                continue;
            }
            let mut field = field;
            if !field.selection_set.is_empty() {
                let nested_provided = match binding {
                    Some(binding) => binding.provides.clone(),
                    None => provided_item.map(|item| item.selections.clone()),
                };
                let returned = schema.try_get_type(definition.ty.inner_named_type())?;
                field.selection_set = self.plan_selection_set(
                    node,
                    subgraph,
                    returned,
                    &field.selection_set,
                    &child_merge_at(merge_at, &field, &definition.ty),
                    nested_provided.as_ref(),
                )?;
            }
            local.merge_selection(field.into())?;
        }

        if !deferred.is_empty() {
            local.add_typename();
            self.plan_deferred(
                Some(node),
                Some(&mut local),
                Some(subgraph),
                ty,
                deferred,
                merge_at,
                None,
                &mut SatisfiabilityPath::new(),
            )?;
        }
        Ok(local)
    }

    /// The source schemas that can resolve each field from `current`, with their binding cost.
    fn candidates(
        &self,
        ty: &'a TypeDefinition,
        fields: Vec<Field>,
        current: Option<SubgraphId>,
        exclude: Option<SubgraphId>,
        path: &mut SatisfiabilityPath,
    ) -> Result<Vec<(Field, Vec<(SubgraphId, u32)>)>, FederationError> {
        let schema = self.schema;
        let mut resolver = FieldResolver::new(schema);
        let mut candidates = Vec::with_capacity(fields.len());
        for field in fields {
            let definition = ty.field(&field.name).ok_or_else(|| {
                FederationError::invalid_operation(format!(
                    "Cannot query field \"{}\" on type \"{}\"",
                    field.name, ty.name
                ))
            })?;
            let viable: Vec<(SubgraphId, u32)> = definition
                .bindings
                .iter()
                .filter(|binding| Some(binding.subgraph) != exclude)
                .filter(|binding| resolver.is_usable(ty, definition, binding, current, path))
                .map(|binding| (binding.subgraph, binding.cost))
                .collect();
            if viable.is_empty() {
                let message = format!(
                    "no source schema can resolve \"{}.{}\" from {}",
                    ty.name,
                    field.name,
                    current.map_or_else(
                        || "the root".to_string(),
                        |current| format!("\"{}\"", schema.subgraph_name(current))
                    )
                );
                error!(%message, "query planning invariant violated");
                return Err(FederationError::planning_invariant(message));
            }
            candidates.push((field, viable));
        }
        Ok(candidates)
    }

    /// Assigns `fields` of the objects at `merge_at` to new steps, grouping them by source
    /// schema. Returns the created steps.
    #[allow(clippy::too_many_arguments)]
    fn plan_deferred(
        &mut self,
        parent: Option<NodeIndex>,
        mut local: Option<&mut SelectionSet>,
        current: Option<SubgraphId>,
        ty: &'a TypeDefinition,
        fields: Vec<Field>,
        merge_at: &[FetchPathElement],
        exclude: Option<SubgraphId>,
        path: &mut SatisfiabilityPath,
    ) -> Result<Vec<NodeIndex>, FederationError> {
        let candidates = self.candidates(ty, fields, current, exclude, path)?;
        let mut created = Vec::new();
        for (subgraph, group) in group_by_coverage(candidates) {
            trace!(
                type_name = %ty.name,
                subgraph = %self.schema.subgraph_name(subgraph),
                fields = group.len(),
                "planning step"
            );
            created.push(self.plan_group(
                parent,
                local.as_deref_mut(),
                current,
                ty,
                subgraph,
                group,
                merge_at,
                path,
                false,
            )?);
        }
        Ok(created)
    }

    /// Creates the step resolving `fields` in `subgraph`, together with the steps providing its
    /// key fields and requirements.
    ///
    /// Keys and requirements are resolved with the attempted binding on `path`, the way
    /// [`FieldResolver`] proved them resolvable. Selections below the fields start from an
    /// empty path.
    #[allow(clippy::too_many_arguments)]
    fn plan_group(
        &mut self,
        parent: Option<NodeIndex>,
        mut local: Option<&mut SelectionSet>,
        current: Option<SubgraphId>,
        ty: &'a TypeDefinition,
        subgraph: SubgraphId,
        fields: Vec<Field>,
        merge_at: &[FetchPathElement],
        path: &mut SatisfiabilityPath,
        serial: bool,
    ) -> Result<NodeIndex, FederationError> {
        let schema = self.schema;
        let path_item = |field: &Field| PathItem {
            type_name: ty.name.clone(),
            field_name: field.name.clone(),
            subgraph,
        };

        let lookup = match fields.first() {
            Some(first) if !schema.is_root_type(&ty.name) => {
                let pushed = path.push(path_item(first));
                let lookup =
                    FieldResolver::new(schema).lookup_into(ty, subgraph, current, path);
                if pushed {
                    path.pop();
                }
                let lookup = lookup.ok_or_else(|| {
                    let message = format!(
                        "no lookup can enter \"{}\" in \"{}\"",
                        ty.name,
                        schema.subgraph_name(subgraph)
                    );
                    error!(%message, "query planning invariant violated");
                    FederationError::planning_invariant(message)
                })?;
                Some(lookup)
            }
            _ => None,
        };
        let entry = match lookup {
            None => StepEntry::Root,
            Some(lookup) => match &lookup.kind {
                LookupKind::Field {
                    field_name,
                    return_type,
                    arguments,
                } => StepEntry::Lookup {
                    field_name: field_name.clone(),
                    return_type: return_type.clone(),
                    arguments: arguments.clone(),
                },
                LookupKind::Entities => StepEntry::Entities {
                    key: lookup.key.clone(),
                },
            },
        };
        let node = self.add_node(subgraph, entry, merge_at, ty, serial);
        if let Some(parent) = parent {
            self.graph.update_edge(parent, node, ());
        }

        if let (Some(lookup), Some(first)) = (lookup, fields.first()) {
            if let Some(local) = local.as_deref_mut() {
                local.add_typename();
            }
            let exclude = (current != Some(subgraph)).then_some(subgraph);
            let pushed = path.push(path_item(first));
            let providers = self.provide(
                parent,
                local.as_deref_mut(),
                current,
                ty,
                &lookup.key,
                merge_at,
                exclude,
                path,
            );
            if pushed {
                path.pop();
            }
            for provider in providers? {
                self.graph.update_edge(provider, node, ());
            }
        }

        let mut selection_set = SelectionSet::default();
        for mut field in fields {
            let definition = ty.field(&field.name).ok_or_else(|| {
                FederationError::internal(format!("Unknown field \"{}.{}\"", ty.name, field.name))
            })?;
            let binding = definition.binding(subgraph).ok_or_else(|| {
                FederationError::internal(format!(
                    "Field \"{}.{}\" is not bound to \"{}\"",
                    ty.name,
                    field.name,
                    schema.subgraph_name(subgraph)
                ))
            })?;
            if let Some(requirement) = &binding.requirement {
                let pushed = path.push(path_item(&field));
                let providers = self.provide(
                    parent,
                    local.as_deref_mut(),
                    current,
                    ty,
                    &requirement.fields,
                    merge_at,
                    Some(subgraph),
                    path,
                );
                if pushed {
                    path.pop();
                }
                for provider in providers? {
                    self.graph.update_edge(provider, node, ());
                }
                for argument in &requirement.arguments {
                    let requirements = &mut self.graph[node].requirements;
                    let variable: Name = format!("_r{}", requirements.len()).into();
                    requirements.push(RequirementInput {
                        variable: variable.clone(),
                        ty: argument.ty.clone(),
                        fields: requirement
                            .fields
                            .restrict_to(&argument.field)
                            .unwrap_or_default(),
                    });
                    field
                        .arguments
                        .insert(argument.name.clone(), Node::new(variable_value(&variable)));
                }
            }
            if !field.selection_set.is_empty() {
                let returned = schema.try_get_type(definition.ty.inner_named_type())?;
                let nested_merge_at = child_merge_at(merge_at, &field, &definition.ty);
                field.selection_set = self.plan_selection_set(
                    node,
                    subgraph,
                    returned,
                    &field.selection_set,
                    &nested_merge_at,
                    binding.provides.as_ref(),
                )?;
            }
            selection_set.merge_selection(field.into())?;
        }
        self.graph[node].selection_set.merge(selection_set)?;
        Ok(node)
    }

    /// Makes the fields of `field_set` available on the objects at `merge_at`: fields `current`
    /// resolves directly are added to `local`, the others are fetched by new steps, which are
    /// returned.
    #[allow(clippy::too_many_arguments)]
    fn provide(
        &mut self,
        parent: Option<NodeIndex>,
        mut local: Option<&mut SelectionSet>,
        current: Option<SubgraphId>,
        ty: &'a TypeDefinition,
        field_set: &FieldSet,
        merge_at: &[FetchPathElement],
        exclude: Option<SubgraphId>,
        path: &mut SatisfiabilityPath,
    ) -> Result<Vec<NodeIndex>, FederationError> {
        let mut remote = Vec::new();
        for item in field_set.items() {
            let definition = ty.field(&item.name).ok_or_else(|| {
                FederationError::internal(format!("Unknown field \"{}.{}\"", ty.name, item.name))
            })?;
            match (current, local.as_deref_mut()) {
                (Some(current), Some(local))
                    if Some(current) != exclude && definition.is_local_to(current) =>
                {
                    local.merge_selection(field_from_item(item).into())?;
                }
                _ => remote.push(field_from_item(item)),
            }
        }
        if remote.is_empty() {
            return Ok(Vec::new());
        }
        self.plan_deferred(parent, local, current, ty, remote, merge_at, exclude, path)
    }

    /// Merges sibling steps that target the same source schema at the same position with the
    /// same entry, when neither depends on the other.
    fn coalesce_siblings(&mut self) -> Result<(), FederationError> {
        loop {
            let mut siblings: IndexMap<(SubgraphId, Vec<FetchPathElement>, Name), Vec<NodeIndex>> =
                IndexMap::new();
            for index in self.graph.node_indices() {
                let node = &self.graph[index];
                if node.serial {
                    continue;
                }
                siblings
                    .entry((node.subgraph, node.merge_at.clone(), node.parent_type.clone()))
                    .or_default()
                    .push(index);
            }
            let pair = siblings.values().find_map(|candidates| {
                candidates.iter().enumerate().find_map(|(i, first)| {
                    candidates[i + 1..]
                        .iter()
                        .find(|second| self.can_merge(*first, **second))
                        .map(|second| (*first, *second))
                })
            });
            match pair {
                Some((first, second)) => self.merge_nodes(first, second)?,
                None => return Ok(()),
            }
        }
    }

    fn can_merge(&self, first: NodeIndex, second: NodeIndex) -> bool {
        let (a, b) = (&self.graph[first], &self.graph[second]);
        if a.entry != b.entry
            || has_path_connecting(&self.graph, first, second, None)
            || has_path_connecting(&self.graph, second, first, None)
        {
            return false;
        }
        let mut renamed = b.selection_set.clone();
        renamed.rename_variables(&requirement_renames(a, b));
        a.selection_set.can_merge(&renamed)
    }

    fn merge_nodes(&mut self, into: NodeIndex, from: NodeIndex) -> Result<(), FederationError> {
        let incoming: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(from, Direction::Incoming)
            .collect();
        let outgoing: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(from, Direction::Outgoing)
            .collect();
        let renames = requirement_renames(&self.graph[into], &self.graph[from]);
        let removed = self
            .graph
            .remove_node(from)
            .ok_or_else(|| FederationError::internal("Merged step does not exist"))?;

        let mut selection_set = removed.selection_set;
        selection_set.rename_variables(&renames);
        let target = &mut self.graph[into];
        target.selection_set.merge(selection_set)?;
        target
            .requirements
            .extend(removed.requirements.into_iter().map(|mut requirement| {
                if let Some(renamed) = renames.get(&requirement.variable) {
                    requirement.variable = renamed.clone();
                }
                requirement
            }));
        for source in incoming.into_iter().filter(|source| *source != into) {
            self.graph.update_edge(source, into, ());
        }
        for dependent in outgoing.into_iter().filter(|dependent| *dependent != into) {
            self.graph.update_edge(into, dependent, ());
        }
        Ok(())
    }

    /// Removes every edge implied by a longer path.
    fn remove_transitive_edges(&mut self) {
        let edges: Vec<_> = self.graph.edge_indices().collect();
        for edge in edges {
            let Some((source, target)) = self.graph.edge_endpoints(edge) else {
                continue;
            };
            self.graph.remove_edge(edge);
            if !has_path_connecting(&self.graph, source, target, None) {
                self.graph.add_edge(source, target, ());
            }
        }
    }

    /// Orders the nodes so that every node comes after its dependencies, preferring creation
    /// order among independent nodes.
    fn topological_order(&self) -> Result<Vec<NodeIndex>, FederationError> {
        let mut in_degree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|index| {
                let degree = self
                    .graph
                    .neighbors_directed(index, Direction::Incoming)
                    .count();
                (index, degree)
            })
            .collect();
        let mut ready: BTreeSet<NodeIndex> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(index, _)| *index)
            .collect();
        let mut order = Vec::with_capacity(in_degree.len());
        while let Some(index) = ready.pop_first() {
            order.push(index);
            for dependent in self.graph.neighbors_directed(index, Direction::Outgoing) {
                if let Some(degree) = in_degree.get_mut(&dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }
        if order.len() != self.graph.node_count() {
            let message = "the step dependency graph has a cycle".to_string();
            error!(%message, "query planning invariant violated");
            return Err(FederationError::planning_invariant(message));
        }
        Ok(order)
    }

    /// Optimizes the graph and numbers its nodes in topological order.
    pub(crate) fn into_steps(
        mut self,
        coalesce_siblings: bool,
    ) -> Result<Vec<ExecutionStep>, FederationError> {
        if coalesce_siblings {
            self.coalesce_siblings()?;
        }
        self.remove_transitive_edges();
        let order = self.topological_order()?;
        let ids: HashMap<NodeIndex, StepId> = order
            .iter()
            .enumerate()
            .map(|(position, index)| (*index, StepId(position)))
            .collect();
        let mut steps = Vec::with_capacity(order.len());
        for index in order {
            let mut depends_on: Vec<StepId> = self
                .graph
                .neighbors_directed(index, Direction::Incoming)
                .filter_map(|dependency| ids.get(&dependency).copied())
                .collect();
            depends_on.sort();
            depends_on.dedup();
            let node = &self.graph[index];
            let operation_kind = match (&node.entry, self.kind) {
                (StepEntry::Root, OperationKind::Mutation) => OperationKind::Mutation,
                _ => OperationKind::Query,
            };
            steps.push(ExecutionStep {
                id: ids[&index],
                subgraph: node.subgraph,
                subgraph_name: self.schema.subgraph_name(node.subgraph).clone(),
                operation_kind,
                entry: node.entry.clone(),
                merge_at: node.merge_at.clone(),
                parent_type: node.parent_type.clone(),
                selection_set: node.selection_set.clone(),
                requirements: node.requirements.clone(),
                depends_on,
            });
        }
        Ok(steps)
    }
}

/// Requirement variables of `from`, renamed to follow those of `into`.
fn requirement_renames(
    into: &FetchDependencyGraphNode,
    from: &FetchDependencyGraphNode,
) -> IndexMap<Name, Name> {
    from.requirements
        .iter()
        .enumerate()
        .map(|(i, requirement)| {
            (
                requirement.variable.clone(),
                Name::from(format!("_r{}", into.requirements.len() + i)),
            )
        })
        .collect()
}

/// Repeatedly picks the source schema able to resolve the most remaining fields, preferring
/// lower cost and then lower id, and assigns those fields to it.
fn group_by_coverage(
    candidates: Vec<(Field, Vec<(SubgraphId, u32)>)>,
) -> Vec<(SubgraphId, Vec<Field>)> {
    let mut remaining = candidates;
    let mut groups = Vec::new();
    while !remaining.is_empty() {
        let mut coverage: BTreeMap<SubgraphId, (usize, u32)> = BTreeMap::new();
        for (_, viable) in &remaining {
            for (subgraph, cost) in viable {
                let entry = coverage.entry(*subgraph).or_default();
                entry.0 += 1;
                entry.1 += cost;
            }
        }
        let Some(best) = coverage
            .iter()
            .max_by(|(a_id, (a_count, a_cost)), (b_id, (b_count, b_cost))| {
                a_count
                    .cmp(b_count)
                    .then(b_cost.cmp(a_cost))
                    .then(b_id.cmp(a_id))
            })
            .map(|(subgraph, _)| *subgraph)
        else {
            break;
        };
        let (covered, rest): (Vec<_>, Vec<_>) = remaining
            .into_iter()
            .partition(|(_, viable)| viable.iter().any(|(subgraph, _)| *subgraph == best));
        groups.push((best, covered.into_iter().map(|(field, _)| field).collect()));
        remaining = rest;
    }
    groups
}

/// The merge path of the objects returned by `field`.
fn child_merge_at(
    merge_at: &[FetchPathElement],
    field: &Field,
    ty: &TypeRef,
) -> Vec<FetchPathElement> {
    let mut child = merge_at.to_vec();
    child.push(FetchPathElement::Key(field.response_key().clone()));
    child.extend(std::iter::repeat(FetchPathElement::Flatten).take(ty.list_depth()));
    child
}

fn field_from_item(item: &FieldSetItem) -> Field {
    let mut field = Field::new(item.name.clone());
    for nested in item.selections.items() {
        field
            .selection_set
            .selections
            .push(field_from_item(nested).into());
    }
    field
}
