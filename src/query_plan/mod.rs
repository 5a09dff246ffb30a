use crate::query_plan::operation::{Operation, OperationKind, SelectionSet};
use crate::schema::{FieldSet, LookupArgument, Name, SubgraphId, TypeRef};
use itertools::Itertools;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub mod caching_query_planner;
pub(crate) mod fetch_dependency_graph;
pub mod operation;
pub mod query_planner;

/// Identifies a step within its plan. Steps are numbered in a topological order of the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepId(pub(crate) usize);

impl StepId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for StepId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An element of the path at which a step's results are merged into the response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FetchPathElement {
    /// A response key.
    Key(Name),
    /// Every element of a list.
    Flatten,
}

impl Display for FetchPathElement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchPathElement::Key(key) => f.write_str(key),
            FetchPathElement::Flatten => f.write_str("@"),
        }
    }
}

/// How a step's selection set is attached to its source schema's operation.
#[derive(Debug, Clone, PartialEq)]
pub enum StepEntry {
    /// The selection set is sent as is on the root type.
    Root,
    /// The selection set is sent below a lookup field, once per entity, with the key fields of
    /// each entity passed as arguments.
    Lookup {
        field_name: Name,
        /// The lookup's declared return type, which may be an abstract type of the entity.
        return_type: Name,
        arguments: Vec<LookupArgument>,
    },
    /// The selection set is sent below `_entities`, with one representation per entity.
    Entities { key: FieldSet },
}

/// A value a step needs from the entity it is executed for, passed as the variable `variable`.
#[derive(Debug, Clone, PartialEq)]
pub struct RequirementInput {
    pub variable: Name,
    pub ty: TypeRef,
    /// The single top-level field to project from the entity, with its nested selection.
    pub fields: FieldSet,
}

/// One request to one source schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionStep {
    pub id: StepId,
    pub subgraph: SubgraphId,
    pub subgraph_name: Name,
    /// `mutation` only for the root steps of a mutation.
    pub operation_kind: OperationKind,
    pub entry: StepEntry,
    /// The path of the objects the step applies to, relative to the response data.
    pub merge_at: Vec<FetchPathElement>,
    /// The type of the objects the step applies to. Objects of another type at `merge_at` are
    /// skipped.
    pub parent_type: Name,
    pub selection_set: SelectionSet,
    pub requirements: Vec<RequirementInput>,
    /// Steps that must complete before this one starts.
    pub depends_on: Vec<StepId>,
}

/// A directed acyclic graph of steps for one operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionPlan {
    operation: Arc<Operation>,
    steps: Vec<ExecutionStep>,
}

impl ExecutionPlan {
    pub(crate) fn new(operation: Arc<Operation>, steps: Vec<ExecutionStep>) -> Self {
        Self { operation, steps }
    }

    /// The normalized operation the plan was built for.
    pub fn operation(&self) -> &Arc<Operation> {
        &self.operation
    }

    /// Steps in topological order: every step comes after the steps it depends on.
    pub fn steps(&self) -> &[ExecutionStep] {
        &self.steps
    }

    pub fn step(&self, id: StepId) -> Option<&ExecutionStep> {
        self.steps.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// For each step, the steps that depend on it.
    pub fn dependents(&self) -> Vec<Vec<StepId>> {
        let mut dependents = vec![Vec::new(); self.steps.len()];
        for step in &self.steps {
            for dependency in &step.depends_on {
                dependents[dependency.0].push(step.id);
            }
        }
        dependents
    }
}

impl Display for ExecutionStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.id, self.subgraph_name)?;
        match &self.entry {
            StepEntry::Root => {}
            StepEntry::Lookup {
                field_name,
                arguments,
                ..
            } => write!(
                f,
                " via {field_name}({})",
                arguments.iter().map(|argument| &argument.name).join(", ")
            )?,
            StepEntry::Entities { key } => write!(f, " via _entities({key})")?,
        }
        if !self.merge_at.is_empty() {
            write!(
                f,
                " at {} on {}",
                self.merge_at.iter().join("."),
                self.parent_type
            )?;
        }
        if !self.requirements.is_empty() {
            write!(
                f,
                " with {}",
                self.requirements
                    .iter()
                    .map(|requirement| format!("${}: {}", requirement.variable, requirement.fields))
                    .join(", ")
            )?;
        }
        if !self.depends_on.is_empty() {
            write!(f, " after [{}]", self.depends_on.iter().join(", "))?;
        }
        write!(f, " {}", self.selection_set)
    }
}

impl Display for ExecutionPlan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Plan({}) {{", self.operation.kind)?;
        for step in &self.steps {
            writeln!(f, "  {step}")?;
        }
        f.write_str("}")
    }
}
