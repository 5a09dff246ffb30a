use std::fmt::{Display, Formatter, Write};

use apollo_compiler::validation::WithErrors;

use crate::composition::satisfiability::SatisfiabilityError;

/// Error codes attached to composition and planning failures. The code is what tooling should
/// match on; messages are for humans.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumIter,
    strum_macros::IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Internal,
    InvalidSourceSchema,
    DuplicateSubgraph,
    TypeKindMismatch,
    FieldTypeMismatch,
    ArgumentTypeMismatch,
    InvalidFieldSharing,
    InvalidFieldSet,
    InvalidLookup,
    InvalidRequirement,
    InvalidOverride,
    ExternalMissingDefinition,
    MissingQueryRoot,
    UnsatisfiableField,
    InvalidOperation,
    PlanningInvariantViolation,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SingleFederationError {
    #[error("An internal error has occurred, please report this bug.\n\nDetails: {message}")]
    Internal { message: String },
    #[error("[{subgraph}] {message}")]
    InvalidSourceSchema { subgraph: String, message: String },
    #[error("A source schema named \"{name}\" was provided more than once")]
    DuplicateSubgraph { name: String },
    #[error("Type \"{type_name}\" has mismatched kinds: it is {first_kind} in \"{first_subgraph}\" but {second_kind} in \"{second_subgraph}\"")]
    TypeKindMismatch {
        type_name: String,
        first_kind: String,
        first_subgraph: String,
        second_kind: String,
        second_subgraph: String,
    },
    #[error("Field \"{type_name}.{field_name}\" has incompatible types across source schemas: {details}")]
    FieldTypeMismatch {
        type_name: String,
        field_name: String,
        details: String,
    },
    #[error("Argument \"{argument_name}\" of field \"{type_name}.{field_name}\" has incompatible types across source schemas: {details}")]
    ArgumentTypeMismatch {
        type_name: String,
        field_name: String,
        argument_name: String,
        details: String,
    },
    #[error("Non-shareable field \"{type_name}.{field_name}\" is resolved from multiple source schemas: it is resolved from {subgraphs} and defined as non-shareable in {non_shareable}")]
    InvalidFieldSharing {
        type_name: String,
        field_name: String,
        subgraphs: String,
        non_shareable: String,
    },
    #[error("[{subgraph}] On type \"{type_name}\", invalid field set \"{field_set}\": {message}")]
    InvalidFieldSet {
        subgraph: String,
        type_name: String,
        field_set: String,
        message: String,
    },
    #[error("[{subgraph}] Invalid lookup \"{field_name}\": {message}")]
    InvalidLookup {
        subgraph: String,
        field_name: String,
        message: String,
    },
    #[error("[{subgraph}] Invalid requirement on \"{type_name}.{field_name}\": {message}")]
    InvalidRequirement {
        subgraph: String,
        type_name: String,
        field_name: String,
        message: String,
    },
    #[error("[{subgraph}] Invalid @override on \"{type_name}.{field_name}\": {message}")]
    InvalidOverride {
        subgraph: String,
        type_name: String,
        field_name: String,
        message: String,
    },
    #[error("Field \"{type_name}.{field_name}\" is marked @external in {subgraphs} but is not defined in any other source schema")]
    ExternalMissingDefinition {
        type_name: String,
        field_name: String,
        subgraphs: String,
    },
    #[error("None of the source schemas define a \"Query\" root type")]
    MissingQueryRoot,
    #[error(transparent)]
    UnsatisfiableField(Box<SatisfiabilityError>),
    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },
    #[error("Query planning invariant violated, the composed schema was not validated correctly.\n\nDetails: {message}")]
    PlanningInvariantViolation { message: String },
}

impl SingleFederationError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SingleFederationError::Internal { .. } => ErrorCode::Internal,
            SingleFederationError::InvalidSourceSchema { .. } => ErrorCode::InvalidSourceSchema,
            SingleFederationError::DuplicateSubgraph { .. } => ErrorCode::DuplicateSubgraph,
            SingleFederationError::TypeKindMismatch { .. } => ErrorCode::TypeKindMismatch,
            SingleFederationError::FieldTypeMismatch { .. } => ErrorCode::FieldTypeMismatch,
            SingleFederationError::ArgumentTypeMismatch { .. } => ErrorCode::ArgumentTypeMismatch,
            SingleFederationError::InvalidFieldSharing { .. } => ErrorCode::InvalidFieldSharing,
            SingleFederationError::InvalidFieldSet { .. } => ErrorCode::InvalidFieldSet,
            SingleFederationError::InvalidLookup { .. } => ErrorCode::InvalidLookup,
            SingleFederationError::InvalidRequirement { .. } => ErrorCode::InvalidRequirement,
            SingleFederationError::InvalidOverride { .. } => ErrorCode::InvalidOverride,
            SingleFederationError::ExternalMissingDefinition { .. } => {
                ErrorCode::ExternalMissingDefinition
            }
            SingleFederationError::MissingQueryRoot => ErrorCode::MissingQueryRoot,
            SingleFederationError::UnsatisfiableField(_) => ErrorCode::UnsatisfiableField,
            SingleFederationError::InvalidOperation { .. } => ErrorCode::InvalidOperation,
            SingleFederationError::PlanningInvariantViolation { .. } => {
                ErrorCode::PlanningInvariantViolation
            }
        }
    }
}

impl From<SatisfiabilityError> for SingleFederationError {
    fn from(value: SatisfiabilityError) -> Self {
        SingleFederationError::UnsatisfiableField(Box::new(value))
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub struct MultipleFederationErrors {
    pub errors: Vec<SingleFederationError>,
}

impl MultipleFederationErrors {
    pub fn push(&mut self, error: FederationError) {
        match error {
            FederationError::SingleFederationError(error) => self.errors.push(error),
            FederationError::MultipleFederationErrors(errors) => self.errors.extend(errors.errors),
        }
    }
}

impl Display for MultipleFederationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "The following errors occurred:")?;
        for error in &self.errors {
            write!(f, "\n\n  - ")?;
            for c in error.to_string().chars() {
                if c == '\n' {
                    write!(f, "\n    ")?;
                } else {
                    f.write_char(c)?;
                }
            }
        }
        Ok(())
    }
}

impl FromIterator<SingleFederationError> for MultipleFederationErrors {
    fn from_iter<T: IntoIterator<Item = SingleFederationError>>(iter: T) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error, derive_more::From)]
pub enum FederationError {
    #[error(transparent)]
    SingleFederationError(SingleFederationError),
    #[error(transparent)]
    MultipleFederationErrors(MultipleFederationErrors),
}

/// Parse and validation errors of client documents.
impl<T> From<WithErrors<T>> for FederationError {
    fn from(WithErrors { errors, .. }: WithErrors<T>) -> Self {
        FederationError::invalid_operation(errors.to_string().trim_end())
    }
}

impl FederationError {
    pub(crate) fn internal(message: impl Into<String>) -> Self {
        SingleFederationError::Internal {
            message: message.into(),
        }
        .into()
    }

    pub(crate) fn invalid_operation(message: impl Into<String>) -> Self {
        SingleFederationError::InvalidOperation {
            message: message.into(),
        }
        .into()
    }

    pub(crate) fn planning_invariant(message: impl Into<String>) -> Self {
        SingleFederationError::PlanningInvariantViolation {
            message: message.into(),
        }
        .into()
    }

    /// Flattens this error into the list of individual errors it carries.
    pub fn errors(&self) -> Vec<&SingleFederationError> {
        match self {
            FederationError::SingleFederationError(error) => vec![error],
            FederationError::MultipleFederationErrors(errors) => errors.errors.iter().collect(),
        }
    }

    pub fn is_planning_invariant_violation(&self) -> bool {
        self.errors()
            .iter()
            .any(|error| error.code() == ErrorCode::PlanningInvariantViolation)
    }
}
