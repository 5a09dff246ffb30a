use crate::schema::Name;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum UnsatisfiableReason {
    #[strum(to_string = "no source schema resolves it")]
    NoSourceBinding,
    #[strum(to_string = "none of the source schemas resolving it can be reached from here")]
    Unreachable,
    #[strum(to_string = "resolving it requires the field itself, directly or through other requirements")]
    RequirementCycle,
}

/// A field that cannot be resolved at some position of the composed schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SatisfiabilityError {
    pub type_name: Name,
    pub field_name: Name,
    /// The source schema execution is in when the field is needed. `None` for root fields.
    pub subgraph: Option<Name>,
    /// How the position was reached, as `Type.field<source schema>` items.
    pub path: Vec<String>,
    pub reason: UnsatisfiableReason,
}

impl Display for SatisfiabilityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Field \"{}.{}\" cannot be resolved",
            self.type_name, self.field_name
        )?;
        if let Some(subgraph) = &self.subgraph {
            write!(f, " from source schema \"{subgraph}\"")?;
        }
        write!(f, ": {}", self.reason)?;
        if !self.path.is_empty() {
            write!(f, " (reached through {})", self.path.join(" -> "))?;
        }
        Ok(())
    }
}

impl std::error::Error for SatisfiabilityError {}
