use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum HintCode {
    InconsistentNullability,
    InconsistentArguments,
    OverriddenField,
    UselessOverride,
}

/// A non-fatal observation made during composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionHint {
    pub code: HintCode,
    pub message: String,
}

impl CompositionHint {
    pub(crate) fn new(code: HintCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl Display for CompositionHint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Formats names as `"a"`, `"a" and "b"` or `"a", "b" and "c"`.
pub(crate) fn human_readable_list<T: Display>(items: impl IntoIterator<Item = T>) -> String {
    let quoted: Vec<String> = items.into_iter().map(|item| format!("\"{item}\"")).collect();
    match quoted.split_last() {
        None => String::new(),
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} and {last}", rest.join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_names_for_humans() {
        assert_eq!(human_readable_list(["a"]), "\"a\"");
        assert_eq!(human_readable_list(["a", "b"]), "\"a\" and \"b\"");
        assert_eq!(human_readable_list(["a", "b", "c"]), "\"a\", \"b\" and \"c\"");
    }
}
