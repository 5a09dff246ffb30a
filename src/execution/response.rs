use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};

pub type Object = Map<String, Value>;

/// A response path element: a response key or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathElement {
    Index(usize),
    Key(String),
}

/// A path into [`Response::data`], e.g. `/products/3/name`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(pub Vec<PathElement>);

impl Path {
    pub fn iter(&self) -> impl Iterator<Item = &PathElement> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn join(&self, rest: impl IntoIterator<Item = PathElement>) -> Path {
        let mut path = self.clone();
        path.0.extend(rest);
        path
    }

    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl From<Vec<PathElement>> for Path {
    fn from(elements: Vec<PathElement>) -> Self {
        Path(elements)
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for element in &self.0 {
            match element {
                PathElement::Index(index) => write!(f, "/{index}")?,
                PathElement::Key(key) => write!(f, "/{key}")?,
            }
        }
        Ok(())
    }
}

/// A GraphQL error, as returned to clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLError {
    pub message: String,

    /// If this is a field error, the path to that field in [`Response::data`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Path>,

    #[serde(default, skip_serializing_if = "Object::is_empty")]
    pub extensions: Object,
}

impl GraphQLError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_path(mut self, path: Path) -> Self {
        self.path = Some(path);
        self
    }

    pub fn with_extension(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extensions.insert(key.to_string(), value.into());
        self
    }

    /// The value of `extensions.code`, if any.
    pub fn code(&self) -> Option<&str> {
        self.extensions.get("code").and_then(Value::as_str)
    }
}

/// The composed response for one client operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// `None` when a non-null violation propagated up to the root.
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQLError>,
}

/// The body of a source schema response.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct SubgraphResponse {
    #[serde(default)]
    pub(crate) data: Option<Value>,
    #[serde(default)]
    pub(crate) errors: Vec<GraphQLError>,
}

/// Merges `source` into `target`. Objects are merged key by key and lists element by element;
/// a null source never overwrites existing data.
pub(crate) fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (_, Value::Null) => {}
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(target), Value::Array(source)) if target.len() == source.len() => {
            for (existing, value) in target.iter_mut().zip(source) {
                deep_merge(existing, value);
            }
        }
        (target, source) => *target = source,
    }
}

/// The value at `path`, if every element of the path exists.
pub(crate) fn value_at_mut<'a>(value: &'a mut Value, path: &Path) -> Option<&'a mut Value> {
    path.iter().try_fold(value, |value, element| match element {
        PathElement::Key(key) => value.as_object_mut()?.get_mut(key),
        PathElement::Index(index) => value.as_array_mut()?.get_mut(*index),
    })
}
