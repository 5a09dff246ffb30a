//! Source schemas, as handed to the merger.
//!
//! Parsing GraphQL SDL is left to callers: a source schema is a plain description of its types,
//! fields and fusion directives. Type references and field sets stay in their textual form and
//! are parsed and validated during merging, so that every malformed input is reported together
//! with the other composition errors.
//!
//! Source schemas deserialize from JSON or YAML:
//!
//! ```json
//! {
//!   "name": "products",
//!   "url": "http://products:4001/graphql",
//!   "types": [
//!     {
//!       "name": "Query",
//!       "kind": "OBJECT",
//!       "fields": [
//!         {
//!           "name": "productById",
//!           "type": "Product",
//!           "arguments": [{ "name": "id", "type": "ID!" }],
//!           "directives": [{ "name": "lookup" }]
//!         }
//!       ]
//!     }
//!   ]
//! }
//! ```

use crate::schema::TypeKind;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<Url>,
    #[serde(default)]
    pub types: Vec<SourceType>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SourceType {
    pub name: String,
    pub kind: TypeKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<SourceField>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub directives: Vec<FusionDirective>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SourceField {
    pub name: String,
    /// A type reference such as `[Product!]!`.
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<SourceArgument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub directives: Vec<FusionDirective>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SourceArgument {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
}

/// The directives the merger understands. Field sets are kept as written.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, strum_macros::IntoStaticStr)]
#[serde(tag = "name", rename_all = "camelCase")]
pub enum FusionDirective {
    /// On object and interface types: the type can be entered through `_entities` with these
    /// key fields.
    #[strum(serialize = "@key")]
    Key { fields: String },
    /// On root query fields: the field fetches an entity by its key fields.
    #[strum(serialize = "@lookup")]
    Lookup,
    /// On fields: the listed fields of the parent type must be fetched first and are passed as
    /// arguments.
    #[strum(serialize = "@requires")]
    Requires { fields: String },
    /// On fields: the listed fields of the returned type are resolved locally at this position.
    #[strum(serialize = "@provides")]
    Provides { fields: String },
    /// On types and fields: the fields may be resolved by several source schemas.
    #[strum(serialize = "@shareable")]
    Shareable,
    /// On fields: this source schema takes over the field from another one.
    #[strum(serialize = "@override")]
    Override { from: String },
    /// On fields: the field is owned by another source schema.
    #[strum(serialize = "@external")]
    External,
    /// On types and fields: the element is hidden from clients.
    #[strum(serialize = "@inaccessible")]
    Inaccessible,
}

impl SourceSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
            types: Vec::new(),
        }
    }

    pub fn url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    pub fn with_type(mut self, ty: SourceType) -> Self {
        self.types.push(ty);
        self
    }

    /// Reads a source schema from its JSON description.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Reads a source schema from its YAML description.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }
}

impl SourceType {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            fields: Vec::new(),
            interfaces: Vec::new(),
            members: Vec::new(),
            values: Vec::new(),
            directives: Vec::new(),
        }
    }

    pub fn object(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Object)
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Interface)
    }

    pub fn union(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Union)
    }

    pub fn enumeration(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Enum)
    }

    pub fn scalar(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Scalar)
    }

    pub fn input_object(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::InputObject)
    }

    pub fn field(mut self, field: SourceField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn member(mut self, member: impl Into<String>) -> Self {
        self.members.push(member.into());
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.values.push(value.into());
        self
    }

    pub fn directive(mut self, directive: FusionDirective) -> Self {
        self.directives.push(directive);
        self
    }

    pub(crate) fn has_directive(&self, matches: impl Fn(&FusionDirective) -> bool) -> bool {
        self.directives.iter().any(matches)
    }
}

impl SourceField {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            arguments: Vec::new(),
            directives: Vec::new(),
        }
    }

    pub fn argument(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.arguments.push(SourceArgument {
            name: name.into(),
            ty: ty.into(),
            default_value: None,
        });
        self
    }

    pub fn argument_with_default(
        mut self,
        name: impl Into<String>,
        ty: impl Into<String>,
        default_value: serde_json::Value,
    ) -> Self {
        self.arguments.push(SourceArgument {
            name: name.into(),
            ty: ty.into(),
            default_value: Some(default_value),
        });
        self
    }

    pub fn directive(mut self, directive: FusionDirective) -> Self {
        self.directives.push(directive);
        self
    }

    pub(crate) fn has_directive(&self, matches: impl Fn(&FusionDirective) -> bool) -> bool {
        self.directives.iter().any(matches)
    }
}
