use std::fmt::{Display, Formatter};
use std::str::FromStr;

use apollo_compiler::ast;
use serde::{Deserialize, Serialize};

use crate::schema::parser;
use crate::schema::{graphql_name, Name};

/// The kind of a named type in a source schema or in the composed schema.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, strum_macros::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeKind {
    #[strum(to_string = "object")]
    Object,
    #[strum(to_string = "interface")]
    Interface,
    #[strum(to_string = "union")]
    Union,
    #[strum(to_string = "enum")]
    Enum,
    #[strum(to_string = "scalar")]
    Scalar,
    #[strum(to_string = "input object")]
    InputObject,
}

impl TypeKind {
    /// Whether values of this kind carry a selection set.
    pub fn is_composite(self) -> bool {
        matches!(
            self,
            TypeKind::Object | TypeKind::Interface | TypeKind::Union
        )
    }

    pub fn is_abstract(self) -> bool {
        matches!(self, TypeKind::Interface | TypeKind::Union)
    }

    /// Whether this kind has fields in the type system sense.
    pub fn has_fields(self) -> bool {
        matches!(
            self,
            TypeKind::Object | TypeKind::Interface | TypeKind::InputObject
        )
    }
}

/// A GraphQL type reference, such as `[Product!]!`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeRef {
    Named(Name),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(name: impl Into<Name>) -> Self {
        TypeRef::Named(name.into())
    }

    pub fn non_null(self) -> Self {
        match self {
            TypeRef::NonNull(_) => self,
            other => TypeRef::NonNull(Box::new(other)),
        }
    }

    pub fn list(self) -> Self {
        TypeRef::List(Box::new(self))
    }

    /// The innermost named type, with list and non-null wrappers removed.
    pub fn inner_named_type(&self) -> &Name {
        match self {
            TypeRef::Named(name) => name,
            TypeRef::List(inner) | TypeRef::NonNull(inner) => inner.inner_named_type(),
        }
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, TypeRef::NonNull(_))
    }

    /// Whether this is a list type, ignoring an outer non-null wrapper.
    pub fn is_list(&self) -> bool {
        matches!(self.nullable(), TypeRef::List(_))
    }

    /// This type with its outer non-null wrapper removed.
    pub fn nullable(&self) -> &TypeRef {
        match self {
            TypeRef::NonNull(inner) => inner,
            other => other,
        }
    }

    /// The number of list wrappers around the named type.
    pub fn list_depth(&self) -> usize {
        match self {
            TypeRef::Named(_) => 0,
            TypeRef::NonNull(inner) => inner.list_depth(),
            TypeRef::List(inner) => 1 + inner.list_depth(),
        }
    }

    fn strip_all_non_null(&self) -> TypeRef {
        match self {
            TypeRef::Named(name) => TypeRef::Named(name.clone()),
            TypeRef::NonNull(inner) => inner.strip_all_non_null(),
            TypeRef::List(inner) => TypeRef::List(Box::new(inner.strip_all_non_null())),
        }
    }

    /// Whether both types have the same named type and list structure, ignoring nullability at
    /// every level.
    pub fn same_shape(&self, other: &TypeRef) -> bool {
        self.strip_all_non_null() == other.strip_all_non_null()
    }

    /// Merges two output types of the same shape. A level is non-null only if it is non-null in
    /// both types. Returns `None` when the shapes differ.
    pub fn merge_output(&self, other: &TypeRef) -> Option<TypeRef> {
        Self::merge_with(self, other, false)
    }

    /// Merges two input types of the same shape. A level is non-null if it is non-null in either
    /// type. Returns `None` when the shapes differ.
    pub fn merge_input(&self, other: &TypeRef) -> Option<TypeRef> {
        Self::merge_with(self, other, true)
    }

    fn merge_with(a: &TypeRef, b: &TypeRef, strict: bool) -> Option<TypeRef> {
        match (a, b) {
            (TypeRef::NonNull(a_inner), TypeRef::NonNull(b_inner)) => {
                Some(Self::merge_with(a_inner, b_inner, strict)?.non_null())
            }
            (TypeRef::NonNull(a_inner), b) | (b, TypeRef::NonNull(a_inner)) => {
                let merged = Self::merge_with(a_inner, b, strict)?;
                Some(if strict { merged.non_null() } else { merged })
            }
            (TypeRef::List(a_inner), TypeRef::List(b_inner)) => {
                Some(Self::merge_with(a_inner, b_inner, strict)?.list())
            }
            (TypeRef::Named(a_name), TypeRef::Named(b_name)) if a_name == b_name => {
                Some(TypeRef::Named(a_name.clone()))
            }
            _ => None,
        }
    }
}

impl Display for TypeRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeRef::Named(name) => f.write_str(name),
            TypeRef::List(inner) => write!(f, "[{inner}]"),
            TypeRef::NonNull(inner) => write!(f, "{inner}!"),
        }
    }
}

impl From<&ast::Type> for TypeRef {
    fn from(value: &ast::Type) -> Self {
        match value {
            ast::Type::Named(name) => TypeRef::named(name.as_str()),
            ast::Type::NonNullNamed(name) => TypeRef::named(name.as_str()).non_null(),
            ast::Type::List(inner) => TypeRef::from(&**inner).list(),
            ast::Type::NonNullList(inner) => TypeRef::from(&**inner).list().non_null(),
        }
    }
}

impl From<&TypeRef> for ast::Type {
    fn from(value: &TypeRef) -> Self {
        match value {
            TypeRef::Named(name) => ast::Type::Named(graphql_name(name)),
            TypeRef::List(inner) => ast::Type::List(Box::new(ast::Type::from(&**inner))),
            TypeRef::NonNull(inner) => match &**inner {
                TypeRef::Named(name) => ast::Type::NonNullNamed(graphql_name(name)),
                TypeRef::List(item) => ast::Type::NonNullList(Box::new(ast::Type::from(&**item))),
                // `non_null` never nests wrappers.
                TypeRef::NonNull(_) => ast::Type::from(&**inner),
            },
        }
    }
}

impl FromStr for TypeRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parser::parse_type_ref(s)
    }
}

impl TryFrom<String> for TypeRef {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TypeRef> for String {
    fn from(value: TypeRef) -> Self {
        value.to_string()
    }
}
