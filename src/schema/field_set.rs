use crate::schema::{parser, Name};
use std::fmt::{Display, Formatter};

/// A selection of fields without arguments or aliases, as written in `@key`, `@requires` and
/// `@provides`. For example `id sku { upc }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldSet {
    items: Vec<FieldSetItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldSetItem {
    pub name: Name,
    /// Empty for leaf fields.
    pub selections: FieldSet,
}

impl FieldSet {
    pub fn parse(source: &str) -> Result<Self, String> {
        parser::parse_field_set(source)
    }

    /// Builds a field set from items, merging items that select the same field.
    pub(crate) fn from_items(items: impl IntoIterator<Item = FieldSetItem>) -> Self {
        let mut field_set = FieldSet::default();
        for item in items {
            field_set.insert(item);
        }
        field_set
    }

    /// A field set made of a single leaf field.
    pub(crate) fn leaf(name: Name) -> Self {
        FieldSet {
            items: vec![FieldSetItem {
                name,
                selections: FieldSet::default(),
            }],
        }
    }

    pub fn items(&self) -> &[FieldSetItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&FieldSetItem> {
        self.items.iter().find(|item| &*item.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Top-level field names, in order.
    pub fn top_level_names(&self) -> impl Iterator<Item = &Name> {
        self.items.iter().map(|item| &item.name)
    }

    /// The number of leaf fields across all levels.
    pub fn leaf_count(&self) -> usize {
        self.items
            .iter()
            .map(|item| {
                if item.selections.is_empty() {
                    1
                } else {
                    item.selections.leaf_count()
                }
            })
            .sum()
    }

    pub(crate) fn insert(&mut self, item: FieldSetItem) {
        match self.items.iter_mut().find(|existing| existing.name == item.name) {
            Some(existing) => {
                for nested in item.selections.items {
                    existing.selections.insert(nested);
                }
            }
            None => self.items.push(item),
        }
    }

    /// Unions `other` into this field set.
    pub fn merge(&mut self, other: &FieldSet) {
        for item in &other.items {
            self.insert(item.clone());
        }
    }

    /// The sub-field-set holding only the top-level field `name`, if selected.
    pub fn restrict_to(&self, name: &str) -> Option<FieldSet> {
        self.get(name).map(|item| FieldSet {
            items: vec![item.clone()],
        })
    }
}

impl Display for FieldSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(&item.name)?;
            if !item.selections.is_empty() {
                write!(f, " {{ {} }}", item.selections)?;
            }
        }
        Ok(())
    }
}
