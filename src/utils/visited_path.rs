use std::collections::HashSet;
use std::hash::Hash;

/// An ordered path of visited items with constant-time membership checks.
///
/// Depth-first traversals push an item before recursing and pop it afterwards. Pushing an item
/// that is already on the path is refused, which is how callers cut off cycles.
#[derive(Debug, Clone)]
pub struct VisitedPath<T> {
    stack: Vec<T>,
    members: HashSet<T>,
}

impl<T> Default for VisitedPath<T> {
    fn default() -> Self {
        Self {
            stack: Vec::new(),
            members: HashSet::new(),
        }
    }
}

impl<T: Clone + Eq + Hash> VisitedPath<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes `item` on the path. Returns `false`, leaving the path untouched, if the item is
    /// already on it.
    pub fn push(&mut self, item: T) -> bool {
        if !self.members.insert(item.clone()) {
            return false;
        }
        self.stack.push(item);
        true
    }

    pub fn pop(&mut self) -> Option<T> {
        let item = self.stack.pop()?;
        self.members.remove(&item);
        Some(item)
    }

    pub fn contains(&self, item: &T) -> bool {
        self.members.contains(item)
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn last(&self) -> Option<&T> {
        self.stack.last()
    }

    /// Iterates from the first pushed item to the most recent one.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.stack.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_duplicates_until_popped() {
        let mut path = VisitedPath::new();
        assert!(path.push("a"));
        assert!(path.push("b"));
        assert!(!path.push("a"));
        assert_eq!(path.iter().copied().collect::<Vec<_>>(), vec!["a", "b"]);

        assert_eq!(path.pop(), Some("b"));
        assert_eq!(path.pop(), Some("a"));
        assert!(path.is_empty());
        assert!(path.push("a"));
        assert!(path.contains(&"a"));
    }
}
