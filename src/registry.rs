//! Reusable type registry: named object roots that reference fields point at.
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::ir::{Field, FieldId, FieldKind, Kind};

const DEFAULT_TYPE_NAME: &str = "Type";

/// Flat, ordered list of reusable type roots. Every root is an `object`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReusableTypes {
    types: Vec<Field>,
}

impl ReusableTypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &FieldId) -> Option<&Field> {
        self.types.iter().find(|t| t.id == *id)
    }

    pub fn by_name(&self, name: &str) -> Option<&Field> {
        self.types.iter().find(|t| t.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.types.iter()
    }

    pub fn as_slice(&self) -> &[Field] {
        &self.types
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// `base`, then `base1`, `base2`, … until the name is free.
    /// An empty base falls back to `Type`.
    pub fn unique_name(&self, base: &str) -> String {
        let base = if base.trim().is_empty() { DEFAULT_TYPE_NAME } else { base.trim() };
        let taken: HashSet<&str> = self.types.iter().map(|t| t.name.as_str()).collect();
        if !taken.contains(base) {
            return base.to_string();
        }
        (1..)
            .map(|n| format!("{base}{n}"))
            .find(|candidate| !taken.contains(candidate.as_str()))
            .unwrap_or_else(|| base.to_string())
    }

    /// Adds an empty object type under a unique name derived from `name`.
    pub fn add_type(&self, name: &str) -> (Self, FieldId) {
        let root = Field::new(self.unique_name(name), FieldKind::blank(Kind::Object), None);
        let id = root.id;
        (self.insert(root), id)
    }

    /// Inserts a prepared root, normalizing it into a valid registry entry:
    /// unique name, no parent, single and required.
    pub(crate) fn insert(&self, mut root: Field) -> Self {
        root.name = self.unique_name(&root.name);
        root.parent_id = None;
        root.array = None;
        root.is_required = true;
        if root.children().is_none() {
            root.kind = FieldKind::blank(Kind::Object);
        }
        let mut types = self.types.clone();
        types.push(root);
        Self { types }
    }

    /// Renames a type; the new name is suffixed if another type holds it.
    pub fn rename_type(&self, id: &FieldId, name: &str) -> Self {
        let Some(pos) = self.types.iter().position(|t| t.id == *id) else {
            log::debug!("rename_type: unknown type {id}");
            return self.clone();
        };
        let others = Self {
            types: self.types.iter().filter(|t| t.id != *id).cloned().collect(),
        };
        let mut types = self.types.clone();
        types[pos].name = others.unique_name(name);
        Self { types }
    }

    /// Removes a type. References to it are left dangling on purpose; the
    /// compiler degrades them to a placeholder.
    pub fn remove_type(&self, id: &FieldId) -> Self {
        Self {
            types: self.types.iter().filter(|t| t.id != *id).cloned().collect(),
        }
    }

    pub(crate) fn from_roots(types: Vec<Field>) -> Self {
        Self { types }
    }

    pub(crate) fn into_roots(self) -> Vec<Field> {
        self.types
    }
}

impl<'a> IntoIterator for &'a ReusableTypes {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;
    fn into_iter(self) -> Self::IntoIter {
        self.types.iter()
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_name_suffixes_on_collision() {
        let types = ReusableTypes::new();
        assert_eq!(types.unique_name(""), "Type");

        let (types, _) = types.add_type("");
        let (types, _) = types.add_type("");
        let (types, _) = types.add_type("");
        let names: Vec<_> = types.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["Type", "Type1", "Type2"]);
    }

    #[test]
    fn unique_name_skips_taken_suffixes() {
        let (types, _) = ReusableTypes::new().add_type("Address");
        let (types, _) = types.add_type("Address2");
        assert_eq!(types.unique_name("Address"), "Address1");
        let (types, _) = types.add_type("Address");
        assert_eq!(types.unique_name("Address"), "Address3");
    }

    #[test]
    fn added_type_is_an_empty_object_root() {
        let (types, id) = ReusableTypes::new().add_type("Money");
        let t = types.get(&id).unwrap();
        assert_eq!(t.kind.tag(), Kind::Object);
        assert_eq!(t.children().map(<[Field]>::len), Some(0));
        assert!(t.parent_id.is_none());
        assert_eq!(types.by_name("Money").map(|t| t.id), Some(id));
    }

    #[test]
    fn rename_keeps_names_unique_but_allows_keeping_own_name() {
        let (types, a) = ReusableTypes::new().add_type("A");
        let (types, b) = types.add_type("B");
        let renamed = types.rename_type(&b, "A");
        assert_eq!(renamed.get(&b).unwrap().name, "A1");
        let same = types.rename_type(&a, "A");
        assert_eq!(same.get(&a).unwrap().name, "A");
    }

    #[test]
    fn remove_type_leaves_others_in_order() {
        let (types, a) = ReusableTypes::new().add_type("A");
        let (types, _) = types.add_type("B");
        let (types, _) = types.add_type("C");
        let types = types.remove_type(&a);
        let names: Vec<_> = types.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["B", "C"]);
        assert!(types.get(&a).is_none());
    }
}
