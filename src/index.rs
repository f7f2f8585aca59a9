//! Id → location index kept alongside the owning tree.
//!
//! The tree owns its children; this map only answers "where is id X" and
//! "who is X's parent" without walking the tree again. It is rebuilt from a
//! tree value on demand and never mutated in place.
use indexmap::IndexMap;

use crate::ir::{Field, FieldId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// Containing field, `None` for roots.
    pub parent: Option<FieldId>,
    /// Position inside the parent's child list (or the root list).
    pub position: usize,
    pub depth: usize,
}

/// Pre-order index over a forest; iteration order is document order.
#[derive(Debug, Clone, Default)]
pub struct TreeIndex {
    slots: IndexMap<FieldId, Slot>,
}

impl TreeIndex {
    pub fn build(tree: &[Field]) -> Self {
        let mut slots = IndexMap::new();
        visit(tree, None, 0, &mut slots);
        Self { slots }
    }

    pub fn get(&self, id: &FieldId) -> Option<&Slot> {
        self.slots.get(id)
    }

    pub fn contains(&self, id: &FieldId) -> bool {
        self.slots.contains_key(id)
    }

    pub fn parent_of(&self, id: &FieldId) -> Option<FieldId> {
        self.slots.get(id).and_then(|s| s.parent)
    }

    /// True when both ids sit in the same sibling list.
    pub fn are_siblings(&self, a: &FieldId, b: &FieldId) -> bool {
        match (self.slots.get(a), self.slots.get(b)) {
            (Some(x), Some(y)) => x.parent == y.parent,
            _ => false,
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = &FieldId> {
        self.slots.keys()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

fn visit(list: &[Field], parent: Option<FieldId>, depth: usize, out: &mut IndexMap<FieldId, Slot>) {
    for (position, f) in list.iter().enumerate() {
        out.insert(f.id, Slot { parent, position, depth });
        if let Some(kids) = f.children() {
            visit(kids, Some(f.id), depth + 1, out);
        }
    }
}

/// Depth-first lookup.
pub fn find<'a>(tree: &'a [Field], id: &FieldId) -> Option<&'a Field> {
    for f in tree {
        if f.id == *id {
            return Some(f);
        }
        if let Some(hit) = f.children().and_then(|kids| find(kids, id)) {
            return Some(hit);
        }
    }
    None
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FieldKind, Kind};

    fn object(name: &str, children: Vec<Field>) -> Field {
        let mut f = Field::new(name, FieldKind::blank(Kind::Object), None);
        let id = f.id;
        f.kind = FieldKind::Object {
            children: children
                .into_iter()
                .map(|mut c| {
                    c.parent_id = Some(id);
                    c
                })
                .collect(),
        };
        f
    }

    #[test]
    fn index_records_parent_position_and_depth() {
        let street = Field::new("street", FieldKind::default(), None);
        let zip = Field::new("zip", FieldKind::default(), None);
        let (street_id, zip_id) = (street.id, zip.id);
        let address = object("address", vec![street, zip]);
        let address_id = address.id;
        let note = Field::new("note", FieldKind::default(), None);
        let note_id = note.id;
        let tree = vec![address, note];

        let ix = TreeIndex::build(&tree);
        assert_eq!(ix.len(), 4);
        assert_eq!(ix.get(&address_id), Some(&Slot { parent: None, position: 0, depth: 0 }));
        assert_eq!(ix.get(&zip_id), Some(&Slot { parent: Some(address_id), position: 1, depth: 1 }));
        assert_eq!(ix.parent_of(&street_id), Some(address_id));
        assert!(ix.are_siblings(&street_id, &zip_id));
        assert!(!ix.are_siblings(&street_id, &note_id));
        assert_eq!(ix.ids().copied().collect::<Vec<_>>(), vec![address_id, street_id, zip_id, note_id]);
    }

    #[test]
    fn find_descends_into_objects() {
        let inner = Field::new("inner", FieldKind::default(), None);
        let inner_id = inner.id;
        let tree = vec![object("outer", vec![object("middle", vec![inner])])];
        assert_eq!(find(&tree, &inner_id).map(|f| f.name.as_str()), Some("inner"));
        assert!(find(&tree, &FieldId::new()).is_none());
    }
}
