//! Tree mutation engine.
//!
//! Every operation takes a tree by reference and hands back a new one. An
//! operation addressed at an id that isn't there (or at a pair of ids that
//! don't share a sibling list) returns a copy of the input unchanged.
use std::fmt;
use std::str::FromStr;

use crate::index::{find, TreeIndex};
use crate::ir::{pascal_case, Field, FieldId, FieldKind, ItemBounds, Kind, Schema};
use crate::registry::ReusableTypes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl FromStr for Direction {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(format!("unknown direction `{other}` (expected up|down)")),
        }
    }
}

// ------------------------------ Internals -------------------------------- //

fn find_mut<'a>(tree: &'a mut [Field], id: &FieldId) -> Option<&'a mut Field> {
    for f in tree.iter_mut() {
        if f.id == *id {
            return Some(f);
        }
        if let Some(kids) = f.children_mut() {
            if let Some(hit) = find_mut(kids, id) {
                return Some(hit);
            }
        }
    }
    None
}

/// The sibling list owned by `parent` (the root list when `None`).
fn siblings_mut<'a>(tree: &'a mut Vec<Field>, parent: Option<&FieldId>) -> Option<&'a mut Vec<Field>> {
    match parent {
        None => Some(tree),
        Some(pid) => find_mut(tree, pid)?.children_mut(),
    }
}

fn remove_in(list: &mut Vec<Field>, id: &FieldId) -> bool {
    if let Some(pos) = list.iter().position(|f| f.id == *id) {
        list.remove(pos);
        return true;
    }
    list.iter_mut()
        .filter_map(Field::children_mut)
        .any(|kids| remove_in(kids, id))
}

/// Copy-edit-return. `edit` reports whether it found its target.
fn edited(tree: &[Field], op: &str, edit: impl FnOnce(&mut Vec<Field>) -> bool) -> Vec<Field> {
    let mut out = tree.to_vec();
    if edit(&mut out) {
        out
    } else {
        log::debug!("{op}: target not found, tree left unchanged");
        tree.to_vec()
    }
}

fn with_field(tree: &[Field], id: &FieldId, op: &str, edit: impl FnOnce(&mut Field)) -> Vec<Field> {
    edited(tree, op, |out| match find_mut(out, id) {
        Some(f) => {
            edit(f);
            true
        }
        None => false,
    })
}

// ------------------------------ Operations ------------------------------- //

/// Appends a blank field under `parent_id` (or as the last root).
pub fn add_field(tree: &[Field], parent_id: Option<FieldId>) -> Vec<Field> {
    add_field_with(tree, parent_id, Field::blank(parent_id))
}

/// Appends a prepared field under `parent_id`; its `parent_id` is overwritten.
/// No-op unless the parent is an `object` present in the tree.
pub fn add_field_with(tree: &[Field], parent_id: Option<FieldId>, mut field: Field) -> Vec<Field> {
    field.parent_id = parent_id;
    edited(tree, "add_field", |out| match siblings_mut(out, parent_id.as_ref()) {
        Some(list) => {
            list.push(field);
            true
        }
        None => false,
    })
}

/// Replaces the field carrying `updated.id`. Attribute consistency is the
/// caller's business.
pub fn update_field(tree: &[Field], updated: &Field) -> Vec<Field> {
    with_field(tree, &updated.id, "update_field", |f| *f = updated.clone())
}

/// Drops the field and its whole subtree.
pub fn remove_field(tree: &[Field], field_id: &FieldId) -> Vec<Field> {
    edited(tree, "remove_field", |out| remove_in(out, field_id))
}

/// Swaps with the neighbour in `direction` inside `parent_id`'s list.
/// Clamped at both ends.
pub fn move_field(
    tree: &[Field],
    field_id: &FieldId,
    direction: Direction,
    parent_id: Option<FieldId>,
) -> Vec<Field> {
    edited(tree, "move_field", |out| {
        let Some(list) = siblings_mut(out, parent_id.as_ref()) else { return false };
        let Some(pos) = list.iter().position(|f| f.id == *field_id) else { return false };
        let target = match direction {
            Direction::Up => pos.checked_sub(1),
            Direction::Down => Some(pos + 1).filter(|&t| t < list.len()),
        };
        match target {
            Some(t) => list.swap(pos, t),
            None => log::debug!("move_field: {field_id} already at the {direction:?} boundary"),
        }
        true
    })
}

/// Drag-and-drop: moves `active_id` to `over_id`'s position. Both ids must
/// share one sibling list.
pub fn reorder_field(tree: &[Field], active_id: &FieldId, over_id: &FieldId) -> Vec<Field> {
    let ix = TreeIndex::build(tree);
    if active_id == over_id || !ix.are_siblings(active_id, over_id) {
        log::debug!("reorder_field: {active_id} and {over_id} are not co-located siblings");
        return tree.to_vec();
    }
    let (Some(from), Some(to)) = (ix.get(active_id).copied(), ix.get(over_id).copied()) else {
        return tree.to_vec();
    };
    edited(tree, "reorder_field", |out| {
        let Some(list) = siblings_mut(out, from.parent.as_ref()) else { return false };
        let item = list.remove(from.position);
        list.insert(to.position, item);
        true
    })
}

pub fn rename_field(tree: &[Field], field_id: &FieldId, name: &str) -> Vec<Field> {
    with_field(tree, field_id, "rename_field", |f| f.name = name.to_string())
}

pub fn set_required(tree: &[Field], field_id: &FieldId, is_required: bool) -> Vec<Field> {
    with_field(tree, field_id, "set_required", |f| f.is_required = is_required)
}

/// Turning list-ness off drops the item bounds with it.
pub fn set_array(tree: &[Field], field_id: &FieldId, is_array: bool) -> Vec<Field> {
    with_field(tree, field_id, "set_array", |f| {
        f.array = match (is_array, f.array) {
            (false, _) => None,
            (true, Some(bounds)) => Some(bounds),
            (true, None) => Some(ItemBounds::default()),
        }
    })
}

/// Switches kind, keeping only attributes the new kind permits. Numeric
/// bounds survive between `integer`, `float` and `currency`.
pub fn change_kind(tree: &[Field], field_id: &FieldId, kind: Kind) -> Vec<Field> {
    with_field(tree, field_id, "change_kind", |f| {
        if f.kind.tag() != kind {
            f.kind = converted_kind(&f.kind, kind);
        }
    })
}

fn converted_kind(old: &FieldKind, kind: Kind) -> FieldKind {
    let bounds = match old {
        FieldKind::Integer(b) | FieldKind::Float(b) => Some(b.clone()),
        FieldKind::Currency(c) => Some(c.bounds.clone()),
        _ => None,
    };
    match (FieldKind::blank(kind), bounds) {
        (FieldKind::Integer(_), Some(b)) => FieldKind::Integer(b),
        (FieldKind::Float(_), Some(b)) => FieldKind::Float(b),
        (FieldKind::Currency(mut c), Some(b)) => {
            c.bounds = b;
            FieldKind::Currency(c)
        }
        (blank, _) => blank,
    }
}

/// Deep copy with a fresh id on every node, re-pointing `parent_id`s.
pub fn fresh_copy(field: &Field, parent_id: Option<FieldId>) -> Field {
    let mut copy = field.clone();
    copy.id = FieldId::new();
    copy.parent_id = parent_id;
    let new_id = copy.id;
    if let Some(kids) = copy.children_mut() {
        *kids = kids.iter().map(|c| fresh_copy(c, Some(new_id))).collect();
    }
    copy
}

/// Moves the object subtree at `field_id` into the registry and leaves a
/// reference in its place. The reference keeps the original id, name and
/// parent; bounds, description and example are cleared.
pub fn promote_to_reusable_type(
    tree: &[Field],
    types: &ReusableTypes,
    field_id: &FieldId,
) -> (Vec<Field>, ReusableTypes) {
    let Some(original) = find(tree, field_id) else {
        log::debug!("promote_to_reusable_type: {field_id} not found");
        return (tree.to_vec(), types.clone());
    };
    if original.children().is_none() {
        log::debug!("promote_to_reusable_type: {field_id} is a {}, not an object", original.kind.tag());
        return (tree.to_vec(), types.clone());
    }

    let mut root = fresh_copy(original, None);
    root.name = pascal_case(&original.name);
    let type_id = root.id;
    let types = types.insert(root);

    let reference = Field {
        id: original.id,
        name: original.name.clone(),
        kind: FieldKind::Reference { reference_id: Some(type_id) },
        array: original.array.map(|_| ItemBounds::default()),
        is_required: original.is_required,
        title: original.title.clone(),
        description: None,
        example: None,
        parent_id: original.parent_id,
    };
    (update_field(tree, &reference), types)
}

// ------------------------------- Commands -------------------------------- //

/// One user edit, addressed by id. Field edits are routed to whichever of the
/// forest or the registry holds the target.
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    Add { parent_id: Option<FieldId> },
    Update(Field),
    Remove(FieldId),
    Rename { id: FieldId, name: String },
    ChangeKind { id: FieldId, kind: Kind },
    SetArray { id: FieldId, is_array: bool },
    SetRequired { id: FieldId, is_required: bool },
    Move { id: FieldId, direction: Direction, parent_id: Option<FieldId> },
    Reorder { active: FieldId, over: FieldId },
    Promote(FieldId),
    AddType { name: String },
    RenameType { id: FieldId, name: String },
    RemoveType(FieldId),
}

impl fmt::Display for Edit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edit::Add { parent_id: Some(p) } => write!(f, "add field under {p}"),
            Edit::Add { parent_id: None } => write!(f, "add root field"),
            Edit::Update(field) => write!(f, "update {}", field.id),
            Edit::Remove(id) => write!(f, "remove {id}"),
            Edit::Rename { id, name } => write!(f, "rename {id} to `{name}`"),
            Edit::ChangeKind { id, kind } => write!(f, "change {id} to {kind}"),
            Edit::SetArray { id, is_array } => write!(f, "set {id} array={is_array}"),
            Edit::SetRequired { id, is_required } => write!(f, "set {id} required={is_required}"),
            Edit::Move { id, direction, .. } => write!(f, "move {id} {direction:?}"),
            Edit::Reorder { active, over } => write!(f, "reorder {active} onto {over}"),
            Edit::Promote(id) => write!(f, "promote {id}"),
            Edit::AddType { name } => write!(f, "add type `{name}`"),
            Edit::RenameType { id, name } => write!(f, "rename type {id} to `{name}`"),
            Edit::RemoveType(id) => write!(f, "remove type {id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Forest,
    Registry,
}

impl Schema {
    fn target_of(&self, id: &FieldId) -> Option<Target> {
        if find(&self.fields, id).is_some() {
            Some(Target::Forest)
        } else if find(self.reusable_types.as_slice(), id).is_some() {
            Some(Target::Registry)
        } else {
            None
        }
    }

    fn is_type_root(&self, id: &FieldId) -> bool {
        self.reusable_types.get(id).is_some()
    }

    /// Runs `op` against whichever tree holds `id`.
    fn on_tree(&self, id: &FieldId, op: impl FnOnce(&[Field]) -> Vec<Field>) -> Schema {
        match self.target_of(id) {
            Some(Target::Forest) => Schema::new(op(&self.fields), self.reusable_types.clone()),
            Some(Target::Registry) => Schema::new(
                self.fields.clone(),
                ReusableTypes::from_roots(op(self.reusable_types.as_slice())),
            ),
            None => {
                log::debug!("edit addressed unknown id {id}");
                self.clone()
            }
        }
    }

    /// Applies `edit` and returns the resulting schema.
    pub fn apply(&self, edit: &Edit) -> Schema {
        match edit {
            Edit::Add { parent_id: None } => {
                Schema::new(add_field(&self.fields, None), self.reusable_types.clone())
            }
            Edit::Add { parent_id: Some(p) } => self.on_tree(p, |t| add_field(t, Some(*p))),
            Edit::Update(field) => self.on_tree(&field.id, |t| update_field(t, field)),
            Edit::Remove(id) => self.on_tree(id, |t| remove_field(t, id)),
            Edit::Rename { id, name } if self.is_type_root(id) => {
                Schema::new(self.fields.clone(), self.reusable_types.rename_type(id, name))
            }
            Edit::Rename { id, name } => self.on_tree(id, |t| rename_field(t, id, name)),
            // type roots stay required single objects
            Edit::ChangeKind { id, .. } | Edit::SetArray { id, .. } | Edit::SetRequired { id, .. }
                if self.is_type_root(id) =>
            {
                log::debug!("{edit}: reusable type roots keep their shape");
                self.clone()
            }
            Edit::ChangeKind { id, kind } => self.on_tree(id, |t| change_kind(t, id, *kind)),
            Edit::SetArray { id, is_array } => self.on_tree(id, |t| set_array(t, id, *is_array)),
            Edit::SetRequired { id, is_required } => {
                self.on_tree(id, |t| set_required(t, id, *is_required))
            }
            Edit::Move { id, direction, parent_id } => {
                self.on_tree(id, |t| move_field(t, id, *direction, *parent_id))
            }
            Edit::Reorder { active, over } => self.on_tree(active, |t| reorder_field(t, active, over)),
            Edit::Promote(id) => self.promote(id),
            Edit::AddType { name } => {
                let (types, _) = self.reusable_types.add_type(name);
                Schema::new(self.fields.clone(), types)
            }
            Edit::RenameType { id, name } => {
                Schema::new(self.fields.clone(), self.reusable_types.rename_type(id, name))
            }
            Edit::RemoveType(id) => {
                Schema::new(self.fields.clone(), self.reusable_types.remove_type(id))
            }
        }
    }

    /// A move whose target sits in the named sibling list. At a list boundary
    /// it changes nothing, yet it is still a valid edit.
    pub fn is_clamped_move(&self, edit: &Edit) -> bool {
        let Edit::Move { id, parent_id, .. } = edit else { return false };
        [self.fields.as_slice(), self.reusable_types.as_slice()]
            .into_iter()
            .any(|tree| TreeIndex::build(tree).get(id).is_some_and(|slot| slot.parent == *parent_id))
    }

    fn promote(&self, id: &FieldId) -> Schema {
        match self.target_of(id) {
            Some(Target::Forest) => {
                let (fields, types) = promote_to_reusable_type(&self.fields, &self.reusable_types, id);
                Schema::new(fields, types)
            }
            Some(Target::Registry) if !self.is_type_root(id) => {
                let roots = self.reusable_types.as_slice();
                let (rewritten, grown) = promote_to_reusable_type(roots, &self.reusable_types, id);
                // `grown` = old roots + the new type; keep the rewritten roots and the addition
                let mut merged = rewritten;
                merged.extend(grown.into_roots().into_iter().skip(roots.len()));
                Schema::new(self.fields.clone(), ReusableTypes::from_roots(merged))
            }
            _ => {
                log::debug!("promote: {id} is not a promotable field");
                self.clone()
            }
        }
    }
}

// ------------------------------- Tests ------------------------------------ //
