//! Advisory diagnostics. None of these stop an operation; each marks a spot
//! where the output was degraded to something safe.
use serde::Serialize;

use crate::ir::FieldId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "category", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Diagnostic {
    /// An edit addressed a missing id or an invalid pair; nothing changed.
    #[error("no-op: {operation}")]
    StructuralNoOp { operation: String },

    /// A reference field points at a reusable type that doesn't exist.
    #[error("field `{field}` references an undefined type{}", fmt_target(.reference_id))]
    DanglingReference {
        field: String,
        field_id: FieldId,
        reference_id: Option<FieldId>,
    },

    /// A reusable type needed its own definition while still being built.
    #[error("circular definition: `{type_name}` is referenced from `{field}` while still being compiled")]
    CircularDefinition { type_name: String, field: String },

    /// The importer met something it doesn't model and fell back to `string`.
    #[error("{path}: {detail}")]
    ImportAmbiguity { path: String, detail: String },
}

fn fmt_target(id: &Option<FieldId>) -> String {
    match id {
        Some(id) => format!(" ({id})"),
        None => " (none selected)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offender() {
        let d = Diagnostic::ImportAmbiguity {
            path: "/properties/flag".into(),
            detail: "unsupported type `boolean`, using string".into(),
        };
        assert_eq!(d.to_string(), "/properties/flag: unsupported type `boolean`, using string");

        let d = Diagnostic::DanglingReference {
            field: "owner".into(),
            field_id: FieldId::new(),
            reference_id: None,
        };
        assert_eq!(d.to_string(), "field `owner` references an undefined type (none selected)");
    }

    #[test]
    fn serializes_with_category_tag() {
        let d = Diagnostic::CircularDefinition { type_name: "Node".into(), field: "next".into() };
        let v = serde_json::to_value(&d).unwrap();
        assert_eq!(v["category"], "circularDefinition");
        assert_eq!(v["typeName"], "Node");
    }
}
