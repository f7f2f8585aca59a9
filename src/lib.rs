//! Field-tree schema authoring: an editable tree of typed fields, a registry
//! of reusable object types, a JSON Schema compiler and an importer for the
//! reverse direction.
pub mod cli;
pub mod diagnostics;
pub mod emit;
pub mod error;
pub mod import;
pub mod index;
pub mod ir;
pub mod mutate;
pub mod project;
pub mod provider;
pub mod registry;
pub mod session;
pub mod store;

pub use diagnostics::Diagnostic;
pub use emit::{compile, compile_schema, Compiled};
pub use error::{Error, Result};
pub use import::{import, import_with, ImportOptions, Imported};
pub use ir::{Field, FieldId, FieldKind, Kind, Schema};
pub use mutate::{Direction, Edit};
pub use registry::ReusableTypes;
