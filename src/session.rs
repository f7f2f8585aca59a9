//! Single-writer container: holds the one current schema, applies edits in
//! call order and persists through an injected [`Store`].
use crate::diagnostics::Diagnostic;
use crate::emit::{compile_schema, Compiled};
use crate::error::Result;
use crate::ir::Schema;
use crate::mutate::Edit;
use crate::project;
use crate::store::Store;

pub struct Session<S: Store> {
    store: S,
    key: String,
    schema: Schema,
}

impl<S: Store> Session<S> {
    /// Loads `key` from the store, or starts empty when nothing is stored.
    pub fn open(store: S, key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        let schema = match store.get(&key)? {
            Some(src) => project::parse_schema(&src)?,
            None => Schema::default(),
        };
        Ok(Self { store, key, schema })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Replaces the held schema wholesale (e.g. after an import).
    pub fn replace(&mut self, schema: Schema) {
        self.schema = schema;
    }

    /// Applies one edit. An edit that changes nothing is reported, not failed.
    pub fn apply(&mut self, edit: &Edit) -> Vec<Diagnostic> {
        let next = self.schema.apply(edit);
        if next == self.schema {
            if self.schema.is_clamped_move(edit) {
                log::debug!("{edit} clamped at the list boundary");
                return Vec::new();
            }
            log::debug!("{edit} left the schema unchanged");
            return vec![Diagnostic::StructuralNoOp { operation: edit.to_string() }];
        }
        self.schema = next;
        Vec::new()
    }

    pub fn save(&mut self) -> Result<()> {
        let src = project::to_json(&self.schema)?;
        self.store.set(&self.key, &src)?;
        log::info!("saved `{}` ({} root fields, {} types)", self.key, self.schema.fields.len(), self.schema.reusable_types.len());
        Ok(())
    }

    pub fn compile(&self) -> Compiled {
        compile_schema(&self.schema)
    }

    pub fn into_store(self) -> S {
        self.store
    }
}
