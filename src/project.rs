//! Persisted representation: `{ "fields": [...], "reusableTypes": [...] }`.
//!
//! Parsing goes through `serde_path_to_error` so a bad document reports where
//! it went wrong, not just what.
use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::ir::Schema;

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| Error::Parse {
        path: err.path().to_string(),
        message: err.into_inner().to_string(),
    })
}

pub fn from_slice_with_path<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let de = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| Error::Parse {
        path: err.path().to_string(),
        message: err.into_inner().to_string(),
    })
}

pub fn parse_schema(src: &str) -> Result<Schema> {
    from_str_with_path(src)
}

pub fn to_json(schema: &Schema) -> Result<String> {
    serde_json::to_string_pretty(schema).map_err(|e| Error::Parse {
        path: ".".into(),
        message: e.to_string(),
    })
}

pub fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| Error::Io { path: path.to_path_buf(), source })
}

pub fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| Error::Io { path: parent.to_path_buf(), source })?;
    }
    std::fs::write(path, contents).map_err(|source| Error::Io { path: path.to_path_buf(), source })
}

pub fn load_schema(path: &Path) -> Result<Schema> {
    parse_schema(&read_file(path)?)
}

/// Any JSON value, for importer input.
pub fn load_value(path: &Path) -> Result<Value> {
    from_slice_with_path(read_file(path)?.as_bytes())
}
