//! Hard failures. These only come from the edges (files, stores, parsing);
//! the tree operations and the compiler never produce them.
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read or write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Syntactically or structurally invalid JSON, with the JSON path of the failure.
    #[error("invalid JSON at {path}: {message}")]
    Parse { path: String, message: String },

    #[error("store error for key `{key}`: {message}")]
    Store { key: String, message: String },

    #[error("nothing stored under key `{0}`")]
    UnknownKey(String),

    #[error("unknown provider `{0}`")]
    UnknownProvider(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
