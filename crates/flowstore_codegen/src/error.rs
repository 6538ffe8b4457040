//! Error types for store generation.
//!
//! Every error is scoped to the one declaration being processed and names it,
//! so a batch can report it and carry on with the next declaration.

use crate::ir::Namespace;

/// Errors that can occur while generating a store for a declaration.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("{namespace}::{declaration}: field `{field}` has unresolved type `{ty}`: {reason}")]
    UnresolvedType {
        namespace: Namespace,
        declaration: String,
        field: String,
        ty: String,
        reason: String,
    },

    #[error("{namespace}::{declaration}: no accessible primary constructor: {reason}")]
    MissingConstructor {
        namespace: Namespace,
        declaration: String,
        reason: String,
    },

    #[error("{namespace}::{declaration}: unsupported store root: {reason}")]
    Unsupported {
        namespace: Namespace,
        declaration: String,
        reason: String,
    },

    #[error("{namespace}::{declaration}: failed to write `{unit}`: {source}")]
    OutputWrite {
        namespace: Namespace,
        declaration: String,
        unit: String,
        #[source]
        source: SinkError,
    },
}

impl GenerateError {
    /// Simple name of the declaration this error belongs to
    pub fn declaration(&self) -> &str {
        match self {
            GenerateError::UnresolvedType { declaration, .. }
            | GenerateError::MissingConstructor { declaration, .. }
            | GenerateError::Unsupported { declaration, .. }
            | GenerateError::OutputWrite { declaration, .. } => declaration,
        }
    }

    /// Namespace of the declaration this error belongs to
    pub fn namespace(&self) -> &Namespace {
        match self {
            GenerateError::UnresolvedType { namespace, .. }
            | GenerateError::MissingConstructor { namespace, .. }
            | GenerateError::Unsupported { namespace, .. }
            | GenerateError::OutputWrite { namespace, .. } => namespace,
        }
    }
}

/// Errors raised by a unit sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("unit `{key}` was already generated in this batch (from {first_origin})")]
    Duplicate { key: String, first_origin: String },

    #[error("unit `{key}` would overwrite `{first_key}` at {}", .path.display())]
    PathCollision {
        path: std::path::PathBuf,
        key: String,
        first_key: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while discovering declarations in source files.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Source directory does not exist: {0}")]
    DirNotFound(std::path::PathBuf),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to walk source tree: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: std::path::PathBuf,
        #[source]
        source: syn::Error,
    },
}

/// Errors returned to a build script or CLI running a whole batch.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("OUT_DIR is not set; configure an output directory outside build scripts")]
    MissingOutDir,

    #[error("store generation failed:\n{}", .0.join("\n"))]
    Failed(Vec<String>),
}
