//! Source Discovery
//!
//! Finds declarations carrying the store-root marker in a tree of Rust source
//! files, together with the scope of the module declaring each one.

use std::fs;
use std::path::{Path, PathBuf};

use quote::ToTokens;
use syn::{Attribute, DeriveInput, Item};
use tracing::debug;
use walkdir::WalkDir;

use crate::builder::Declaration;
use crate::error::SourceError;
use crate::ir::{Namespace, Origin};
use crate::scope::TypeScope;

/// Default name of the store-root marker attribute
pub const DEFAULT_MARKER: &str = "flow_store";

// ─────────────────────────────────────────────────────────────────────────────
// Source Tree
// ─────────────────────────────────────────────────────────────────────────────

/// A crate source directory (`src/`), whose `lib.rs`/`main.rs` is the crate root
#[derive(Debug, Clone)]
pub struct SourceTree {
    root: PathBuf,
}

impl SourceTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every `.rs` file below the root, sorted by path
    pub fn paths(&self) -> Result<Vec<PathBuf>, SourceError> {
        if !self.root.is_dir() {
            return Err(SourceError::DirNotFound(self.root.clone()));
        }

        let mut paths = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "rs") {
                paths.push(path.to_path_buf());
            }
        }
        Ok(paths)
    }

    /// Read one file of this tree
    pub fn read(&self, path: &Path) -> Result<SourceFile, SourceError> {
        SourceFile::read(path, module_namespace(&self.root, path))
    }
}

/// Module path of a file in a source tree: `lib.rs` -> `crate`,
/// `ui/mod.rs` and `ui.rs` -> `crate::ui`
pub fn module_namespace(root: &Path, file: &Path) -> Namespace {
    let relative = file.strip_prefix(root).unwrap_or(file);
    let mut namespace = Namespace::crate_root();

    if let Some(parent) = relative.parent() {
        for component in parent.components() {
            namespace = namespace.child(component.as_os_str().to_string_lossy());
        }
    }

    let stem = relative
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let at_root = namespace == Namespace::crate_root();
    match stem.as_str() {
        "mod" => namespace,
        "lib" | "main" if at_root => namespace,
        _ => namespace.child(stem),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Source File
// ─────────────────────────────────────────────────────────────────────────────

/// One source file and the module it defines
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub namespace: Namespace,
    pub text: String,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, namespace: Namespace, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            namespace,
            text: text.into(),
        }
    }

    pub fn read(path: &Path, namespace: Namespace) -> Result<Self, SourceError> {
        let text = fs::read_to_string(path).map_err(|source| SourceError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(path, namespace, text))
    }

    /// Declarations carrying `marker`, in source order, including those in
    /// inline modules
    pub fn declarations(&self, marker: &str) -> Result<Vec<Declaration>, SourceError> {
        let parse_error = |source| SourceError::Parse {
            path: self.path.clone(),
            source,
        };

        let file = syn::parse_file(&self.text).map_err(parse_error)?;
        let origin = Origin::from_source(&self.path, &self.text);

        let mut declarations = Vec::new();
        collect(&self.namespace, &file.items, marker, &origin, &mut declarations)
            .map_err(parse_error)?;

        debug!(
            "Found {} marked declarations in {}",
            declarations.len(),
            self.path.display()
        );
        Ok(declarations)
    }
}

fn collect(
    namespace: &Namespace,
    items: &[Item],
    marker: &str,
    origin: &Origin,
    out: &mut Vec<Declaration>,
) -> syn::Result<()> {
    let scope = TypeScope::for_items(namespace.clone(), items);

    for item in items {
        let marked = match item {
            Item::Struct(s) => has_marker(&s.attrs, marker),
            Item::Enum(e) => has_marker(&e.attrs, marker),
            Item::Union(u) => has_marker(&u.attrs, marker),
            Item::Mod(m) => {
                if let Some((_, content)) = &m.content {
                    collect(&namespace.child(m.ident.to_string()), content, marker, origin, out)?;
                }
                false
            }
            _ => false,
        };

        if marked {
            let input: DeriveInput = syn::parse2(item.to_token_stream())?;
            out.push(Declaration::new(input, scope.clone(), origin.clone()));
        }
    }

    Ok(())
}

/// `#[flow_store]`, or any path ending in the marker name
fn has_marker(attrs: &[Attribute], marker: &str) -> bool {
    attrs.iter().any(|attr| {
        attr.path()
            .segments
            .last()
            .is_some_and(|segment| segment.ident == marker)
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
