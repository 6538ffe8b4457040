//! Store IR
//!
//! Structural description of one store root: where it lives, what it is
//! called and the ordered shapes of its fields. Built once per declaration,
//! read once by the emitter.

use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};

use crate::scope::is_prelude;

// ─────────────────────────────────────────────────────────────────────────────
// Namespace
// ─────────────────────────────────────────────────────────────────────────────

/// A module path such as `crate::ui` or `std::collections`.
///
/// `self` is the namespace of code spliced into the declaring module when the
/// absolute path is not known (derive expansion). For the same reason a path
/// may be kept *as written*: it only resolves from the declaring module.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Namespace {
    segments: Vec<String>,
    as_written: bool,
}

impl Namespace {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
            as_written: false,
        }
    }

    /// Path copied from the declaring module's source, e.g. `model` from
    /// `model::Point` when `model` may be a local module, an import or a crate
    pub fn as_written<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            as_written: true,
            ..Self::new(segments)
        }
    }

    /// `crate`
    pub fn crate_root() -> Self {
        Self::new(["crate"])
    }

    /// `self`
    pub fn local() -> Self {
        Self::new(["self"])
    }

    /// Parse `a::b::c`. An empty string is the crate root.
    pub fn parse(path: &str) -> Self {
        let segments: Vec<&str> = path
            .split("::")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if segments.is_empty() {
            Self::crate_root()
        } else {
            Self::new(segments)
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_as_written(&self) -> bool {
        self.as_written
    }

    pub fn is_local(&self) -> bool {
        self.segments.len() == 1 && self.segments[0] == "self"
    }

    /// Whether the path starts at `crate`, `self` or `super`
    pub fn is_relative(&self) -> bool {
        matches!(
            self.segments.first().map(String::as_str),
            Some("crate" | "self" | "super")
        )
    }

    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.into());
        Self {
            segments,
            as_written: self.as_written,
        }
    }

    /// Enclosing module, or `None` above the crate root or an external root
    pub fn parent(&self) -> Option<Self> {
        match self.segments.as_slice() {
            [only] if only == "self" => Some(Self::new(["super"])),
            [.., last] if last == "super" => Some(self.child("super")),
            [_] | [] => None,
            [rest @ .., _] => Some(Self {
                segments: rest.to_vec(),
                as_written: self.as_written,
            }),
        }
    }

    /// Path to `name` usable from any module of the crate. As-written paths
    /// stay unprefixed and only hold in the declaring module.
    pub fn qualify(&self, name: &str) -> String {
        if self.is_relative() || self.as_written {
            format!("{}::{}", self, name)
        } else {
            format!("::{}::{}", self, name)
        }
    }

    /// Directory for this namespace below an output root: `crate::ui` -> `ui`
    pub fn relative_dir(&self) -> PathBuf {
        self.segments
            .iter()
            .skip_while(|s| *s == "crate")
            .collect()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("::"))
    }
}

impl Serialize for Namespace {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Type Shape
// ─────────────────────────────────────────────────────────────────────────────

/// A (possibly generic) type reference as written in source.
///
/// `type_arguments` holds only what is lexically present: a bare `Grid` stays
/// argument-free even when `Grid` is a generic alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TypeShape {
    pub qualified_namespace: Namespace,
    pub simple_name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub type_arguments: Vec<TypeShape>,
}

impl TypeShape {
    pub fn new(qualified_namespace: Namespace, simple_name: impl Into<String>) -> Self {
        Self {
            qualified_namespace,
            simple_name: simple_name.into(),
            type_arguments: Vec::new(),
        }
    }

    pub fn with_arguments(mut self, type_arguments: Vec<TypeShape>) -> Self {
        self.type_arguments = type_arguments;
        self
    }

    /// `Name` or `Name<A, B>`, recursively
    pub fn render(&self) -> String {
        self.to_string()
    }

    /// Generic nesting depth: 0 for `i32`, 1 for `Vec<i32>`, 2 for `Vec<Vec<i32>>`
    pub fn depth(&self) -> usize {
        self.type_arguments
            .iter()
            .map(|arg| arg.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Primitive or prelude type, nameable anywhere without an import
    pub fn is_prelude(&self) -> bool {
        is_prelude(&self.qualified_namespace, &self.simple_name)
    }

    /// Visit this shape and every nested argument, outermost first
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a TypeShape)) {
        f(self);
        for arg in &self.type_arguments {
            arg.walk(f);
        }
    }
}

impl fmt::Display for TypeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.simple_name)?;
        if let Some((first, rest)) = self.type_arguments.split_first() {
            write!(f, "<{}", first)?;
            for arg in rest {
                write!(f, ", {}", arg)?;
            }
            f.write_str(">")?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fields, Origin, Visibility
// ─────────────────────────────────────────────────────────────────────────────

/// One named field of the store root
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub shape: TypeShape,
}

impl FieldDescriptor {
    /// Mutator taking an awaiting transform: `count` -> `count_with`
    pub fn async_mutator_name(&self) -> String {
        async_mutator_name(&self.name)
    }
}

pub(crate) fn async_mutator_name(field: &str) -> String {
    format!("{}_with", field.trim_start_matches("r#"))
}

/// Where a declaration came from. Used for dependency tracking and
/// diagnostics only; never rendered into generated code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Origin {
    /// Source file, `None` for declarations handed in by a macro
    pub path: Option<PathBuf>,
    /// Hash of the source text the declaration was read from
    pub fingerprint: u64,
}

impl Origin {
    /// Origin of a declaration with no backing file
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn from_source(path: impl AsRef<Path>, text: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        Self {
            path: Some(path.as_ref().to_path_buf()),
            fingerprint: hasher.finish(),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}", path.display()),
            None => f.write_str("<macro input>"),
        }
    }
}

/// Visibility of the store root, carried over to its wrapper
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreVisibility {
    /// No modifier: visible in the declaring module
    Inherited,
    Public,
    Crate,
    Super,
    /// `pub(in path)`
    Restricted(String),
}

impl StoreVisibility {
    /// Modifier for code placed in the declaring module
    pub fn inline_modifier(&self) -> String {
        match self {
            StoreVisibility::Inherited => String::new(),
            StoreVisibility::Public => "pub ".to_string(),
            StoreVisibility::Crate => "pub(crate) ".to_string(),
            StoreVisibility::Super => "pub(super) ".to_string(),
            StoreVisibility::Restricted(path) => format!("pub(in {}) ", path),
        }
    }

    /// Modifier for code placed in a child module of the declaring module,
    /// reaching the same set of modules
    pub fn child_module_modifier(&self) -> String {
        match self {
            StoreVisibility::Inherited => "pub(super) ".to_string(),
            StoreVisibility::Super => "pub(in super::super) ".to_string(),
            StoreVisibility::Restricted(path) if path == "self" => "pub(super) ".to_string(),
            StoreVisibility::Restricted(path) if path.starts_with("super") => {
                format!("pub(in super::{}) ", path)
            }
            other => other.inline_modifier(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Store IR
// ─────────────────────────────────────────────────────────────────────────────

/// Intermediate representation of one store root
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StoreIr {
    pub origin: Origin,
    /// Namespace of the root, and of the generated wrapper
    pub namespace: Namespace,
    pub root_type_name: String,
    pub visibility: StoreVisibility,
    /// Declaration order
    pub fields: Vec<FieldDescriptor>,
}

impl StoreIr {
    /// Name of the generated wrapper type and unit: `<Root>Store`
    pub fn store_name(&self) -> String {
        format!("{}Store", self.root_type_name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn int() -> TypeShape {
        TypeShape::new(Namespace::new(["core", "primitive"]), "i32")
    }

    fn vec_of(inner: TypeShape) -> TypeShape {
        TypeShape::new(Namespace::new(["std", "vec"]), "Vec").with_arguments(vec![inner])
    }

    #[test]
    fn test_render_nested_generics() {
        let shape = vec_of(vec_of(int()));
        assert_eq!(shape.render(), "Vec<Vec<i32>>");
        assert_eq!(shape.depth(), 2);
        assert_eq!(int().depth(), 0);
    }

    #[test]
    fn test_render_multiple_arguments() {
        let map = TypeShape::new(Namespace::new(["std", "collections"]), "HashMap")
            .with_arguments(vec![int(), vec_of(int())]);
        assert_eq!(map.to_string(), "HashMap<i32, Vec<i32>>");
    }

    #[test]
    fn test_namespace_parent() {
        assert_eq!(
            Namespace::parse("crate::ui::state").parent(),
            Some(Namespace::parse("crate::ui"))
        );
        assert_eq!(Namespace::local().parent(), Some(Namespace::new(["super"])));
        assert_eq!(
            Namespace::new(["super"]).parent(),
            Some(Namespace::new(["super", "super"]))
        );
        assert_eq!(Namespace::crate_root().parent(), None);
    }

    #[test]
    fn test_namespace_qualify_and_dir() {
        assert_eq!(Namespace::parse("crate::ui").qualify("Item"), "crate::ui::Item");
        assert_eq!(
            Namespace::parse("std::collections").qualify("HashMap"),
            "::std::collections::HashMap"
        );
        assert_eq!(Namespace::as_written(["model"]).qualify("Point"), "model::Point");
        assert_eq!(Namespace::parse("crate::ui::state").relative_dir(), PathBuf::from("ui/state"));
        assert_eq!(Namespace::parse("").relative_dir(), PathBuf::new());
    }

    #[test]
    fn test_child_module_visibility() {
        assert_eq!(StoreVisibility::Inherited.child_module_modifier(), "pub(super) ");
        assert_eq!(StoreVisibility::Super.child_module_modifier(), "pub(in super::super) ");
        assert_eq!(StoreVisibility::Crate.child_module_modifier(), "pub(crate) ");
        assert_eq!(
            StoreVisibility::Restricted("crate::ui".into()).child_module_modifier(),
            "pub(in crate::ui) "
        );
    }

    #[test]
    fn test_origin_fingerprint_tracks_text() {
        let a = Origin::from_source("src/a.rs", "struct A;");
        let b = Origin::from_source("src/a.rs", "struct A;");
        let c = Origin::from_source("src/a.rs", "struct B;");
        assert_eq!(a, b);
        assert_ne!(a.fingerprint, c.fingerprint);
        assert_eq!(Origin::detached().to_string(), "<macro input>");
    }
}
