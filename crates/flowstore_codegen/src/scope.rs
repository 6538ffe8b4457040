//! Type Scope
//!
//! Resolves type paths written in a module to `(namespace, simple name)`
//! pairs, using only what the module itself declares and imports.

use std::collections::{BTreeMap, BTreeSet};

use syn::{Item, UseTree};
use tracing::debug;

use crate::ir::Namespace;

// ─────────────────────────────────────────────────────────────────────────────
// Prelude
// ─────────────────────────────────────────────────────────────────────────────

const PRIMITIVES: &[&str] = &[
    "bool", "char", "str", "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32", "u64",
    "u128", "usize", "f32", "f64",
];

const PRELUDE_TYPES: &[(&str, &str)] = &[
    ("String", "std::string"),
    ("Vec", "std::vec"),
    ("Option", "std::option"),
    ("Result", "std::result"),
    ("Box", "std::boxed"),
];

/// Namespace a name resolves to when nothing in the module shadows it
pub fn prelude_namespace(name: &str) -> Option<Namespace> {
    if PRIMITIVES.contains(&name) {
        return Some(Namespace::new(["core", "primitive"]));
    }
    PRELUDE_TYPES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, ns)| Namespace::parse(ns))
}

/// Whether `namespace::name` is nameable everywhere without an import
pub fn is_prelude(namespace: &Namespace, name: &str) -> bool {
    prelude_namespace(name).is_some_and(|ns| &ns == namespace)
}

// ─────────────────────────────────────────────────────────────────────────────
// Type Scope
// ─────────────────────────────────────────────────────────────────────────────

/// Names visible in one module.
///
/// A strict scope rejects single-segment names it cannot account for. A
/// lenient scope (used when only the declaration itself is visible, as in a
/// derive) assumes such names live in the declaring module.
#[derive(Debug, Clone)]
pub struct TypeScope {
    namespace: Namespace,
    strict: bool,
    /// Types declared in this module
    locals: BTreeSet<String>,
    /// Modules declared in this module
    modules: BTreeSet<String>,
    /// Alias -> absolute path of the imported item
    imports: BTreeMap<String, Vec<String>>,
    /// Modules imported with `*`
    globs: Vec<Namespace>,
}

impl TypeScope {
    /// Scope that knows nothing and resolves unknown names into `namespace`
    pub fn lenient(namespace: Namespace) -> Self {
        Self::empty(namespace, false)
    }

    /// Scope that knows nothing and rejects unknown names
    pub fn strict(namespace: Namespace) -> Self {
        Self::empty(namespace, true)
    }

    fn empty(namespace: Namespace, strict: bool) -> Self {
        Self {
            namespace,
            strict,
            locals: BTreeSet::new(),
            modules: BTreeSet::new(),
            imports: BTreeMap::new(),
            globs: Vec::new(),
        }
    }

    /// Strict scope populated from a module's items
    pub fn for_items(namespace: Namespace, items: &[Item]) -> Self {
        let mut scope = Self::strict(namespace);

        // Modules first: imports may go through them.
        for item in items {
            match item {
                Item::Mod(m) => scope.declare_module(m.ident.to_string()),
                Item::ExternCrate(e) => {
                    let alias = e.rename.as_ref().map(|(_, a)| a).unwrap_or(&e.ident);
                    if alias != "_" {
                        scope.import(alias.to_string(), vec![e.ident.to_string()]);
                    }
                }
                _ => {}
            }
        }

        for item in items {
            match item {
                Item::Struct(s) => scope.declare_type(s.ident.to_string()),
                Item::Enum(e) => scope.declare_type(e.ident.to_string()),
                Item::Union(u) => scope.declare_type(u.ident.to_string()),
                Item::Type(t) => scope.declare_type(t.ident.to_string()),
                Item::Trait(t) => scope.declare_type(t.ident.to_string()),
                Item::Use(u) => scope.collect_use(&mut Vec::new(), &u.tree),
                _ => {}
            }
        }

        scope
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn declare_type(&mut self, name: impl Into<String>) {
        self.locals.insert(name.into());
    }

    pub fn declare_module(&mut self, name: impl Into<String>) {
        self.modules.insert(name.into());
    }

    /// Record `alias` as naming the item at `path` (as written, may be relative)
    pub fn import(&mut self, alias: impl Into<String>, path: Vec<String>) {
        let alias = alias.into();
        match self.absolutize(&path) {
            Ok(full) => {
                self.imports.insert(alias, full);
            }
            Err(reason) => debug!("Skipping import of `{}`: {}", path.join("::"), reason),
        }
    }

    pub fn import_glob(&mut self, path: Vec<String>) {
        match self.absolutize(&path) {
            Ok(full) => self.globs.push(Namespace::new(full)),
            Err(reason) => debug!("Skipping glob import of `{}`: {}", path.join("::"), reason),
        }
    }

    fn collect_use(&mut self, prefix: &mut Vec<String>, tree: &UseTree) {
        match tree {
            UseTree::Path(p) => {
                prefix.push(p.ident.to_string());
                self.collect_use(prefix, &p.tree);
                prefix.pop();
            }
            UseTree::Name(n) => {
                if n.ident == "self" {
                    if let Some(last) = prefix.last().cloned() {
                        self.import(last, prefix.clone());
                    }
                } else {
                    let mut path = prefix.clone();
                    path.push(n.ident.to_string());
                    self.import(n.ident.to_string(), path);
                }
            }
            UseTree::Rename(r) => {
                if r.rename == "_" {
                    return;
                }
                let mut path = prefix.clone();
                if r.ident != "self" {
                    path.push(r.ident.to_string());
                }
                self.import(r.rename.to_string(), path);
            }
            UseTree::Glob(_) => self.import_glob(prefix.clone()),
            UseTree::Group(g) => {
                for tree in &g.items {
                    self.collect_use(prefix, tree);
                }
            }
        }
    }

    /// Turn a path written in this module into an absolute one
    fn absolutize(&self, segments: &[String]) -> Result<Vec<String>, String> {
        let Some((first, rest)) = segments.split_first() else {
            return Err("empty path".to_string());
        };

        let base = match first.as_str() {
            "crate" => return Ok(segments.to_vec()),
            "self" => self.namespace.clone(),
            "super" => {
                let mut rest = rest;
                let mut ns = self
                    .namespace
                    .parent()
                    .ok_or_else(|| format!("`super` above `{}`", self.namespace))?;
                while let Some((next, tail)) = rest.split_first() {
                    if next != "super" {
                        break;
                    }
                    ns = ns
                        .parent()
                        .ok_or_else(|| format!("`super` above `{}`", self.namespace))?;
                    rest = tail;
                }
                return Ok(ns.segments().iter().chain(rest).cloned().collect());
            }
            m if self.modules.contains(m) => self.namespace.child(m),
            alias if self.imports.contains_key(alias) => Namespace::new(self.imports[alias].clone()),
            _ => return Ok(segments.to_vec()),
        };

        Ok(base.segments().iter().chain(rest).cloned().collect())
    }

    /// Resolve a type path to its namespace and simple name
    pub fn resolve(&self, path: &syn::Path) -> Result<(Namespace, String), String> {
        let segments: Vec<String> = path.segments.iter().map(|s| s.ident.to_string()).collect();

        if path.leading_colon.is_some() {
            return split_last(segments);
        }

        if let [name] = segments.as_slice() {
            return self.resolve_name(name);
        }

        // Without the module's items, an unknown first segment may be a local
        // module, an import or a crate: keep the path as written.
        if !self.strict && !self.knows_root(&segments[0]) {
            let (namespace, name) = split_last(segments)?;
            return Ok((Namespace::as_written(namespace.segments().to_vec()), name));
        }

        split_last(self.absolutize(&segments)?)
    }

    /// Whether `first` is a path root this scope can place
    fn knows_root(&self, first: &str) -> bool {
        matches!(first, "crate" | "self" | "super")
            || self.modules.contains(first)
            || self.imports.contains_key(first)
    }

    fn resolve_name(&self, name: &str) -> Result<(Namespace, String), String> {
        if self.locals.contains(name) {
            return Ok((self.namespace.clone(), name.to_string()));
        }
        if let Some(full) = self.imports.get(name) {
            return split_last(full.clone());
        }
        if let Some(ns) = prelude_namespace(name) {
            return Ok((ns, name.to_string()));
        }
        if let [glob] = self.globs.as_slice() {
            return Ok((glob.clone(), name.to_string()));
        }
        if !self.strict {
            return Ok((self.namespace.clone(), name.to_string()));
        }

        if self.globs.len() > 1 {
            Err(format!(
                "ambiguous: `{}` is not declared and {} glob imports are in scope",
                name,
                self.globs.len()
            ))
        } else {
            Err(format!(
                "`{}` is not declared in `{}`, imported, or in the prelude",
                name, self.namespace
            ))
        }
    }
}

fn split_last(mut segments: Vec<String>) -> Result<(Namespace, String), String> {
    let name = segments.pop().ok_or_else(|| "empty path".to_string())?;
    if segments.is_empty() {
        return Err(format!("`{}` has no enclosing module", name));
    }
    Ok((Namespace::new(segments), name))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
