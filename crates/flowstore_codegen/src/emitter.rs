//! Code Emitter
//!
//! Renders a [`StoreIr`] into the source text of its `<Root>Store` wrapper.
//! Output depends only on the IR and the options; all ordering comes from the
//! field sequence and sorted sets, so equal inputs give byte-identical text.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use heck::ToSnakeCase;

use crate::ir::{Namespace, Origin, StoreIr, TypeShape};
use crate::sink::UnitKey;

/// Default path of the crate providing `MutableStateFlow` and `StateFlow`
pub const DEFAULT_RUNTIME_PATH: &str = "::flowstore";

// ─────────────────────────────────────────────────────────────────────────────
// Options & Output
// ─────────────────────────────────────────────────────────────────────────────

/// Where the generated code will be placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Spliced into the module declaring the root (derive expansion)
    Inline,
    /// A file mounted as a child module of the module declaring the root
    Module,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitOptions {
    pub runtime_path: String,
    pub layout: Layout,
}

impl EmitOptions {
    pub fn inline() -> Self {
        Self {
            runtime_path: DEFAULT_RUNTIME_PATH.to_string(),
            layout: Layout::Inline,
        }
    }

    pub fn module() -> Self {
        Self {
            runtime_path: DEFAULT_RUNTIME_PATH.to_string(),
            layout: Layout::Module,
        }
    }

    pub fn with_runtime_path(mut self, runtime_path: impl Into<String>) -> Self {
        self.runtime_path = runtime_path.into();
        self
    }
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self::module()
    }
}

/// One generated compilation unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedUnit {
    pub namespace: Namespace,
    /// Wrapper type name, `<Root>Store`
    pub name: String,
    /// `<root>_store.rs`
    pub file_name: String,
    pub source: String,
    pub origin: Origin,
}

impl GeneratedUnit {
    pub fn key(&self) -> UnitKey {
        UnitKey {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
        }
    }

    /// Location below an output root: `crate::ui` + `UiStateStore` -> `ui/ui_state_store.rs`
    pub fn relative_path(&self) -> PathBuf {
        self.namespace.relative_dir().join(&self.file_name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Emit
// ─────────────────────────────────────────────────────────────────────────────

/// Render the wrapper for `ir`
pub fn emit(ir: &StoreIr, options: &EmitOptions) -> GeneratedUnit {
    let root = ir.root_type_name.as_str();
    let store = ir.store_name();
    let runtime = options.runtime_path.trim_end_matches("::");
    let renderer = TypeRenderer::new(ir, options.layout);
    let vis = match options.layout {
        Layout::Inline => ir.visibility.inline_modifier(),
        Layout::Module => ir.visibility.child_module_modifier(),
    };

    let mut w = CodeWriter::default();

    if options.layout == Layout::Module {
        w.line(format!(
            "// @generated by flowstore from `{}`. Do not edit.",
            ir.namespace.qualify(root).trim_start_matches("::")
        ));
        w.blank();
        if !renderer.imports.is_empty() {
            for (simple, namespace) in renderer.sorted_imports() {
                w.line(format!("use {};", namespace.qualify(simple)));
            }
            w.blank();
        }
    }

    // Wrapper type
    w.line(format!("/// Observable store for [`{}`].", root));
    w.line("///");
    w.line(format!(
        "/// Every field of `{}` has an async mutator of the same name.",
        root
    ));
    w.open(format!("{}struct {}", vis, store));
    w.line(format!("flow: {}::MutableStateFlow<{}>,", runtime, root));
    w.close("");
    w.blank();

    w.open(format!("impl {}", store));
    w.line("/// Read-only view of the current and future states");
    w.open(format!("pub fn flow(&self) -> {}::StateFlow<{}>", runtime, root));
    w.line("self.flow.as_state_flow()");
    w.close("");

    for field in &ir.fields {
        let name = field.name.as_str();
        let ty = renderer.render(&field.shape);

        w.blank();
        w.line(format!(
            "/// Replace `{}` with `transform({})` and publish the resulting state",
            name, name
        ));
        w.open(format!(
            "pub async fn {}(&self, transform: impl ::core::ops::FnOnce({}) -> {})",
            name, ty, ty
        ));
        write_update(&mut w, ir, name, "transform(old_value)");
        w.close("");

        w.blank();
        w.line(format!("/// Like [`Self::{}`], with a transform that can await", name));
        w.line(format!(
            "pub async fn {}<F>(&self, transform: impl ::core::ops::FnOnce({}) -> F)",
            field.async_mutator_name(),
            ty
        ));
        w.line("where");
        w.line(format!("    F: ::core::future::Future<Output = {}>,", ty));
        w.brace();
        write_update(&mut w, ir, name, "transform(old_value).await");
        w.close("");
    }
    w.close("");
    w.blank();

    // Factory on the root type
    w.open(format!("impl {}", root));
    w.line(format!("/// Wrap this state in a new [`{}`]", store));
    w.open(format!("pub fn into_store(self) -> {}", store));
    w.line("::core::convert::From::from(self)");
    w.close("");
    w.close("");
    w.blank();

    w.open(format!("impl ::core::convert::From<{}> for {}", root, store));
    w.open(format!("fn from(state: {}) -> Self", root));
    w.open("Self");
    w.line(format!("flow: {}::MutableStateFlow::new(state),", runtime));
    w.close("");
    w.close("");
    w.close("");

    GeneratedUnit {
        namespace: ir.namespace.clone(),
        file_name: format!("{}.rs", store.to_snake_case()),
        name: store,
        source: w.finish(),
        origin: ir.origin.clone(),
    }
}

/// Read, replace one field, publish. The read and the publish are separate
/// steps: concurrent mutators may overwrite each other's change.
fn write_update(w: &mut CodeWriter, ir: &StoreIr, field: &str, new_value: &str) {
    w.line("let old_state = self.flow.value();");
    w.line(format!("let old_value = old_state.{};", field));
    w.line(format!("let new_value = {};", new_value));
    w.open(format!("let new_state = {}", ir.root_type_name));
    w.line(format!("{}: new_value,", field));
    if ir.fields.len() > 1 {
        w.line("..old_state");
    }
    w.close(";");
    w.line("self.flow.emit(new_state).await;");
}

// ─────────────────────────────────────────────────────────────────────────────
// Type Rendering
// ─────────────────────────────────────────────────────────────────────────────

/// Decides, per type, between the simple name and a qualified path
struct TypeRenderer<'a> {
    namespace: &'a Namespace,
    layout: Layout,
    /// Simple name -> namespace it is imported from (module layout only)
    imports: BTreeMap<String, Namespace>,
}

impl<'a> TypeRenderer<'a> {
    fn new(ir: &'a StoreIr, layout: Layout) -> Self {
        let mut imports = BTreeMap::new();

        if layout == Layout::Module {
            imports.insert(ir.root_type_name.clone(), ir.namespace.clone());

            let mut referenced = BTreeSet::new();
            for field in &ir.fields {
                field.shape.walk(&mut |shape| {
                    if !shape.is_prelude() {
                        referenced.insert((shape.qualified_namespace.clone(), shape.simple_name.clone()));
                    }
                });
            }

            // First namespace (in sorted order) wins a simple name.
            for (namespace, simple) in referenced {
                imports.entry(simple).or_insert(namespace);
            }
        }

        Self {
            namespace: &ir.namespace,
            layout,
            imports,
        }
    }

    /// Imports ordered by full path
    fn sorted_imports(&self) -> Vec<(&str, &Namespace)> {
        let mut imports: Vec<(&str, &Namespace)> = self
            .imports
            .iter()
            .map(|(simple, namespace)| (simple.as_str(), namespace))
            .collect();
        imports.sort_by(|a, b| (a.1, a.0).cmp(&(b.1, b.0)));
        imports
    }

    fn nameable(&self, shape: &TypeShape) -> bool {
        if shape.is_prelude() {
            return true;
        }
        match self.layout {
            Layout::Inline => &shape.qualified_namespace == self.namespace,
            Layout::Module => {
                self.imports.get(&shape.simple_name) == Some(&shape.qualified_namespace)
            }
        }
    }

    fn render(&self, shape: &TypeShape) -> String {
        let mut out = if self.nameable(shape) {
            shape.simple_name.clone()
        } else {
            shape.qualified_namespace.qualify(&shape.simple_name)
        };

        if !shape.type_arguments.is_empty() {
            let args: Vec<String> = shape.type_arguments.iter().map(|a| self.render(a)).collect();
            out.push('<');
            out.push_str(&args.join(", "));
            out.push('>');
        }
        out
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Code Writer
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct CodeWriter {
    out: String,
    indent: usize,
}

impl CodeWriter {
    fn line(&mut self, text: impl AsRef<str>) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn open(&mut self, header: impl AsRef<str>) {
        self.line(format!("{} {{", header.as_ref()));
        self.indent += 1;
    }

    /// Opening brace on its own line, after a `where` clause
    fn brace(&mut self) {
        self.line("{");
        self.indent += 1;
    }

    fn close(&mut self, suffix: &str) {
        self.indent = self.indent.saturating_sub(1);
        self.line(format!("}}{}", suffix));
    }

    fn finish(self) -> String {
        self.out
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{Declaration, build};
    use crate::ir::StoreVisibility;
    use crate::scope::TypeScope;
    use syn::parse_quote;

    fn data_ir() -> StoreIr {
        build(&Declaration::from_derive(parse_quote! {
            pub struct Data {
                text: String,
                count: i32,
            }
        }))
        .unwrap()
    }

    fn module_ir(input: syn::DeriveInput, items: syn::File) -> StoreIr {
        let scope = TypeScope::for_items(Namespace::parse("crate::ui"), &items.items);
        build(&Declaration::new(input, scope, Origin::detached())).unwrap()
    }

    #[test]
    fn test_emit_is_deterministic() {
        let a = emit(&data_ir(), &EmitOptions::module());
        let b = emit(&data_ir(), &EmitOptions::module());
        assert_eq!(a.source, b.source);
        assert_eq!(a, b);
    }

    #[test]
    fn test_emit_mutators_in_field_order() {
        let unit = emit(&data_ir(), &EmitOptions::inline());
        assert_eq!(unit.name, "DataStore");
        assert_eq!(unit.file_name, "data_store.rs");

        let text = unit.source.find("pub async fn text(").unwrap();
        let count = unit.source.find("pub async fn count(").unwrap();
        assert!(text < count);

        assert!(unit.source.contains(
            "    pub async fn count(&self, transform: impl ::core::ops::FnOnce(i32) -> i32) {\n\
             \x20       let old_state = self.flow.value();\n\
             \x20       let old_value = old_state.count;\n\
             \x20       let new_value = transform(old_value);\n\
             \x20       let new_state = Data {\n\
             \x20           count: new_value,\n\
             \x20           ..old_state\n\
             \x20       };\n\
             \x20       self.flow.emit(new_state).await;\n\
             \x20   }\n"
        ));
        assert!(unit.source.contains("pub struct DataStore {"));
        assert!(unit.source.contains("flow: ::flowstore::MutableStateFlow<Data>,"));
        assert!(unit.source.contains("pub fn flow(&self) -> ::flowstore::StateFlow<Data> {"));
        assert!(unit.source.contains("pub fn into_store(self) -> DataStore {"));
        assert!(!unit.source.contains("@generated"));

        assert!(unit.source.contains(
            "    pub async fn count_with<F>(&self, transform: impl ::core::ops::FnOnce(i32) -> F)\n\
             \x20   where\n\
             \x20       F: ::core::future::Future<Output = i32>,\n\
             \x20   {\n\
             \x20       let old_state = self.flow.value();\n\
             \x20       let old_value = old_state.count;\n\
             \x20       let new_value = transform(old_value).await;\n"
        ));
        let count_with = unit.source.find("pub async fn count_with<F>(").unwrap();
        assert!(count < count_with);
    }

    #[test]
    fn test_emit_output_parses() {
        let ir = module_ir(
            parse_quote! {
                struct UiState {
                    text: String,
                    list: Vec<Vec<i32>>,
                    index: HashMap<String, Item>,
                }
            },
            parse_quote! {
                use std::collections::HashMap;
                struct Item;
            },
        );

        for options in [EmitOptions::inline(), EmitOptions::module()] {
            let unit = emit(&ir, &options);
            syn::parse_file(&unit.source).unwrap();
        }
    }

    #[test]
    fn test_nested_generics_keep_depth() {
        let ir = module_ir(
            parse_quote! { struct Board { list: Vec<Vec<i32>> } },
            parse_quote! {},
        );
        let unit = emit(&ir, &EmitOptions::module());
        assert!(unit.source.contains("impl ::core::ops::FnOnce(Vec<Vec<i32>>) -> Vec<Vec<i32>>"));
    }

    #[test]
    fn test_single_field_has_no_update_tail() {
        let ir = build(&Declaration::from_derive(parse_quote! {
            struct Counter { count: u64 }
        }))
        .unwrap();
        let unit = emit(&ir, &EmitOptions::inline());
        assert!(!unit.source.contains("..old_state"));
        syn::parse_file(&unit.source).unwrap();
    }

    #[test]
    fn test_conversion_names_are_free_field_names() {
        let ir = build(&Declaration::from_derive(parse_quote! {
            struct Calls { new: u32, from: u32 }
        }))
        .unwrap();
        let unit = emit(&ir, &EmitOptions::inline());
        assert!(unit.source.contains("pub async fn new(&self"));
        assert!(unit.source.contains("::core::convert::From::from(self)"));
        assert!(unit.source.contains("fn from(state: Calls) -> Self {"));
        syn::parse_file(&unit.source).unwrap();
    }

    #[test]
    fn test_zero_fields_have_no_mutators() {
        let ir = build(&Declaration::from_derive(parse_quote! { struct Marker; })).unwrap();
        let unit = emit(&ir, &EmitOptions::inline());
        assert!(!unit.source.contains("async fn"));
        assert!(unit.source.contains("pub fn into_store(self) -> MarkerStore {"));
    }

    #[test]
    fn test_module_layout_imports() {
        let ir = module_ir(
            parse_quote! {
                struct UiState {
                    index: HashMap<String, Item>,
                    label: Option<String>,
                }
            },
            parse_quote! {
                use std::collections::HashMap;
                struct Item;
            },
        );
        let unit = emit(&ir, &EmitOptions::module());

        assert!(unit.source.starts_with(
            "// @generated by flowstore from `crate::ui::UiState`. Do not edit.\n\
             \n\
             use crate::ui::Item;\n\
             use crate::ui::UiState;\n\
             use ::std::collections::HashMap;\n\
             \n"
        ));
        assert!(!unit.source.contains("use ::std::option"));
        assert!(unit.source.contains("FnOnce(HashMap<String, Item>) -> HashMap<String, Item>"));
        assert!(unit.source.contains("pub(super) struct UiStateStore {"));
        assert_eq!(unit.relative_path(), PathBuf::from("ui/ui_state_store.rs"));
    }

    #[test]
    fn test_module_layout_qualifies_conflicting_names() {
        let ir = module_ir(
            parse_quote! {
                struct Outcome {
                    first: Error,
                    second: fmt::Error,
                }
            },
            parse_quote! {
                use std::fmt;
                enum Error { Bad }
            },
        );
        let unit = emit(&ir, &EmitOptions::module());

        assert!(unit.source.contains("use crate::ui::Error;\n"));
        assert!(!unit.source.contains("use ::std::fmt::Error;"));
        assert!(unit.source.contains("FnOnce(Error) -> Error"));
        assert!(unit.source.contains("FnOnce(::std::fmt::Error) -> ::std::fmt::Error"));
    }

    #[test]
    fn test_inline_layout_qualifies_foreign_types() {
        let ir = build(&Declaration::from_derive(parse_quote! {
            pub(crate) struct Cache {
                entries: std::collections::BTreeMap<String, Entry>,
                parent: super::Parent,
            }
        }))
        .unwrap();
        assert_eq!(ir.visibility, StoreVisibility::Crate);

        let unit = emit(&ir, &EmitOptions::inline().with_runtime_path("crate::runtime"));
        assert!(unit.source.contains(
            "FnOnce(std::collections::BTreeMap<String, Entry>) -> std::collections::BTreeMap<String, Entry>"
        ));
        assert!(unit.source.contains("FnOnce(super::Parent) -> super::Parent"));
        assert!(unit.source.contains("pub(crate) struct CacheStore {"));
        assert!(unit.source.contains("flow: crate::runtime::MutableStateFlow<Cache>,"));
    }

    #[test]
    fn test_inline_layout_keeps_module_paths_as_written() {
        let ir = build(&Declaration::from_derive(parse_quote! {
            struct Scene {
                origin: model::Point,
                error: fmt::Error,
                absolute: ::std::time::Duration,
            }
        }))
        .unwrap();

        let unit = emit(&ir, &EmitOptions::inline());
        assert!(unit.source.contains("FnOnce(model::Point) -> model::Point"));
        assert!(unit.source.contains("FnOnce(fmt::Error) -> fmt::Error"));
        assert!(unit.source.contains("FnOnce(::std::time::Duration) -> ::std::time::Duration"));
        assert!(!unit.source.contains("::model::"));
        assert!(!unit.source.contains("::fmt::"));
    }
}
