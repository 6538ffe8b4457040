//! Generator
//!
//! Runs build -> emit -> write over a batch of declarations. Every failure is
//! scoped to its declaration (or source file) and recorded; the batch always
//! runs to the end.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::builder::{Declaration, build};
use crate::emitter::{DEFAULT_RUNTIME_PATH, EmitOptions, GeneratedUnit, emit};
use crate::error::{BuildError, GenerateError, SourceError};
use crate::sink::{FileSink, UnitKey, UnitSink};
use crate::source::{DEFAULT_MARKER, SourceTree};

// ─────────────────────────────────────────────────────────────────────────────
// Batch Report
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of one batch
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Units written, in processing order
    pub generated: Vec<UnitKey>,
    /// Declarations that failed
    pub failures: Vec<GenerateError>,
    /// Files or directories that could not be read or parsed
    pub source_errors: Vec<SourceError>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.source_errors.is_empty()
    }

    /// One human-readable line per problem
    pub fn diagnostics(&self) -> Vec<String> {
        self.source_errors
            .iter()
            .map(ToString::to_string)
            .chain(self.failures.iter().map(ToString::to_string))
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Generator
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Generator {
    options: EmitOptions,
}

impl Generator {
    pub fn new(options: EmitOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EmitOptions {
        &self.options
    }

    /// Generate and write the store for one declaration
    pub fn generate(
        &self,
        declaration: &Declaration,
        sink: &mut dyn UnitSink,
    ) -> Result<GeneratedUnit, GenerateError> {
        let ir = build(declaration)?;
        let unit = emit(&ir, &self.options);

        sink.write(&unit)
            .map_err(|source| GenerateError::OutputWrite {
                namespace: ir.namespace.clone(),
                declaration: ir.root_type_name.clone(),
                unit: unit.name.clone(),
                source,
            })?;

        info!("Generated {} from {}", unit.key(), unit.origin);
        Ok(unit)
    }

    /// Process every declaration, in order
    pub fn run<I>(&self, declarations: I, sink: &mut dyn UnitSink) -> BatchReport
    where
        I: IntoIterator<Item = Declaration>,
    {
        let mut report = BatchReport::default();
        self.run_into(declarations, sink, &mut report);
        report
    }

    fn run_into<I>(&self, declarations: I, sink: &mut dyn UnitSink, report: &mut BatchReport)
    where
        I: IntoIterator<Item = Declaration>,
    {
        for declaration in declarations {
            match self.generate(&declaration, sink) {
                Ok(unit) => report.generated.push(unit.key()),
                Err(e) => {
                    warn!("Skipping {}: {}", declaration.name(), e);
                    report.failures.push(e);
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Offline generation over source directories, for build scripts and the CLI.
///
/// ```ignore
/// // build.rs
/// fn main() {
///     flowstore_codegen::Builder::new().source_dir("src").compile().unwrap();
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Builder {
    source_dirs: Vec<PathBuf>,
    out_dir: Option<PathBuf>,
    runtime_path: String,
    marker: String,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    pub fn new() -> Self {
        Self {
            source_dirs: Vec::new(),
            out_dir: None,
            runtime_path: DEFAULT_RUNTIME_PATH.to_string(),
            marker: DEFAULT_MARKER.to_string(),
        }
    }

    /// Add a crate source directory. Defaults to `src` when none is added.
    pub fn source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source_dirs.push(dir.into());
        self
    }

    /// Output root. Defaults to `$OUT_DIR/flowstore`.
    pub fn out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.out_dir = Some(dir.into());
        self
    }

    pub fn runtime_path(mut self, path: impl Into<String>) -> Self {
        self.runtime_path = path.into();
        self
    }

    pub fn marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    pub fn source_dirs(&self) -> Vec<PathBuf> {
        if self.source_dirs.is_empty() {
            vec![PathBuf::from("src")]
        } else {
            self.source_dirs.clone()
        }
    }

    pub fn resolved_out_dir(&self) -> Result<PathBuf, BuildError> {
        match &self.out_dir {
            Some(dir) => Ok(dir.clone()),
            None => std::env::var_os("OUT_DIR")
                .map(|dir| PathBuf::from(dir).join("flowstore"))
                .ok_or(BuildError::MissingOutDir),
        }
    }

    /// Run one batch over every source directory
    pub fn generate(&self) -> Result<BatchReport, BuildError> {
        let out_dir = self.resolved_out_dir()?;
        let generator = Generator::new(
            EmitOptions::module().with_runtime_path(self.runtime_path.clone()),
        );
        let mut sink = FileSink::new(&out_dir);
        let mut report = BatchReport::default();

        for dir in self.source_dirs() {
            let tree = SourceTree::new(&dir);
            let paths = match tree.paths() {
                Ok(paths) => paths,
                Err(e) => {
                    warn!("{}", e);
                    report.source_errors.push(e);
                    continue;
                }
            };

            for path in paths {
                let declarations = tree
                    .read(&path)
                    .and_then(|file| file.declarations(&self.marker));
                match declarations {
                    Ok(declarations) => generator.run_into(declarations, &mut sink, &mut report),
                    Err(e) => {
                        warn!("{}", e);
                        report.source_errors.push(e);
                    }
                }
            }
        }

        info!(
            generated = report.generated.len(),
            unchanged = sink.unchanged(),
            failed = report.failures.len() + report.source_errors.len(),
            "Store generation finished in {}",
            out_dir.display()
        );
        Ok(report)
    }

    /// Build-script entry point: registers the source directories with Cargo
    /// and fails with every diagnostic when anything failed
    pub fn compile(&self) -> Result<BatchReport, BuildError> {
        for dir in self.source_dirs() {
            println!("cargo:rerun-if-changed={}", dir.display());
        }

        let report = self.generate()?;
        if report.is_success() {
            Ok(report)
        } else {
            Err(BuildError::Failed(report.diagnostics()))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::ir::{Namespace, Origin};
    use crate::scope::TypeScope;
    use crate::sink::MemorySink;
    use std::fs;
    use syn::parse_quote;

    fn declaration(input: syn::DeriveInput, origin: &str) -> Declaration {
        Declaration::new(
            input,
            TypeScope::strict(Namespace::parse("crate::ui")),
            Origin::from_source(origin, ""),
        )
    }

    #[test]
    fn test_name_collision_keeps_first_unit() {
        let mut sink = MemorySink::new();
        let report = Generator::default().run(
            [
                declaration(parse_quote! { struct UiState { count: i32 } }, "src/ui.rs"),
                declaration(parse_quote! { struct UiState { text: String } }, "src/ui/mod.rs"),
            ],
            &mut sink,
        );

        assert_eq!(report.generated.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0], GenerateError::OutputWrite { .. }));
        assert_eq!(report.failures[0].namespace(), &Namespace::parse("crate::ui"));

        let unit = sink.get(&report.generated[0]).unwrap();
        assert!(unit.source.contains("pub async fn count("));
        assert!(!unit.source.contains("pub async fn text("));
    }

    #[test]
    fn test_failure_does_not_stop_batch() {
        let mut sink = MemorySink::new();
        let report = Generator::default().run(
            [
                declaration(parse_quote! { struct A { x: u8 } }, "src/a.rs"),
                declaration(parse_quote! { struct B { y: Missing } }, "src/b.rs"),
                declaration(parse_quote! { struct C(u8); }, "src/c.rs"),
                declaration(parse_quote! { struct D { z: bool } }, "src/d.rs"),
            ],
            &mut sink,
        );

        let names: Vec<&str> = report.generated.iter().map(|k| k.name.as_str()).collect();
        assert_eq!(names, vec!["AStore", "DStore"]);
        assert_eq!(report.failures.len(), 2);
        assert!(matches!(report.failures[0], GenerateError::UnresolvedType { .. }));
        assert!(matches!(report.failures[1], GenerateError::MissingConstructor { .. }));
        assert!(!report.is_success());
        assert_eq!(report.diagnostics().len(), 2);
    }

    #[test]
    fn test_builder_generates_files() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let out = dir.path().join("out");
        fs::create_dir_all(src.join("ui")).unwrap();
        fs::write(src.join("lib.rs"), "pub mod ui;").unwrap();
        fs::write(
            src.join("ui/mod.rs"),
            "#[flow_store]\n#[derive(Clone)]\npub struct UiState { pub text: String, pub count: i32 }\n",
        )
        .unwrap();
        fs::write(src.join("broken.rs"), "struct {").unwrap();

        let report = Builder::new()
            .source_dir(&src)
            .out_dir(&out)
            .runtime_path("crate::flow")
            .generate()
            .unwrap();

        assert_eq!(report.generated.len(), 1);
        assert_eq!(report.source_errors.len(), 1);

        let text = fs::read_to_string(out.join("ui/ui_state_store.rs")).unwrap();
        assert!(text.starts_with("// @generated by flowstore from `crate::ui::UiState`."));
        assert!(text.contains("use crate::ui::UiState;"));
        assert!(text.contains("flow: crate::flow::MutableStateFlow<UiState>,"));
        assert!(text.contains("pub struct UiStateStore {"));
    }

    #[test]
    fn test_builder_reports_roots_sharing_a_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let out = dir.path().join("out");
        fs::create_dir_all(&src).unwrap();
        fs::write(
            src.join("lib.rs"),
            "#[flow_store]\n#[derive(Clone)]\npub struct UiState { pub count: i32 }\n\
             #[flow_store]\n#[derive(Clone)]\npub struct UIState { pub text: String }\n",
        )
        .unwrap();

        let report = Builder::new().source_dir(&src).out_dir(&out).generate().unwrap();

        assert_eq!(report.generated.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            &report.failures[0],
            GenerateError::OutputWrite { declaration, source: SinkError::PathCollision { .. }, .. }
                if declaration == "UIState"
        ));
        let text = fs::read_to_string(out.join("ui_state_store.rs")).unwrap();
        assert!(text.contains("pub struct UiStateStore {"));
    }

    #[test]
    fn test_builder_requires_out_dir_outside_build_scripts() {
        if std::env::var_os("OUT_DIR").is_none() {
            let err = Builder::new().generate().unwrap_err();
            assert!(matches!(err, BuildError::MissingOutDir));
        }
    }
}
