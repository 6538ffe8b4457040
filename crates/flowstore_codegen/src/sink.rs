//! Unit Sinks
//!
//! Destinations for generated units. A sink lives for one batch and rejects a
//! second unit under an already-used `(namespace, name)` key.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::emitter::GeneratedUnit;
use crate::error::SinkError;
use crate::ir::{Namespace, Origin};

/// Identity of a generated unit within a batch
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitKey {
    pub namespace: Namespace,
    pub name: String,
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.namespace, self.name)
    }
}

/// Accepts generated units
pub trait UnitSink {
    fn write(&mut self, unit: &GeneratedUnit) -> Result<(), SinkError>;
}

/// Fails when `first` (the origin already stored under the unit's key) exists
fn check_unique(first: Option<&Origin>, unit: &GeneratedUnit) -> Result<(), SinkError> {
    match first {
        Some(first) => Err(SinkError::Duplicate {
            key: unit.key().to_string(),
            first_origin: first.to_string(),
        }),
        None => Ok(()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory Sink
// ─────────────────────────────────────────────────────────────────────────────

/// Keeps units in memory, keyed and ordered by [`UnitKey`]
#[derive(Debug, Default)]
pub struct MemorySink {
    units: BTreeMap<UnitKey, GeneratedUnit>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &UnitKey) -> Option<&GeneratedUnit> {
        self.units.get(key)
    }

    pub fn units(&self) -> impl Iterator<Item = &GeneratedUnit> {
        self.units.values()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl UnitSink for MemorySink {
    fn write(&mut self, unit: &GeneratedUnit) -> Result<(), SinkError> {
        check_unique(self.units.get(&unit.key()).map(|first| &first.origin), unit)?;
        self.units.insert(unit.key(), unit.clone());
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File Sink
// ─────────────────────────────────────────────────────────────────────────────

/// Writes each unit to `<root>/<namespace dirs>/<unit file>`
#[derive(Debug)]
pub struct FileSink {
    root: PathBuf,
    written: BTreeMap<UnitKey, Origin>,
    /// Relative path -> unit written there
    paths: BTreeMap<PathBuf, UnitKey>,
    /// Units whose file already held identical content
    unchanged: usize,
}

impl FileSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            written: BTreeMap::new(),
            paths: BTreeMap::new(),
            unchanged: 0,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a unit is (or would be) written to
    pub fn path_of(&self, unit: &GeneratedUnit) -> PathBuf {
        self.root.join(unit.relative_path())
    }

    /// Keys written in this batch, with the origin of each
    pub fn written(&self) -> &BTreeMap<UnitKey, Origin> {
        &self.written
    }

    pub fn unchanged(&self) -> usize {
        self.unchanged
    }
}

impl UnitSink for FileSink {
    fn write(&mut self, unit: &GeneratedUnit) -> Result<(), SinkError> {
        check_unique(self.written.get(&unit.key()), unit)?;

        // Distinct names can share a file name (`UIState`, `UiState`)
        let relative = unit.relative_path();
        if let Some(first) = self.paths.get(&relative) {
            return Err(SinkError::PathCollision {
                path: relative,
                key: unit.key().to_string(),
                first_key: first.to_string(),
            });
        }

        let path = self.root.join(&relative);
        if fs::read_to_string(&path).is_ok_and(|existing| existing == unit.source) {
            debug!("Unchanged: {}", path.display());
            self.unchanged += 1;
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, &unit.source)?;
            debug!("Wrote {}", path.display());
        }

        self.written.insert(unit.key(), unit.origin.clone());
        self.paths.insert(relative, unit.key());
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(namespace: &str, source: &str, origin: &str) -> GeneratedUnit {
        GeneratedUnit {
            namespace: Namespace::parse(namespace),
            name: "UiStateStore".to_string(),
            file_name: "ui_state_store.rs".to_string(),
            source: source.to_string(),
            origin: Origin::from_source(origin, source),
        }
    }

    #[test]
    fn test_memory_sink_rejects_duplicate_key() {
        let mut sink = MemorySink::new();
        sink.write(&unit("crate::ui", "a", "src/ui.rs")).unwrap();
        sink.write(&unit("crate::other", "b", "src/other.rs")).unwrap();

        let err = sink.write(&unit("crate::ui", "c", "src/ui/mod.rs")).unwrap_err();
        assert!(matches!(err, SinkError::Duplicate { .. }));
        assert!(err.to_string().contains("src/ui.rs"));
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_file_sink_writes_under_namespace_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::new(dir.path());

        let u = unit("crate::ui", "// generated\n", "src/ui.rs");
        sink.write(&u).unwrap();

        let path = dir.path().join("ui").join("ui_state_store.rs");
        assert_eq!(sink.path_of(&u), path);
        assert_eq!(fs::read_to_string(&path).unwrap(), "// generated\n");
        assert!(sink.written().contains_key(&u.key()));
    }

    #[test]
    fn test_file_sink_skips_identical_content() {
        let dir = tempfile::tempdir().unwrap();
        let u = unit("crate", "same\n", "src/lib.rs");

        FileSink::new(dir.path()).write(&u).unwrap();

        let mut second = FileSink::new(dir.path());
        second.write(&u).unwrap();
        assert_eq!(second.unchanged(), 1);

        let mut third = FileSink::new(dir.path());
        third.write(&unit("crate", "changed\n", "src/lib.rs")).unwrap();
        assert_eq!(third.unchanged(), 0);
        assert_eq!(
            fs::read_to_string(dir.path().join("ui_state_store.rs")).unwrap(),
            "changed\n"
        );
    }

    #[test]
    fn test_file_sink_rejects_duplicate_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::new(dir.path());
        sink.write(&unit("crate::ui", "first\n", "src/ui.rs")).unwrap();

        let err = sink.write(&unit("crate::ui", "second\n", "src/ui/mod.rs")).unwrap_err();
        assert!(matches!(err, SinkError::Duplicate { .. }));
        assert_eq!(
            fs::read_to_string(dir.path().join("ui/ui_state_store.rs")).unwrap(),
            "first\n"
        );
    }

    #[test]
    fn test_file_sink_rejects_names_sharing_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::new(dir.path());
        sink.write(&unit("crate::ui", "camel\n", "src/ui.rs")).unwrap();

        let upper = GeneratedUnit {
            name: "UIStateStore".to_string(),
            ..unit("crate::ui", "upper\n", "src/ui.rs")
        };
        let err = sink.write(&upper).unwrap_err();

        assert!(matches!(err, SinkError::PathCollision { .. }));
        assert!(err.to_string().contains("crate::ui::UiStateStore"));
        assert_eq!(
            fs::read_to_string(dir.path().join("ui/ui_state_store.rs")).unwrap(),
            "camel\n"
        );
        assert_eq!(sink.written().len(), 1);
    }
}
