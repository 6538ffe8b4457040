//! Flowstore - observable stores for plain data structs
//!
//! This crate bundles:
//! - The runtime state flow used by generated stores (`flowstore_runtime`)
//! - The `#[derive(FlowStore)]` and `#[flow_store]` markers (`flowstore_macros`)
//! - The offline generator, for build scripts and the CLI (`codegen`)
//! - Generator configuration and a source watcher for the `flowstore` binary

// Re-export core crates
pub use flowstore_codegen as codegen;
pub use flowstore_macros::{FlowStore, flow_store};
pub use flowstore_runtime::{MutableStateFlow, StateFlow, Subscription};

// flowstore.toml
pub mod config;

// Regenerate on source changes
pub mod watcher;

/// Mount a store generated by `flowstore_codegen::Builder` in a build script.
///
/// Place it in the module declaring the root; the path is the unit's location
/// below `$OUT_DIR/flowstore/`.
///
/// ```ignore
/// // src/ui/mod.rs
/// #[flowstore::flow_store]
/// #[derive(Clone)]
/// pub struct UiState { text: String }
///
/// flowstore::include_store!(ui_state_store, "ui/ui_state_store.rs");
/// pub use ui_state_store::UiStateStore;
/// ```
#[macro_export]
macro_rules! include_store {
    ($module:ident, $path:literal) => {
        mod $module {
            include!(concat!(env!("OUT_DIR"), "/flowstore/", $path));
        }
    };
}
