//! Flowstore Codegen - store wrapper generator
//!
//! Turns a struct carrying the store-root marker into a `<Root>Store` wrapper
//! with one async mutation method per field.
//!
//! The pipeline has two pure stages and one side effect:
//!
//! 1. [`build`] reads a [`Declaration`] into a [`StoreIr`]
//! 2. [`emit`] renders the IR into a [`GeneratedUnit`]
//! 3. a [`UnitSink`] stores the unit (memory, or files under an output dir)
//!
//! [`Generator`] runs the pipeline over a batch, and [`Builder`] wires it into
//! a Cargo build script.

mod builder;
mod emitter;
mod error;
mod generator;
mod ir;
mod scope;
mod sink;
mod source;

pub use builder::*;
pub use emitter::*;
pub use error::*;
pub use generator::*;
pub use ir::*;
pub use scope::*;
pub use sink::*;
pub use source::*;
