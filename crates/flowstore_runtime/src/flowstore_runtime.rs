//! Flowstore Runtime - observable state container used by generated stores
//!
//! Every generated `<Root>Store` owns a [`MutableStateFlow`] holding the whole
//! root value and hands out [`StateFlow`] handles for read-only access.
//!
//! - A flow always holds exactly one current value.
//! - Publishing is serialized: subscribers see values in publish order.
//! - A new subscriber starts from the current value, never from history.

mod state_flow;

pub use state_flow::*;
