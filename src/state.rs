//! Control state module - latest value and dirty flag per mapped control
//!
//! This module provides the store shared between the device-reading thread
//! and the dispatch loop. Writers never block readers: every entry is a
//! pair of atomics padded to its own cache line.

mod store;
mod types;

pub use store::ControlStateStore;
pub use types::ControlTracking;
