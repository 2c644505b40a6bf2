//! Game controller input using gilrs
//!
//! Enumerates controllers and runs the ingestion thread that feeds the
//! control state store.

mod axis;
mod buttons;
pub mod diagnostics;
mod provider;

pub use diagnostics::print_device_diagnostics;
pub use provider::{device_id, find_device, list_devices, spawn_ingestion, DEFAULT_SETTLE};
