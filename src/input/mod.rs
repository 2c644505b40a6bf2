//! Device input - the ingestion side of the pipeline

pub mod gamepad;

use thiserror::Error;

use crate::control::ControlDescriptor;

pub use gamepad::{
    find_device, list_devices, print_device_diagnostics, spawn_ingestion, DEFAULT_SETTLE,
};

/// Device backend errors
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to initialize input backend: {0}")]
    Init(String),

    #[error("controller {0} not found")]
    NotFound(String),
}

/// A connected controller and the controls it exposes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Stable id (controller UUID in hex)
    pub id: String,
    pub name: String,
    pub controls: Vec<ControlDescriptor>,
}
