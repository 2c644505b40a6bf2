//! Physical control identity
//!
//! A control is addressed by a platform specific code. Two controls are the
//! same control exactly when their [`ControlAddress`] values are equal.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical minimum reported for axis controls
pub const AXIS_LOGICAL_MIN: i32 = -32767;
/// Logical maximum reported for axis controls
pub const AXIS_LOGICAL_MAX: i32 = 32767;

/// Platform specific address of one physical control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ControlAddress {
    /// Linux input subsystem event type/code pair
    #[serde(rename_all = "camelCase")]
    Evdev { event_type: u16, event_code: u16 },
    /// Opaque backend code on platforms without evdev
    Native { code: u32 },
}

impl ControlAddress {
    /// Build an address from the raw code the input backend reports.
    ///
    /// On Linux the backend packs the evdev type into the high half word and
    /// the event code into the low half word.
    pub fn from_native(code: u32) -> Self {
        if cfg!(target_os = "linux") {
            ControlAddress::Evdev {
                event_type: (code >> 16) as u16,
                event_code: (code & 0xFFFF) as u16,
            }
        } else {
            ControlAddress::Native { code }
        }
    }
}

impl fmt::Display for ControlAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ControlAddress::Evdev { event_type, event_code } => {
                write!(f, "evdev {}:{}", event_type, event_code)
            }
            ControlAddress::Native { code } => write!(f, "code 0x{:08X}", code),
        }
    }
}

/// One physical control discovered on a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlDescriptor {
    pub address: ControlAddress,
    pub name: String,
    pub is_button: bool,
    /// Native range, meaningless for buttons
    pub logical_min: i32,
    pub logical_max: i32,
}

impl ControlDescriptor {
    /// Descriptor for a two-state button
    pub fn button(address: ControlAddress, name: impl Into<String>) -> Self {
        Self {
            address,
            name: name.into(),
            is_button: true,
            logical_min: 0,
            logical_max: 1,
        }
    }

    /// Descriptor for an axis spanning the backend's full scaled range
    pub fn axis(address: ControlAddress, name: impl Into<String>) -> Self {
        Self {
            address,
            name: name.into(),
            is_button: false,
            logical_min: AXIS_LOGICAL_MIN,
            logical_max: AXIS_LOGICAL_MAX,
        }
    }

    /// Short label used in menus: `X Axis (Axis/Value: -32767-32767)`
    pub fn summary(&self) -> String {
        if self.is_button {
            format!("{} (Button)", self.name)
        } else {
            format!(
                "{} (Axis/Value: {}-{})",
                self.name, self.logical_min, self.logical_max
            )
        }
    }
}
