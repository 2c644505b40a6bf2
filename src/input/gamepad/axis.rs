//! Axis naming and value scaling for gilrs controllers

use gilrs::Axis;

use crate::control::AXIS_LOGICAL_MAX;

/// Axes offered when enumerating a controller, in menu order
pub const STANDARD_AXES: &[Axis] = &[
    Axis::LeftStickX,
    Axis::LeftStickY,
    Axis::RightStickX,
    Axis::RightStickY,
    Axis::LeftZ,
    Axis::RightZ,
    Axis::DPadX,
    Axis::DPadY,
];

/// Display name of an axis
pub fn axis_name(axis: Axis) -> &'static str {
    match axis {
        Axis::LeftStickX => "Left X",
        Axis::LeftStickY => "Left Y",
        Axis::RightStickX => "Right X",
        Axis::RightStickY => "Right Y",
        Axis::LeftZ => "Left Z",
        Axis::RightZ => "Right Z",
        Axis::DPadX => "D-Pad X",
        Axis::DPadY => "D-Pad Y",
        _ => "Axis",
    }
}

/// Scale a gilrs position (-1.0..=1.0) to the integer logical range
pub fn scale_axis(value: f32) -> i32 {
    if value.is_nan() {
        return 0;
    }
    (value.clamp(-1.0, 1.0) * AXIS_LOGICAL_MAX as f32).round() as i32
}
