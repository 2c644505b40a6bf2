//! Button naming for gilrs controllers
//!
//! gilrs reports face buttons by physical position (South, East, North,
//! West). Names are shown by position so they read the same on every
//! layout:
//!
//! ```text
//!       [North]
//!   [West]   [East]
//!       [South]
//! ```

use gilrs::Button;

/// Buttons offered when enumerating a controller, in menu order
pub const STANDARD_BUTTONS: &[Button] = &[
    Button::South,
    Button::East,
    Button::North,
    Button::West,
    Button::C,
    Button::Z,
    Button::LeftTrigger,
    Button::RightTrigger,
    Button::LeftTrigger2,
    Button::RightTrigger2,
    Button::Select,
    Button::Start,
    Button::Mode,
    Button::LeftThumb,
    Button::RightThumb,
    Button::DPadUp,
    Button::DPadDown,
    Button::DPadLeft,
    Button::DPadRight,
];

/// Display name of a button
pub fn button_name(button: Button) -> &'static str {
    match button {
        // Face buttons
        Button::South => "South",
        Button::East => "East",
        Button::North => "North",
        Button::West => "West",
        Button::C => "C",
        Button::Z => "Z",

        // Shoulder buttons
        Button::LeftTrigger => "L1",
        Button::RightTrigger => "R1",
        Button::LeftTrigger2 => "L2",
        Button::RightTrigger2 => "R2",

        // Menu buttons
        Button::Select => "Select",
        Button::Start => "Start",
        Button::Mode => "Mode",

        // Stick clicks
        Button::LeftThumb => "L3",
        Button::RightThumb => "R3",

        Button::DPadUp => "D-Pad Up",
        Button::DPadDown => "D-Pad Down",
        Button::DPadLeft => "D-Pad Left",
        Button::DPadRight => "D-Pad Right",

        _ => "Button",
    }
}
