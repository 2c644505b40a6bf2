//! HID-MIDI - map joystick and gamepad controls to MIDI
//!
//! Pipeline: the [`input`] thread writes raw samples into the per-control
//! [`state`] store, the [`dispatch`] loop drains it through [`translate`]
//! and hands messages to a [`transport`]. [`calibration`] learns axis
//! ranges from the same store. A [`session::Session`] ties them together.

pub mod calibration;
pub mod cli;
pub mod config;
pub mod control;
pub mod dispatch;
pub mod input;
pub mod midi;
pub mod monitor;
pub mod paths;
pub mod session;
pub mod state;
pub mod translate;
pub mod transport;
