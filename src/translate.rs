//! Value translation - raw control samples to MIDI messages
//!
//! Pure functions: given a mapping, the default channel, a raw sample and
//! the control's dispatch bookkeeping, decide which message (if any) to
//! emit. Buttons are edge triggered; axes are normalized against their
//! calibration range and deduplicated at 7-bit output resolution.

use crate::config::{MappingRule, MessageKind};
use crate::midi::{MidiMessage, DATA_MAX};
use crate::state::ControlTracking;

/// Result of translating one sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Translation {
    /// A message should be transmitted
    Send(MidiMessage),
    /// Nothing to send (no edge, or output value unchanged)
    Unchanged,
    /// Axis mapping has never been calibrated
    Uncalibrated,
    /// Calibration range is empty; axis output is disabled
    Degenerate,
}

/// Translate a sample for `rule`.
///
/// Updates `tracking.last_sent` when an axis message is produced. The
/// caller owns `tracking.previous` and must set it after every sample.
pub fn translate(
    rule: &MappingRule,
    default_channel: u8,
    value: i32,
    tracking: &mut ControlTracking,
) -> Translation {
    let channel = rule.effective_channel(default_channel);

    if rule.control.is_button {
        return match button_edge(value, tracking.previous) {
            Some(pressed) => Translation::Send(button_message(rule, channel, pressed)),
            None => Translation::Unchanged,
        };
    }

    if !rule.calibrated {
        return Translation::Uncalibrated;
    }

    let Some(out) = axis_output(value, rule.cal_min, rule.cal_max, rule.reverse) else {
        return Translation::Degenerate;
    };

    if tracking.last_sent == Some(out) {
        return Translation::Unchanged;
    }

    tracking.last_sent = Some(out);
    Translation::Send(MidiMessage::ControlChange {
        channel,
        cc: rule.number,
        value: out,
    })
}

/// `Some(pressed)` when the button state differs from the previous sample
pub fn button_edge(value: i32, previous: i32) -> Option<bool> {
    let pressed = value != 0;
    (pressed != (previous != 0)).then_some(pressed)
}

fn button_message(rule: &MappingRule, channel: u8, pressed: bool) -> MidiMessage {
    match rule.kind {
        MessageKind::NoteToggle if pressed => MidiMessage::NoteOn {
            channel,
            note: rule.number,
            velocity: rule.note_velocity,
        },
        MessageKind::NoteToggle => MidiMessage::NoteOff {
            channel,
            note: rule.number,
            velocity: 0,
        },
        MessageKind::ContinuousController => MidiMessage::ControlChange {
            channel,
            cc: rule.number,
            value: if pressed { rule.cc_on } else { rule.cc_off },
        },
    }
}

/// Position of `value` within `[min, max]` as 0.0..=1.0, clamped.
///
/// `None` when the range is empty or inverted.
pub fn normalize(value: i32, min: i32, max: i32) -> Option<f64> {
    let range = i64::from(max) - i64::from(min);
    if range <= 0 {
        return None;
    }
    let clamped = value.clamp(min, max);
    Some((i64::from(clamped) - i64::from(min)) as f64 / range as f64)
}

/// 7-bit output for an axis sample.
///
/// Rounds half away from zero (`+0.5` then truncate). A reversed axis is
/// the exact mirror of the forward output, `127 - forward`.
pub fn axis_output(value: i32, cal_min: i32, cal_max: i32, reverse: bool) -> Option<u8> {
    let norm = normalize(value, cal_min, cal_max)?;
    let forward = (norm * f64::from(DATA_MAX) + 0.5) as u8;
    let forward = forward.min(DATA_MAX);
    Some(if reverse { DATA_MAX - forward } else { forward })
}

/// Percentage shown by the live monitor (direction ignores `reverse`).
///
/// Uses the calibration range once calibrated, otherwise the control's
/// logical range. Never feeds back into dispatch state.
pub fn display_percent(rule: &MappingRule, value: i32) -> f64 {
    let (min, max) = if rule.calibrated {
        (rule.cal_min, rule.cal_max)
    } else {
        (rule.control.logical_min, rule.control.logical_max)
    };

    match normalize(value, min, max) {
        Some(norm) => norm * 100.0,
        None if value >= max => 100.0,
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{ControlAddress, ControlDescriptor};

    fn addr() -> ControlAddress {
        ControlAddress::Native { code: 1 }
    }

    fn axis(cal_min: i32, cal_max: i32, reverse: bool) -> MappingRule {
        let mut rule = MappingRule::new(ControlDescriptor::axis(addr(), "Throttle"));
        rule.number = 7;
        rule.cal_min = cal_min;
        rule.cal_max = cal_max;
        rule.calibrated = true;
        rule.reverse = reverse;
        rule
    }

    fn note_button() -> MappingRule {
        let mut rule = MappingRule::new(ControlDescriptor::button(addr(), "Trigger"));
        rule.kind = MessageKind::NoteToggle;
        rule.channel = Some(2);
        rule.number = 60;
        rule.note_velocity = 100;
        rule
    }

    #[test]
    fn test_axis_midpoint_rounds_up() {
        assert_eq!(axis_output(500, 0, 1000, false), Some(64));
        assert_eq!(axis_output(500, 0, 1000, true), Some(63));
    }

    #[test]
    fn test_axis_clamps_outside_calibration() {
        assert_eq!(axis_output(-50, 0, 1000, false), Some(0));
        assert_eq!(axis_output(5000, 0, 1000, false), Some(127));
        assert_eq!(axis_output(5000, 0, 1000, true), Some(0));
    }

    #[test]
    fn test_axis_handles_full_i32_span() {
        assert_eq!(axis_output(i32::MAX, i32::MIN, i32::MAX, false), Some(127));
        assert_eq!(axis_output(i32::MIN, i32::MIN, i32::MAX, false), Some(0));
    }

    #[test]
    fn test_degenerate_range_yields_nothing() {
        let rule = axis(400, 400, false);
        let mut tracking = ControlTracking::default();
        for value in [i32::MIN, 0, 399, 400, 401, i32::MAX] {
            assert_eq!(translate(&rule, 0, value, &mut tracking), Translation::Degenerate);
        }
        assert_eq!(tracking.last_sent, None);
    }

    #[test]
    fn test_uncalibrated_axis_never_sends() {
        let mut rule = axis(0, 1000, false);
        rule.calibrated = false;
        let mut tracking = ControlTracking::default();
        assert_eq!(translate(&rule, 0, 700, &mut tracking), Translation::Uncalibrated);
    }

    #[test]
    fn test_axis_dedup_at_output_resolution() {
        let rule = axis(0, 1000, false);
        let mut tracking = ControlTracking::default();

        let first = translate(&rule, 4, 500, &mut tracking);
        assert_eq!(
            first,
            Translation::Send(MidiMessage::ControlChange { channel: 4, cc: 7, value: 64 })
        );
        assert_eq!(tracking.last_sent, Some(64));

        // 501 still lands on step 64
        assert_eq!(translate(&rule, 4, 501, &mut tracking), Translation::Unchanged);
    }

    #[test]
    fn test_button_note_edges() {
        let rule = note_button();
        let mut tracking = ControlTracking::default();

        assert_eq!(
            translate(&rule, 0, 1, &mut tracking),
            Translation::Send(MidiMessage::NoteOn { channel: 2, note: 60, velocity: 100 })
        );

        tracking.previous = 1;
        assert_eq!(translate(&rule, 0, 1, &mut tracking), Translation::Unchanged);
        assert_eq!(
            translate(&rule, 0, 0, &mut tracking),
            Translation::Send(MidiMessage::NoteOff { channel: 2, note: 60, velocity: 0 })
        );
    }

    #[test]
    fn test_button_cc_uses_on_off_values() {
        let mut rule = note_button();
        rule.kind = MessageKind::ContinuousController;
        rule.channel = None;
        rule.cc_on = 90;
        rule.cc_off = 10;

        let mut tracking = ControlTracking::default();
        assert_eq!(
            translate(&rule, 5, 1, &mut tracking),
            Translation::Send(MidiMessage::ControlChange { channel: 5, cc: 60, value: 90 })
        );

        tracking.previous = 1;
        assert_eq!(
            translate(&rule, 5, 0, &mut tracking),
            Translation::Send(MidiMessage::ControlChange { channel: 5, cc: 60, value: 10 })
        );
    }

    #[test]
    fn test_any_nonzero_is_pressed() {
        assert_eq!(button_edge(-1, 0), Some(true));
        assert_eq!(button_edge(255, 1), None);
        assert_eq!(button_edge(0, 7), Some(false));
    }

    #[test]
    fn test_display_percent() {
        let rule = axis(0, 1000, true);
        assert_eq!(display_percent(&rule, 250), 25.0);

        let mut uncalibrated = axis(0, 0, false);
        uncalibrated.calibrated = false;
        assert_eq!(display_percent(&uncalibrated, 0), 50.0);

        let degenerate = axis(10, 10, false);
        assert_eq!(display_percent(&degenerate, 10), 100.0);
        assert_eq!(display_percent(&degenerate, 9), 0.0);
    }
}
