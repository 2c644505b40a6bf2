//! MIDI utilities and message types
//!
//! Only the channel voice messages the mapper can emit are modelled. Every
//! message encodes to exactly three bytes: `status|channel, data1, data2`.

use std::fmt;

/// Note Off status nibble
pub const NOTE_OFF: u8 = 0x80;
/// Note On status nibble
pub const NOTE_ON: u8 = 0x90;
/// Control Change status nibble
pub const CONTROL_CHANGE: u8 = 0xB0;

/// Highest 7-bit data value
pub const DATA_MAX: u8 = 0x7F;

/// Number of MIDI channels (0-based channels 0..=15)
pub const CHANNEL_COUNT: u8 = 16;

/// Outbound MIDI message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note Off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff { channel: u8, note: u8, velocity: u8 },

    /// Note On: channel (0-15), note (0-127), velocity (0-127)
    NoteOn { channel: u8, note: u8, velocity: u8 },

    /// Control Change: channel (0-15), cc (0-127), value (0-127)
    ControlChange { channel: u8, cc: u8, value: u8 },
}

impl MidiMessage {
    /// Encode the message to its wire bytes
    pub fn encode(&self) -> [u8; 3] {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                [NOTE_OFF | (channel & 0x0F), note & DATA_MAX, velocity & DATA_MAX]
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                [NOTE_ON | (channel & 0x0F), note & DATA_MAX, velocity & DATA_MAX]
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                [CONTROL_CHANGE | (channel & 0x0F), cc & DATA_MAX, value & DATA_MAX]
            }
        }
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                write!(f, "NoteOff ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                write!(f, "NoteOn ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                write!(f, "CC ch:{} cc:{} v:{}", channel + 1, cc, value)
            }
        }
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_note_on() {
        let msg = MidiMessage::NoteOn {
            channel: 2,
            note: 60,
            velocity: 100,
        };

        assert_eq!(msg.encode(), [0x92, 60, 100]);
    }

    #[test]
    fn test_encode_note_off_keeps_status() {
        let msg = MidiMessage::NoteOff {
            channel: 2,
            note: 60,
            velocity: 0,
        };

        assert_eq!(msg.encode(), [0x82, 60, 0]);
    }

    #[test]
    fn test_encode_control_change() {
        let msg = MidiMessage::ControlChange {
            channel: 2,
            cc: 7,
            value: 100,
        };

        assert_eq!(msg.encode(), [0xB2, 7, 100]);
    }

    #[test]
    fn test_encode_masks_data_bytes() {
        let msg = MidiMessage::NoteOn {
            channel: 0x12,
            note: 0xBC,
            velocity: 0xFF,
        };

        assert_eq!(msg.encode(), [0x92, 0x3C, 0x7F]);
    }

    #[test]
    fn test_display_is_one_based() {
        let msg = MidiMessage::ControlChange { channel: 0, cc: 1, value: 64 };
        assert_eq!(msg.to_string(), "CC ch:1 cc:1 v:64");
        assert_eq!(format_hex(&msg.encode()), "B0 01 40");
    }
}
