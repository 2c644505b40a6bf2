//! Outbound MIDI transport
//!
//! The dispatch loop only needs "send these bytes"; [`Transport`] is that
//! seam. [`MidiOutTransport`] implements it over a midir output port.

use midir::{MidiOutput, MidiOutputConnection, MidiOutputPort};
use thiserror::Error;
use tracing::{debug, info, trace};

use crate::midi::format_hex;

const CLIENT_NAME: &str = "HID-MIDI";

/// Transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to initialize MIDI output: {0}")]
    Init(#[from] midir::InitError),

    #[error("MIDI output port '{0}' not found")]
    PortNotFound(String),

    #[error("failed to connect to '{port}': {reason}")]
    Connect { port: String, reason: String },

    #[error("failed to send MIDI: {0}")]
    Send(#[from] midir::SendError),
}

/// Destination for encoded MIDI messages.
///
/// A single best-effort attempt per call; callers never retry.
pub trait Transport: Send {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
}

/// List available MIDI output ports
pub fn list_output_ports() -> Result<Vec<String>, TransportError> {
    let midi_out = MidiOutput::new(CLIENT_NAME)?;

    let mut port_names = Vec::new();
    for port in midi_out.ports() {
        if let Ok(name) = midi_out.port_name(&port) {
            port_names.push(name);
        }
    }

    Ok(port_names)
}

/// Pick the port called exactly `pattern`, else the first whose name
/// contains it case-insensitively
pub(crate) fn match_port<'a, I>(names: I, pattern: &str) -> Option<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    let names: Vec<&str> = names.into_iter().collect();
    if let Some(exact) = names.iter().position(|name| *name == pattern) {
        return Some(exact);
    }

    let needle = pattern.to_lowercase();
    names
        .iter()
        .position(|name| name.to_lowercase().contains(&needle))
}

fn find_output_port(midi_out: &MidiOutput, pattern: &str) -> Option<(MidiOutputPort, String)> {
    let named: Vec<(MidiOutputPort, String)> = midi_out
        .ports()
        .into_iter()
        .filter_map(|port| midi_out.port_name(&port).ok().map(|name| (port, name)))
        .collect();

    let index = match_port(named.iter().map(|(_, name)| name.as_str()), pattern)?;
    let found = named.into_iter().nth(index)?;
    debug!("Found port '{}' matching pattern '{}'", found.1, pattern);
    Some(found)
}

/// midir output connection
pub struct MidiOutTransport {
    connection: Option<MidiOutputConnection>,
    port_name: String,
}

impl MidiOutTransport {
    /// Open the output port named (or containing) `pattern`
    pub fn open(pattern: &str) -> Result<Self, TransportError> {
        let midi_out = MidiOutput::new(CLIENT_NAME)?;
        debug!("Found {} MIDI output ports", midi_out.port_count());

        let (port, port_name) = find_output_port(&midi_out, pattern)
            .ok_or_else(|| TransportError::PortNotFound(pattern.to_string()))?;

        let connection = midi_out
            .connect(&port, CLIENT_NAME)
            .map_err(|e| TransportError::Connect {
                port: port_name.clone(),
                reason: e.to_string(),
            })?;

        info!("Connected to MIDI output: {}", port_name);
        Ok(Self {
            connection: Some(connection),
            port_name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Close the port; later sends are dropped
    pub fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
            info!("Closed MIDI output: {}", self.port_name);
        }
    }
}

impl Transport for MidiOutTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        match self.connection.as_mut() {
            Some(connection) => {
                trace!("MIDI TX -> {}", format_hex(bytes));
                connection.send(bytes)?;
            }
            None => trace!("No MIDI output open, dropping {}", format_hex(bytes)),
        }
        Ok(())
    }
}

impl Drop for MidiOutTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_name_wins_over_substring() {
        let names = ["loopMIDI Port 2", "loopMIDI Port"];
        assert_eq!(match_port(names, "loopMIDI Port"), Some(1));
    }

    #[test]
    fn test_substring_match_ignores_case() {
        let names = ["Midi Through:0", "LoopBe Internal MIDI"];
        assert_eq!(match_port(names, "loopbe"), Some(1));
        assert_eq!(match_port(names, "nothing"), None);
    }

    #[test]
    fn test_closed_transport_drops_silently() {
        let mut transport = MidiOutTransport {
            connection: None,
            port_name: "Gone".to_string(),
        };
        assert!(transport.send(&[0x90, 60, 100]).is_ok());
        transport.close();
        assert!(transport.send(&[0x80, 60, 0]).is_ok());
    }
}
