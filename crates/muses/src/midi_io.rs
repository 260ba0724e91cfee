//! MIDI I/O via ALSA (through midir)
//!
//! Ports are matched by substring, so `"IAC"` opens the first port whose
//! name contains it. Outputs are reached through the [`MidiSink`] trait so
//! players can be driven without hardware.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use midir::{MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use tracing::{debug, info};

use crate::primitives::MidiMessage;

/// Information about a MIDI port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiPortInfo {
    /// Port index (for midir connection)
    pub index: usize,
    /// Port name from ALSA
    pub name: String,
}

/// A timestamped MIDI message received from hardware
#[derive(Debug, Clone)]
pub struct TimestampedMidiMessage {
    /// Timestamp in microseconds (from midir, relative to some epoch)
    pub timestamp_us: u64,
    /// The parsed MIDI message
    pub message: MidiMessage,
}

impl TimestampedMidiMessage {
    pub fn timestamp(&self) -> Duration {
        Duration::from_micros(self.timestamp_us)
    }
}

/// Error type for MIDI operations
#[derive(Debug, thiserror::Error)]
pub enum MidiError {
    #[error("Failed to initialize MIDI: {0}")]
    InitFailed(String),

    #[error("Port not found: {0}")]
    PortNotFound(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),
}

/// Parse raw MIDI bytes into a MidiMessage
pub fn parse_midi_bytes(data: &[u8]) -> Option<MidiMessage> {
    let (&status, rest) = data.split_first()?;
    let channel = status & 0x0F;

    match (status & 0xF0, rest) {
        (0x90, &[pitch, 0, ..]) | (0x80, &[pitch, _, ..]) => {
            Some(MidiMessage::NoteOff { channel, pitch })
        }
        (0x90, &[pitch, velocity, ..]) => Some(MidiMessage::NoteOn {
            channel,
            pitch,
            velocity,
        }),
        (0xB0, &[controller, value, ..]) => Some(MidiMessage::ControlChange {
            channel,
            controller,
            value,
        }),
        _ => {
            debug!("Unhandled MIDI message type: {:02X}", status);
            None
        }
    }
}

/// Encode a MidiMessage to raw MIDI bytes
pub fn encode_midi_message(msg: &MidiMessage) -> Vec<u8> {
    match *msg {
        MidiMessage::NoteOn {
            channel,
            pitch,
            velocity,
        } => vec![0x90 | (channel & 0x0F), pitch & 0x7F, velocity & 0x7F],
        MidiMessage::NoteOff { channel, pitch } => vec![0x80 | (channel & 0x0F), pitch & 0x7F, 0],
        MidiMessage::ControlChange {
            channel,
            controller,
            value,
        } => vec![0xB0 | (channel & 0x0F), controller, value],
    }
}

/// List available MIDI input ports
pub fn list_input_ports() -> Result<Vec<MidiPortInfo>, MidiError> {
    let midi_in = MidiInput::new("muses-scan").map_err(|e| MidiError::InitFailed(e.to_string()))?;

    Ok(midi_in
        .ports()
        .iter()
        .enumerate()
        .filter_map(|(index, port)| {
            midi_in
                .port_name(port)
                .ok()
                .map(|name| MidiPortInfo { index, name })
        })
        .collect())
}

/// List available MIDI output ports
pub fn list_output_ports() -> Result<Vec<MidiPortInfo>, MidiError> {
    let midi_out =
        MidiOutput::new("muses-scan").map_err(|e| MidiError::InitFailed(e.to_string()))?;

    Ok(midi_out
        .ports()
        .iter()
        .enumerate()
        .filter_map(|(index, port)| {
            midi_out
                .port_name(port)
                .ok()
                .map(|name| MidiPortInfo { index, name })
        })
        .collect())
}

/// Callback type for receiving MIDI input; runs on midir's thread.
pub type MidiInputCallback = Box<dyn FnMut(TimestampedMidiMessage) + Send + 'static>;

/// Active MIDI input connection. Dropping it closes the port.
pub struct ActiveMidiInput {
    connection: Option<MidiInputConnection<()>>,
    pub port_name: String,
}

impl ActiveMidiInput {
    /// Open a MIDI input port by name pattern
    pub fn open(port_pattern: &str, mut callback: MidiInputCallback) -> Result<Self, MidiError> {
        let midi_in = MidiInput::new("muses-in").map_err(|e| MidiError::InitFailed(e.to_string()))?;

        let ports = midi_in.ports();
        let port = ports
            .iter()
            .find(|p| {
                midi_in
                    .port_name(p)
                    .map(|n| n.contains(port_pattern))
                    .unwrap_or(false)
            })
            .ok_or_else(|| MidiError::PortNotFound(port_pattern.to_string()))?;

        let port_name = midi_in
            .port_name(port)
            .map_err(|e| MidiError::ConnectionFailed(e.to_string()))?;

        let connection = midi_in
            .connect(
                port,
                "muses-input",
                move |timestamp_us, data, _| {
                    if let Some(message) = parse_midi_bytes(data) {
                        callback(TimestampedMidiMessage {
                            timestamp_us,
                            message,
                        });
                    }
                },
                (),
            )
            .map_err(|e| MidiError::ConnectionFailed(e.to_string()))?;

        info!("Opened MIDI input: {}", port_name);

        Ok(Self {
            connection: Some(connection),
            port_name,
        })
    }

    /// Close the connection
    pub fn close(&mut self) {
        if let Some(conn) = self.connection.take() {
            conn.close();
            info!("Closed MIDI input: {}", self.port_name);
        }
    }
}

impl Drop for ActiveMidiInput {
    fn drop(&mut self) {
        self.close();
    }
}

/// Destination for outgoing MIDI.
pub trait MidiSink: Send {
    fn name(&self) -> &str;

    fn send(&mut self, msg: &MidiMessage) -> Result<(), MidiError>;
}

/// Active MIDI output connection
pub struct ActiveMidiOutput {
    connection: Option<MidiOutputConnection>,
    pub port_name: String,
}

impl ActiveMidiOutput {
    /// Open a MIDI output port by name pattern
    pub fn open(port_pattern: &str) -> Result<Self, MidiError> {
        let midi_out =
            MidiOutput::new("muses-out").map_err(|e| MidiError::InitFailed(e.to_string()))?;

        let ports = midi_out.ports();
        let port = ports
            .iter()
            .find(|p| {
                midi_out
                    .port_name(p)
                    .map(|n| n.contains(port_pattern))
                    .unwrap_or(false)
            })
            .ok_or_else(|| MidiError::PortNotFound(port_pattern.to_string()))?;

        let port_name = midi_out
            .port_name(port)
            .map_err(|e| MidiError::ConnectionFailed(e.to_string()))?;

        let connection = midi_out
            .connect(port, "muses-output")
            .map_err(|e| MidiError::ConnectionFailed(e.to_string()))?;

        info!("Opened MIDI output: {}", port_name);

        Ok(Self {
            connection: Some(connection),
            port_name,
        })
    }

    /// Send raw MIDI bytes
    pub fn send_raw(&mut self, data: &[u8]) -> Result<(), MidiError> {
        let conn = self
            .connection
            .as_mut()
            .ok_or_else(|| MidiError::SendFailed("Connection closed".to_string()))?;
        conn.send(data)
            .map_err(|e| MidiError::SendFailed(e.to_string()))
    }

    /// Close the connection
    pub fn close(&mut self) {
        if let Some(conn) = self.connection.take() {
            conn.close();
            info!("Closed MIDI output: {}", self.port_name);
        }
    }
}

impl MidiSink for ActiveMidiOutput {
    fn name(&self) -> &str {
        &self.port_name
    }

    fn send(&mut self, msg: &MidiMessage) -> Result<(), MidiError> {
        self.send_raw(&encode_midi_message(msg))
    }
}

impl Drop for ActiveMidiOutput {
    fn drop(&mut self) {
        self.close();
    }
}

/// A message captured by a [`MemorySink`], stamped on arrival.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub at: Instant,
    pub message: MidiMessage,
}

/// Sink that keeps every message in memory instead of sending it.
///
/// Clones share the same log, so one handle can be given to a player and
/// another kept for inspection.
#[derive(Debug, Clone)]
pub struct MemorySink {
    name: String,
    log: Arc<Mutex<Vec<SentMessage>>>,
}

impl MemorySink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Snapshot of everything sent so far.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    pub fn messages(&self) -> Vec<MidiMessage> {
        self.sent().into_iter().map(|s| s.message).collect()
    }

    pub fn note_ons(&self) -> Vec<MidiMessage> {
        self.messages()
            .into_iter()
            .filter(|m| matches!(m, MidiMessage::NoteOn { .. }))
            .collect()
    }
}

impl MidiSink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&mut self, msg: &MidiMessage) -> Result<(), MidiError> {
        let mut log = self
            .log
            .lock()
            .map_err(|_| MidiError::SendFailed(format!("{}: log poisoned", self.name)))?;
        log.push(SentMessage {
            at: Instant::now(),
            message: msg.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_note_on() {
        let data = [0x90, 60, 100]; // Note On, channel 0, middle C, velocity 100
        assert_eq!(
            parse_midi_bytes(&data),
            Some(MidiMessage::NoteOn {
                channel: 0,
                pitch: 60,
                velocity: 100
            })
        );
    }

    #[test]
    fn test_parse_note_on_velocity_zero_is_note_off() {
        let data = [0x93, 60, 0];
        assert_eq!(
            parse_midi_bytes(&data),
            Some(MidiMessage::NoteOff {
                channel: 3,
                pitch: 60
            })
        );
    }

    #[test]
    fn test_parse_note_off_ignores_release_velocity() {
        let data = [0x80, 64, 40];
        assert_eq!(
            parse_midi_bytes(&data),
            Some(MidiMessage::NoteOff {
                channel: 0,
                pitch: 64
            })
        );
    }

    #[test]
    fn test_parse_control_change() {
        let data = [0xB0, 1, 64]; // CC1 (mod wheel), value 64
        assert_eq!(
            parse_midi_bytes(&data),
            Some(MidiMessage::ControlChange {
                channel: 0,
                controller: 1,
                value: 64
            })
        );
    }

    #[test]
    fn test_parse_truncated_and_system_messages() {
        assert_eq!(parse_midi_bytes(&[]), None);
        assert_eq!(parse_midi_bytes(&[0x90, 60]), None);
        assert_eq!(parse_midi_bytes(&[0xF8]), None);
    }

    #[test]
    fn test_encode_note_on() {
        let msg = MidiMessage::NoteOn {
            channel: 0,
            pitch: 60,
            velocity: 100,
        };
        assert_eq!(encode_midi_message(&msg), vec![0x90, 60, 100]);
    }

    #[test]
    fn test_encode_note_off_on_channel() {
        let msg = MidiMessage::NoteOff {
            channel: 6,
            pitch: 48,
        };
        assert_eq!(encode_midi_message(&msg), vec![0x86, 48, 0]);
    }

    #[test]
    fn test_control_change_wire_bytes() {
        let msg = MidiMessage::ControlChange {
            channel: 2,
            controller: 64,
            value: 127,
        };
        assert_eq!(encode_midi_message(&msg), vec![0xB2, 64, 127]);
    }

    #[test]
    fn test_unhandled_channel_messages_are_dropped() {
        assert_eq!(parse_midi_bytes(&[0xC0, 5]), None);
        assert_eq!(parse_midi_bytes(&[0xE1, 0x00, 0x40]), None);
    }

    #[test]
    fn test_memory_sink_shares_log_between_clones() {
        let sink = MemorySink::new("melody");
        let mut handle = sink.clone();
        handle
            .send(&MidiMessage::NoteOn {
                channel: 0,
                pitch: 72,
                velocity: 90,
            })
            .unwrap();
        handle
            .send(&MidiMessage::NoteOff {
                channel: 0,
                pitch: 72,
            })
            .unwrap();
        assert_eq!(sink.messages().len(), 2);
        assert_eq!(sink.note_ons().len(), 1);
        assert_eq!(handle.name(), "melody");
    }
}
