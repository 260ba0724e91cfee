//! Message and event types shared across the engine.

use std::time::Duration;

use muses_harmony::PitchClass;

/// MIDI channel voice messages understood by the engine.
///
/// Channels are wire channels, 0–15.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn {
        channel: u8,
        pitch: u8,
        velocity: u8,
    },
    NoteOff {
        channel: u8,
        pitch: u8,
    },
    ControlChange {
        channel: u8,
        controller: u8,
        value: u8,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteKind {
    On,
    Off,
}

/// A note-on or note-off heard from the performer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    pub kind: NoteKind,
    pub pitch: u8,
    pub velocity: u8,
    pub channel: u8,
    /// Arrival time on the input port's clock.
    pub timestamp: Duration,
}

impl NoteEvent {
    pub fn on(pitch: u8, velocity: u8, timestamp: Duration) -> Self {
        Self {
            kind: NoteKind::On,
            pitch,
            velocity,
            channel: 0,
            timestamp,
        }
    }

    pub fn off(pitch: u8, timestamp: Duration) -> Self {
        Self {
            kind: NoteKind::Off,
            pitch,
            velocity: 0,
            channel: 0,
            timestamp,
        }
    }

    /// Note events from a MIDI message; anything other than a note is `None`.
    pub fn from_message(message: &MidiMessage, timestamp: Duration) -> Option<Self> {
        match *message {
            MidiMessage::NoteOn {
                channel,
                pitch,
                velocity,
            } if velocity > 0 => Some(Self {
                kind: NoteKind::On,
                pitch,
                velocity,
                channel,
                timestamp,
            }),
            MidiMessage::NoteOn { channel, pitch, .. } | MidiMessage::NoteOff { channel, pitch } => {
                Some(Self {
                    kind: NoteKind::Off,
                    pitch,
                    velocity: 0,
                    channel,
                    timestamp,
                })
            }
            _ => None,
        }
    }

    pub fn is_on(&self) -> bool {
        self.kind == NoteKind::On
    }

    pub fn pitch_class(&self) -> PitchClass {
        self.pitch % 12
    }
}

/// Events handed off together by the listener.
pub type NoteBatch = Vec<NoteEvent>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_on_with_zero_velocity_is_off() {
        let msg = MidiMessage::NoteOn {
            channel: 2,
            pitch: 64,
            velocity: 0,
        };
        let event = NoteEvent::from_message(&msg, Duration::ZERO).unwrap();
        assert_eq!(event.kind, NoteKind::Off);
        assert_eq!(event.channel, 2);
    }

    #[test]
    fn non_note_messages_are_ignored() {
        let msg = MidiMessage::ControlChange {
            channel: 0,
            controller: 64,
            value: 127,
        };
        assert!(NoteEvent::from_message(&msg, Duration::ZERO).is_none());
    }

    #[test]
    fn pitch_class_of_event() {
        let event = NoteEvent::on(62, 90, Duration::from_millis(5));
        assert!(event.is_on());
        assert_eq!(event.pitch_class(), 2);
    }
}
