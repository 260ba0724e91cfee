//! End-to-end: notes in on a channel, music out on three memory sinks.

use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::{Duration, Instant};

use muses::{
    Engine, MemorySink, MidiMessage, OutputSinks, TimestampedMidiMessage,
};
use musesconf::{MusesConfig, RhythmSource};

/// 2400 bpm: 25ms beats, 100ms measures.
fn fast_config(source: RhythmSource) -> MusesConfig {
    let mut config = MusesConfig::default();
    config.tempo.bpm = 2400.0;
    config.generator.batch_size = 4;
    config.generator.seed = Some(17);
    config.generator.rhythm_source = source;
    config
}

struct Outputs {
    melody: MemorySink,
    chord: MemorySink,
    rhythm: MemorySink,
}

impl Outputs {
    fn new() -> (Self, OutputSinks) {
        let outputs = Self {
            melody: MemorySink::new("melody"),
            chord: MemorySink::new("chord"),
            rhythm: MemorySink::new("rhythm"),
        };
        let sinks = OutputSinks {
            melody: Box::new(outputs.melody.clone()),
            chord: Box::new(outputs.chord.clone()),
            rhythm: Box::new(outputs.rhythm.clone()),
        };
        (outputs, sinks)
    }

    fn all_playing(&self) -> bool {
        !self.melody.note_ons().is_empty()
            && !self.chord.note_ons().is_empty()
            && !self.rhythm.note_ons().is_empty()
    }
}

/// A C major run, one note per beat, each held for 20ms.
fn perform(tx: &Sender<TimestampedMidiMessage>, notes: usize) {
    let scale = [60, 62, 64, 65, 67, 69, 71, 72];
    for i in 0..notes {
        let pitch = scale[i % scale.len()];
        let at = i as u64 * 25_000;
        tx.send(TimestampedMidiMessage {
            timestamp_us: at,
            message: MidiMessage::NoteOn {
                channel: 0,
                pitch,
                velocity: 96,
            },
        })
        .unwrap();
        tx.send(TimestampedMidiMessage {
            timestamp_us: at + 20_000,
            message: MidiMessage::NoteOff { channel: 0, pitch },
        })
        .unwrap();
    }
}

fn wait_for(outputs: &Outputs, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if outputs.all_playing() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    outputs.all_playing()
}

fn channel_of(message: &MidiMessage) -> Option<u8> {
    match message {
        MidiMessage::NoteOn { channel, .. } | MidiMessage::NoteOff { channel, .. } => Some(*channel),
        _ => None,
    }
}

#[test]
fn performer_input_reaches_all_three_outputs() {
    let engine = Engine::new(fast_config(RhythmSource::Echo)).unwrap();
    let (outputs, sinks) = Outputs::new();
    let (tx, rx) = mpsc::channel();
    let _handle = engine.start(rx, sinks).unwrap();

    perform(&tx, 24);
    assert!(wait_for(&outputs, Duration::from_secs(2)), "no output within 2s");

    let channels: Vec<u8> = outputs
        .melody
        .messages()
        .iter()
        .chain(outputs.chord.messages().iter())
        .chain(outputs.rhythm.messages().iter())
        .filter_map(channel_of)
        .collect();
    assert!(channels.iter().all(|&c| c < 7), "{channels:?}");

    for message in outputs.rhythm.note_ons() {
        assert!(matches!(message, MidiMessage::NoteOn { pitch: 75, .. }));
    }
    drop(tx);
}

#[test]
fn markov_rhythm_keeps_playing_after_the_performer_stops() {
    let engine = Engine::new(fast_config(RhythmSource::Markov)).unwrap();
    let (outputs, sinks) = Outputs::new();
    let (tx, rx) = mpsc::channel();
    let _handle = engine.start(rx, sinks).unwrap();

    perform(&tx, 16);
    assert!(wait_for(&outputs, Duration::from_secs(2)), "no output within 2s");

    // one chord per measure; several measures pass with no new input
    let deadline = Instant::now() + Duration::from_secs(2);
    let chords = || {
        outputs
            .chord
            .messages()
            .iter()
            .filter(|m| matches!(m, MidiMessage::NoteOff { .. }))
            .count()
    };
    let first = chords();
    while chords() <= first && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert!(chords() > first, "chord stopped after the first packet");
    drop(tx);
}
