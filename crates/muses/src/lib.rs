//! muses - a live MIDI companion
//!
//! Listens to a performer on one MIDI input, infers the mode they play in,
//! samples a chord progression for each phrase, learns their melody and
//! rhythm with Markov chains, and answers on three outputs: melody, chord
//! and a click.
//!
//! # Threads
//!
//! ```text
//!  MIDI in ──► listener ──note buffer──► analyzer ──frame──┐
//!                  │                        ▲              ▼
//!                  └────────batches────────────────────► generator ──packet──► melody
//!                                           │              ▲                   chord
//!  clock ───scale change────────────────────┘              │                   rhythm
//!        ───measure elapsed────────────────────────────────┘
//! ```

pub mod analyzer;
pub mod clock;
pub mod engine;
pub mod generator;
pub mod listener;
pub mod mailbox;
pub mod markov;
pub mod midi_io;
pub mod notation;
pub mod primitives;
pub mod sequencer;

pub use analyzer::{HarmonicAnalyzer, HarmonicFrame};
pub use clock::{ClockTick, MeasureClock, RealTimer, RecordingTimer, ScaleChangeRequest, Tempo, Timer};
pub use engine::{open_ports, Engine, EngineError, EngineHandle};
pub use generator::{GeneratorSettings, MelodyStep, PlaybackPacket, SequenceGenerator};
pub use listener::{run_listener, Batcher};
pub use mailbox::{FrameCell, Mailbox, NoteBuffer};
pub use markov::MarkovChain;
pub use midi_io::{
    ActiveMidiInput, ActiveMidiOutput, MemorySink, MidiError, MidiPortInfo, MidiSink,
    TimestampedMidiMessage,
};
pub use notation::{NoteValue, RhythmSymbol};
pub use primitives::{MidiMessage, NoteBatch, NoteEvent, NoteKind};
pub use sequencer::{OutputSinks, Part, Player, Sequencer};
