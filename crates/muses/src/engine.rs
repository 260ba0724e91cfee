//! Engine wiring: builds every role from a [`MusesConfig`] and starts the
//! seven threads.

use std::io;
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use musesconf::{ConfigError, MusesConfig, PortsConfig};
use muses_harmony::{ChordModel, HarmonyError, MarkovChordModel, ModeTable};
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::info;

use crate::analyzer::{HarmonicAnalyzer, HarmonicFrame};
use crate::clock::{ClockTick, MeasureClock, RealTimer, ScaleChangeRequest, Tempo, Timer};
use crate::generator::{GeneratorSettings, SequenceGenerator};
use crate::listener::run_listener;
use crate::mailbox::{FrameCell, Mailbox, NoteBuffer};
use crate::midi_io::{ActiveMidiInput, ActiveMidiOutput, MidiError, TimestampedMidiMessage};
use crate::sequencer::{OutputSinks, Sequencer};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Harmony(#[from] HarmonyError),

    #[error(transparent)]
    Midi(#[from] MidiError),

    #[error("Failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("No MIDI port configured for: {0}")]
    MissingPorts(String),
}

/// Offsets the configured seed so each seeded role gets its own stream.
const ANALYZER_STREAM: u64 = 0;
const GENERATOR_STREAM: u64 = 1;

pub struct Engine {
    config: MusesConfig,
    table: ModeTable,
    chord_model: Arc<dyn ChordModel>,
    timer: Arc<dyn Timer>,
}

impl Engine {
    /// Validate `config` and build the harmony tables and chord model.
    pub fn new(config: MusesConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let table = ModeTable::from_steps(&config.harmony.families)?;
        let chord_model: Arc<dyn ChordModel> = match &config.harmony.chord_model {
            Some(path) => Arc::new(MarkovChordModel::load(path)?),
            None => Arc::new(MarkovChordModel::builtin()),
        };
        Ok(Self {
            config,
            table,
            chord_model,
            timer: Arc::new(RealTimer),
        })
    }

    pub fn with_chord_model(mut self, model: Arc<dyn ChordModel>) -> Self {
        self.chord_model = model;
        self
    }

    pub fn with_timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.timer = timer;
        self
    }

    pub fn config(&self) -> &MusesConfig {
        &self.config
    }

    fn rng(&self, stream: u64) -> StdRng {
        match self.config.generator.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(stream)),
            None => StdRng::from_entropy(),
        }
    }

    /// Start all roles. Returns once every thread is running.
    pub fn start(
        self,
        input: Receiver<TimestampedMidiMessage>,
        outputs: OutputSinks,
    ) -> Result<EngineHandle, EngineError> {
        let config = &self.config;
        let tempo = Tempo::from(&config.tempo);
        let measures_per_phrase = config.tempo.measures_per_scale_change;

        let frame: Arc<FrameCell<HarmonicFrame>> = Arc::new(FrameCell::new());
        let scale_change: Arc<Mailbox<ScaleChangeRequest>> = Arc::new(Mailbox::new());
        let measure_elapsed: Arc<Mailbox<ClockTick>> = Arc::new(Mailbox::new());
        let sequencer = Arc::new(Sequencer::new());
        let notes = Arc::new(NoteBuffer::new());

        let (generator_tx, generator_rx) = mpsc::sync_channel(config.generator.queue_capacity);

        let mut workers = sequencer.spawn_players(outputs, &config.playback, Arc::clone(&self.timer))?;

        let generator = SequenceGenerator::new(
            GeneratorSettings::from_config(
                tempo,
                &config.generator,
                &config.playback,
                config.harmony.channel_map,
            ),
            self.rng(GENERATOR_STREAM),
        );
        {
            let frame = Arc::clone(&frame);
            let measure_elapsed = Arc::clone(&measure_elapsed);
            let sequencer = Arc::clone(&sequencer);
            workers.push(spawn("generator", move || {
                generator.run(generator_rx, &frame, &measure_elapsed, &sequencer)
            })?);
        }

        let analyzer = HarmonicAnalyzer::new(
            self.table.clone(),
            Arc::clone(&self.chord_model),
            measures_per_phrase as usize,
            self.rng(ANALYZER_STREAM),
        );
        {
            let frame = Arc::clone(&frame);
            let scale_change = Arc::clone(&scale_change);
            let notes = Arc::clone(&notes);
            workers.push(spawn("analyzer", move || {
                analyzer.run(&notes, &scale_change, &frame)
            })?);
        }

        let batch_size = config.generator.batch_size;
        let listener = spawn("listener", move || {
            run_listener(input, batch_size, &notes, generator_tx)
        })?;

        let clock = MeasureClock::new(tempo, measures_per_phrase, Arc::clone(&self.timer));
        workers.push(spawn("clock", move || {
            clock.run(&*frame, &scale_change, &measure_elapsed)
        })?);

        info!(
            bpm = config.tempo.bpm,
            beats_per_measure = config.tempo.beats_per_measure,
            measures_per_scale_change = measures_per_phrase,
            "engine started"
        );

        Ok(EngineHandle { listener, workers })
    }
}

fn spawn(
    name: &'static str,
    body: impl FnOnce() + Send + 'static,
) -> Result<JoinHandle<()>, EngineError> {
    thread::Builder::new()
        .name(name.to_string())
        .spawn(body)
        .map_err(|source| EngineError::Spawn { name, source })
}

/// Threads of a running engine.
pub struct EngineHandle {
    listener: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

impl EngineHandle {
    /// Names of every running thread, listener first.
    pub fn thread_names(&self) -> Vec<String> {
        std::iter::once(&self.listener)
            .chain(&self.workers)
            .filter_map(|h| h.thread().name().map(str::to_string))
            .collect()
    }

    /// Block until the listener exits, i.e. until the MIDI input closes.
    /// The other roles never finish and are left to process exit.
    pub fn join_listener(self) -> thread::Result<()> {
        self.listener.join()
    }
}

/// Open the configured MIDI ports.
///
/// The returned input must stay alive for as long as notes should flow; its
/// messages arrive on the returned receiver.
pub fn open_ports(
    ports: &PortsConfig,
) -> Result<(ActiveMidiInput, Receiver<TimestampedMidiMessage>, OutputSinks), EngineError> {
    let missing = ports.missing();
    if !missing.is_empty() {
        return Err(EngineError::MissingPorts(missing.join(", ")));
    }

    let outputs = OutputSinks {
        melody: Box::new(ActiveMidiOutput::open(&ports.melody)?),
        chord: Box::new(ActiveMidiOutput::open(&ports.chord)?),
        rhythm: Box::new(ActiveMidiOutput::open(&ports.rhythm)?),
    };

    let (tx, rx) = mpsc::channel();
    let input = ActiveMidiInput::open(
        &ports.input,
        Box::new(move |message| {
            // the engine is gone once the receiver is dropped
            let _ = tx.send(message);
        }),
    )?;

    Ok((input, rx, outputs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi_io::MemorySink;
    use std::path::PathBuf;

    fn sinks() -> OutputSinks {
        OutputSinks {
            melody: Box::new(MemorySink::new("melody")),
            chord: Box::new(MemorySink::new("chord")),
            rhythm: Box::new(MemorySink::new("rhythm")),
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = MusesConfig::default();
        config.tempo.bpm = 0.0;
        assert!(matches!(Engine::new(config), Err(EngineError::Config(_))));
    }

    #[test]
    fn missing_chord_model_file_is_fatal() {
        let mut config = MusesConfig::default();
        config.harmony.chord_model = Some(PathBuf::from("/nonexistent/chords.json"));
        assert!(matches!(Engine::new(config), Err(EngineError::Harmony(_))));
    }

    #[test]
    fn unset_ports_are_reported_together() {
        let ports = PortsConfig {
            input: "keys".into(),
            ..PortsConfig::default()
        };
        match open_ports(&ports) {
            Err(EngineError::MissingPorts(names)) => assert_eq!(names, "melody, chord, rhythm"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("ports should be missing"),
        }
    }

    #[test]
    fn start_names_all_seven_threads() {
        let mut config = MusesConfig::default();
        config.generator.seed = Some(9);
        let engine = Engine::new(config).unwrap();
        let (tx, rx) = mpsc::channel();
        let handle = engine.start(rx, sinks()).unwrap();

        let mut names = handle.thread_names();
        names.sort();
        assert_eq!(
            names,
            vec!["analyzer", "chord", "clock", "generator", "listener", "melody", "rhythm"]
        );

        drop(tx);
        handle.join_listener().unwrap();
    }
}
