//! Sequencer: three independent players for melody, chord and click.
//!
//! [`Sequencer::play`] hands the same packet to every player. Each player
//! owns its output and performs on its own thread, sleeping between notes,
//! so a slow melody never holds up the chord or the click.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use musesconf::PlaybackConfig;
use tracing::{debug, warn};

use crate::clock::Timer;
use crate::engine::EngineError;
use crate::generator::PlaybackPacket;
use crate::mailbox::Mailbox;
use crate::midi_io::MidiSink;
use crate::primitives::MidiMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Part {
    Melody,
    Chord,
    Rhythm,
}

impl Part {
    pub const ALL: [Part; 3] = [Part::Melody, Part::Chord, Part::Rhythm];

    pub fn name(self) -> &'static str {
        match self {
            Part::Melody => "melody",
            Part::Chord => "chord",
            Part::Rhythm => "rhythm",
        }
    }
}

/// The three output ports, one per part.
pub struct OutputSinks {
    pub melody: Box<dyn MidiSink>,
    pub chord: Box<dyn MidiSink>,
    pub rhythm: Box<dyn MidiSink>,
}

/// Performs one part of each packet on one output.
pub struct Player {
    part: Part,
    sink: Box<dyn MidiSink>,
    velocity: u8,
    clicks_per_measure: u32,
    timer: Arc<dyn Timer>,
}

impl Player {
    pub fn new(
        part: Part,
        sink: Box<dyn MidiSink>,
        playback: &PlaybackConfig,
        timer: Arc<dyn Timer>,
    ) -> Self {
        let velocity = match part {
            Part::Melody => playback.melody_velocity,
            Part::Chord => playback.chord_velocity,
            Part::Rhythm => playback.click_velocity,
        };
        Self {
            part,
            sink,
            velocity,
            clicks_per_measure: playback.clicks_per_measure,
            timer,
        }
    }

    fn send(&mut self, message: MidiMessage) {
        if let Err(e) = self.sink.send(&message) {
            warn!(part = self.part.name(), sink = self.sink.name(), "send failed: {}", e);
        }
    }

    fn note_on(&mut self, channel: u8, pitch: u8) {
        let velocity = self.velocity;
        self.send(MidiMessage::NoteOn {
            channel,
            pitch,
            velocity,
        });
    }

    fn note_off(&mut self, channel: u8, pitch: u8) {
        self.send(MidiMessage::NoteOff { channel, pitch });
    }

    /// Play this player's part of `packet`, returning when it has finished.
    pub fn perform(&mut self, packet: &PlaybackPacket) {
        let channel = packet.wire_channel();
        match self.part {
            Part::Melody => {
                for step in &packet.steps {
                    let sounding = !step.rhythm.rest;
                    if sounding {
                        self.note_on(channel, step.pitch);
                    }
                    self.timer.sleep(step.duration(packet.beat_duration));
                    if sounding {
                        self.note_off(channel, step.pitch);
                    }
                }
            }
            Part::Chord => {
                for &pitch in &packet.chord_notes {
                    self.note_on(channel, pitch);
                }
                self.timer.sleep(packet.measure_duration);
                for &pitch in &packet.chord_notes {
                    self.note_off(channel, pitch);
                }
            }
            Part::Rhythm => {
                let clicks = match self.clicks_per_measure {
                    0 => beats_in(packet),
                    n => n,
                };
                let interval = packet.measure_duration / clicks.max(1);
                for _ in 0..clicks {
                    self.note_on(channel, packet.rhythm_pitch);
                    self.timer.sleep(interval);
                    self.note_off(channel, packet.rhythm_pitch);
                }
            }
        }
    }

    /// Perform every packet posted to `inbox`, forever.
    pub fn run(mut self, inbox: &Mailbox<Arc<PlaybackPacket>>) {
        loop {
            let packet = inbox.take();
            debug!(part = self.part.name(), measure = packet.measure, "playing");
            self.perform(&packet);
        }
    }
}

fn beats_in(packet: &PlaybackPacket) -> u32 {
    let beat = packet.beat_duration.as_secs_f64();
    if beat <= 0.0 {
        return 1;
    }
    (packet.measure_duration.as_secs_f64() / beat).round().max(1.0) as u32
}

/// Fans packets out to the players.
#[derive(Default)]
pub struct Sequencer {
    melody: Arc<Mailbox<Arc<PlaybackPacket>>>,
    chord: Arc<Mailbox<Arc<PlaybackPacket>>>,
    rhythm: Arc<Mailbox<Arc<PlaybackPacket>>>,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    fn inbox(&self, part: Part) -> &Arc<Mailbox<Arc<PlaybackPacket>>> {
        match part {
            Part::Melody => &self.melody,
            Part::Chord => &self.chord,
            Part::Rhythm => &self.rhythm,
        }
    }

    /// Hand `packet` to all three players. A packet a player has not started
    /// yet is replaced.
    pub fn play(&self, packet: PlaybackPacket) {
        let packet = Arc::new(packet);
        for part in Part::ALL {
            if self.inbox(part).post(Arc::clone(&packet)) {
                warn!(part = part.name(), measure = packet.measure, "player was still busy, dropped a packet");
            }
        }
    }

    /// Start one named thread per part.
    pub fn spawn_players(
        &self,
        sinks: OutputSinks,
        playback: &PlaybackConfig,
        timer: Arc<dyn Timer>,
    ) -> Result<Vec<JoinHandle<()>>, EngineError> {
        let OutputSinks {
            melody,
            chord,
            rhythm,
        } = sinks;

        [(Part::Melody, melody), (Part::Chord, chord), (Part::Rhythm, rhythm)]
            .into_iter()
            .map(|(part, sink)| {
                let player = Player::new(part, sink, playback, Arc::clone(&timer));
                let inbox = Arc::clone(self.inbox(part));
                thread::Builder::new()
                    .name(part.name().to_string())
                    .spawn(move || player.run(&inbox))
                    .map_err(|source| EngineError::Spawn {
                        name: part.name(),
                        source,
                    })
            })
            .collect()
    }
}
