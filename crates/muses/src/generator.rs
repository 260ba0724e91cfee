//! Sequence generator role
//!
//! Every measure, parses what the performer played against the current
//! chord, folds it into the melody and rhythm chains, and composes a
//! [`PlaybackPacket`] for the sequencer.

use std::sync::mpsc::Receiver;
use std::time::Duration;

use musesconf::{GeneratorConfig, OctaveRange, PlaybackConfig, RhythmSource};
use muses_harmony::{Chord, PitchClass, ToneRole};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};

use crate::analyzer::HarmonicFrame;
use crate::clock::{ClockTick, Tempo};
use crate::mailbox::{FrameCell, Mailbox};
use crate::markov::MarkovChain;
use crate::notation::{self, RhythmSymbol};
use crate::primitives::{NoteBatch, NoteEvent};
use crate::sequencer::Sequencer;

/// Rhythm symbols sampled per measure before clipping.
pub const GENERATED_RHYTHM_LENGTH: usize = 10;

/// MIDI note for a pitch class in an octave, C4 = 60.
///
/// Notes above 127 drop by whole octaves, so the pitch class never changes.
pub fn midi_pitch(pitch_class: PitchClass, octave: u8) -> u8 {
    let mut pitch = 12 * (u16::from(octave) + 1) + u16::from(pitch_class % 12);
    while pitch > 127 {
        pitch -= 12;
    }
    pitch as u8
}

/// One note or rest of the generated melody.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MelodyStep {
    pub pitch: u8,
    pub rhythm: RhythmSymbol,
}

impl MelodyStep {
    pub fn duration(&self, beat: Duration) -> Duration {
        beat.mul_f64(self.rhythm.beats())
    }
}

/// One measure of music for the three players.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackPacket {
    pub measure: u64,
    pub steps: Vec<MelodyStep>,
    pub chord_notes: Vec<u8>,
    pub rhythm_pitch: u8,
    /// 1-based MIDI channel chosen by the mode.
    pub channel: u8,
    pub measure_duration: Duration,
    pub beat_duration: Duration,
}

impl PlaybackPacket {
    /// Channel number as sent on the wire, 0–15.
    pub fn wire_channel(&self) -> u8 {
        self.channel.saturating_sub(1) & 0x0F
    }
}

/// Settings the generator needs, gathered from configuration.
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub tempo: Tempo,
    pub markov_order: usize,
    pub markov_inertia: f64,
    pub melody_octaves: OctaveRange,
    pub chord_octaves: OctaveRange,
    pub rhythm_source: RhythmSource,
    pub channel_map: [u8; 7],
    pub click_pitch: u8,
}

impl GeneratorSettings {
    pub fn from_config(
        tempo: Tempo,
        generator: &GeneratorConfig,
        playback: &PlaybackConfig,
        channel_map: [u8; 7],
    ) -> Self {
        Self {
            tempo,
            markov_order: generator.markov_order,
            markov_inertia: generator.markov_inertia,
            melody_octaves: generator.melody_octaves,
            chord_octaves: generator.chord_octaves,
            rhythm_source: generator.rhythm_source,
            channel_map,
            click_pitch: playback.click_pitch,
        }
    }
}

pub struct SequenceGenerator {
    settings: GeneratorSettings,
    melody: MarkovChain<ToneRole>,
    rhythm: MarkovChain<RhythmSymbol>,
    rng: StdRng,
}

impl SequenceGenerator {
    pub fn new(settings: GeneratorSettings, rng: StdRng) -> Self {
        Self {
            melody: MarkovChain::new(settings.markov_order, settings.markov_inertia),
            rhythm: MarkovChain::new(settings.markov_order, settings.markov_inertia),
            settings,
            rng,
        }
    }

    pub fn melody_chain(&self) -> &MarkovChain<ToneRole> {
        &self.melody
    }

    pub fn rhythm_chain(&self) -> &MarkovChain<RhythmSymbol> {
        &self.rhythm
    }

    /// Compose one measure from the events heard since the last one.
    ///
    /// Returns `None` when there is nothing to play: no rhythm survives
    /// clipping, or the chains have not learned anything yet.
    pub fn compose(
        &mut self,
        tick: ClockTick,
        frame: &HarmonicFrame,
        events: &[NoteEvent],
    ) -> Option<PlaybackPacket> {
        let tempo = self.settings.tempo;
        let chord = frame.chord_at(tick.bar_in_phrase);
        let channel = self.settings.channel_map[frame.mode.degree % 7];

        let rhythm_in = notation::parse_rhythm(events, &tempo);
        let melody_in = notation::parse_melody(events, &chord);
        if !rhythm_in.is_empty() && !melody_in.is_empty() {
            self.melody.learn(&melody_in);
            self.rhythm.learn(&rhythm_in);
        }

        let budget = f64::from(tempo.beats_per_measure);
        let rhythm_out = match self.settings.rhythm_source {
            RhythmSource::Echo => notation::clip(&rhythm_in, budget),
            RhythmSource::Markov if self.rhythm.is_trained() => notation::clip(
                &self.rhythm.generate(GENERATED_RHYTHM_LENGTH, &mut self.rng),
                budget,
            ),
            RhythmSource::Markov => Vec::new(),
        };
        if rhythm_out.is_empty() || !self.melody.is_trained() {
            debug!(measure = tick.measure, "nothing to play this measure");
            return None;
        }

        let melody_out = self.melody.generate(rhythm_out.len(), &mut self.rng);
        let steps: Vec<MelodyStep> = melody_out
            .iter()
            .zip(rhythm_out.iter())
            .map(|(&role, &rhythm)| MelodyStep {
                pitch: self.pick_pitch(&chord, role),
                rhythm,
            })
            .collect();
        let chord_notes = voice_chord(&chord, self.settings.chord_octaves, &mut self.rng);

        debug!(
            measure = tick.measure,
            melody = %notation::render(&melody_out),
            rhythm = %notation::render(&rhythm_out),
            pitches = ?steps.iter().map(|s| s.pitch).collect::<Vec<_>>(),
            "generated measure"
        );
        info!(
            measure = tick.measure,
            channel,
            "chord {} ({})",
            chord.symbol,
            chord.degree
        );

        Some(PlaybackPacket {
            measure: tick.measure,
            steps,
            chord_notes,
            rhythm_pitch: self.settings.click_pitch,
            channel,
            measure_duration: tempo.measure_duration(),
            beat_duration: tempo.beat_duration(),
        })
    }

    fn pick_pitch(&mut self, chord: &Chord, role: ToneRole) -> u8 {
        let OctaveRange(low, high) = self.settings.melody_octaves;
        let octave = self.rng.gen_range(low..=high);
        let pitch_class = chord
            .tones(role)
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(chord.root);
        midi_pitch(pitch_class, octave)
    }

    /// Run the generator role forever.
    ///
    /// Waits for the first batch of notes and the first harmonic frame, then
    /// composes one packet per measure.
    pub fn run(
        mut self,
        batches: Receiver<NoteBatch>,
        frame: &FrameCell<HarmonicFrame>,
        measure_elapsed: &Mailbox<ClockTick>,
        sequencer: &Sequencer,
    ) {
        let mut pending: Vec<NoteEvent> = match batches.recv() {
            Ok(first) => first,
            Err(_) => {
                info!("note input closed before any notes arrived");
                return;
            }
        };
        frame.wait_current();

        loop {
            let tick = measure_elapsed.take();
            let current = frame.wait_current();
            for batch in batches.try_iter() {
                pending.extend(batch);
            }
            let events = std::mem::take(&mut pending);
            if let Some(packet) = self.compose(tick, &current, &events) {
                sequencer.play(packet);
            }
        }
    }
}

/// Chord root at the bottom of `octaves`, plus each chord tone in a random
/// octave of the range. Sorted, without duplicates.
pub fn voice_chord(chord: &Chord, octaves: OctaveRange, rng: &mut impl Rng) -> Vec<u8> {
    let OctaveRange(low, high) = octaves;
    let mut notes = vec![midi_pitch(chord.root, low)];
    notes.extend(
        chord
            .chord_tones
            .iter()
            .map(|&pc| midi_pitch(pc, rng.gen_range(low..=high))),
    );
    notes.sort_unstable();
    notes.dedup();
    notes
}
