//! Harmonic analyzer role
//!
//! Takes the pitch classes the performer played during a phrase and, when
//! the clock asks for a scale change, turns them into the next
//! [`HarmonicFrame`]: a mode and a fresh chord progression.

use std::sync::Arc;

use muses_harmony::{infer_mode, ChordModel, Chord, Degree, Mode, ModeTable, PitchClass, Scale};
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use crate::clock::ScaleChangeRequest;
use crate::mailbox::{FrameCell, Mailbox, NoteBuffer};

/// Mode and chord progression in force for one phrase.
#[derive(Debug, Clone, PartialEq)]
pub struct HarmonicFrame {
    pub phrase: u64,
    pub mode: Mode,
    pub scale: Scale,
    /// One degree per measure of the phrase.
    pub chords: Vec<Degree>,
}

impl HarmonicFrame {
    /// Chord for the given bar, resolved against this frame's scale.
    pub fn chord_at(&self, bar_in_phrase: u32) -> Chord {
        let degree = if self.chords.is_empty() {
            Degree::I
        } else {
            self.chords[bar_in_phrase as usize % self.chords.len()]
        };
        Chord::resolve(&self.scale, degree)
    }
}

pub struct HarmonicAnalyzer {
    table: ModeTable,
    chord_model: Arc<dyn ChordModel>,
    measures_per_phrase: usize,
    mode: Mode,
    buffer: Vec<PitchClass>,
    rng: StdRng,
}

impl HarmonicAnalyzer {
    pub fn new(
        table: ModeTable,
        chord_model: Arc<dyn ChordModel>,
        measures_per_phrase: usize,
        rng: StdRng,
    ) -> Self {
        Self {
            table,
            chord_model,
            measures_per_phrase,
            mode: Mode::initial(),
            buffer: Vec::new(),
            rng,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn buffered(&self) -> &[PitchClass] {
        &self.buffer
    }

    /// Add heard pitch classes to the phrase buffer.
    pub fn absorb(&mut self, pitch_classes: impl IntoIterator<Item = PitchClass>) {
        self.buffer.extend(pitch_classes);
    }

    /// Infer the mode from everything buffered, resample the progression and
    /// clear the buffer.
    ///
    /// With nothing buffered the mode is kept.
    pub fn change_scale(&mut self, phrase: u64) -> HarmonicFrame {
        match infer_mode(&self.table, &self.buffer) {
            Some(detection) => {
                debug!(
                    notes = self.buffer.len(),
                    affinity = detection.affinity,
                    "mode inferred"
                );
                self.mode = detection.mode;
            }
            None => debug!("no notes this phrase, keeping {}", self.mode),
        }
        self.buffer.clear();

        let chords = self
            .chord_model
            .sample(self.measures_per_phrase, &mut self.rng);
        let scale = match self.table.scale(&self.mode) {
            Some(scale) => *scale,
            None => {
                warn!(mode = %self.mode, "mode not in table, falling back to the initial mode");
                self.mode = Mode::initial();
                self.table.modes_at(0)[0][0]
            }
        };

        HarmonicFrame {
            phrase,
            mode: self.mode,
            scale,
            chords,
        }
    }

    /// Answer one scale change: take everything heard since the last one
    /// and publish the next frame.
    pub fn serve(
        &mut self,
        request: ScaleChangeRequest,
        notes: &NoteBuffer,
        frame: &FrameCell<HarmonicFrame>,
    ) {
        self.absorb(notes.take());
        let next = self.change_scale(request.phrase);
        let progression: Vec<String> = next
            .chords
            .iter()
            .map(|&d| format!("{} ({})", d, Chord::resolve(&next.scale, d).symbol))
            .collect();
        info!(
            phrase = next.phrase,
            mode = %next.mode,
            scale = ?next.scale,
            "scale change: next chords {}",
            progression.join(", ")
        );
        frame.publish(next);
    }

    /// Run the analyzer role forever.
    ///
    /// Waits for the first batch before serving any scale change. Returns
    /// only if the input closes before any notes arrive.
    pub fn run(
        mut self,
        notes: &NoteBuffer,
        scale_change: &Mailbox<ScaleChangeRequest>,
        frame: &FrameCell<HarmonicFrame>,
    ) {
        if !notes.wait_first_batch() {
            info!("note input closed before any notes arrived");
            return;
        }

        loop {
            let request = scale_change.take();
            self.serve(request, notes, frame);
        }
    }
}
