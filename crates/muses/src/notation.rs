//! Abstract melody and rhythm symbols, and parsing performer input into them.
//!
//! Melodies are written as tone roles relative to the current chord
//! (`c`, `l`, `x`). Rhythms use note values in quarter-note beats, with a
//! rest flag: `4`, `8r`, `4dot`, ...

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use muses_harmony::{Chord, ToneRole};

use crate::clock::Tempo;
use crate::primitives::NoteEvent;

/// Shortest silence, in beats, that is written as a rest: half a sixteenth.
pub const MIN_REST_BEATS: f64 = 0.125;

/// Note values without triplets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NoteValue {
    Whole,
    Half,
    DottedQuarter,
    Quarter,
    Eighth,
    Sixteenth,
}

impl NoteValue {
    /// Longest first.
    pub const ALL: [NoteValue; 6] = [
        NoteValue::Whole,
        NoteValue::Half,
        NoteValue::DottedQuarter,
        NoteValue::Quarter,
        NoteValue::Eighth,
        NoteValue::Sixteenth,
    ];

    /// Length in quarter-note beats.
    pub fn beats(self) -> f64 {
        match self {
            NoteValue::Whole => 4.0,
            NoteValue::Half => 2.0,
            NoteValue::DottedQuarter => 1.5,
            NoteValue::Quarter => 1.0,
            NoteValue::Eighth => 0.5,
            NoteValue::Sixteenth => 0.25,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            NoteValue::Whole => "1",
            NoteValue::Half => "2",
            NoteValue::DottedQuarter => "4dot",
            NoteValue::Quarter => "4",
            NoteValue::Eighth => "8",
            NoteValue::Sixteenth => "16",
        }
    }

    /// The value closest to `beats`; ties go to the longer value.
    pub fn nearest(beats: f64) -> Self {
        let mut best = NoteValue::Whole;
        let mut best_diff = f64::INFINITY;
        for value in Self::ALL {
            let diff = (value.beats() - beats).abs();
            if diff < best_diff {
                best = value;
                best_diff = diff;
            }
        }
        best
    }
}

/// One rhythm token: a note value, sounded or rested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RhythmSymbol {
    pub value: NoteValue,
    pub rest: bool,
}

impl RhythmSymbol {
    pub fn note(value: NoteValue) -> Self {
        Self { value, rest: false }
    }

    pub fn rest(value: NoteValue) -> Self {
        Self { value, rest: true }
    }

    pub fn beats(&self) -> f64 {
        self.value.beats()
    }
}

impl fmt::Display for RhythmSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value.symbol())?;
        if self.rest {
            f.write_str("r")?;
        }
        Ok(())
    }
}

impl FromStr for RhythmSymbol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (body, rest) = match s.strip_suffix('r') {
            Some(body) => (body, true),
            None => (s, false),
        };
        NoteValue::ALL
            .iter()
            .copied()
            .find(|v| v.symbol() == body)
            .map(|value| Self { value, rest })
            .ok_or_else(|| format!("not a rhythm symbol: {s:?}"))
    }
}

/// Space-separated rendering for logs, e.g. `"4 8r 8 2"`.
pub fn render<T: fmt::Display>(symbols: &[T]) -> String {
    symbols
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn by_time(events: &[NoteEvent]) -> Vec<NoteEvent> {
    let mut sorted = events.to_vec();
    sorted.sort_by_key(|e| e.timestamp);
    sorted
}

/// One melody symbol per note-on, in time order.
pub fn parse_melody(events: &[NoteEvent], chord: &Chord) -> Vec<ToneRole> {
    by_time(events)
        .iter()
        .filter(|e| e.is_on())
        .map(|e| chord.role_of(e.pitch_class()))
        .collect()
}

/// Rhythm symbols for the notes in `events`, rests included.
///
/// Each note-off releases the earliest still-sounding onset of its pitch, so
/// a re-struck key pairs both strikes with their own releases. A note that is
/// never released lasts until the next onset; the last such note has no end
/// and is dropped.
pub fn parse_rhythm(events: &[NoteEvent], tempo: &Tempo) -> Vec<RhythmSymbol> {
    let events = by_time(events);

    let mut onsets: Vec<(Duration, Option<Duration>)> = Vec::new();
    let mut sounding: BTreeMap<u8, VecDeque<usize>> = BTreeMap::new();
    for event in &events {
        if event.is_on() {
            sounding.entry(event.pitch).or_default().push_back(onsets.len());
            onsets.push((event.timestamp, None));
        } else if let Some(n) = sounding.get_mut(&event.pitch).and_then(VecDeque::pop_front) {
            onsets[n].1 = Some(event.timestamp);
        }
    }

    let mut spans = Vec::with_capacity(onsets.len());
    for (n, &(start, release)) in onsets.iter().enumerate() {
        let end = release.or_else(|| onsets.get(n + 1).map(|&(next, _)| next));
        if let Some(end) = end {
            spans.push((start, end));
        }
    }

    let mut symbols = Vec::with_capacity(spans.len() * 2);
    let mut previous_end = None;
    for (start, end) in spans {
        if let Some(prev) = previous_end {
            if start > prev {
                let gap = tempo.to_beats(start - prev);
                if gap >= MIN_REST_BEATS {
                    symbols.push(RhythmSymbol::rest(NoteValue::nearest(gap)));
                }
            }
        }
        let length = tempo.to_beats(end.saturating_sub(start));
        symbols.push(RhythmSymbol::note(NoteValue::nearest(length)));
        previous_end = Some(end);
    }
    symbols
}

/// Longest prefix of `rhythm` that fits in `budget_beats`.
///
/// Stops at the first symbol that would overflow; later symbols are never
/// considered, even if they would fit.
pub fn clip(rhythm: &[RhythmSymbol], budget_beats: f64) -> Vec<RhythmSymbol> {
    const EPSILON: f64 = 1e-9;
    let mut used = 0.0;
    rhythm
        .iter()
        .copied()
        .take_while(|symbol| {
            let next = used + symbol.beats();
            let fits = next <= budget_beats + EPSILON;
            if fits {
                used = next;
            }
            fits
        })
        .collect()
}

pub fn total_beats(rhythm: &[RhythmSymbol]) -> f64 {
    rhythm.iter().map(RhythmSymbol::beats).sum()
}
