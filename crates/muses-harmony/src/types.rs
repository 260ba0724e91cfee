use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pitch class 0–11 (C=0, C#=1, ...)
pub type PitchClass = u8;

/// Seven pitch classes, starting at the mode root.
pub type Scale = [PitchClass; 7];

const NOTE_NAMES_SHARP: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];
const NOTE_NAMES_FLAT: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// Pitch classes conventionally spelled with flats.
pub static FLAT_KEY_ROOTS: [PitchClass; 6] = [1, 3, 5, 6, 8, 10];

pub fn note_name(pitch_class: PitchClass, use_flats: bool) -> &'static str {
    let idx = (pitch_class % 12) as usize;
    if use_flats {
        NOTE_NAMES_FLAT[idx]
    } else {
        NOTE_NAMES_SHARP[idx]
    }
}

/// Pitch class of a MIDI note number.
pub fn pitch_class(midi_pitch: u8) -> PitchClass {
    midi_pitch % 12
}

/// Names for the rotations of the diatonic family.
pub const DIATONIC_MODE_NAMES: [&str; 7] = [
    "ionian",
    "dorian",
    "phrygian",
    "lydian",
    "mixolydian",
    "aeolian",
    "locrian",
];

/// Roman-numeral chord degree within the current mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Degree {
    I,
    II,
    III,
    IV,
    V,
    VI,
    VII,
}

impl Degree {
    pub const ALL: [Degree; 7] = [
        Degree::I,
        Degree::II,
        Degree::III,
        Degree::IV,
        Degree::V,
        Degree::VI,
        Degree::VII,
    ];

    /// Zero-based scale index (I = 0).
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn numeral(self) -> &'static str {
        match self {
            Degree::I => "I",
            Degree::II => "II",
            Degree::III => "III",
            Degree::IV => "IV",
            Degree::V => "V",
            Degree::VI => "VI",
            Degree::VII => "VII",
        }
    }
}

impl fmt::Display for Degree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.numeral())
    }
}

impl FromStr for Degree {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Degree::ALL
            .iter()
            .copied()
            .find(|d| d.numeral().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("not a chord degree: {s:?}"))
    }
}

impl TryFrom<String> for Degree {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Degree> for String {
    fn from(degree: Degree) -> Self {
        degree.numeral().to_string()
    }
}

/// The prevailing mode: a root, an interval family, and a rotation of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mode {
    pub root: PitchClass,
    /// Index into the configured interval families.
    pub family: usize,
    /// Rotation within the family, 0–6.
    pub degree: usize,
}

impl Mode {
    /// The mode in force before any notes have been analyzed: C, first family, first rotation.
    pub const fn initial() -> Self {
        Self {
            root: 0,
            family: 0,
            degree: 0,
        }
    }

    pub fn uses_flats(&self) -> bool {
        FLAT_KEY_ROOTS.contains(&self.root)
    }

    /// Human-readable name, e.g. "D dorian" or "E family 1/3".
    pub fn name(&self) -> String {
        let root = note_name(self.root, self.uses_flats());
        if self.family == 0 {
            format!("{} {}", root, DIATONIC_MODE_NAMES[self.degree % 7])
        } else {
            format!("{} family {}/{}", root, self.family, self.degree)
        }
    }
}

impl Default for Mode {
    fn default() -> Self {
        Self::initial()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
