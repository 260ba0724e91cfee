//! Performance configuration - tempo, harmony, generation and playback.
//!
//! These values seed the engine at startup. They are validated once by
//! [`crate::MusesConfig::validate`] and never change while the engine runs.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Inclusive octave range, written as `[low, high]` in TOML.
///
/// Octave numbering follows the C4 = MIDI 60 convention. Every pitch class
/// of an octave must be a MIDI note, so the highest octave is 8 (B8 = 119;
/// octave 9 stops at G9 = 127).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OctaveRange(pub u8, pub u8);

impl OctaveRange {
    pub const MAX_OCTAVE: u8 = 8;

    pub fn low(&self) -> u8 {
        self.0
    }

    pub fn high(&self) -> u8 {
        self.1
    }

    /// A range is well formed when `low <= high <= MAX_OCTAVE`.
    pub fn is_valid(&self) -> bool {
        self.0 <= self.1 && self.1 <= Self::MAX_OCTAVE
    }
}

/// Tempo and measure structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoConfig {
    /// Beats per minute. Must be > 0.
    /// Default: 74
    #[serde(default = "TempoConfig::default_bpm")]
    pub bpm: f64,

    /// Quarter-note beats in one measure.
    /// Default: 4
    #[serde(default = "TempoConfig::default_beats_per_measure")]
    pub beats_per_measure: u32,

    /// Measures between two scale changes (the phrase length).
    /// Default: 4
    #[serde(default = "TempoConfig::default_measures_per_scale_change")]
    pub measures_per_scale_change: u32,
}

impl TempoConfig {
    fn default_bpm() -> f64 {
        74.0
    }

    fn default_beats_per_measure() -> u32 {
        4
    }

    fn default_measures_per_scale_change() -> u32 {
        4
    }
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            bpm: Self::default_bpm(),
            beats_per_measure: Self::default_beats_per_measure(),
            measures_per_scale_change: Self::default_measures_per_scale_change(),
        }
    }
}

/// Mode inference and chord progression settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarmonyConfig {
    /// Interval families; each is 7 semitone steps summing to 12.
    #[serde(default = "HarmonyConfig::default_families")]
    pub families: Vec<Vec<u8>>,

    /// MIDI channel (1-16) for each mode degree, Ionian-position first.
    #[serde(default = "HarmonyConfig::default_channel_map")]
    pub channel_map: [u8; 7],

    /// JSON chord progression model. The built-in table is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chord_model: Option<PathBuf>,
}

impl HarmonyConfig {
    fn default_families() -> Vec<Vec<u8>> {
        vec![vec![2, 2, 1, 2, 2, 2, 1], vec![2, 2, 1, 3, 1, 2, 1]]
    }

    fn default_channel_map() -> [u8; 7] {
        [1, 2, 3, 4, 5, 6, 7]
    }
}

impl Default for HarmonyConfig {
    fn default() -> Self {
        Self {
            families: Self::default_families(),
            channel_map: Self::default_channel_map(),
            chord_model: None,
        }
    }
}

/// Where the played rhythm comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RhythmSource {
    /// Echo the performer's last measure of rhythm, clipped to one measure.
    #[default]
    Echo,
    /// Sample the rhythm chain, clipped to one measure.
    Markov,
}

/// Note batching and Markov generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Note events collected before a batch is handed off.
    /// Default: 10
    #[serde(default = "GeneratorConfig::default_batch_size")]
    pub batch_size: usize,

    /// Batches that may queue between the listener and a consumer.
    /// Default: 64
    #[serde(default = "GeneratorConfig::default_queue_capacity")]
    pub queue_capacity: usize,

    /// Markov context length.
    /// Default: 3
    #[serde(default = "GeneratorConfig::default_markov_order")]
    pub markov_order: usize,

    /// Weight of previously learned probabilities, in [0, 1].
    /// Default: 0.7
    #[serde(default = "GeneratorConfig::default_markov_inertia")]
    pub markov_inertia: f64,

    #[serde(default = "GeneratorConfig::default_melody_octaves")]
    pub melody_octaves: OctaveRange,

    #[serde(default = "GeneratorConfig::default_chord_octaves")]
    pub chord_octaves: OctaveRange,

    #[serde(default)]
    pub rhythm_source: RhythmSource,

    /// Fixed RNG seed for reproducible runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl GeneratorConfig {
    fn default_batch_size() -> usize {
        10
    }

    fn default_queue_capacity() -> usize {
        64
    }

    fn default_markov_order() -> usize {
        3
    }

    fn default_markov_inertia() -> f64 {
        0.7
    }

    fn default_melody_octaves() -> OctaveRange {
        OctaveRange(4, 6)
    }

    fn default_chord_octaves() -> OctaveRange {
        OctaveRange(2, 5)
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            batch_size: Self::default_batch_size(),
            queue_capacity: Self::default_queue_capacity(),
            markov_order: Self::default_markov_order(),
            markov_inertia: Self::default_markov_inertia(),
            melody_octaves: Self::default_melody_octaves(),
            chord_octaves: Self::default_chord_octaves(),
            rhythm_source: RhythmSource::default(),
            seed: None,
        }
    }
}

/// Output voicing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Pitch of the rhythmic click (75 = GM claves).
    pub click_pitch: u8,
    /// Clicks per measure, evenly spaced. Zero means one per beat.
    pub clicks_per_measure: u32,
    pub melody_velocity: u8,
    pub chord_velocity: u8,
    pub click_velocity: u8,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            click_pitch: 75,
            clicks_per_measure: 0,
            melody_velocity: 100,
            chord_velocity: 80,
            click_velocity: 100,
        }
    }
}
