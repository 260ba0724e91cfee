use serde::{Deserialize, Serialize};
use std::fmt;

use crate::chord_templates::{chord_symbol, ChordQuality};
use crate::types::{Degree, PitchClass, Scale, FLAT_KEY_ROOTS};

/// How a pitch class relates to the chord being played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ToneRole {
    /// One of the three triad tones.
    Chord,
    /// In the scale but outside the triad.
    Color,
    /// Outside the scale.
    Other,
}

impl ToneRole {
    pub const ALL: [ToneRole; 3] = [ToneRole::Chord, ToneRole::Color, ToneRole::Other];

    /// Single-letter melody symbol: `c`, `l` or `x`.
    pub fn symbol(self) -> char {
        match self {
            ToneRole::Chord => 'c',
            ToneRole::Color => 'l',
            ToneRole::Other => 'x',
        }
    }
}

impl fmt::Display for ToneRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A triad on one degree of the current scale, with its tone partition.
///
/// The three sets are disjoint and together cover all 12 pitch classes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chord {
    pub degree: Degree,
    pub root: PitchClass,
    pub symbol: String,
    pub quality: Option<ChordQuality>,
    pub chord_tones: Vec<PitchClass>,
    pub color_tones: Vec<PitchClass>,
    pub other_tones: Vec<PitchClass>,
}

impl Chord {
    /// Stack thirds on `degree` of `scale`.
    pub fn resolve(scale: &Scale, degree: Degree) -> Self {
        let d = degree.index();
        let chord_tones = vec![scale[d], scale[(d + 2) % 7], scale[(d + 4) % 7]];
        let color_tones = scale
            .iter()
            .copied()
            .filter(|pc| !chord_tones.contains(pc))
            .collect();
        let other_tones = (0..12u8).filter(|pc| !scale.contains(pc)).collect();

        let use_flats = FLAT_KEY_ROOTS.contains(&scale[0]);
        let (symbol, quality) = chord_symbol(scale[d], &chord_tones, use_flats);

        Self {
            degree,
            root: scale[d],
            symbol,
            quality,
            chord_tones,
            color_tones,
            other_tones,
        }
    }

    pub fn role_of(&self, pitch_class: PitchClass) -> ToneRole {
        let pc = pitch_class % 12;
        if self.chord_tones.contains(&pc) {
            ToneRole::Chord
        } else if self.color_tones.contains(&pc) {
            ToneRole::Color
        } else {
            ToneRole::Other
        }
    }

    pub fn tones(&self, role: ToneRole) -> &[PitchClass] {
        match role {
            ToneRole::Chord => &self.chord_tones,
            ToneRole::Color => &self.color_tones,
            ToneRole::Other => &self.other_tones,
        }
    }
}

/// Resolve a degree sequence against one scale.
pub fn resolve_progression(scale: &Scale, degrees: &[Degree]) -> Vec<Chord> {
    degrees.iter().map(|&d| Chord::resolve(scale, d)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const C_MAJOR: Scale = [0, 2, 4, 5, 7, 9, 11];

    #[test]
    fn tonic_triad_in_c_major() {
        let chord = Chord::resolve(&C_MAJOR, Degree::I);
        assert_eq!(chord.chord_tones, vec![0, 4, 7]);
        assert_eq!(chord.color_tones, vec![2, 5, 9, 11]);
        assert_eq!(chord.other_tones, vec![1, 3, 6, 8, 10]);
        assert_eq!(chord.symbol, "C");
    }

    #[test]
    fn upper_degrees_wrap_around_the_scale() {
        let chord = Chord::resolve(&C_MAJOR, Degree::VI);
        assert_eq!(chord.chord_tones, vec![9, 0, 4]);
        assert_eq!(chord.symbol, "Am");

        let chord = Chord::resolve(&C_MAJOR, Degree::VII);
        assert_eq!(chord.chord_tones, vec![11, 2, 5]);
        assert_eq!(chord.quality, Some(ChordQuality::Diminished));
    }

    #[test]
    fn partition_covers_every_pitch_class_once() {
        let d_dorian: Scale = [2, 4, 5, 7, 9, 11, 0];
        for degree in Degree::ALL {
            let chord = Chord::resolve(&d_dorian, degree);
            let mut all: Vec<u8> = ToneRole::ALL
                .iter()
                .flat_map(|&role| chord.tones(role).iter().copied())
                .collect();
            assert_eq!(all.len(), 12);
            all.sort_unstable();
            assert_eq!(all, (0..12).collect::<Vec<u8>>());
            assert_eq!(chord.chord_tones.len(), 3);
            assert_eq!(chord.color_tones.len(), 4);
        }
    }

    #[test]
    fn role_lookup() {
        let chord = Chord::resolve(&C_MAJOR, Degree::V);
        assert_eq!(chord.role_of(7), ToneRole::Chord);
        assert_eq!(chord.role_of(14), ToneRole::Chord);
        assert_eq!(chord.role_of(0), ToneRole::Color);
        assert_eq!(chord.role_of(1), ToneRole::Other);
    }

    #[test]
    fn progression_keeps_order() {
        let chords = resolve_progression(&C_MAJOR, &[Degree::I, Degree::IV, Degree::V, Degree::I]);
        let symbols: Vec<&str> = chords.iter().map(|c| c.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["C", "F", "G", "C"]);
    }
}
