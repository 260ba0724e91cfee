//! Mode inference from a bag of recently played pitch classes.

use crate::modes::ModeTable;
use crate::types::{Mode, PitchClass, Scale};
use serde::{Deserialize, Serialize};

/// Reward for a note found at each scale position, tonic first.
pub const POSITION_WEIGHTS: [f64; 7] = [0.3, 0.06, 0.08, 0.08, 0.24, 0.16, 0.08];

/// Penalty for each played note that falls outside the scale.
pub const OUT_OF_SCALE_PENALTY: f64 = 0.2;

/// Result of a mode inference pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeDetection {
    pub mode: Mode,
    pub affinity: f64,
}

/// Per-pitch-class occurrence counts.
pub fn pitch_class_histogram(notes: &[PitchClass]) -> [usize; 12] {
    let mut histogram = [0usize; 12];
    for &pc in notes {
        histogram[(pc % 12) as usize] += 1;
    }
    histogram
}

/// Most frequent pitch class. Ties go to whichever was heard first.
pub fn get_root(notes: &[PitchClass]) -> Option<PitchClass> {
    let histogram = pitch_class_histogram(notes);
    let max = *histogram.iter().max()?;
    notes
        .iter()
        .map(|&pc| pc % 12)
        .find(|&pc| histogram[pc as usize] == max)
}

/// How well `notes` fit a single scale.
///
/// Each occurrence of a scale tone adds that position's weight; each note
/// outside the scale costs [`OUT_OF_SCALE_PENALTY`]. The total is divided by
/// the number of notes.
pub fn affinity(scale: &Scale, notes: &[PitchClass]) -> f64 {
    if notes.is_empty() {
        return 0.0;
    }
    let histogram = pitch_class_histogram(notes);
    let reward: f64 = scale
        .iter()
        .zip(POSITION_WEIGHTS.iter())
        .map(|(&pc, &weight)| weight * histogram[pc as usize] as f64)
        .sum();
    let outside = notes.iter().filter(|&&pc| !scale.contains(&(pc % 12))).count();
    (reward - outside as f64 * OUT_OF_SCALE_PENALTY) / notes.len() as f64
}

/// Affinity of every mode in `modes`, indexed `[family][degree]`.
pub fn harmonic_affinities(modes: &[[Scale; 7]], notes: &[PitchClass]) -> Vec<[f64; 7]> {
    modes
        .iter()
        .map(|rotations| std::array::from_fn(|degree| affinity(&rotations[degree], notes)))
        .collect()
}

/// Family with the best single mode, then the best degree within it.
///
/// Ties resolve to the lowest index.
pub fn select_mode(affinities: &[[f64; 7]]) -> Option<(usize, usize, f64)> {
    fn argmax(values: impl Iterator<Item = f64>) -> Option<(usize, f64)> {
        values.enumerate().fold(None, |best, (i, v)| match best {
            Some((_, b)) if v <= b => best,
            _ => Some((i, v)),
        })
    }

    let (family, _) = argmax(
        affinities
            .iter()
            .map(|row| row.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
    )?;
    let (degree, score) = argmax(affinities[family].iter().copied())?;
    Some((family, degree, score))
}

/// Infer the prevailing mode of `notes`. Returns `None` for an empty bag.
pub fn infer_mode(table: &ModeTable, notes: &[PitchClass]) -> Option<ModeDetection> {
    let root = get_root(notes)?;
    let affinities = harmonic_affinities(table.modes_at(root), notes);
    let (family, degree, affinity) = select_mode(&affinities)?;
    Some(ModeDetection {
        mode: Mode {
            root,
            family,
            degree,
        },
        affinity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::ModeTable;

    #[test]
    fn root_is_most_frequent() {
        assert_eq!(get_root(&[0, 4, 4, 7]), Some(4));
        assert_eq!(get_root(&[14, 2, 9]), Some(2));
        assert_eq!(get_root(&[]), None);
    }

    #[test]
    fn root_ties_go_to_first_heard() {
        assert_eq!(get_root(&[7, 0, 0, 7]), Some(7));
        assert_eq!(get_root(&[5, 9, 2]), Some(5));
    }

    #[test]
    fn root_ignores_arrival_order() {
        // C C D in every order
        for notes in [[0, 0, 2], [0, 2, 0], [2, 0, 0]] {
            assert_eq!(get_root(&notes), Some(0), "{notes:?}");
        }
    }

    #[test]
    fn weights_sum_to_one() {
        let sum: f64 = POSITION_WEIGHTS.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn full_scale_affinity() {
        let c_major = [0, 2, 4, 5, 7, 9, 11];
        assert!((affinity(&c_major, &c_major) - 1.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn out_of_scale_notes_are_penalized() {
        let c_major = [0, 2, 4, 5, 7, 9, 11];
        // C, G and C#: 0.3 + 0.24 - 0.2 over 3 notes
        let expected = (0.3 + 0.24 - 0.2) / 3.0;
        assert!((affinity(&c_major, &[0, 7, 1]) - expected).abs() < 1e-12);
        // unplayed scale tones cost nothing
        assert!((affinity(&c_major, &[0, 7]) - 0.27).abs() < 1e-12);
    }

    #[test]
    fn exact_scale_beats_every_partial_match() {
        let table = ModeTable::default();
        for root in 0..12u8 {
            for rotations in table.modes_at(root) {
                for scale in rotations {
                    let own = affinity(scale, scale);
                    for other_root in 0..12u8 {
                        for other_rotations in table.modes_at(other_root) {
                            for other in other_rotations {
                                let shared =
                                    other.iter().filter(|&pc| scale.contains(pc)).count();
                                if shared < 7 {
                                    assert!(own > affinity(other, scale));
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn c_major_melody_is_c_ionian() {
        let notes = [0, 4, 7, 0, 2, 5, 9, 11, 0];
        let detection = infer_mode(&ModeTable::default(), &notes).unwrap();
        assert_eq!(detection.mode, Mode::initial());
    }

    #[test]
    fn a_heavy_melody_picks_aeolian() {
        // A natural minor tones with A as the most common
        let notes = [9, 9, 9, 11, 0, 2, 4, 4, 5, 7];
        let detection = infer_mode(&ModeTable::default(), &notes).unwrap();
        assert_eq!(detection.mode.root, 9);
        assert_eq!(detection.mode.family, 0);
        assert_eq!(detection.mode.degree, 5);
    }

    #[test]
    fn select_mode_ties_resolve_low() {
        let flat = vec![[0.5; 7], [0.5; 7]];
        assert_eq!(select_mode(&flat), Some((0, 0, 0.5)));

        let mut rows = vec![[0.0; 7], [0.0; 7]];
        rows[1][3] = 0.9;
        rows[0][6] = 0.4;
        assert_eq!(select_mode(&rows), Some((1, 3, 0.9)));
    }

    #[test]
    fn empty_notes_give_no_detection() {
        assert!(infer_mode(&ModeTable::default(), &[]).is_none());
        assert!(select_mode(&[]).is_none());
    }
}
