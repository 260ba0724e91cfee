//! Interval families and the scales they produce at every root.
//!
//! A family is seven semitone steps summing to an octave. Rotating the
//! steps left by `d` gives the family's `d`-th mode; accumulating the
//! rotated steps from a root gives that mode's scale.

use crate::types::{Mode, PitchClass, Scale};
use crate::HarmonyError;

/// Seven semitone steps summing to 12.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeFamily {
    steps: [u8; 7],
}

impl ModeFamily {
    pub const DIATONIC: ModeFamily = ModeFamily {
        steps: [2, 2, 1, 2, 2, 2, 1],
    };
    pub const HARMONIC_MAJOR: ModeFamily = ModeFamily {
        steps: [2, 2, 1, 3, 1, 2, 1],
    };

    pub fn new(steps: &[u8]) -> Result<Self, HarmonyError> {
        let sum: u32 = steps.iter().map(|&s| u32::from(s)).sum();
        if steps.len() != 7 || steps.contains(&0) || sum != 12 {
            return Err(HarmonyError::InvalidFamily(steps.to_vec()));
        }
        let mut fixed = [0u8; 7];
        fixed.copy_from_slice(steps);
        Ok(Self { steps: fixed })
    }

    pub fn steps(&self) -> &[u8; 7] {
        &self.steps
    }

    /// Steps rotated left by `degree`.
    pub fn rotation(&self, degree: usize) -> [u8; 7] {
        let mut rotated = self.steps;
        rotated.rotate_left(degree % 7);
        rotated
    }
}

/// Scale obtained by accumulating `steps` from `root`, mod 12.
pub fn scale_from(root: PitchClass, steps: &[u8; 7]) -> Scale {
    let mut scale = [0u8; 7];
    let mut pc = root % 12;
    for (slot, step) in scale.iter_mut().zip(steps.iter()) {
        *slot = pc;
        pc = (pc + step) % 12;
    }
    scale
}

/// All seven rotations of every family, rooted at `root`.
///
/// Indexed `[family][degree]`.
pub fn get_all_modes(families: &[ModeFamily], root: PitchClass) -> Vec<[Scale; 7]> {
    families
        .iter()
        .map(|family| std::array::from_fn(|degree| scale_from(root, &family.rotation(degree))))
        .collect()
}

/// Precomputed scales for every root, family and degree.
#[derive(Debug, Clone)]
pub struct ModeTable {
    families: Vec<ModeFamily>,
    by_root: Vec<Vec<[Scale; 7]>>,
}

impl ModeTable {
    pub fn new(families: Vec<ModeFamily>) -> Result<Self, HarmonyError> {
        if families.is_empty() {
            return Err(HarmonyError::NoFamilies);
        }
        let by_root = (0..12u8).map(|root| get_all_modes(&families, root)).collect();
        Ok(Self { families, by_root })
    }

    /// Build from raw step lists, as they appear in configuration.
    pub fn from_steps(families: &[Vec<u8>]) -> Result<Self, HarmonyError> {
        let families = families
            .iter()
            .map(|steps| ModeFamily::new(steps))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(families)
    }

    pub fn families(&self) -> &[ModeFamily] {
        &self.families
    }

    /// Every mode rooted at `root`, indexed `[family][degree]`.
    pub fn modes_at(&self, root: PitchClass) -> &[[Scale; 7]] {
        &self.by_root[(root % 12) as usize]
    }

    /// Scale of `mode`, or `None` if its family is not in this table.
    pub fn scale(&self, mode: &Mode) -> Option<&Scale> {
        self.modes_at(mode.root)
            .get(mode.family)
            .and_then(|rotations| rotations.get(mode.degree))
    }
}

impl Default for ModeTable {
    fn default() -> Self {
        let families = vec![ModeFamily::DIATONIC, ModeFamily::HARMONIC_MAJOR];
        let by_root = (0..12u8).map(|root| get_all_modes(&families, root)).collect();
        Self { families, by_root }
    }
}
