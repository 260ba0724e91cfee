//! Harmonic analysis for Muses.
//!
//! Infers the prevailing mode from a bag of played pitch classes, resolves
//! chord degrees against that mode's scale, and samples chord progressions.
//! Everything here is pure and synchronous; the engine decides when to call it.

pub mod chord_model;
pub mod chord_templates;
pub mod chords;
pub mod inference;
pub mod modes;
pub mod types;

pub use chord_model::{ChordModel, MarkovChordModel};
pub use chord_templates::ChordQuality;
pub use chords::{resolve_progression, Chord, ToneRole};
pub use inference::{get_root, harmonic_affinities, infer_mode, ModeDetection};
pub use modes::{get_all_modes, ModeFamily, ModeTable};
pub use types::{Degree, Mode, PitchClass, Scale};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarmonyError {
    #[error("interval family must be 7 positive steps summing to 12, got {0:?}")]
    InvalidFamily(Vec<u8>),

    #[error("at least one interval family is required")]
    NoFamilies,

    #[error("failed to read chord model {path}: {source}")]
    ModelRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse chord model: {0}")]
    ModelParse(#[from] serde_json::Error),

    #[error("invalid chord model: {0}")]
    ModelInvalid(String),
}
