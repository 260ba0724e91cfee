use crate::types::{note_name, PitchClass};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChordQuality {
    Major,
    Minor,
    Diminished,
    Augmented,
    Suspended4,
    Suspended2,
}

/// Chord quality plus the interval set it covers, as a bitmask over 12 pitch classes.
pub struct ChordTemplate {
    pub quality: ChordQuality,
    pub suffix: &'static str,
    pub intervals: u16,
}

impl ChordTemplate {
    const fn new(quality: ChordQuality, suffix: &'static str, intervals: &[u8]) -> Self {
        let mut mask = 0u16;
        let mut i = 0;
        while i < intervals.len() {
            mask |= 1 << intervals[i];
            i += 1;
        }
        Self {
            quality,
            suffix,
            intervals: mask,
        }
    }
}

/// Stacked-third triads that a seven-note scale can produce.
pub static TEMPLATES: &[ChordTemplate] = &[
    ChordTemplate::new(ChordQuality::Major, "", &[0, 4, 7]),
    ChordTemplate::new(ChordQuality::Minor, "m", &[0, 3, 7]),
    ChordTemplate::new(ChordQuality::Diminished, "dim", &[0, 3, 6]),
    ChordTemplate::new(ChordQuality::Augmented, "aug", &[0, 4, 8]),
    ChordTemplate::new(ChordQuality::Suspended4, "sus4", &[0, 5, 7]),
    ChordTemplate::new(ChordQuality::Suspended2, "sus2", &[0, 2, 7]),
];

/// Convert a set of pitch classes to an interval bitmask relative to a root.
fn to_interval_mask(pitch_classes: &[PitchClass], root: PitchClass) -> u16 {
    pitch_classes
        .iter()
        .fold(0u16, |mask, &pc| mask | 1 << ((pc % 12 + 12 - root % 12) % 12))
}

/// Find the template whose intervals exactly equal `pitch_classes` above `root`.
pub fn identify(root: PitchClass, pitch_classes: &[PitchClass]) -> Option<&'static ChordTemplate> {
    let mask = to_interval_mask(pitch_classes, root);
    TEMPLATES.iter().find(|t| t.intervals == mask)
}

/// Chord symbol for a triad built on `root`, e.g. "Dm" or "Bdim".
///
/// Triads outside the template set are spelled out, e.g. "C(C-D-F#)".
pub fn chord_symbol(
    root: PitchClass,
    pitch_classes: &[PitchClass],
    use_flats: bool,
) -> (String, Option<ChordQuality>) {
    let root_name = note_name(root, use_flats);
    match identify(root, pitch_classes) {
        Some(template) => (format!("{}{}", root_name, template.suffix), Some(template.quality)),
        None => {
            let spelled: Vec<&str> = pitch_classes
                .iter()
                .map(|&pc| note_name(pc, use_flats))
                .collect();
            (format!("{}({})", root_name, spelled.join("-")), None)
        }
    }
}
