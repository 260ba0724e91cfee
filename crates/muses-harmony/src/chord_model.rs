//! Chord progression models.
//!
//! The progression for each phrase is sampled from a [`ChordModel`]. The
//! bundled [`MarkovChordModel`] is a first-order chain over [`Degree`]s that
//! can be replaced by a JSON file of the same shape:
//!
//! ```json
//! {
//!   "initial": { "I": 0.6, "VI": 0.4 },
//!   "transitions": {
//!     "I":  { "IV": 0.5, "V": 0.5 },
//!     "IV": { "V": 1.0 },
//!     "V":  { "I": 0.7, "VI": 0.3 },
//!     "VI": { "IV": 1.0 }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::types::Degree;
use crate::HarmonyError;

/// Source of chord progressions.
pub trait ChordModel: Send + Sync {
    /// Sample `n` chord degrees.
    fn sample(&self, n: usize, rng: &mut dyn RngCore) -> Vec<Degree>;
}

/// Weighted categorical distribution over degrees.
pub type DegreeWeights = BTreeMap<Degree, f64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkovChordModel {
    pub initial: DegreeWeights,
    #[serde(default)]
    pub transitions: BTreeMap<Degree, DegreeWeights>,
}

impl MarkovChordModel {
    /// Common-practice progressions in a major-ish key.
    pub fn builtin() -> Self {
        use Degree::*;

        fn weights(pairs: &[(Degree, f64)]) -> DegreeWeights {
            pairs.iter().copied().collect()
        }

        let initial = weights(&[(I, 0.5), (II, 0.1), (IV, 0.15), (V, 0.1), (VI, 0.15)]);
        let transitions = [
            (I, weights(&[(I, 0.05), (II, 0.1), (III, 0.05), (IV, 0.3), (V, 0.3), (VI, 0.2)])),
            (II, weights(&[(I, 0.1), (IV, 0.15), (V, 0.6), (VII, 0.15)])),
            (III, weights(&[(I, 0.1), (IV, 0.3), (VI, 0.6)])),
            (IV, weights(&[(I, 0.35), (II, 0.1), (IV, 0.05), (V, 0.4), (VI, 0.1)])),
            (V, weights(&[(I, 0.55), (IV, 0.15), (V, 0.05), (VI, 0.25)])),
            (VI, weights(&[(II, 0.25), (III, 0.1), (IV, 0.4), (V, 0.25)])),
            (VII, weights(&[(I, 0.7), (III, 0.2), (VI, 0.1)])),
        ]
        .into_iter()
        .collect();

        Self {
            initial,
            transitions,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, HarmonyError> {
        let model: Self = serde_json::from_str(json)?;
        model.validate()?;
        Ok(model)
    }

    pub fn load(path: &Path) -> Result<Self, HarmonyError> {
        let json = std::fs::read_to_string(path).map_err(|source| HarmonyError::ModelRead {
            path: path.to_path_buf(),
            source,
        })?;
        let model = Self::from_json(&json)?;
        info!(
            path = %path.display(),
            states = model.transitions.len(),
            "loaded chord model"
        );
        Ok(model)
    }

    fn validate(&self) -> Result<(), HarmonyError> {
        check_weights("initial", &self.initial)?;
        for (from, row) in &self.transitions {
            check_weights(&format!("transitions.{from}"), row)?;
        }
        Ok(())
    }
}

impl Default for MarkovChordModel {
    fn default() -> Self {
        Self::builtin()
    }
}

fn check_weights(name: &str, weights: &DegreeWeights) -> Result<(), HarmonyError> {
    if let Some((degree, w)) = weights.iter().find(|(_, w)| !(w.is_finite() && **w >= 0.0)) {
        return Err(HarmonyError::ModelInvalid(format!(
            "{name}: weight for {degree} must be finite and non-negative, got {w}"
        )));
    }
    if weights.values().sum::<f64>() <= 0.0 {
        return Err(HarmonyError::ModelInvalid(format!(
            "{name}: weights must not all be zero"
        )));
    }
    Ok(())
}

/// Draw one key from `weights` in proportion to its weight.
pub fn sample_weighted<K: Copy>(weights: &BTreeMap<K, f64>, rng: &mut dyn RngCore) -> Option<K> {
    let total: f64 = weights.values().sum();
    if total <= 0.0 {
        return None;
    }
    let mut target = rng.gen::<f64>() * total;
    let mut last = None;
    for (&key, &weight) in weights {
        if weight <= 0.0 {
            continue;
        }
        if target < weight {
            return Some(key);
        }
        target -= weight;
        last = Some(key);
    }
    last
}

impl ChordModel for MarkovChordModel {
    fn sample(&self, n: usize, rng: &mut dyn RngCore) -> Vec<Degree> {
        let mut degrees = Vec::with_capacity(n);
        let mut current = None;
        for _ in 0..n {
            let row = current
                .and_then(|d| self.transitions.get(&d))
                .unwrap_or(&self.initial);
            let next = sample_weighted(row, rng).unwrap_or(Degree::I);
            degrees.push(next);
            current = Some(next);
        }
        debug!(?degrees, "sampled chord progression");
        degrees
    }
}
