//! Adaptive fixed-order Markov chain over melody or rhythm symbols.
//!
//! Each context of `order` symbols maps to a distribution over the next
//! symbol. A global distribution backs off contexts that were never seen
//! and histories shorter than the order. Tables are `BTreeMap`s, so a
//! seeded RNG reproduces the same sequence.

use std::collections::BTreeMap;

use muses_harmony::chord_model::sample_weighted;
use rand::RngCore;

pub type Distribution<S> = BTreeMap<S, f64>;

#[derive(Debug, Clone)]
pub struct MarkovChain<S: Ord + Copy> {
    order: usize,
    inertia: f64,
    contexts: BTreeMap<Vec<S>, Distribution<S>>,
    global: Distribution<S>,
    trained: bool,
}

impl<S: Ord + Copy> MarkovChain<S> {
    /// `order` must be at least 1; `inertia` in [0, 1] is the weight kept
    /// by old probabilities when a new sequence is learned.
    pub fn new(order: usize, inertia: f64) -> Self {
        Self {
            order: order.max(1),
            inertia: inertia.clamp(0.0, 1.0),
            contexts: BTreeMap::new(),
            global: BTreeMap::new(),
            trained: false,
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn is_trained(&self) -> bool {
        self.trained
    }

    pub fn global(&self) -> &Distribution<S> {
        &self.global
    }

    /// Next-symbol distribution learned for `context`.
    pub fn distribution(&self, context: &[S]) -> Option<&Distribution<S>> {
        self.contexts.get(context)
    }

    /// Fold `sequence` into the model. An empty sequence changes nothing.
    pub fn learn(&mut self, sequence: &[S]) {
        if sequence.is_empty() {
            return;
        }

        let mut counts: BTreeMap<Vec<S>, Distribution<S>> = BTreeMap::new();
        for window in sequence.windows(self.order + 1) {
            let (context, next) = window.split_at(self.order);
            *counts
                .entry(context.to_vec())
                .or_default()
                .entry(next[0])
                .or_insert(0.0) += 1.0;
        }
        let mut unigram = Distribution::new();
        for &symbol in sequence {
            *unigram.entry(symbol).or_insert(0.0) += 1.0;
        }

        if !self.trained {
            self.contexts = counts
                .into_iter()
                .filter_map(|(context, row)| normalized(row).map(|row| (context, row)))
                .collect();
            self.global = normalized(unigram).unwrap_or_default();
            self.trained = true;
            return;
        }

        for (context, row) in counts {
            let Some(empirical) = normalized(row) else {
                continue;
            };
            let old = self.contexts.get(&context);
            if let Some(blend) = blend(old, &empirical, self.inertia) {
                self.contexts.insert(context, blend);
            }
        }
        if let Some(empirical) = normalized(unigram) {
            if let Some(blend) = blend(Some(&self.global), &empirical, self.inertia) {
                self.global = blend;
            }
        }
    }

    /// Sample `length` symbols.
    ///
    /// Each symbol is conditioned on the last `order` generated ones, or on
    /// the global distribution when that context is unknown.
    pub fn generate(&self, length: usize, rng: &mut dyn RngCore) -> Vec<S> {
        debug_assert!(self.trained, "generate called before any learn");
        let mut output: Vec<S> = Vec::with_capacity(length);
        while output.len() < length {
            let row = output
                .len()
                .checked_sub(self.order)
                .and_then(|start| self.contexts.get(&output[start..]))
                .unwrap_or(&self.global);
            match sample_weighted(row, rng).or_else(|| sample_weighted(&self.global, rng)) {
                Some(symbol) => output.push(symbol),
                None => break,
            }
        }
        output
    }
}

fn normalized<S: Ord>(mut row: Distribution<S>) -> Option<Distribution<S>> {
    let total: f64 = row.values().sum();
    if total <= 0.0 {
        return None;
    }
    for p in row.values_mut() {
        *p /= total;
    }
    Some(row)
}

/// `inertia × old + (1 − inertia) × new`, renormalized.
fn blend<S: Ord + Copy>(
    old: Option<&Distribution<S>>,
    new: &Distribution<S>,
    inertia: f64,
) -> Option<Distribution<S>> {
    let mut mixed = Distribution::new();
    if let Some(old) = old {
        for (&symbol, &p) in old {
            *mixed.entry(symbol).or_insert(0.0) += inertia * p;
        }
    }
    for (&symbol, &p) in new {
        *mixed.entry(symbol).or_insert(0.0) += (1.0 - inertia) * p;
    }
    mixed.retain(|_, p| *p > 0.0);
    normalized(mixed)
}
