//! Shared handoffs between engine threads.
//!
//! [`Mailbox`] carries cadence signals and playback packets: one slot,
//! latest post wins, an unconsumed value is replaced. [`FrameCell`] holds
//! the current harmonic frame and lets readers wait until it is valid.
//! [`NoteBuffer`] collects the pitch classes of a phrase; appending never
//! blocks on the reader.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use muses_harmony::PitchClass;

fn relock<'a, T>(
    result: Result<MutexGuard<'a, T>, PoisonError<MutexGuard<'a, T>>>,
) -> MutexGuard<'a, T> {
    // Slots only ever hold complete values, so a poisoned lock is still usable.
    result.unwrap_or_else(PoisonError::into_inner)
}

/// Capacity-one, latest-wins handoff.
#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Mutex<Option<T>>,
    ready: Condvar,
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    /// Store `value`, replacing anything not yet taken.
    ///
    /// Returns `true` when an earlier value was overwritten.
    pub fn post(&self, value: T) -> bool {
        let mut slot = relock(self.slot.lock());
        let overwritten = slot.replace(value).is_some();
        self.ready.notify_one();
        overwritten
    }

    /// Block until a value is posted, then take it.
    pub fn take(&self) -> T {
        let mut slot = relock(self.slot.lock());
        loop {
            if let Some(value) = slot.take() {
                return value;
            }
            slot = relock(self.ready.wait(slot));
        }
    }

    pub fn try_take(&self) -> Option<T> {
        relock(self.slot.lock()).take()
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct FrameState<T> {
    value: Option<T>,
    current: bool,
    publishes: u64,
}

/// The current value of something that is periodically rebuilt.
///
/// Between [`invalidate`](Self::invalidate) and the next
/// [`publish`](Self::publish), [`wait_current`](Self::wait_current) blocks.
#[derive(Debug)]
pub struct FrameCell<T> {
    state: Mutex<FrameState<T>>,
    published: Condvar,
}

impl<T: Clone> FrameCell<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FrameState {
                value: None,
                current: false,
                publishes: 0,
            }),
            published: Condvar::new(),
        }
    }

    /// Mark the held value stale.
    pub fn invalidate(&self) {
        relock(self.state.lock()).current = false;
    }

    /// Replace the value and wake every waiter.
    pub fn publish(&self, value: T) {
        let mut state = relock(self.state.lock());
        state.value = Some(value);
        state.current = true;
        state.publishes += 1;
        self.published.notify_all();
    }

    /// How many values have been published so far.
    pub fn publish_count(&self) -> u64 {
        relock(self.state.lock()).publishes
    }

    /// Block until a value has been published since the last invalidation.
    pub fn wait_current(&self) -> T {
        let mut state = relock(self.state.lock());
        loop {
            if state.current {
                if let Some(value) = &state.value {
                    return value.clone();
                }
            }
            state = relock(self.published.wait(state));
        }
    }

    /// The held value if it is current.
    pub fn current(&self) -> Option<T> {
        let state = relock(self.state.lock());
        if state.current {
            state.value.clone()
        } else {
            None
        }
    }
}

impl<T: Clone> Default for FrameCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
struct NoteBufferState {
    pitch_classes: Vec<PitchClass>,
    batches: u64,
    closed: bool,
}

/// Pitch classes heard since the last scale change.
///
/// The listener appends whole batches; the analyzer takes everything at
/// once. Neither side waits for the other except at startup.
#[derive(Debug, Default)]
pub struct NoteBuffer {
    state: Mutex<NoteBufferState>,
    filled: Condvar,
}

impl NoteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one batch worth of pitch classes. Counts as a batch even when
    /// it carries no note-ons.
    pub fn push_batch(&self, pitch_classes: impl IntoIterator<Item = PitchClass>) {
        let mut state = relock(self.state.lock());
        state.pitch_classes.extend(pitch_classes);
        state.batches += 1;
        self.filled.notify_all();
    }

    /// Block until the first batch arrives.
    ///
    /// Returns `false` if the buffer was closed before any batch.
    pub fn wait_first_batch(&self) -> bool {
        let mut state = relock(self.state.lock());
        loop {
            if state.batches > 0 {
                return true;
            }
            if state.closed {
                return false;
            }
            state = relock(self.filled.wait(state));
        }
    }

    /// Everything appended since the last take.
    pub fn take(&self) -> Vec<PitchClass> {
        std::mem::take(&mut relock(self.state.lock()).pitch_classes)
    }

    /// No more batches will come.
    pub fn close(&self) {
        relock(self.state.lock()).closed = true;
        self.filled.notify_all();
    }

    pub fn len(&self) -> usize {
        relock(self.state.lock()).pitch_classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn batches(&self) -> u64 {
        relock(self.state.lock()).batches
    }
}
