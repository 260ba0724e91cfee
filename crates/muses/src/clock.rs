//! Measure clock
//!
//! Sleeps one measure at a time and turns elapsed measures into cadence
//! signals: every measure for the generator, every phrase for the
//! analyzer. Sleeping goes through [`Timer`] so tests can run the clock
//! without waiting.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use musesconf::TempoConfig;
use tracing::{info, warn};

use crate::mailbox::{FrameCell, Mailbox};

/// Something that can wait.
pub trait Timer: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Wall-clock timer backed by `thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealTimer;

impl Timer for RealTimer {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Timer that records requested sleeps and returns immediately.
#[derive(Debug, Clone, Default)]
pub struct RecordingTimer {
    slept: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.slept.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn total(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

impl Timer for RecordingTimer {
    fn sleep(&self, duration: Duration) {
        if let Ok(mut slept) = self.slept.lock() {
            slept.push(duration);
        }
    }
}

/// Tempo in musical time: how long beats and measures last.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo {
    pub bpm: f64,
    pub beats_per_measure: u32,
}

impl Tempo {
    pub fn new(bpm: f64, beats_per_measure: u32) -> Self {
        Self {
            bpm,
            beats_per_measure,
        }
    }

    pub fn beat_duration(&self) -> Duration {
        Duration::from_secs_f64(60.0 / self.bpm)
    }

    pub fn measure_duration(&self) -> Duration {
        self.beats(self.beats_per_measure as f64)
    }

    /// Wall-clock length of `beats` quarter notes.
    pub fn beats(&self, beats: f64) -> Duration {
        Duration::from_secs_f64(beats * 60.0 / self.bpm)
    }

    /// Quarter notes spanned by `duration`.
    pub fn to_beats(&self, duration: Duration) -> f64 {
        duration.as_secs_f64() * self.bpm / 60.0
    }
}

impl From<&TempoConfig> for Tempo {
    fn from(config: &TempoConfig) -> Self {
        Self::new(config.bpm, config.beats_per_measure)
    }
}

/// One elapsed measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTick {
    /// Measures elapsed since start, from 0.
    pub measure: u64,
    /// Position within the phrase, 0 ≤ bar < measures per phrase.
    pub bar_in_phrase: u32,
}

/// Request for the analyzer to start a new phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleChangeRequest {
    pub phrase: u64,
    pub measure: u64,
}

/// Counts measures and decides when a phrase begins.
pub struct MeasureClock {
    tempo: Tempo,
    measures_per_phrase: u32,
    counter: u32,
    measure: u64,
    phrase: u64,
    timer: Arc<dyn Timer>,
}

impl MeasureClock {
    pub fn new(tempo: Tempo, measures_per_phrase: u32, timer: Arc<dyn Timer>) -> Self {
        Self {
            tempo,
            measures_per_phrase: measures_per_phrase.max(1),
            counter: 0,
            measure: 0,
            phrase: 0,
            timer,
        }
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    /// Sleep one measure and advance.
    ///
    /// Returns the tick and, at the first measure of each phrase, the scale
    /// change to request.
    pub fn advance(&mut self) -> (ClockTick, Option<ScaleChangeRequest>) {
        self.timer.sleep(self.tempo.measure_duration());

        let tick = ClockTick {
            measure: self.measure,
            bar_in_phrase: self.counter,
        };
        let request = (self.counter == 0).then(|| {
            let request = ScaleChangeRequest {
                phrase: self.phrase,
                measure: self.measure,
            };
            self.phrase += 1;
            request
        });

        self.counter = (self.counter + 1) % self.measures_per_phrase;
        self.measure += 1;
        (tick, request)
    }

    /// Drive the signals forever.
    ///
    /// At a phrase start the frame is invalidated before the scale change is
    /// requested, so a generator woken by the same measure waits for the
    /// analyzer's new frame.
    pub fn run<F: Clone>(
        mut self,
        frame: &FrameCell<F>,
        scale_change: &Mailbox<ScaleChangeRequest>,
        measure_elapsed: &Mailbox<ClockTick>,
    ) {
        loop {
            self.step(frame, scale_change, measure_elapsed);
        }
    }

    /// One iteration of [`run`](Self::run).
    pub fn step<F: Clone>(
        &mut self,
        frame: &FrameCell<F>,
        scale_change: &Mailbox<ScaleChangeRequest>,
        measure_elapsed: &Mailbox<ClockTick>,
    ) -> ClockTick {
        let (tick, request) = self.advance();
        info!(
            measure = tick.measure,
            "[measure {}/{}]",
            tick.bar_in_phrase + 1,
            self.measures_per_phrase
        );

        if let Some(request) = request {
            frame.invalidate();
            if scale_change.post(request) {
                warn!(phrase = request.phrase, "previous scale change was never taken");
            }
        }

        if measure_elapsed.post(tick) {
            warn!(measure = tick.measure, "previous measure was never taken");
        }
        tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn clock(bpm: f64, phrase: u32) -> (MeasureClock, RecordingTimer) {
        let timer = RecordingTimer::new();
        let clock = MeasureClock::new(Tempo::new(bpm, 4), phrase, Arc::new(timer.clone()));
        (clock, timer)
    }

    #[test]
    fn measure_duration_at_74_bpm() {
        let tempo = Tempo::new(74.0, 4);
        let secs = tempo.measure_duration().as_secs_f64();
        assert!((secs - 3.243).abs() < 0.001, "got {secs}");
        assert!((tempo.beat_duration().as_secs_f64() - 60.0 / 74.0).abs() < 1e-9);
    }

    #[test]
    fn beats_round_trip() {
        let tempo = Tempo::new(120.0, 4);
        assert_eq!(tempo.beats(1.0), Duration::from_millis(500));
        assert!((tempo.to_beats(Duration::from_millis(250)) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn one_scale_change_per_phrase() {
        let (mut clock, timer) = clock(74.0, 4);
        let requests: Vec<_> = (0..4).filter_map(|_| clock.advance().1).collect();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].measure, 0);

        let more: Vec<_> = (0..8).filter_map(|_| clock.advance().1).collect();
        assert_eq!(
            more.iter().map(|r| (r.phrase, r.measure)).collect::<Vec<_>>(),
            vec![(1, 4), (2, 8)]
        );
        assert_eq!(timer.sleeps().len(), 12);
    }

    #[test]
    fn bar_in_phrase_wraps() {
        let (mut clock, _) = clock(120.0, 3);
        let bars: Vec<u32> = (0..7).map(|_| clock.advance().0.bar_in_phrase).collect();
        assert_eq!(bars, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn four_ticks_sleep_four_measures() {
        let (mut clock, timer) = clock(74.0, 4);
        for _ in 0..4 {
            clock.advance();
        }
        assert!((timer.total().as_secs_f64() - 4.0 * 240.0 / 74.0).abs() < 1e-6);
    }

    #[test]
    fn step_invalidates_frame_then_posts() {
        let (mut clock, _) = clock(120.0, 2);
        let frame = FrameCell::new();
        let scale_change = Mailbox::new();
        let measure = Mailbox::new();
        frame.publish("old");

        let tick = clock.step(&frame, &scale_change, &measure);
        assert_eq!(tick.bar_in_phrase, 0);
        assert_eq!(frame.current(), None);
        assert_eq!(scale_change.try_take().map(|r| r.phrase), Some(0));
        assert_eq!(measure.try_take(), Some(tick));

        frame.publish("new");
        clock.step(&frame, &scale_change, &measure);
        assert_eq!(frame.current(), Some("new"));
        assert_eq!(scale_change.try_take(), None);
    }
}
