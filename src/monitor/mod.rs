//! Violation monitors.
//!
//! Each monitor is a cancellable background thread sharing one stop flag.
//! All three append into the session's violation log through a
//! [`ViolationSink`](crate::ViolationSink); none of them read or mutate
//! existing entries.
//!
//! Cadence and debounce timing both read the injected [`Clock`], so the
//! decision logic runs deterministically under a manual clock. Threads sleep
//! in short slices between clock polls, keeping stop latency well under one
//! sampling interval.

pub mod audio;
pub mod face;
pub mod visibility;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::clock::Clock;
use crate::detect::FaceDetector;
use crate::media::{AudioStream, VideoStream};
use crate::ViolationLog;

pub use visibility::{VisibilityRule, VisibilitySignal};

/// Sleep slice between stop-flag and clock polls.
pub(crate) const STOP_POLL_MS: u64 = 25;

/// Per-monitor health counters, logged at teardown.
#[derive(Clone, Copy, Debug, Default)]
pub struct MonitorStats {
    pub ticks: u64,
    pub samples: u64,
    pub errors: u64,
    pub skipped_not_ready: u64,
}

/// Debounce state for one violation rule.
///
/// A rule arms on the first qualifying sample and fires once a later
/// qualifying sample lands past the grace window. Any disqualifying sample
/// resets it to not-started, and firing resets it as well: the firing sample
/// does not seed the next run.
#[derive(Clone, Copy, Debug)]
pub struct DebounceRule {
    grace_ms: u64,
    since_ms: Option<u64>,
}

impl DebounceRule {
    pub fn new(grace_ms: u64) -> Self {
        Self {
            grace_ms,
            since_ms: None,
        }
    }

    /// Feed one sample. Returns true when the violation fires.
    pub fn observe(&mut self, active: bool, now_ms: u64) -> bool {
        if !active {
            self.since_ms = None;
            return false;
        }
        match self.since_ms {
            None => {
                self.since_ms = Some(now_ms);
                false
            }
            Some(since) => {
                if now_ms.saturating_sub(since) > self.grace_ms {
                    self.since_ms = None;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        self.since_ms.is_some()
    }

    pub fn reset(&mut self) {
        self.since_ms = None;
    }
}

/// The running monitor threads for one proctoring context.
///
/// `stop()` is the only way monitors end: it sets the shared flag and joins
/// every thread, so no violation can be appended after it returns.
pub struct MonitorSet {
    stop: Arc<AtomicBool>,
    joins: Vec<(&'static str, JoinHandle<MonitorStats>)>,
}

impl MonitorSet {
    /// Spawn the face, audio, and visibility monitors against live streams.
    ///
    /// Returns the set plus the [`VisibilitySignal`] the embedding layer uses
    /// to report focus changes.
    pub fn start(
        video: Arc<Mutex<VideoStream>>,
        audio: Arc<Mutex<AudioStream>>,
        detector: Box<dyn FaceDetector + Send>,
        log: &ViolationLog,
        clock: Arc<dyn Clock>,
    ) -> (Self, VisibilitySignal) {
        let stop = Arc::new(AtomicBool::new(false));
        let (signal, events) = mpsc::channel();

        let joins = vec![
            (
                "face",
                face::spawn_face_monitor(video, detector, log.sink(), clock.clone(), stop.clone()),
            ),
            (
                "audio",
                audio::spawn_audio_monitor(audio, log.sink(), clock.clone(), stop.clone()),
            ),
            (
                "visibility",
                visibility::spawn_visibility_monitor(events, log.sink(), clock, stop.clone()),
            ),
        ];

        (Self { stop, joins }, VisibilitySignal::new(signal))
    }

    /// Stop all monitors and join their threads. Idempotent.
    pub fn stop(&mut self) {
        if self.stop.swap(true, Ordering::SeqCst) {
            return;
        }
        for (name, join) in self.joins.drain(..) {
            match join.join() {
                Ok(stats) => log::info!(
                    "{} monitor stopped: ticks={} samples={} errors={} skipped_not_ready={}",
                    name,
                    stats.ticks,
                    stats.samples,
                    stats.errors,
                    stats.skipped_not_ready
                ),
                Err(_) => log::error!("{} monitor thread panicked", name),
            }
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn running_threads(&self) -> usize {
        self.joins.len()
    }
}

pub(crate) fn poll_sleep() {
    std::thread::sleep(Duration::from_millis(STOP_POLL_MS));
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debounce_fires_after_grace_and_resets() {
        let mut rule = DebounceRule::new(3_000);
        // Samples every 400ms, all active: fires on the first sample past 3s.
        let mut fired_at = None;
        for tick in 0..9u64 {
            let now = tick * 400;
            if rule.observe(true, now) {
                fired_at = Some(now);
                break;
            }
        }
        assert_eq!(fired_at, Some(3_200));
        assert!(!rule.is_pending(), "firing resets the run");
    }

    #[test]
    fn debounce_resets_on_disqualifying_sample() {
        let mut rule = DebounceRule::new(1_000);
        assert!(!rule.observe(true, 0));
        assert!(!rule.observe(true, 900));
        // Interrupted just before the window expires.
        assert!(!rule.observe(false, 1_000));
        assert!(!rule.observe(true, 1_100));
        assert!(!rule.observe(true, 2_000));
        assert!(rule.observe(true, 2_200));
    }

    #[test]
    fn debounce_inactive_samples_never_fire() {
        let mut rule = DebounceRule::new(5_000);
        for tick in 0..100u64 {
            assert!(!rule.observe(false, tick * 250));
        }
        assert!(!rule.is_pending());
    }

    #[test]
    fn monitor_set_stop_is_idempotent() {
        use crate::clock::ManualClock;
        use crate::detect::SyntheticFaceDetector;

        let video = Arc::new(Mutex::new(
            crate::media::VideoStream::open("stub://camera0").expect("camera"),
        ));
        let audio = Arc::new(Mutex::new(
            crate::media::AudioStream::open("stub://mic0").expect("microphone"),
        ));
        let log = ViolationLog::new();
        let clock = Arc::new(ManualClock::new(0));
        let (mut monitors, _signal) = MonitorSet::start(
            video,
            audio,
            Box::new(SyntheticFaceDetector::new()),
            &log,
            clock,
        );
        assert_eq!(monitors.running_threads(), 3);
        monitors.stop();
        monitors.stop();
        assert!(monitors.is_stopped());
        assert_eq!(monitors.running_threads(), 0);
        assert_eq!(log.count(), 0);
    }
}
