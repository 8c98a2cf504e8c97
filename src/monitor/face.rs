//! Face monitor.
//!
//! Samples the video stream every [`FACE_SAMPLE_INTERVAL_MS`] through the
//! face-detection capability and classifies two independent conditions:
//!
//! - **no_face**: a contiguous run of zero-count samples longer than 3s
//! - **multi_face**: a contiguous run of count >= 2 samples longer than 1s
//!
//! Both rules run independently and may both fire within the same sampling
//! period if conditions alternate. A not-ready detector skips the tick
//! (degraded, not fatal); a failing detector call is counted and the loop
//! continues on the next tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::clock::Clock;
use crate::detect::FaceDetector;
use crate::media::VideoStream;
use crate::monitor::{poll_sleep, DebounceRule, MonitorStats};
use crate::{
    ViolationKind, ViolationSink, FACE_SAMPLE_INTERVAL_MS, MULTI_FACE_GRACE_MS, NO_FACE_GRACE_MS,
};

/// What one face-count sample produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FaceFindings {
    pub no_face: bool,
    /// Observed count when the multi-face window expired.
    pub multi_face: Option<usize>,
}

/// The pure per-condition debounce pair, driven by face-count samples.
#[derive(Clone, Copy, Debug)]
pub struct FaceRules {
    no_face: DebounceRule,
    multi_face: DebounceRule,
}

impl FaceRules {
    pub fn new() -> Self {
        Self {
            no_face: DebounceRule::new(NO_FACE_GRACE_MS),
            multi_face: DebounceRule::new(MULTI_FACE_GRACE_MS),
        }
    }

    /// Feed one face-count sample into both rules.
    pub fn observe(&mut self, count: usize, now_ms: u64) -> FaceFindings {
        FaceFindings {
            no_face: self.no_face.observe(count == 0, now_ms),
            multi_face: self
                .multi_face
                .observe(count >= 2, now_ms)
                .then_some(count),
        }
    }
}

impl Default for FaceRules {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn spawn_face_monitor(
    video: Arc<Mutex<VideoStream>>,
    mut detector: Box<dyn FaceDetector + Send>,
    sink: ViolationSink,
    clock: Arc<dyn Clock>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<MonitorStats> {
    // Baseline the cadence at monitor start, not at first thread schedule:
    // a clock advance right after start must count as one elapsed interval.
    let mut last_tick = clock.now_ms();
    std::thread::spawn(move || {
        let mut stats = MonitorStats::default();
        let mut rules = FaceRules::new();
        let mut warned_not_ready = false;

        loop {
            if stop.load(Ordering::SeqCst) {
                break;
            }
            poll_sleep();
            let now = clock.now_ms();
            if now.saturating_sub(last_tick) < FACE_SAMPLE_INTERVAL_MS {
                continue;
            }
            last_tick = now;
            stats.ticks += 1;

            if !detector.is_ready() {
                stats.skipped_not_ready += 1;
                if !warned_not_ready {
                    log::warn!(
                        "face detector '{}' not ready; sampling degraded for this session",
                        detector.name()
                    );
                    warned_not_ready = true;
                }
                continue;
            }

            let frame = {
                let Ok(mut stream) = video.lock() else {
                    break;
                };
                match stream.next_frame() {
                    Ok(frame) => frame,
                    Err(e) => {
                        stats.errors += 1;
                        log::debug!("face monitor: frame capture failed: {}", e);
                        continue;
                    }
                }
            };

            let count = match detector.count_faces(&frame) {
                Ok(count) => count,
                Err(e) => {
                    stats.errors += 1;
                    log::debug!("face monitor: detection failed: {}", e);
                    continue;
                }
            };
            stats.samples += 1;
            log::debug!("face monitor: seq={} count={}", frame.seq, count);

            let findings = rules.observe(count, now);
            if stop.load(Ordering::SeqCst) {
                break;
            }
            if findings.no_face {
                sink.record(ViolationKind::NoFace, now, None);
            }
            if let Some(observed) = findings.multi_face {
                sink.record(
                    ViolationKind::MultiFace,
                    now,
                    Some(serde_json::json!({ "faceCount": observed })),
                );
            }
        }

        stats
    })
}
