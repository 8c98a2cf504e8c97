//! Proctored-exam session kernel.
//!
//! This crate implements the client-side controller for one proctored exam
//! attempt: media acquisition, violation monitoring, and submission gating.
//!
//! # Architecture
//!
//! One exam attempt is orchestrated end-to-end by the `ExamSession`
//! controller. When an exam opens, the controller acquires the camera and
//! microphone, then starts three monitors that feed a shared append-only
//! violation log:
//!
//! - **Face monitor**: samples the video stream through a face detector and
//!   classifies no-face and multi-face conditions with debounce windows.
//! - **Audio monitor**: samples microphone signal energy and classifies
//!   sustained loud/speech conditions.
//! - **Visibility monitor**: watches for the exam surface losing focus and
//!   classifies absences that outlast a grace period.
//!
//! Once the violation count reaches [`VIOLATION_THRESHOLD`], submission is
//! rejected without a network call. Every exit path (submit, cancel, drop)
//! funnels through one teardown routine that stops all monitors and releases
//! both media streams exactly once.
//!
//! # Module Structure
//!
//! - `media`: camera/microphone acquisition and exclusive stream ownership
//! - `detect`: face-detection capability seam
//! - `monitor`: the three monitors and their debounce state machines
//! - `service`: exam fetch / submission / upload collaborator contracts
//! - `session`: the session controller and proctoring context

use serde::Serialize;
use std::sync::{Arc, Mutex};

pub mod clock;
pub mod config;
pub mod detect;
pub mod media;
pub mod monitor;
pub mod recorder;
pub mod service;
pub mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ProctorConfig;
pub use detect::{FaceDetector, ScriptedFaceDetector, SyntheticFaceDetector};
pub use media::{AudioChunk, MediaHandles, VideoFrame};
pub use monitor::{DebounceRule, MonitorStats, VisibilitySignal};
pub use service::{
    AnswerEntry, ExamDefinition, ExamService, ExamType, HttpExamService, MockExamService,
    ProctoringReport, Question, SubmissionOutcome, SubmissionRequest,
};
pub use session::{ExamSession, ProctoringContext, SessionDevices, SessionState};

// -------------------- Fixed Policy Constants --------------------

/// Violation count at which submission is permanently rejected.
pub const VIOLATION_THRESHOLD: usize = 3;

/// Face monitor sampling cadence.
pub const FACE_SAMPLE_INTERVAL_MS: u64 = 400;
/// Audio monitor sampling cadence, independent of the face cadence.
pub const AUDIO_SAMPLE_INTERVAL_MS: u64 = 250;

/// Contiguous zero-face time required before `no_face` fires.
pub const NO_FACE_GRACE_MS: u64 = 3_000;
/// Contiguous multi-face time required before `multi_face` fires.
pub const MULTI_FACE_GRACE_MS: u64 = 1_000;
/// Contiguous over-threshold time required before `speech_detected` fires.
pub const SPEECH_GRACE_MS: u64 = 5_000;
/// Hidden/blurred time required before `tab_hidden_or_blur` fires.
pub const VISIBILITY_GRACE_MS: u64 = 3_000;

/// RMS energy above which a sample counts toward `speech_detected`.
pub const SPEECH_RMS_THRESHOLD: f32 = 0.1;

// -------------------- Violations --------------------

/// Detected anomaly classes, serialized with the wire `type` strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ViolationKind {
    #[serde(rename = "no_face")]
    NoFace,
    #[serde(rename = "multi_face")]
    MultiFace,
    #[serde(rename = "speech_detected")]
    SpeechDetected,
    #[serde(rename = "tab_hidden_or_blur")]
    TabHiddenOrBlur,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::NoFace => "no_face",
            ViolationKind::MultiFace => "multi_face",
            ViolationKind::SpeechDetected => "speech_detected",
            ViolationKind::TabHiddenOrBlur => "tab_hidden_or_blur",
        }
    }
}

/// One detected anomaly.
///
/// Violations are constructed only by the monitors through a
/// [`ViolationSink`] and are immutable once appended. The timestamp is the
/// debounce-expiry time, not the first observation of the condition.
#[derive(Clone, Debug, Serialize)]
pub struct Violation {
    #[serde(rename = "type")]
    kind: ViolationKind,
    at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<serde_json::Value>,
}

impl Violation {
    pub fn kind(&self) -> ViolationKind {
        self.kind
    }

    /// Milliseconds since epoch at which the debounce window expired.
    pub fn at_ms(&self) -> u64 {
        self.at
    }

    pub fn detail(&self) -> Option<&serde_json::Value> {
        self.detail.as_ref()
    }
}

/// Per-kind violation counters for the submission payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationTotals {
    pub no_face: usize,
    pub multi_face: usize,
    pub speech: usize,
    pub tab: usize,
}

/// Append-only violation log owned by the session controller.
///
/// Monitors receive a [`ViolationSink`] and can only append; entries are
/// never reordered, mutated, or removed. Appends from any monitor thread at
/// any time are tolerated.
#[derive(Clone, Debug, Default)]
pub struct ViolationLog {
    entries: Arc<Mutex<Vec<Violation>>>,
}

impl ViolationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append-only handle for a monitor.
    pub fn sink(&self) -> ViolationSink {
        ViolationSink {
            entries: self.entries.clone(),
        }
    }

    pub fn count(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn snapshot(&self) -> Vec<Violation> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn totals(&self) -> ViolationTotals {
        let mut totals = ViolationTotals::default();
        for violation in self.snapshot() {
            match violation.kind {
                ViolationKind::NoFace => totals.no_face += 1,
                ViolationKind::MultiFace => totals.multi_face += 1,
                ViolationKind::SpeechDetected => totals.speech += 1,
                ViolationKind::TabHiddenOrBlur => totals.tab += 1,
            }
        }
        totals
    }
}

/// Append-only handle into a [`ViolationLog`].
#[derive(Clone, Debug)]
pub struct ViolationSink {
    entries: Arc<Mutex<Vec<Violation>>>,
}

impl ViolationSink {
    pub fn record(&self, kind: ViolationKind, at_ms: u64, detail: Option<serde_json::Value>) {
        log::warn!("violation: {} at={}ms", kind.as_str(), at_ms);
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(Violation {
                kind,
                at: at_ms,
                detail,
            });
        }
    }
}

// -------------------- Error Taxonomy --------------------

/// Failure classes surfaced by the session controller.
///
/// Raised through `anyhow::Error`; callers classify by downcasting.
#[derive(Clone, Debug)]
pub enum ProctorError {
    /// Camera or microphone denied or missing. Fatal to starting the exam.
    MediaUnavailable { reason: String },
    /// Face-detection capability not loaded. Degraded, not fatal.
    ModelNotReady,
    /// Violation count reached the threshold. No network call is attempted.
    SubmissionBlocked { violations: usize },
    /// Transient transport failure. Session state is preserved for retry.
    Network {
        operation: &'static str,
        reason: String,
    },
    /// Answer-audio upload failed. Text-only submission stays possible.
    Upload { reason: String },
}

impl std::fmt::Display for ProctorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProctorError::MediaUnavailable { reason } => {
                write!(f, "media unavailable: {}", reason)
            }
            ProctorError::ModelNotReady => write!(f, "face-detection model not ready"),
            ProctorError::SubmissionBlocked { violations } => write!(
                f,
                "submission blocked: {} violations recorded (threshold {})",
                violations, VIOLATION_THRESHOLD
            ),
            ProctorError::Network { operation, reason } => {
                write!(f, "network failure during {}: {}", operation, reason)
            }
            ProctorError::Upload { reason } => write!(f, "audio upload failed: {}", reason),
        }
    }
}

impl std::error::Error for ProctorError {}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn violation_log_appends_in_order() {
        let log = ViolationLog::new();
        let sink = log.sink();
        sink.record(ViolationKind::NoFace, 3_000, None);
        sink.record(ViolationKind::MultiFace, 4_000, None);
        sink.record(ViolationKind::NoFace, 7_000, None);

        let entries = log.snapshot();
        assert_eq!(log.count(), 3);
        assert_eq!(entries[0].kind(), ViolationKind::NoFace);
        assert_eq!(entries[1].kind(), ViolationKind::MultiFace);
        assert_eq!(entries[2].at_ms(), 7_000);

        let totals = log.totals();
        assert_eq!(totals.no_face, 2);
        assert_eq!(totals.multi_face, 1);
        assert_eq!(totals.speech, 0);
        assert_eq!(totals.tab, 0);
    }

    #[test]
    fn violation_log_tolerates_interleaved_appends() {
        let log = ViolationLog::new();
        let mut joins = Vec::new();
        for kind in [ViolationKind::SpeechDetected, ViolationKind::TabHiddenOrBlur] {
            let sink = log.sink();
            joins.push(std::thread::spawn(move || {
                for i in 0..50 {
                    sink.record(kind, i, None);
                }
            }));
        }
        for join in joins {
            join.join().expect("append thread");
        }
        assert_eq!(log.count(), 100);
        let totals = log.totals();
        assert_eq!(totals.speech, 50);
        assert_eq!(totals.tab, 50);
    }

    #[test]
    fn violation_serializes_with_wire_type_strings() {
        let log = ViolationLog::new();
        log.sink().record(
            ViolationKind::MultiFace,
            1_234,
            Some(serde_json::json!({ "faceCount": 3 })),
        );
        let value = serde_json::to_value(&log.snapshot()[0]).expect("serialize violation");
        assert_eq!(value["type"], "multi_face");
        assert_eq!(value["at"], 1_234);
        assert_eq!(value["detail"]["faceCount"], 3);
    }

    #[test]
    fn error_display_names_the_threshold() {
        let err = ProctorError::SubmissionBlocked { violations: 4 };
        assert!(err.to_string().contains("threshold 3"));
    }
}
