//! Session controller.
//!
//! `ExamSession` orchestrates one exam attempt end-to-end: it fetches the
//! exam definition, acquires media, starts the monitors, collects answers,
//! and enforces submission eligibility against the violation threshold.
//!
//! State transitions are strictly forward:
//! Idle -> Loading -> Active -> Submitting -> Closed, plus Active -> Closed
//! on cancel and Loading -> Idle on a failed open (retryable). Every exit
//! path, including dropping the session mid-attempt, funnels through one
//! teardown routine that stops all monitors and releases both media streams.

use anyhow::{anyhow, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::clock::Clock;
use crate::detect::FaceDetector;
use crate::media::MediaHandles;
use crate::monitor::{MonitorSet, VisibilitySignal};
use crate::recorder::ResponseRecorder;
use crate::service::{
    AnswerEntry, ExamDefinition, ExamService, ProctoringReport, SubmissionOutcome,
    SubmissionRequest,
};
use crate::{ProctorError, ViolationLog, VIOLATION_THRESHOLD};

/// Exam lifecycle state. `Closed` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading,
    Active,
    Submitting,
    Closed,
}

/// Device specs for the proctoring grants.
#[derive(Clone, Debug)]
pub struct SessionDevices {
    pub camera: String,
    pub microphone: String,
}

/// Live media handles, monitors, and violation log for one active attempt.
///
/// Created on entry to Active, shut down on every exit path. The media
/// handles are owned exclusively here; no other component may acquire or
/// release them.
pub struct ProctoringContext {
    started_at_ms: u64,
    ended_at_ms: Option<u64>,
    log: ViolationLog,
    media: MediaHandles,
    monitors: MonitorSet,
    visibility: VisibilitySignal,
}

impl ProctoringContext {
    pub fn started_at_ms(&self) -> u64 {
        self.started_at_ms
    }

    pub fn ended_at_ms(&self) -> Option<u64> {
        self.ended_at_ms
    }

    pub fn log(&self) -> &ViolationLog {
        &self.log
    }

    pub fn media(&self) -> &MediaHandles {
        &self.media
    }

    pub fn visibility_signal(&self) -> VisibilitySignal {
        self.visibility.clone()
    }

    /// The single teardown routine: stop monitors, stamp the end time,
    /// release media. Idempotent.
    fn shutdown(&mut self, now_ms: u64) {
        self.monitors.stop();
        if self.ended_at_ms.is_none() {
            self.ended_at_ms = Some(now_ms);
        }
        self.media.release();
    }
}

/// One exam attempt.
pub struct ExamSession {
    exam_id: String,
    devices: SessionDevices,
    state: SessionState,
    exam: Option<ExamDefinition>,
    answers: BTreeMap<u32, String>,
    audio_response_url: Option<String>,
    proctoring: Option<ProctoringContext>,
    recorder: Option<ResponseRecorder>,
    detector: Option<Box<dyn FaceDetector + Send>>,
    service: Arc<dyn ExamService>,
    clock: Arc<dyn Clock>,
}

impl ExamSession {
    pub fn new(
        exam_id: impl Into<String>,
        devices: SessionDevices,
        service: Arc<dyn ExamService>,
        detector: Box<dyn FaceDetector + Send>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            exam_id: exam_id.into(),
            devices,
            state: SessionState::Idle,
            exam: None,
            answers: BTreeMap::new(),
            audio_response_url: None,
            proctoring: None,
            recorder: None,
            detector: Some(detector),
            service,
            clock,
        }
    }

    pub fn exam_id(&self) -> &str {
        &self.exam_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn exam(&self) -> Option<&ExamDefinition> {
        self.exam.as_ref()
    }

    pub fn answer(&self, question_index: u32) -> Option<&str> {
        self.answers.get(&question_index).map(|s| s.as_str())
    }

    pub fn answer_count(&self) -> usize {
        self.answers.len()
    }

    pub fn audio_response_url(&self) -> Option<&str> {
        self.audio_response_url.as_deref()
    }

    pub fn proctoring(&self) -> Option<&ProctoringContext> {
        self.proctoring.as_ref()
    }

    pub fn violation_count(&self) -> usize {
        self.proctoring.as_ref().map(|p| p.log.count()).unwrap_or(0)
    }

    /// Focus-change handle for the embedding layer, available while a
    /// proctoring context exists.
    pub fn visibility_signal(&self) -> Option<VisibilitySignal> {
        self.proctoring.as_ref().map(|p| p.visibility_signal())
    }

    /// Fetch the exam, acquire media, and start the monitors.
    ///
    /// On fetch or media failure the session returns to Idle and the error
    /// is surfaced; the caller may retry.
    pub fn open_exam(&mut self) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(anyhow!(
                "open_exam requires an Idle session (state: {:?})",
                self.state
            ));
        }
        self.state = SessionState::Loading;

        let exam = match self.service.fetch_exam(&self.exam_id) {
            Ok(exam) => exam,
            Err(e) => {
                self.state = SessionState::Idle;
                return Err(e);
            }
        };

        // The exam cannot start without both grants; proctoring is never
        // silently disabled.
        let media = match MediaHandles::acquire(&self.devices) {
            Ok(media) => media,
            Err(e) => {
                self.state = SessionState::Idle;
                return Err(e);
            }
        };

        let detector = match self.detector.take() {
            Some(detector) => detector,
            None => {
                self.state = SessionState::Idle;
                return Err(anyhow!("face detector already consumed by this session"));
            }
        };

        let log = ViolationLog::new();
        let started_at_ms = self.clock.now_ms();
        let (monitors, visibility) = MonitorSet::start(
            media.video(),
            media.audio(),
            detector,
            &log,
            self.clock.clone(),
        );

        self.proctoring = Some(ProctoringContext {
            started_at_ms,
            ended_at_ms: None,
            log,
            media,
            monitors,
            visibility,
        });
        self.exam = Some(exam);
        self.state = SessionState::Active;
        log::info!("exam {} active, proctoring started", self.exam_id);
        Ok(())
    }

    /// Upsert an answer. A duplicate index overwrites the earlier value.
    pub fn record_answer(&mut self, question_index: u32, value: impl Into<String>) -> Result<()> {
        if self.state != SessionState::Active {
            return Err(anyhow!(
                "record_answer requires an Active session (state: {:?})",
                self.state
            ));
        }
        let value = value.into();
        if let Some(previous) = self.answers.insert(question_index, value) {
            log::debug!(
                "answer {} overwritten (previous length {})",
                question_index,
                previous.len()
            );
        }
        Ok(())
    }

    /// Start recording a spoken answer. Listening/speaking exams only; opens
    /// a microphone grant independent of the proctoring one.
    pub fn start_audio_response_capture(&mut self) -> Result<()> {
        if self.state != SessionState::Active {
            return Err(anyhow!(
                "audio capture requires an Active session (state: {:?})",
                self.state
            ));
        }
        let exam = self
            .exam
            .as_ref()
            .ok_or_else(|| anyhow!("no exam loaded"))?;
        if !exam.exam_type.captures_audio_response() {
            return Err(anyhow!(
                "audio responses are not captured for {:?} exams",
                exam.exam_type
            ));
        }
        if self.recorder.is_some() {
            return Err(anyhow!("an answer recording is already in progress"));
        }
        self.recorder = Some(ResponseRecorder::start(&self.devices.microphone)?);
        Ok(())
    }

    /// Stop recording, upload the clip, and store the returned URL.
    ///
    /// An upload failure leaves the session Active with answers intact;
    /// text-only submission stays possible.
    pub fn stop_audio_response_capture(&mut self) -> Result<()> {
        let recorder = self
            .recorder
            .take()
            .ok_or_else(|| anyhow!("no answer recording in progress"))?;
        let wav = recorder.finish()?;
        let url = self.service.upload_audio(&self.exam_id, &wav)?;
        log::info!("answer audio uploaded: {}", url);
        self.audio_response_url = Some(url);
        Ok(())
    }

    /// Submit the attempt.
    ///
    /// Hard gate first: at [`VIOLATION_THRESHOLD`] or more violations the
    /// submission is rejected with `SubmissionBlocked` and no network call is
    /// made. A network failure leaves the session Active with the proctoring
    /// context live, so the user may retry.
    pub fn submit(&mut self) -> Result<SubmissionOutcome> {
        if self.state != SessionState::Active {
            return Err(anyhow!(
                "submit requires an Active session (state: {:?})",
                self.state
            ));
        }
        let context = self
            .proctoring
            .as_ref()
            .ok_or_else(|| anyhow!("no proctoring context"))?;

        let violations = context.log.count();
        if violations >= VIOLATION_THRESHOLD {
            return Err(ProctorError::SubmissionBlocked { violations }.into());
        }

        let request = SubmissionRequest {
            answers: self
                .answers
                .iter()
                .map(|(&question_index, answer)| AnswerEntry {
                    question_index,
                    answer: answer.clone(),
                })
                .collect(),
            audio_url: self.audio_response_url.clone(),
            proctoring: ProctoringReport {
                started_at: context.started_at_ms,
                ended_at: self.clock.now_ms(),
                violations: context.log.snapshot(),
                totals: context.log.totals(),
                blocked_submission: false,
            },
        };

        let outcome = self.service.submit_exam(&self.exam_id, &request)?;

        self.state = SessionState::Submitting;
        self.teardown();
        self.state = SessionState::Closed;
        log::info!(
            "exam {} submitted: success={} score={:?}",
            self.exam_id,
            outcome.success,
            outcome.score
        );
        Ok(outcome)
    }

    /// Tear down proctoring and close the session without a network call.
    /// A no-op once Closed.
    pub fn cancel(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.teardown();
        self.state = SessionState::Closed;
        log::info!("exam {} cancelled", self.exam_id);
    }

    fn teardown(&mut self) {
        if let Some(mut recorder) = self.recorder.take() {
            recorder.abort();
        }
        if let Some(context) = self.proctoring.as_mut() {
            context.shutdown(self.clock.now_ms());
        }
    }
}

impl Drop for ExamSession {
    fn drop(&mut self) {
        // Unmount contract: leaving mid-attempt behaves like cancel().
        if self.state != SessionState::Closed {
            if self.proctoring.is_some() {
                log::info!("exam {} dropped while open; cancelling", self.exam_id);
            }
            self.teardown();
            self.state = SessionState::Closed;
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
