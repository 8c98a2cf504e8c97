//! Exam service collaborator contracts.
//!
//! The grading backend is an opaque collaborator reachable over HTTP. This
//! module carries the wire shapes the session controller actually consumes
//! and two implementations of the [`ExamService`] seam: [`HttpExamService`]
//! for a real backend and [`MockExamService`] for tests and the synthetic
//! demo run.

pub mod http;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::{Violation, ViolationTotals};

pub use http::HttpExamService;

/// Exam kind; determines which answer-capture flow and payload shape apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamType {
    Quiz,
    Written,
    /// Covers the combined listening/speaking capture flow.
    Listening,
}

impl ExamType {
    /// Whether this exam type records a spoken answer.
    pub fn captures_audio_response(&self) -> bool {
        matches!(self, ExamType::Listening)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    /// Present only for quiz grading done server-side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

/// Exam definition as fetched from the service.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamDefinition {
    pub exam_id: String,
    #[serde(rename = "type")]
    pub exam_type: ExamType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passing_score: Option<u32>,
    pub questions: Vec<Question>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEntry {
    pub question_index: u32,
    pub answer: String,
}

/// Proctoring summary attached to every submission.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProctoringReport {
    pub started_at: u64,
    pub ended_at: u64,
    pub violations: Vec<Violation>,
    pub totals: ViolationTotals,
    pub blocked_submission: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    pub answers: Vec<AnswerEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    pub proctoring: ProctoringReport,
}

/// Grading response. Quiz exams carry score/passed; written and listening
/// exams are acknowledged only and graded out-of-band.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed: Option<bool>,
}

/// The exam service seam consumed by the session controller.
pub trait ExamService: Send + Sync {
    /// Fetch the exam definition for an attempt.
    fn fetch_exam(&self, exam_id: &str) -> Result<ExamDefinition>;

    /// Submit answers plus the proctoring summary.
    fn submit_exam(&self, exam_id: &str, request: &SubmissionRequest) -> Result<SubmissionOutcome>;

    /// Upload a recorded answer clip; returns the stored URL.
    fn upload_audio(&self, exam_id: &str, wav_bytes: &[u8]) -> Result<String>;
}

// ----------------------------------------------------------------------------
// In-memory service for tests and the synthetic demo
// ----------------------------------------------------------------------------

/// In-memory [`ExamService`] that records every call and can be scripted to
/// fail, for exercising retry paths without a backend.
#[derive(Default)]
pub struct MockExamService {
    exams: Mutex<HashMap<String, ExamDefinition>>,
    submissions: Mutex<Vec<(String, SubmissionRequest)>>,
    uploads: Mutex<Vec<(String, usize)>>,
    outcome: Mutex<SubmissionOutcome>,
    fail_fetch: AtomicBool,
    fail_submit: AtomicBool,
    fail_upload: AtomicBool,
}

impl MockExamService {
    pub fn new() -> Self {
        Self {
            outcome: Mutex::new(SubmissionOutcome {
                success: true,
                score: None,
                passed: None,
            }),
            ..Self::default()
        }
    }

    pub fn insert_exam(&self, exam: ExamDefinition) {
        if let Ok(mut exams) = self.exams.lock() {
            exams.insert(exam.exam_id.clone(), exam);
        }
    }

    pub fn set_outcome(&self, outcome: SubmissionOutcome) {
        if let Ok(mut current) = self.outcome.lock() {
            *current = outcome;
        }
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_submit(&self, fail: bool) {
        self.fail_submit.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_upload(&self, fail: bool) {
        self.fail_upload.store(fail, Ordering::SeqCst);
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn last_submission(&self) -> Option<SubmissionRequest> {
        self.submissions
            .lock()
            .ok()
            .and_then(|s| s.last().map(|(_, request)| request.clone()))
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().map(|u| u.len()).unwrap_or(0)
    }
}

impl ExamService for MockExamService {
    fn fetch_exam(&self, exam_id: &str) -> Result<ExamDefinition> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(crate::ProctorError::Network {
                operation: "exam fetch",
                reason: "mock failure".to_string(),
            }
            .into());
        }
        self.exams
            .lock()
            .ok()
            .and_then(|exams| exams.get(exam_id).cloned())
            .ok_or_else(|| anyhow!("exam not found: {}", exam_id))
    }

    fn submit_exam(&self, exam_id: &str, request: &SubmissionRequest) -> Result<SubmissionOutcome> {
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(crate::ProctorError::Network {
                operation: "submission",
                reason: "mock failure".to_string(),
            }
            .into());
        }
        if let Ok(mut submissions) = self.submissions.lock() {
            submissions.push((exam_id.to_string(), request.clone()));
        }
        Ok(self
            .outcome
            .lock()
            .map(|outcome| *outcome)
            .unwrap_or_default())
    }

    fn upload_audio(&self, exam_id: &str, wav_bytes: &[u8]) -> Result<String> {
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(crate::ProctorError::Upload {
                reason: "mock failure".to_string(),
            }
            .into());
        }
        if let Ok(mut uploads) = self.uploads.lock() {
            uploads.push((exam_id.to_string(), wav_bytes.len()));
        }
        Ok(format!("https://cdn.example.test/audio/{}.wav", exam_id))
    }
}
