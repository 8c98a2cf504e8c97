//! Face-detection capability seam.
//!
//! The face monitor only consumes a face count per frame; the model behind
//! it is an external capability. [`FaceDetector`] is the boundary:
//! implementations must not retain frames beyond the `count_faces` call and
//! must report readiness honestly, because a not-ready detector degrades the
//! session (sampling is skipped) rather than failing it.

use anyhow::{anyhow, Result};

use crate::media::VideoFrame;

/// Face-detection backend trait.
pub trait FaceDetector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// True once the underlying model is loaded. Sampling is skipped while
    /// this is false.
    fn is_ready(&self) -> bool;

    /// Count faces visible in a frame.
    ///
    /// Implementations must treat the frame as read-only and ephemeral. A
    /// single failing call does not stop the monitor loop.
    fn count_faces(&mut self, frame: &VideoFrame) -> Result<usize>;
}

/// Build a detector from a config spec.
pub fn detector_from_spec(spec: &str) -> Result<Box<dyn FaceDetector + Send>> {
    match spec {
        "synthetic" => Ok(Box::new(SyntheticFaceDetector::new())),
        "unready" => Ok(Box::new(SyntheticFaceDetector::not_ready())),
        other => Err(anyhow!(
            "unknown detector '{}'; expected 'synthetic' or 'unready'",
            other
        )),
    }
}

pub(crate) fn validate_detector_spec(spec: &str) -> Result<()> {
    detector_from_spec(spec).map(|_| ())
}

/// Synthetic detector for stub streams.
///
/// Derives a stable one-face reading from frame content, so a live synthetic
/// session accumulates zero face violations. The `not_ready` variant models
/// a model asset that never finished loading.
pub struct SyntheticFaceDetector {
    ready: bool,
}

impl SyntheticFaceDetector {
    pub fn new() -> Self {
        Self { ready: true }
    }

    pub fn not_ready() -> Self {
        Self { ready: false }
    }
}

impl Default for SyntheticFaceDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceDetector for SyntheticFaceDetector {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn count_faces(&mut self, frame: &VideoFrame) -> Result<usize> {
        if frame.pixels.is_empty() {
            return Err(anyhow!("empty frame"));
        }
        // Synthetic scenes always contain exactly one test-taker.
        Ok(1)
    }
}

/// Scripted detector for tests: replays an explicit face-count sequence and
/// repeats the final entry once the script is exhausted.
pub struct ScriptedFaceDetector {
    counts: Vec<usize>,
    position: usize,
    ready: bool,
}

impl ScriptedFaceDetector {
    pub fn new(counts: Vec<usize>) -> Self {
        Self {
            counts,
            position: 0,
            ready: true,
        }
    }

    /// Hold every reading at one value.
    pub fn constant(count: usize) -> Self {
        Self::new(vec![count])
    }

    pub fn with_ready(mut self, ready: bool) -> Self {
        self.ready = ready;
        self
    }
}

impl FaceDetector for ScriptedFaceDetector {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn count_faces(&mut self, _frame: &VideoFrame) -> Result<usize> {
        let Some(&count) = self
            .counts
            .get(self.position)
            .or_else(|| self.counts.last())
        else {
            return Err(anyhow!("scripted detector has no readings"));
        };
        if self.position < self.counts.len() {
            self.position += 1;
        }
        Ok(count)
    }
}
