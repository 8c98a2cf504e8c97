//! Camera stream.
//!
//! `stub://` specs produce a synthetic RGB stream whose content varies frame
//! to frame, enough for the synthetic face detector to derive a plausible
//! presence pattern. Frames carry a sequence number so consumers can spot
//! stalls.

use anyhow::{anyhow, Context, Result};
use url::Url;

use super::media_unavailable;

const STUB_WIDTH: u32 = 640;
const STUB_HEIGHT: u32 = 480;

/// One captured video frame.
#[derive(Clone, Debug)]
pub struct VideoFrame {
    pub seq: u64,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Live camera track, owned by `MediaHandles`.
#[derive(Debug)]
pub struct VideoStream {
    spec: String,
    seq: u64,
    scene_state: u8,
    stopped: bool,
    stop_count: u32,
}

impl VideoStream {
    /// Request the camera grant for a device spec. Only synthetic backends
    /// exist in this crate; anything else is treated as an unavailable
    /// device.
    pub(crate) fn open(spec: &str) -> Result<Self> {
        let url = Url::parse(spec).context("parse camera spec")?;
        match url.scheme() {
            "stub" => {
                log::info!("VideoStream: camera grant for {} (synthetic)", spec);
                Ok(Self {
                    spec: spec.to_string(),
                    seq: 0,
                    scene_state: 0,
                    stopped: false,
                    stop_count: 0,
                })
            }
            "denied" => Err(media_unavailable(format!(
                "camera permission denied for {}",
                spec
            ))),
            other => Err(media_unavailable(format!(
                "no camera backend for scheme '{}'",
                other
            ))),
        }
    }

    /// Capture the next frame. Sampling a stopped track is an error.
    pub fn next_frame(&mut self) -> Result<VideoFrame> {
        if self.stopped {
            return Err(anyhow!("camera track stopped: {}", self.spec));
        }
        self.seq += 1;
        let pixels = self.generate_synthetic_pixels();
        Ok(VideoFrame {
            seq: self.seq,
            width: STUB_WIDTH,
            height: STUB_HEIGHT,
            pixels,
        })
    }

    /// Generate synthetic pixel data.
    ///
    /// Simulates a mostly static scene whose state shifts occasionally, so
    /// consecutive frames differ without being random noise.
    fn generate_synthetic_pixels(&mut self) -> Vec<u8> {
        let pixel_count = (STUB_WIDTH * STUB_HEIGHT * 3) as usize;
        if self.seq % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.seq + self.scene_state as u64) % 256) as u8;
        }
        pixels
    }

    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.stop_count += 1;
        log::debug!("VideoStream: stopped {} after {} frames", self.spec, self.seq);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn stop_count(&self) -> u32 {
        self.stop_count
    }

    /// Frames captured so far, for health logging.
    pub fn frames_captured(&self) -> u64 {
        self.seq
    }
}
