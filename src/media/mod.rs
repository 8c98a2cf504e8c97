//! Media acquisition.
//!
//! [`MediaHandles`] is the sole owner of the camera and microphone grants for
//! one proctoring context. Monitors and the preview consumer borrow shared
//! stream handles, but acquire and release authority never leaves this
//! module:
//!
//! - Either grant failing fails the whole acquisition; a camera opened before
//!   a denied microphone is stopped again, so no partial acquisition leaks.
//! - `release()` stops every track on both streams exactly once and is a
//!   no-op on repeat calls.
//!
//! Device specs are scheme-dispatched URLs. `stub://<name>` grants a
//! synthetic stream; `denied://<name>` simulates a permission denial. Real
//! hardware capture lives outside this crate.

pub mod camera;
pub mod microphone;

use anyhow::Result;
use std::sync::{Arc, Mutex};

pub use camera::{VideoFrame, VideoStream};
pub use microphone::{AudioChunk, AudioStream};

use crate::session::SessionDevices;
use crate::ProctorError;

/// Exclusive owner of the camera and microphone streams for one session.
#[derive(Debug)]
pub struct MediaHandles {
    video: Arc<Mutex<VideoStream>>,
    audio: Arc<Mutex<AudioStream>>,
    released: bool,
}

impl MediaHandles {
    /// Request both grants. Either failing yields `MediaUnavailable` with no
    /// partial acquisition left behind.
    pub fn acquire(devices: &SessionDevices) -> Result<Self> {
        let video = VideoStream::open(&devices.camera)?;
        let audio = match AudioStream::open(&devices.microphone) {
            Ok(audio) => audio,
            Err(e) => {
                let mut video = video;
                video.stop();
                return Err(e);
            }
        };
        log::info!(
            "media acquired: camera={} microphone={}",
            devices.camera,
            devices.microphone
        );
        Ok(Self {
            video: Arc::new(Mutex::new(video)),
            audio: Arc::new(Mutex::new(audio)),
            released: false,
        })
    }

    /// Live video stream handle for the face monitor and preview.
    pub fn video(&self) -> Arc<Mutex<VideoStream>> {
        self.video.clone()
    }

    /// Live audio stream handle for the audio monitor.
    pub fn audio(&self) -> Arc<Mutex<AudioStream>> {
        self.audio.clone()
    }

    /// Stop every track on both streams. Idempotent.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Ok(mut video) = self.video.lock() {
            video.stop();
        }
        if let Ok(mut audio) = self.audio.lock() {
            audio.stop();
        }
        log::info!("media released");
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn video_stop_count(&self) -> u32 {
        self.video.lock().map(|v| v.stop_count()).unwrap_or(0)
    }

    pub fn audio_stop_count(&self) -> u32 {
        self.audio.lock().map(|a| a.stop_count()).unwrap_or(0)
    }
}

pub(crate) fn media_unavailable(reason: impl Into<String>) -> anyhow::Error {
    ProctorError::MediaUnavailable {
        reason: reason.into(),
    }
    .into()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
