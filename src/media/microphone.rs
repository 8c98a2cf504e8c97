//! Microphone stream.
//!
//! `stub://` specs produce a synthetic time-domain signal. The device name
//! selects a profile: names containing `loud` emit a sustained tone whose RMS
//! sits well above the speech threshold; everything else emits near-silence
//! with low-level noise. Both the proctoring grant and the answer recorder
//! open independent streams through this backend.

use anyhow::{anyhow, Context, Result};
use rand::Rng;
use url::Url;

use super::media_unavailable;

const STUB_SAMPLE_RATE: u32 = 16_000;
const STUB_CHUNK_SAMPLES: usize = 4_000;

/// One captured audio chunk, raw time-domain samples in -1..1.
#[derive(Clone, Debug)]
pub struct AudioChunk {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SignalProfile {
    Quiet,
    Loud,
}

/// Live microphone track.
#[derive(Debug)]
pub struct AudioStream {
    spec: String,
    profile: SignalProfile,
    chunk_count: u64,
    stopped: bool,
    stop_count: u32,
}

impl AudioStream {
    pub(crate) fn open(spec: &str) -> Result<Self> {
        let url = Url::parse(spec).context("parse microphone spec")?;
        match url.scheme() {
            "stub" => {
                let profile = if url.host_str().is_some_and(|host| host.contains("loud")) {
                    SignalProfile::Loud
                } else {
                    SignalProfile::Quiet
                };
                log::info!(
                    "AudioStream: microphone grant for {} (synthetic, {:?})",
                    spec,
                    profile
                );
                Ok(Self {
                    spec: spec.to_string(),
                    profile,
                    chunk_count: 0,
                    stopped: false,
                    stop_count: 0,
                })
            }
            "denied" => Err(media_unavailable(format!(
                "microphone permission denied for {}",
                spec
            ))),
            other => Err(media_unavailable(format!(
                "no microphone backend for scheme '{}'",
                other
            ))),
        }
    }

    /// Capture the next chunk. Sampling a stopped track is an error.
    pub fn next_chunk(&mut self) -> Result<AudioChunk> {
        if self.stopped {
            return Err(anyhow!("microphone track stopped: {}", self.spec));
        }
        self.chunk_count += 1;
        let samples = match self.profile {
            SignalProfile::Quiet => self.generate_noise(0.02),
            SignalProfile::Loud => self.generate_tone(0.5, 220.0),
        };
        Ok(AudioChunk {
            samples,
            sample_rate: STUB_SAMPLE_RATE,
        })
    }

    fn generate_noise(&self, amplitude: f32) -> Vec<f32> {
        let mut rng = rand::thread_rng();
        (0..STUB_CHUNK_SAMPLES)
            .map(|_| rng.gen_range(-amplitude..amplitude))
            .collect()
    }

    fn generate_tone(&self, amplitude: f32, freq_hz: f32) -> Vec<f32> {
        let phase_offset = self.chunk_count as usize * STUB_CHUNK_SAMPLES;
        (0..STUB_CHUNK_SAMPLES)
            .map(|i| {
                let t = (phase_offset + i) as f32 / STUB_SAMPLE_RATE as f32;
                amplitude * (2.0 * std::f32::consts::PI * freq_hz * t).sin()
            })
            .collect()
    }

    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.stop_count += 1;
        log::debug!(
            "AudioStream: stopped {} after {} chunks",
            self.spec,
            self.chunk_count
        );
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn stop_count(&self) -> u32 {
        self.stop_count
    }

    /// Chunks captured so far, for health logging.
    pub fn chunks_captured(&self) -> u64 {
        self.chunk_count
    }
}
