//! Answer-audio capture.
//!
//! Records the spoken answer for listening/speaking exams. This is distinct
//! from the proctoring audio monitor: it captures the *answer*, not a
//! violation signal, and opens its own microphone grant independent of the
//! proctoring one. Captured samples are encoded as 16-bit PCM WAV before
//! upload.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::media::AudioStream;

const CAPTURE_POLL_MS: u64 = 100;

/// A running answer recording.
pub struct ResponseRecorder {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<Capture>>,
}

struct Capture {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl ResponseRecorder {
    /// Open an independent microphone grant and start capturing.
    pub fn start(microphone: &str) -> Result<Self> {
        let mut stream = AudioStream::open(microphone)?;
        let stop = Arc::new(AtomicBool::new(false));
        let stop_thread = stop.clone();
        let join = std::thread::spawn(move || {
            let mut capture = Capture {
                samples: Vec::new(),
                sample_rate: 0,
            };
            while !stop_thread.load(Ordering::SeqCst) {
                match stream.next_chunk() {
                    Ok(chunk) => {
                        capture.sample_rate = chunk.sample_rate;
                        capture.samples.extend_from_slice(&chunk.samples);
                    }
                    Err(e) => {
                        log::debug!("answer recorder: chunk capture failed: {}", e);
                        break;
                    }
                }
                std::thread::sleep(Duration::from_millis(CAPTURE_POLL_MS));
            }
            stream.stop();
            capture
        });
        log::info!("answer recording started on {}", microphone);
        Ok(Self {
            stop,
            join: Some(join),
        })
    }

    /// Stop capturing and encode the clip as WAV.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        let capture = self.stop_capture()?;
        if capture.samples.is_empty() {
            return Err(anyhow!("answer recording captured no audio"));
        }
        log::info!(
            "answer recording finished: {} samples at {} Hz",
            capture.samples.len(),
            capture.sample_rate
        );
        Ok(encode_wav_pcm16(&capture.samples, capture.sample_rate))
    }

    /// Stop capturing and discard the clip.
    pub fn abort(&mut self) {
        if let Ok(capture) = self.stop_capture() {
            log::debug!(
                "answer recording aborted, {} samples discarded",
                capture.samples.len()
            );
        }
    }

    fn stop_capture(&mut self) -> Result<Capture> {
        self.stop.store(true, Ordering::SeqCst);
        let join = self
            .join
            .take()
            .ok_or_else(|| anyhow!("recording already stopped"))?;
        join.join()
            .map_err(|_| anyhow!("answer capture thread panicked"))
    }
}

impl Drop for ResponseRecorder {
    fn drop(&mut self) {
        if self.join.is_some() {
            self.abort();
        }
    }
}

/// Encode mono f32 samples as a 16-bit PCM WAV file (44-byte header).
pub fn encode_wav_pcm16(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let byte_rate = sample_rate * 2;
    let mut wav = Vec::with_capacity(44 + data_len as usize);

    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes()); // PCM chunk size
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes()); // block align
    wav.extend_from_slice(&16u16.to_le_bytes()); // bits per sample

    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        let quantized = (clamped * i16::MAX as f32) as i16;
        wav.extend_from_slice(&quantized.to_le_bytes());
    }

    wav
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_header_layout_is_canonical() {
        let wav = encode_wav_pcm16(&[0.0, 0.5, -0.5, 1.0], 16_000);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(wav[4..8].try_into().unwrap()), 36 + 8);
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(u32::from_le_bytes(wav[16..20].try_into().unwrap()), 16);
        assert_eq!(u16::from_le_bytes(wav[20..22].try_into().unwrap()), 1);
        assert_eq!(u16::from_le_bytes(wav[22..24].try_into().unwrap()), 1);
        assert_eq!(u32::from_le_bytes(wav[24..28].try_into().unwrap()), 16_000);
        assert_eq!(u32::from_le_bytes(wav[28..32].try_into().unwrap()), 32_000);
        assert_eq!(u16::from_le_bytes(wav[32..34].try_into().unwrap()), 2);
        assert_eq!(u16::from_le_bytes(wav[34..36].try_into().unwrap()), 16);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32::from_le_bytes(wav[40..44].try_into().unwrap()), 8);
        assert_eq!(wav.len(), 52);
    }

    #[test]
    fn samples_are_clamped_before_quantization() {
        let wav = encode_wav_pcm16(&[2.0, -2.0], 8_000);
        let first = i16::from_le_bytes(wav[44..46].try_into().unwrap());
        let second = i16::from_le_bytes(wav[46..48].try_into().unwrap());
        assert_eq!(first, i16::MAX);
        assert_eq!(second, -i16::MAX);
    }

    #[test]
    fn recorder_captures_and_encodes_a_clip() -> Result<()> {
        let recorder = ResponseRecorder::start("stub://mic0")?;
        std::thread::sleep(Duration::from_millis(150));
        let wav = recorder.finish()?;
        assert_eq!(&wav[0..4], b"RIFF");
        assert!(wav.len() > 44);
        Ok(())
    }

    #[test]
    fn recorder_abort_discards_without_error() -> Result<()> {
        let mut recorder = ResponseRecorder::start("stub://mic0")?;
        recorder.abort();
        recorder.abort();
        Ok(())
    }

    #[test]
    fn recorder_requires_a_grantable_microphone() {
        assert!(ResponseRecorder::start("denied://mic0").is_err());
    }
}
