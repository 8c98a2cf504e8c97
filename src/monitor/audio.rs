//! Audio monitor.
//!
//! Samples the proctoring microphone every [`AUDIO_SAMPLE_INTERVAL_MS`],
//! computes root-mean-square energy over the raw time-domain chunk, and
//! classifies sustained over-threshold signal (someone talking or dictating
//! answers). The energy of a full-scale sine lands around 0.707, so readings
//! occupy a 0..~0.7 range against the 0.1 threshold.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::clock::Clock;
use crate::media::AudioStream;
use crate::monitor::{poll_sleep, DebounceRule, MonitorStats};
use crate::{
    ViolationKind, ViolationSink, AUDIO_SAMPLE_INTERVAL_MS, SPEECH_GRACE_MS, SPEECH_RMS_THRESHOLD,
};

/// Root-mean-square energy of a time-domain sample buffer.
pub fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

pub(crate) fn spawn_audio_monitor(
    audio: Arc<Mutex<AudioStream>>,
    sink: ViolationSink,
    clock: Arc<dyn Clock>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<MonitorStats> {
    // Baseline the cadence at monitor start, not at first thread schedule:
    // a clock advance right after start must count as one elapsed interval.
    let mut last_tick = clock.now_ms();
    std::thread::spawn(move || {
        let mut stats = MonitorStats::default();
        let mut rule = DebounceRule::new(SPEECH_GRACE_MS);

        loop {
            if stop.load(Ordering::SeqCst) {
                break;
            }
            poll_sleep();
            let now = clock.now_ms();
            if now.saturating_sub(last_tick) < AUDIO_SAMPLE_INTERVAL_MS {
                continue;
            }
            last_tick = now;
            stats.ticks += 1;

            let chunk = {
                let Ok(mut stream) = audio.lock() else {
                    break;
                };
                match stream.next_chunk() {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        stats.errors += 1;
                        log::debug!("audio monitor: chunk capture failed: {}", e);
                        continue;
                    }
                }
            };
            stats.samples += 1;

            let energy = rms_energy(&chunk.samples);
            log::debug!("audio monitor: energy={:.3}", energy);

            let fired = rule.observe(energy > SPEECH_RMS_THRESHOLD, now);
            if stop.load(Ordering::SeqCst) {
                break;
            }
            if fired {
                let rounded = (energy * 1_000.0).round() / 1_000.0;
                sink.record(
                    ViolationKind::SpeechDetected,
                    now,
                    Some(serde_json::json!({ "energy": rounded })),
                );
            }
        }

        stats
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_silence_is_zero() {
        assert_eq!(rms_energy(&[]), 0.0);
        assert_eq!(rms_energy(&[0.0; 256]), 0.0);
    }

    #[test]
    fn rms_of_full_scale_sine_is_about_point_seven() {
        let samples: Vec<f32> = (0..16_000)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 16_000.0).sin())
            .collect();
        let energy = rms_energy(&samples);
        assert!((energy - 0.707).abs() < 0.01, "energy={}", energy);
    }

    #[test]
    fn speech_fires_only_after_five_continuous_seconds() {
        let mut rule = DebounceRule::new(SPEECH_GRACE_MS);
        let mut fired = Vec::new();
        // Energy above threshold at every 250ms tick.
        for tick in 0..25u64 {
            let now = tick * AUDIO_SAMPLE_INTERVAL_MS;
            if rule.observe(true, now) {
                fired.push(now);
            }
        }
        assert_eq!(fired, vec![5_250]);
    }

    #[test]
    fn single_below_threshold_sample_resets_the_timer() {
        let mut rule = DebounceRule::new(SPEECH_GRACE_MS);
        for tick in 0..19u64 {
            assert!(!rule.observe(true, tick * AUDIO_SAMPLE_INTERVAL_MS));
        }
        // One quiet sample at 4.75s, then loud again: the earlier run is gone.
        assert!(!rule.observe(false, 19 * AUDIO_SAMPLE_INTERVAL_MS));
        assert!(!rule.observe(true, 20 * AUDIO_SAMPLE_INTERVAL_MS));
        assert!(!rule.observe(true, 21 * AUDIO_SAMPLE_INTERVAL_MS));
    }

    #[test]
    fn repeated_sub_threshold_samples_never_fire() {
        let mut rule = DebounceRule::new(SPEECH_GRACE_MS);
        for tick in 0..100u64 {
            assert!(!rule.observe(false, tick * AUDIO_SAMPLE_INTERVAL_MS));
        }
    }
}
