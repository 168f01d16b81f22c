// SPDX-License-Identifier: GPL-3.0-only
//! Blocking PCM playback on the default output device

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::decode::resample_linear;

pub const TONE_FADE_MS: u64 = 20;
pub const ATTENTION_TONE_FREQUENCIES: [f32; 2] = [880.0, 660.0];
pub const ATTENTION_TONE_MS: u64 = 150;

/// Volume shared between the player and running output callbacks.
#[derive(Debug, Clone)]
pub struct SharedVolume(Arc<AtomicU32>);

impl SharedVolume {
    #[must_use]
    pub fn new(volume: f32) -> Self {
        Self(Arc::new(AtomicU32::new(volume.clamp(0.0, 1.0).to_bits())))
    }

    pub fn set(&self, volume: f32) {
        self.0.store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    #[must_use]
    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Two short beeps with a fade in/out, at `sample_rate`.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn attention_tone(sample_rate: u32) -> Vec<f32> {
    let rate = sample_rate as f32;
    let per_tone = (rate * ATTENTION_TONE_MS as f32 / 1000.0) as usize;
    let fade = ((rate * TONE_FADE_MS as f32 / 1000.0) as usize).max(1);
    let gap = per_tone / 3;

    let mut samples = Vec::with_capacity(ATTENTION_TONE_FREQUENCIES.len() * (per_tone + gap));
    for frequency in ATTENTION_TONE_FREQUENCIES {
        for clock in 0..per_tone {
            let envelope = (clock.min(per_tone - clock) as f32 / fade as f32).min(1.0);
            let value = (clock as f32 * frequency * 2.0 * std::f32::consts::PI / rate).sin();
            samples.push(value * 0.3 * envelope);
        }
        samples.extend(std::iter::repeat_n(0.0, gap));
    }
    samples
}

/// Play mono `samples` recorded at `sample_rate` and block until they are
/// done, `stop` is raised, or a timeout passes.
///
/// # Errors
///
/// Returns an error if no output device is available or the output stream
/// cannot be created or started.
#[allow(clippy::cast_precision_loss)]
pub fn play_samples(
    samples: &[f32],
    sample_rate: u32,
    volume: &SharedVolume,
    stop: &Arc<AtomicBool>,
) -> Result<()> {
    if samples.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow::anyhow!("No output device available"))?;
    let config = device
        .default_output_config()
        .map_err(|e| anyhow::anyhow!("Failed to get output config: {e}"))?;

    let device_rate = config.sample_rate().0;
    let channels = usize::from(config.channels());
    log::debug!(
        "Playing {} samples at {sample_rate} Hz on device at {device_rate} Hz, {channels} channels",
        samples.len()
    );

    let pcm = Arc::new(resample_linear(samples, sample_rate, device_rate));
    let total = pcm.len();
    let position = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicBool::new(false));

    let next_sample = {
        let pcm = Arc::clone(&pcm);
        let position = Arc::clone(&position);
        let finished = Arc::clone(&finished);
        let volume = volume.clone();
        move || -> f32 {
            let index = position.fetch_add(1, Ordering::Relaxed);
            match pcm.get(index) {
                Some(sample) => sample * volume.get(),
                None => {
                    finished.store(true, Ordering::Relaxed);
                    0.0
                }
            }
        }
    };

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => device.build_output_stream(
            &config.config(),
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    let value = next_sample();
                    for sample in frame {
                        *sample = value;
                    }
                }
            },
            |err| log::warn!("Audio stream error: {err}"),
            None,
        ),
        cpal::SampleFormat::I16 => device.build_output_stream(
            &config.config(),
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    #[allow(clippy::cast_possible_truncation)]
                    let value = (next_sample() * f32::from(i16::MAX)) as i16;
                    for sample in frame {
                        *sample = value;
                    }
                }
            },
            |err| log::warn!("Audio stream error: {err}"),
            None,
        ),
        _ => return Err(anyhow::anyhow!("Unsupported sample format for playback")),
    }?;

    stream
        .play()
        .map_err(|e| anyhow::anyhow!("Failed to start playback: {e}"))?;

    let timeout = Duration::from_secs_f32(total as f32 / device_rate.max(1) as f32)
        + Duration::from_secs(1);
    let start = Instant::now();
    while !finished.load(Ordering::Relaxed) {
        if stop.load(Ordering::Relaxed) {
            log::debug!("Playback interrupted");
            break;
        }
        if start.elapsed() > timeout {
            log::warn!("Playback timed out");
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    drop(stream);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attention_tone_shape() {
        let tone = attention_tone(8000);
        let per_tone = 1200;
        assert_eq!(tone.len(), 2 * (per_tone + per_tone / 3));
        assert!(tone[0].abs() < f32::EPSILON);
        assert!(tone.iter().all(|s| s.abs() <= 0.3 + f32::EPSILON));
        // Silence between the two beeps
        assert!(tone[per_tone..per_tone + per_tone / 3].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_shared_volume_clamps() {
        let volume = SharedVolume::new(2.0);
        assert!((volume.get() - 1.0).abs() < f32::EPSILON);
        let clone = volume.clone();
        clone.set(0.0);
        assert!(volume.get().abs() < f32::EPSILON);
    }
}
