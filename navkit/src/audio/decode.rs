// SPDX-License-Identifier: GPL-3.0-only
use std::path::Path;

use anyhow::{Context, Result};
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::conv::FromSample;
use symphonia::core::errors::Error as SymphoniaError;

/// Mix all channels of `data` down to mono and append them to `samples`.
fn conv<T>(samples: &mut Vec<f32>, data: &AudioBuffer<T>)
where
    T: symphonia::core::sample::Sample,
    f32: FromSample<T>,
{
    let channels = data.spec().channels.count();
    if channels == 0 {
        return;
    }
    #[allow(clippy::cast_precision_loss)]
    let scale = 1.0 / channels as f32;
    let start = samples.len();
    samples.extend(data.chan(0).iter().map(|v| f32::from_sample(*v) * scale));
    for channel in 1..channels {
        for (mixed, v) in samples[start..].iter_mut().zip(data.chan(channel)) {
            *mixed += f32::from_sample(*v) * scale;
        }
    }
}

/// Decode an audio file (mp3, wav, ...) to mono PCM.
///
/// # Errors
///
/// Returns an error if the file cannot be opened, has no decodable track, or
/// a packet fails to decode.
pub fn pcm_decode<P: AsRef<Path>>(path: P) -> Result<(Vec<f32>, u32)> {
    let path = path.as_ref();
    let src = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mss = symphonia::core::io::MediaSourceStream::new(
        Box::new(src),
        symphonia::core::io::MediaSourceStreamOptions::default(),
    );
    let mut hint = symphonia::core::probe::Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &symphonia::core::formats::FormatOptions::default(),
            &symphonia::core::meta::MetadataOptions::default(),
        )
        .context("Unsupported audio format")?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| anyhow::anyhow!("no supported audio tracks"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Unsupported codec")?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut pcm_data = Vec::new();

    while let Ok(packet) = format.next_packet() {
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Corrupt frames are skipped, mp3 streams often start with one
            Err(SymphoniaError::DecodeError(e)) => {
                log::debug!("Skipping undecodable packet: {e}");
                continue;
            }
            Err(e) => return Err(e).context("Failed to decode audio"),
        };
        if sample_rate == 0 {
            sample_rate = decoded.spec().rate;
        }
        match decoded {
            AudioBufferRef::F64(buf) => conv(&mut pcm_data, &buf),
            AudioBufferRef::F32(buf) => conv(&mut pcm_data, &buf),
            AudioBufferRef::S32(buf) => conv(&mut pcm_data, &buf),
            AudioBufferRef::S16(buf) => conv(&mut pcm_data, &buf),
            AudioBufferRef::S8(buf) => conv(&mut pcm_data, &buf),
            AudioBufferRef::U32(buf) => conv(&mut pcm_data, &buf),
            AudioBufferRef::U16(buf) => conv(&mut pcm_data, &buf),
            AudioBufferRef::U8(buf) => conv(&mut pcm_data, &buf),
            AudioBufferRef::U24(buf) => conv(&mut pcm_data, &buf),
            AudioBufferRef::S24(buf) => conv(&mut pcm_data, &buf),
        }
    }

    if sample_rate == 0 {
        anyhow::bail!("Unknown sample rate in {}", path.display());
    }
    Ok((pcm_data, sample_rate))
}

/// Linear-interpolation resampling, good enough for speech prompts.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }
    let ratio = f64::from(from_rate) / f64::from(to_rate);
    let out_len = ((samples.len() as f64) / ratio).round() as usize;
    (0..out_len)
        .map(|i| {
            let position = i as f64 * ratio;
            let index = position.floor() as usize;
            let fraction = (position - index as f64) as f32;
            let current = samples[index.min(samples.len() - 1)];
            let next = samples[(index + 1).min(samples.len() - 1)];
            current + (next - current) * fraction
        })
        .collect()
}
