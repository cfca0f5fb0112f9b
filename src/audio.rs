//! Recognizer-ready sample handling.
//!
//! The extracted track is decoded to normalized mono `f32` samples at the rate
//! the recognizer expects. Decoding and resampling are CPU-bound and run on the
//! blocking pool.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{LingomuxError, Result};

/// Basic level statistics, logged before recognition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioStats {
    pub duration_secs: f64,
    pub peak: f32,
    pub rms: f32,
}

impl AudioStats {
    pub fn measure(samples: &[f32], sample_rate: u32) -> Self {
        if samples.is_empty() || sample_rate == 0 {
            return Self {
                duration_secs: 0.0,
                peak: 0.0,
                rms: 0.0,
            };
        }

        let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        let energy: f64 = samples.iter().map(|s| f64::from(*s) * f64::from(*s)).sum();

        Self {
            duration_secs: samples.len() as f64 / f64::from(sample_rate),
            peak,
            rms: (energy / samples.len() as f64).sqrt() as f32,
        }
    }
}

/// Decode a WAV file to mono samples at `target_rate`
pub async fn load_samples(path: &Path, target_rate: u32) -> Result<Vec<f32>> {
    if !path.is_file() {
        return Err(LingomuxError::NotFound(format!("audio file {}", path.display())));
    }

    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || decode_file(&path, target_rate))
        .await
        .map_err(|e| LingomuxError::engine(format!("Audio decoding task failed: {}", e), String::new()))?
}

fn decode_file(path: &Path, target_rate: u32) -> Result<Vec<f32>> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|sample| sample as f32 / max_val))
                .collect::<std::result::Result<_, _>>()?
        }
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<std::result::Result<_, _>>()?,
    };

    let mono = downmix(&interleaved, spec.channels);
    let samples = resample_linear(&mono, spec.sample_rate, target_rate);

    let stats = AudioStats::measure(&samples, target_rate);
    debug!(
        "Decoded {}: {}ch {}Hz -> mono {}Hz, {:.2}s, peak {:.3}, rms {:.3}",
        path.display(),
        spec.channels,
        spec.sample_rate,
        target_rate,
        stats.duration_secs,
        stats.peak,
        stats.rms
    );

    Ok(samples)
}

/// Average interleaved frames down to one channel
pub fn downmix(interleaved: &[f32], channels: u16) -> Vec<f32> {
    let channels = usize::from(channels.max(1));
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = f64::from(from_rate) / f64::from(to_rate);
    let out_len = ((samples.len() as f64) / ratio).round().max(1.0) as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = (pos.floor() as usize).min(last);
            let next = (idx + 1).min(last);
            let frac = (pos - idx as f64) as f32;
            samples[idx] + (samples[next] - samples[idx]) * frac
        })
        .collect()
}

/// Write mono 16-bit PCM, the input format whisper.cpp reads
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<PathBuf> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
        writer.write_sample(value)?;
    }
    writer.finalize()?;

    Ok(path.to_path_buf())
}
