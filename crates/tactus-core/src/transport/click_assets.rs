//! Click waveforms: built-in blips or user WAV files resampled to the render rate.

use crate::{Error, Result};
use rubato::{FftFixedIn, Resampler};
use std::path::Path;

const RESAMPLE_CHUNK: usize = 1024;
const RESAMPLE_SUB_CHUNKS: usize = 2;

/// Accented and regular click waveforms at one sample rate.
#[derive(Debug, Clone)]
pub struct ClickAssets {
    sample_rate: f64,
    accent: Vec<f32>,
    regular: Vec<f32>,
}

impl ClickAssets {
    /// Synthesised clicks only.
    pub fn builtin(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            accent: generate_click(sample_rate, true),
            regular: generate_click(sample_rate, false),
        }
    }

    /// Load each waveform from its source, falling back to the built-in
    /// click when the source is absent, empty or unreadable.
    pub fn load(
        sample_rate: f64,
        accent_source: Option<&Path>,
        regular_source: Option<&Path>,
    ) -> Self {
        Self {
            sample_rate,
            accent: load_or_builtin(accent_source, sample_rate, true),
            regular: load_or_builtin(regular_source, sample_rate, false),
        }
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    #[inline]
    pub fn waveform(&self, accented: bool) -> &[f32] {
        if accented {
            &self.accent
        } else {
            &self.regular
        }
    }
}

fn load_or_builtin(source: Option<&Path>, sample_rate: f64, accented: bool) -> Vec<f32> {
    let Some(path) = source else {
        return generate_click(sample_rate, accented);
    };

    match load_click_sample(path, sample_rate) {
        Ok(samples) if !samples.is_empty() => samples,
        Ok(_) => {
            tracing::warn!(path = %path.display(), "click sample is empty, using built-in click");
            generate_click(sample_rate, accented)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to load click sample, using built-in click");
            generate_click(sample_rate, accented)
        }
    }
}

/// 30 ms sine blip with a 1 ms attack and 10 ms release.
pub fn generate_click(sample_rate: f64, accented: bool) -> Vec<f32> {
    let num_samples = (sample_rate * 0.03) as usize;
    let freq = if accented { 1200.0 } else { 1000.0 };
    let level = if accented { 1.0 } else { 0.7 };

    (0..num_samples)
        .map(|i| {
            let t = i as f64 / sample_rate;
            let env = if t < 0.001 {
                t / 0.001
            } else if t < 0.02 {
                1.0
            } else {
                (1.0 - (t - 0.02) / 0.01).max(0.0)
            };
            let phase = 2.0 * std::f64::consts::PI * freq * t;
            (phase.sin() * env * level) as f32
        })
        .collect()
}

/// Read a WAV file as mono at `sample_rate`.
pub fn load_click_sample(path: &Path, sample_rate: f64) -> Result<Vec<f32>> {
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<core::result::Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<core::result::Result<_, _>>()?
        }
    };

    let mono: Vec<f32> = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();

    resample_mono(&mono, spec.sample_rate, sample_rate.round() as u32)
}

fn resample_mono(input: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    if source_rate == target_rate || input.is_empty() {
        return Ok(input.to_vec());
    }
    if source_rate == 0 || target_rate == 0 {
        return Err(Error::ClickAsset(format!(
            "cannot resample {source_rate} Hz to {target_rate} Hz"
        )));
    }

    let mut resampler = FftFixedIn::<f32>::new(
        source_rate as usize,
        target_rate as usize,
        RESAMPLE_CHUNK,
        RESAMPLE_SUB_CHUNKS,
        1,
    )?;

    let expected = (input.len() as f64 * target_rate as f64 / source_rate as f64).ceil() as usize;
    let mut output = Vec::with_capacity(expected + RESAMPLE_CHUNK);

    let mut pos = 0;
    while pos < input.len() {
        let needed = resampler.input_frames_next();
        let copy = needed.min(input.len() - pos);

        let mut chunk = vec![0.0f32; needed];
        chunk[..copy].copy_from_slice(&input[pos..pos + copy]);

        let processed = resampler.process(&[chunk], None)?;
        output.extend_from_slice(&processed[0]);
        pos += needed;
    }

    output.truncate(expected);
    Ok(output)
}
