//! Audio Buffer Management
//!
//! Non-interleaved `f32` sample storage shared by decoding, rendering and
//! encoding. Render targets are plain buffers; the source track is wrapped in
//! a [`DecodedTrack`](crate::engine::track::DecodedTrack) and never mutated.

use crate::error::{Result, ToneError};

/// Peak level used when normalizing an export or a mixdown
pub const NORMALIZE_TARGET: f32 = 0.99;

/// Multi-channel audio data
///
/// # Example
///
/// ```
/// use tonewarp::engine::AudioBuffer;
///
/// let buffer = AudioBuffer::silent(2, 48000, 48000);
/// assert_eq!(buffer.channels(), 2);
/// assert_eq!(buffer.frames(), 48000);
/// assert_eq!(buffer.duration_secs(), 1.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Sample data: outer Vec is channels, inner Vec is frames
    pub samples: Vec<Vec<f32>>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Zero-filled buffer
    pub fn silent(channels: usize, frames: usize, sample_rate: u32) -> Self {
        Self {
            samples: vec![vec![0.0; frames]; channels],
            sample_rate,
        }
    }

    /// Wrap per-channel vectors; every channel must have the same length
    pub fn from_channels(samples: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if samples.is_empty() {
            return Err(ToneError::decode("audio has no channels"));
        }
        let frames = samples[0].len();
        if samples.iter().any(|ch| ch.len() != frames) {
            return Err(ToneError::decode("channels have different lengths"));
        }
        if sample_rate == 0 {
            return Err(ToneError::decode("sample rate is zero"));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Split `[L, R, L, R, ...]` into channels
    pub fn from_interleaved(interleaved: &[f32], channels: usize, sample_rate: u32) -> Result<Self> {
        if channels == 0 {
            return Err(ToneError::decode("audio has no channels"));
        }
        if interleaved.len() % channels != 0 {
            return Err(ToneError::decode(format!(
                "interleaved data length {} is not divisible by channel count {}",
                interleaved.len(),
                channels
            )));
        }

        let frames = interleaved.len() / channels;
        let mut samples = vec![Vec::with_capacity(frames); channels];
        for frame in interleaved.chunks_exact(channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                samples[ch].push(sample);
            }
        }
        Self::from_channels(samples, sample_rate)
    }

    /// Merge channels into `[L, R, L, R, ...]`
    pub fn to_interleaved(&self) -> Vec<f32> {
        let frames = self.frames();
        let mut interleaved = Vec::with_capacity(frames * self.channels());
        for frame in 0..frames {
            for channel in &self.samples {
                interleaved.push(channel[frame]);
            }
        }
        interleaved
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    /// Samples per channel
    #[inline]
    pub fn frames(&self) -> usize {
        self.samples.first().map_or(0, Vec::len)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    /// Immutable access to one channel; empty for an out-of-range index
    pub fn channel(&self, index: usize) -> &[f32] {
        self.samples.get(index).map_or(&[], Vec::as_slice)
    }

    /// Largest absolute sample value
    pub fn peak(&self) -> f32 {
        self.samples
            .iter()
            .flat_map(|ch| ch.iter())
            .fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    /// Root mean square over all channels
    pub fn rms(&self) -> f32 {
        let count = self.channels() * self.frames();
        if count == 0 {
            return 0.0;
        }
        let sum: f64 = self
            .samples
            .iter()
            .flat_map(|ch| ch.iter())
            .map(|&s| f64::from(s) * f64::from(s))
            .sum();
        (sum / count as f64).sqrt() as f32
    }

    /// Check that no sample is NaN or infinite
    pub fn is_finite(&self) -> bool {
        self.samples.iter().flat_map(|ch| ch.iter()).all(|s| s.is_finite())
    }

    pub fn apply_gain(&mut self, gain: f32) {
        for channel in &mut self.samples {
            for sample in channel.iter_mut() {
                *sample *= gain;
            }
        }
    }

    /// Scale so the peak equals `target`; silent buffers are left alone
    ///
    /// Returns the applied gain.
    pub fn normalize_peak(&mut self, target: f32) -> f32 {
        let peak = self.peak();
        if peak <= f32::EPSILON {
            return 1.0;
        }
        let gain = target / peak;
        self.apply_gain(gain);
        gain
    }

    /// Linear-interpolation sample rate conversion
    pub fn resampled(&self, target_rate: u32) -> Self {
        if target_rate == self.sample_rate || self.sample_rate == 0 {
            return self.clone();
        }
        let ratio = f64::from(target_rate) / f64::from(self.sample_rate);
        Self {
            samples: self
                .samples
                .iter()
                .map(|channel| resample_linear(channel, ratio))
                .collect(),
            sample_rate: target_rate,
        }
    }
}

fn resample_linear(samples: &[f32], ratio: f64) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let source_len = samples.len();
    let target_len = ((source_len as f64) * ratio).ceil() as usize;

    (0..target_len)
        .map(|i| {
            let src_pos = i as f64 / ratio;
            let src_idx = src_pos.floor() as usize;
            let frac = (src_pos - src_idx as f64) as f32;

            if src_idx + 1 < source_len {
                samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac
            } else if src_idx < source_len {
                samples[src_idx]
            } else {
                0.0
            }
        })
        .collect()
}
