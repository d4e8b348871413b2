//! Dynamics compressor
//!
//! Feed-forward compressor at the summing point of the chain: the dry path,
//! the echo return and the noise bed all meet here. Detection is peak-based
//! and linked across channels, the gain computer has a quadratic soft knee and
//! the resulting gain is smoothed with separate attack and release times.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ToneError};

/// Compressor configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressorSettings {
    /// Threshold level in dB (-100 to 0)
    pub threshold_db: f64,
    /// Knee width in dB (0 = hard knee, up to 40)
    pub knee_db: f64,
    /// Compression ratio (1 to 20)
    pub ratio: f64,
    /// Attack time in seconds
    pub attack_secs: f64,
    /// Release time in seconds
    pub release_secs: f64,
}

impl Default for CompressorSettings {
    fn default() -> Self {
        Self {
            threshold_db: -24.0,
            knee_db: 30.0,
            ratio: 12.0,
            attack_secs: 0.003,
            release_secs: 0.25,
        }
    }
}

impl CompressorSettings {
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("threshold_db", self.threshold_db, -100.0, 0.0),
            ("knee_db", self.knee_db, 0.0, 40.0),
            ("ratio", self.ratio, 1.0, 20.0),
            ("attack_secs", self.attack_secs, 0.0, 1.0),
            ("release_secs", self.release_secs, 0.0, 1.0),
        ];
        for (name, value, min, max) in checks {
            if !(min..=max).contains(&value) {
                return Err(ToneError::Config {
                    reason: format!("compressor {} = {} outside {}..={}", name, value, min, max),
                });
            }
        }
        Ok(())
    }
}

/// Linked-stereo compressor
#[derive(Debug, Clone)]
pub struct Compressor {
    settings: CompressorSettings,
    attack_coeff: f64,
    release_coeff: f64,
    /// Smoothed gain, linear
    gain: f64,
}

impl Compressor {
    pub fn new(settings: CompressorSettings, sample_rate: f64) -> Self {
        Self {
            settings,
            attack_coeff: Self::coefficient(settings.attack_secs, sample_rate),
            release_coeff: Self::coefficient(settings.release_secs, sample_rate),
            gain: 1.0,
        }
    }

    /// coeff = exp(-1 / time_in_samples)
    fn coefficient(secs: f64, sample_rate: f64) -> f64 {
        let samples = secs * sample_rate;
        if samples > 0.0 {
            (-1.0 / samples).exp()
        } else {
            0.0
        }
    }

    /// Gain change in dB (zero or negative) for a detector level in dB
    pub fn gain_reduction_db(&self, input_db: f64) -> f64 {
        let threshold = self.settings.threshold_db;
        let ratio = self.settings.ratio;
        let knee = self.settings.knee_db;

        if knee > 0.0 {
            let knee_start = threshold - knee / 2.0;
            let knee_end = threshold + knee / 2.0;

            if input_db <= knee_start {
                0.0
            } else if input_db >= knee_end {
                (threshold + (input_db - threshold) / ratio) - input_db
            } else {
                // Quadratic blend, meets the full ratio line at the knee end
                let over = input_db - knee_start;
                (1.0 / ratio - 1.0) * over * over / (2.0 * knee)
            }
        } else if input_db <= threshold {
            0.0
        } else {
            (threshold + (input_db - threshold) / ratio) - input_db
        }
    }

    /// Compress one frame in place
    #[inline]
    pub fn process_frame(&mut self, frame: &mut [f32]) {
        let peak = frame.iter().fold(0.0f64, |acc, s| acc.max(f64::from(s.abs())));
        let target = db_to_linear(self.gain_reduction_db(linear_to_db(peak)));

        let coeff = if target < self.gain {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.gain = coeff * self.gain + (1.0 - coeff) * target;

        let gain = self.gain as f32;
        for sample in frame.iter_mut() {
            *sample *= gain;
        }
    }

    /// Current gain reduction in dB, for metering
    pub fn current_reduction_db(&self) -> f64 {
        linear_to_db(self.gain)
    }

    pub fn reset(&mut self) {
        self.gain = 1.0;
    }

    pub fn settings(&self) -> &CompressorSettings {
        &self.settings
    }
}

/// Linear amplitude to dB, floored at -120 dB
pub fn linear_to_db(linear: f64) -> f64 {
    if linear > 1e-6 {
        20.0 * linear.log10()
    } else {
        -120.0
    }
}

pub fn db_to_linear(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}
