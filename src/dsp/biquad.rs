//! Biquad filters
//!
//! Second-order sections with Audio EQ Cookbook coefficients. The chain uses a
//! resonant low-pass for tone shaping and a constant 0 dB peak band-pass to
//! colour the background noise.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Filter response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Remove above the cutoff
    LowPass,
    /// Pass a band around the centre frequency, 0 dB at the peak
    BandPass,
}

/// Normalized coefficients
/// H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BiquadCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl BiquadCoeffs {
    /// Coefficients for `kind` at `frequency` Hz
    ///
    /// Frequency is clamped below Nyquist so high cutoffs at low sample rates
    /// stay stable.
    pub fn calculate(kind: FilterKind, sample_rate: f64, frequency: f64, q: f64) -> Self {
        let nyquist = sample_rate / 2.0;
        let freq = frequency.clamp(1.0, nyquist * 0.999);
        let q = q.max(1e-4);

        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / (2.0 * q);

        let (b0, b1, b2, a0, a1, a2) = match kind {
            FilterKind::LowPass => (
                (1.0 - cos_w0) / 2.0,
                1.0 - cos_w0,
                (1.0 - cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterKind::BandPass => (alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha),
        };

        BiquadCoeffs {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Magnitude response at `frequency`, linear
    pub fn magnitude_at(&self, frequency: f64, sample_rate: f64) -> f64 {
        let w = 2.0 * PI * frequency / sample_rate;
        let (c1, s1) = (w.cos(), w.sin());
        let (c2, s2) = ((2.0 * w).cos(), (2.0 * w).sin());

        let num_re = self.b0 + self.b1 * c1 + self.b2 * c2;
        let num_im = -(self.b1 * s1 + self.b2 * s2);
        let den_re = 1.0 + self.a1 * c1 + self.a2 * c2;
        let den_im = -(self.a1 * s1 + self.a2 * s2);

        (num_re.hypot(num_im)) / (den_re.hypot(den_im))
    }
}

/// Per-channel filter memory
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadState {
    /// Direct Form I
    #[inline]
    fn process(&mut self, input: f64, c: &BiquadCoeffs) -> f64 {
        let output = c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }
}

/// Multi-channel biquad with a movable corner frequency
#[derive(Debug, Clone)]
pub struct Biquad {
    kind: FilterKind,
    sample_rate: f64,
    frequency: f64,
    q: f64,
    coeffs: BiquadCoeffs,
    states: Vec<BiquadState>,
}

impl Biquad {
    pub fn new(kind: FilterKind, sample_rate: f64, frequency: f64, q: f64, channels: usize) -> Self {
        Self {
            kind,
            sample_rate,
            frequency,
            q,
            coeffs: BiquadCoeffs::calculate(kind, sample_rate, frequency, q),
            states: vec![BiquadState::default(); channels.max(1)],
        }
    }

    /// Move the corner frequency; coefficients are only recomputed on change
    #[inline]
    pub fn set_frequency(&mut self, frequency: f64) {
        if frequency != self.frequency {
            self.frequency = frequency;
            self.coeffs = BiquadCoeffs::calculate(self.kind, self.sample_rate, frequency, self.q);
        }
    }

    #[inline]
    pub fn process(&mut self, channel: usize, input: f64) -> f64 {
        match self.states.get_mut(channel) {
            Some(state) => state.process(input, &self.coeffs),
            None => input,
        }
    }

    pub fn reset(&mut self) {
        self.states.fill(BiquadState::default());
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn coeffs(&self) -> &BiquadCoeffs {
        &self.coeffs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sine_rms_through(filter: &mut Biquad, freq: f64, sr: f64) -> f64 {
        let n = (sr * 0.5) as usize;
        let mut sum = 0.0;
        for i in 0..n {
            let x = (2.0 * PI * freq * i as f64 / sr).sin();
            let y = filter.process(0, x);
            // Skip the transient
            if i > n / 2 {
                sum += y * y;
            }
        }
        (sum / (n - n / 2 - 1) as f64).sqrt()
    }

    #[test]
    fn test_low_pass_passes_below_cutoff() {
        let sr = 48000.0;
        let mut lp = Biquad::new(FilterKind::LowPass, sr, 2000.0, 1.0, 1);
        let rms = sine_rms_through(&mut lp, 100.0, sr);
        assert_relative_eq!(rms, std::f64::consts::FRAC_1_SQRT_2, epsilon = 0.01);
    }

    #[test]
    fn test_low_pass_attenuates_above_cutoff() {
        let sr = 48000.0;
        let mut lp = Biquad::new(FilterKind::LowPass, sr, 500.0, 1.0, 1);
        let rms = sine_rms_through(&mut lp, 8000.0, sr);
        assert!(rms < 0.01, "rms {}", rms);
    }

    #[test]
    fn test_band_pass_peak_is_unity() {
        let sr = 48000.0;
        let coeffs = BiquadCoeffs::calculate(FilterKind::BandPass, sr, 1000.0, 0.5);
        assert_relative_eq!(coeffs.magnitude_at(1000.0, sr), 1.0, epsilon = 1e-9);
        assert!(coeffs.magnitude_at(50.0, sr) < 0.2);
    }

    #[test]
    fn test_low_pass_q_one_resonance() {
        // Cookbook low-pass gain at the cutoff equals Q
        let sr = 48000.0;
        let coeffs = BiquadCoeffs::calculate(FilterKind::LowPass, sr, 1000.0, 1.0);
        assert_relative_eq!(coeffs.magnitude_at(1000.0, sr), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_cutoff_above_nyquist_is_stable() {
        let sr = 22050.0;
        let mut lp = Biquad::new(FilterKind::LowPass, sr, 20000.0, 1.0, 1);
        let mut peak: f64 = 0.0;
        for i in 0..22050 {
            let x = if i % 2 == 0 { 1.0 } else { -1.0 };
            peak = peak.max(lp.process(0, x).abs());
        }
        assert!(peak.is_finite());
        assert!(peak < 10.0);
    }

    #[test]
    fn test_set_frequency_recomputes() {
        let mut lp = Biquad::new(FilterKind::LowPass, 48000.0, 1000.0, 1.0, 2);
        let before = *lp.coeffs();
        lp.set_frequency(1000.0);
        assert_eq!(*lp.coeffs(), before);
        lp.set_frequency(4000.0);
        assert_ne!(*lp.coeffs(), before);
        assert_eq!(lp.frequency(), 4000.0);
    }
}
