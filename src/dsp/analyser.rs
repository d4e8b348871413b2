//! Analysis tap
//!
//! Keeps the most recent `fft_size` output frames (mono sum) and produces
//! waveform and spectrum snapshots for visualizers. Passing audio through the
//! tap never alters it.

use std::f32::consts::PI;
use std::fmt;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// Level reported for empty bins
pub const MIN_DECIBELS: f32 = -120.0;

/// Ring buffer plus cached forward FFT
pub struct Analyser {
    ring: Vec<f32>,
    write_pos: usize,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl fmt::Debug for Analyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analyser")
            .field("fft_size", &self.ring.len())
            .field("write_pos", &self.write_pos)
            .finish()
    }
}

impl Analyser {
    /// Create a tap of `fft_size` frames (rounded up to a power of two, min 32)
    pub fn new(fft_size: usize) -> Self {
        let size = fft_size.max(32).next_power_of_two();
        let mut planner = FftPlanner::new();
        Self {
            ring: vec![0.0; size],
            write_pos: 0,
            window: blackman(size),
            fft: planner.plan_fft_forward(size),
        }
    }

    pub fn fft_size(&self) -> usize {
        self.ring.len()
    }

    /// Record one output frame
    #[inline]
    pub fn push_frame(&mut self, frame: &[f32]) {
        let mono = if frame.is_empty() {
            0.0
        } else {
            frame.iter().sum::<f32>() / frame.len() as f32
        };
        self.ring[self.write_pos] = mono;
        self.write_pos = (self.write_pos + 1) % self.ring.len();
    }

    /// Last `fft_size` samples, oldest first
    pub fn time_domain(&self) -> Vec<f32> {
        let (newest, oldest) = self.ring.split_at(self.write_pos);
        oldest.iter().chain(newest).copied().collect()
    }

    /// Magnitude spectrum in dBFS, `fft_size / 2` bins from DC upward
    pub fn frequency_db(&self) -> Vec<f32> {
        let size = self.ring.len();
        let mut buffer: Vec<Complex<f32>> = self
            .time_domain()
            .into_iter()
            .zip(&self.window)
            .map(|(s, w)| Complex::new(s * w, 0.0))
            .collect();

        self.fft.process(&mut buffer);

        buffer
            .iter()
            .take(size / 2)
            .map(|bin| {
                let magnitude = bin.norm() / size as f32;
                if magnitude > 0.0 {
                    (20.0 * magnitude.log10()).max(MIN_DECIBELS)
                } else {
                    MIN_DECIBELS
                }
            })
            .collect()
    }

    pub fn reset(&mut self) {
        self.ring.fill(0.0);
        self.write_pos = 0;
    }
}

fn blackman(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let x = 2.0 * PI * i as f32 / size as f32;
            0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_rounds_to_power_of_two() {
        assert_eq!(Analyser::new(2048).fft_size(), 2048);
        assert_eq!(Analyser::new(1000).fft_size(), 1024);
        assert_eq!(Analyser::new(0).fft_size(), 32);
    }

    #[test]
    fn test_time_domain_is_oldest_first() {
        let mut tap = Analyser::new(32);
        for i in 0..40 {
            tap.push_frame(&[i as f32]);
        }
        let snapshot = tap.time_domain();
        assert_eq!(snapshot.len(), 32);
        assert_eq!(snapshot[0], 8.0);
        assert_eq!(snapshot[31], 39.0);
    }

    #[test]
    fn test_push_frame_averages_channels() {
        let mut tap = Analyser::new(32);
        tap.push_frame(&[1.0, 0.0]);
        assert_eq!(tap.time_domain()[31], 0.5);
    }

    #[test]
    fn test_spectrum_peaks_at_tone_bin() {
        let size = 1024;
        let sr = 48000.0f32;
        let bin = 64;
        let freq = bin as f32 * sr / size as f32;

        let mut tap = Analyser::new(size);
        for i in 0..size {
            tap.push_frame(&[(2.0 * PI * freq * i as f32 / sr).sin()]);
        }
        let spectrum = tap.frequency_db();
        assert_eq!(spectrum.len(), size / 2);

        let (peak_bin, _) = spectrum
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |best, (i, &db)| if db > best.1 { (i, db) } else { best });
        assert_eq!(peak_bin, bin);
    }

    #[test]
    fn test_silence_reports_floor() {
        let tap = Analyser::new(64);
        assert!(tap.frequency_db().iter().all(|&db| db == MIN_DECIBELS));
    }
}
