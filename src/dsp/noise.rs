//! Background noise source
//!
//! A buffer of uniform white noise played in a loop. The buffer is generated
//! from a seeded generator so live and offline renders of the same settings
//! share the exact same noise.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Looping white-noise buffer
#[derive(Debug, Clone)]
pub struct NoiseSource {
    samples: Vec<f32>,
    position: usize,
}

impl NoiseSource {
    /// Generate `length_secs` of noise in `[-1, 1)` at `sample_rate`
    pub fn new(length_secs: f64, sample_rate: f64, seed: u64) -> Self {
        let len = ((length_secs * sample_rate).round() as usize).max(1);
        let mut rng = StdRng::seed_from_u64(seed);
        let samples = (0..len).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
        Self {
            samples,
            position: 0,
        }
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let sample = self.samples[self.position];
        self.position = (self.position + 1) % self.samples.len();
        sample
    }

    /// Restart from the beginning of the buffer
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
