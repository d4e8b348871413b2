//! Exponential parameter smoothing
//!
//! A one-pole approach toward a target value with time constant `tau`:
//! after `tau` seconds the remaining distance has shrunk to about 37%.
//! Setting a target never jumps, so edits while audio runs stay click-free.

/// Distance below which a ramp snaps onto its target
const SETTLE_EPSILON: f64 = 1e-9;

/// One-pole smoothed parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRamp {
    current: f64,
    target: f64,
    coeff: f64,
}

impl ParamRamp {
    /// Create a ramp resting at `value`
    ///
    /// A non-positive `time_constant` disables smoothing.
    pub fn new(value: f64, time_constant: f64, sample_rate: f64) -> Self {
        Self {
            current: value,
            target: value,
            coeff: Self::coefficient(time_constant, sample_rate),
        }
    }

    /// A ramp that always sits on its target
    pub fn immediate(value: f64) -> Self {
        Self {
            current: value,
            target: value,
            coeff: 1.0,
        }
    }

    fn coefficient(time_constant: f64, sample_rate: f64) -> f64 {
        if time_constant <= 0.0 || sample_rate <= 0.0 {
            1.0
        } else {
            1.0 - (-1.0 / (time_constant * sample_rate)).exp()
        }
    }

    /// Start approaching `target` from the current value
    pub fn set_target(&mut self, target: f64) {
        self.target = target;
        if self.coeff >= 1.0 {
            self.current = target;
        }
    }

    /// Jump to `value` with no transition
    pub fn set_immediate(&mut self, value: f64) {
        self.current = value;
        self.target = value;
    }

    /// Advance one sample and return the new value
    #[inline]
    pub fn next_value(&mut self) -> f64 {
        let distance = self.target - self.current;
        if distance.abs() <= SETTLE_EPSILON {
            self.current = self.target;
        } else {
            self.current += distance * self.coeff;
        }
        self.current
    }

    /// Advance `samples` steps at once
    pub fn advance(&mut self, samples: usize) {
        if self.is_settled() {
            return;
        }
        let remaining = (1.0 - self.coeff).powi(samples.min(i32::MAX as usize) as i32);
        self.current = self.target - (self.target - self.current) * remaining;
        if (self.target - self.current).abs() <= SETTLE_EPSILON {
            self.current = self.target;
        }
    }

    pub fn value(&self) -> f64 {
        self.current
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn is_settled(&self) -> bool {
        self.current == self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_reaches_63_percent_after_one_time_constant() {
        let sr = 48000.0;
        let mut ramp = ParamRamp::new(0.0, 0.016, sr);
        ramp.set_target(1.0);

        let tau_samples = (0.016 * sr) as usize;
        for _ in 0..tau_samples {
            ramp.next_value();
        }
        assert_relative_eq!(ramp.value(), 1.0 - (-1.0f64).exp(), epsilon = 1e-3);
    }

    #[test]
    fn test_settles_on_target() {
        let mut ramp = ParamRamp::new(2.0, 0.001, 48000.0);
        ramp.set_target(5.0);
        for _ in 0..48000 {
            ramp.next_value();
        }
        assert!(ramp.is_settled());
        assert_eq!(ramp.value(), 5.0);
    }

    #[test]
    fn test_no_jump_on_set_target() {
        let mut ramp = ParamRamp::new(1.0, 0.016, 44100.0);
        ramp.set_target(0.0);
        assert_eq!(ramp.value(), 1.0);
        let first = ramp.next_value();
        assert!(first < 1.0 && first > 0.99);
    }

    #[test]
    fn test_immediate_ramp() {
        let mut ramp = ParamRamp::immediate(0.3);
        ramp.set_target(0.8);
        assert_eq!(ramp.value(), 0.8);
        assert_eq!(ramp.next_value(), 0.8);

        let mut zero_tau = ParamRamp::new(0.0, 0.0, 48000.0);
        zero_tau.set_target(3.0);
        assert_eq!(zero_tau.value(), 3.0);
    }

    #[test]
    fn test_advance_matches_stepping() {
        let mut stepped = ParamRamp::new(0.0, 0.01, 48000.0);
        let mut jumped = stepped;
        stepped.set_target(1.0);
        jumped.set_target(1.0);

        for _ in 0..200 {
            stepped.next_value();
        }
        jumped.advance(200);
        assert_relative_eq!(stepped.value(), jumped.value(), epsilon = 1e-9);
    }
}
