//! Constrained randomization
//!
//! Draws every unlocked field uniformly over its step grid. A cooldown window
//! guards against overlapping generations and is measured on the injected
//! clock, independent of transport state.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::state::{AudioState, Field};
use crate::engine::clock::Clock;

/// Default cooldown between two accepted generations, in seconds
pub const DEFAULT_COOLDOWN_SECS: f64 = 2.0;

/// Generates and remembers random parameter vectors
#[derive(Debug)]
pub struct RandomizationEngine {
    clock: Arc<dyn Clock>,
    rng: StdRng,
    cooldown_secs: f64,
    locked: Vec<Field>,
    last_generated: Option<AudioState>,
    generating_since: Option<f64>,
}

impl RandomizationEngine {
    /// Create an engine seeded from OS entropy
    pub fn new(clock: Arc<dyn Clock>, cooldown_secs: f64) -> Self {
        Self::with_rng(clock, cooldown_secs, StdRng::from_entropy())
    }

    /// Create a reproducible engine
    pub fn with_seed(clock: Arc<dyn Clock>, cooldown_secs: f64, seed: u64) -> Self {
        Self::with_rng(clock, cooldown_secs, StdRng::seed_from_u64(seed))
    }

    fn with_rng(clock: Arc<dyn Clock>, cooldown_secs: f64, rng: StdRng) -> Self {
        Self {
            clock,
            rng,
            cooldown_secs: cooldown_secs.max(0.0),
            locked: Vec::new(),
            last_generated: None,
            generating_since: None,
        }
    }

    /// Fields that keep their value from the base vector during generation
    pub fn set_locked(&mut self, fields: &[Field]) {
        self.locked = fields.to_vec();
    }

    pub fn locked(&self) -> &[Field] {
        &self.locked
    }

    /// Whether a generation happened less than one cooldown ago
    pub fn is_generating(&self) -> bool {
        match self.generating_since {
            Some(started) => self.clock.now() - started < self.cooldown_secs,
            None => false,
        }
    }

    /// Draw a new vector, or `None` while the cooldown is active
    ///
    /// Locked fields are copied from `base`.
    pub fn generate(&mut self, base: &AudioState) -> Option<AudioState> {
        if self.is_generating() {
            debug!("randomize ignored: generation already in progress");
            return None;
        }

        let mut state = *base;
        for field in Field::ALL {
            if self.locked.contains(&field) {
                continue;
            }
            let value = draw(&mut self.rng, field);
            state.set(field, value);
        }

        self.last_generated = Some(state);
        self.generating_since = Some(self.clock.now());
        debug!(?state, "generated random parameters");
        Some(state)
    }

    /// The last generated vector, without drawing new values
    pub fn restore(&self) -> Option<AudioState> {
        self.last_generated
    }

    /// Forget the last vector and the in-progress flag
    pub fn clear(&mut self) {
        self.last_generated = None;
        self.generating_since = None;
    }
}

/// `min + floor(U * steps) * step` over the field's grid
fn draw(rng: &mut StdRng, field: Field) -> f64 {
    let spec = field.spec();
    let steps = spec.steps().max(1);
    let index = rng.gen_range(0..steps);
    spec.min + f64::from(index) * spec.step
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::clock::ManualClock;

    fn engine_with_clock() -> (Arc<ManualClock>, RandomizationEngine) {
        let clock = Arc::new(ManualClock::new(0.0));
        let engine = RandomizationEngine::with_seed(clock.clone(), DEFAULT_COOLDOWN_SECS, 7);
        (clock, engine)
    }

    #[test]
    fn test_generated_values_stay_on_grid() {
        let clock = Arc::new(ManualClock::new(0.0));
        let mut engine = RandomizationEngine::with_seed(clock.clone(), 0.0, 42);

        for _ in 0..200 {
            let state = engine.generate(&AudioState::default()).unwrap();
            for (field, value) in state.iter() {
                let spec = field.spec();
                assert!(value >= spec.min && value <= spec.max, "{} = {}", field, value);
                assert_eq!(spec.clamp(value), value, "{} off grid: {}", field, value);
            }
        }
    }

    #[test]
    fn test_cooldown_rejects_overlapping_generation() {
        let (clock, mut engine) = engine_with_clock();
        let base = AudioState::default();

        let first = engine.generate(&base);
        assert!(first.is_some());
        assert!(engine.is_generating());

        clock.advance(1.0);
        assert!(engine.generate(&base).is_none());
        assert_eq!(engine.restore(), first);

        clock.advance(1.0);
        assert!(!engine.is_generating());
        assert!(engine.generate(&base).is_some());
    }

    #[test]
    fn test_restore_replays_without_drawing() {
        let (_clock, mut engine) = engine_with_clock();
        assert!(engine.restore().is_none());

        let generated = engine.generate(&AudioState::default()).unwrap();
        assert_eq!(engine.restore(), Some(generated));
        assert_eq!(engine.restore(), Some(generated));
    }

    #[test]
    fn test_locked_fields_keep_base_value() {
        let (_clock, mut engine) = engine_with_clock();
        engine.set_locked(&[Field::Volume]);

        let base = AudioState::default().with(Field::Volume, 42.0);
        let state = engine.generate(&base).unwrap();
        assert_eq!(state.volume(), 42.0);
    }

    #[test]
    fn test_seeded_engines_agree() {
        let clock = Arc::new(ManualClock::new(0.0));
        let mut a = RandomizationEngine::with_seed(clock.clone(), 0.0, 99);
        let mut b = RandomizationEngine::with_seed(clock, 0.0, 99);
        let base = AudioState::default();
        assert_eq!(a.generate(&base), b.generate(&base));
    }

    #[test]
    fn test_clear_forgets_last_vector() {
        let (_clock, mut engine) = engine_with_clock();
        engine.generate(&AudioState::default());
        engine.clear();
        assert!(engine.restore().is_none());
        assert!(!engine.is_generating());
    }
}
