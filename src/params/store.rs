//! Parameter snapshot store
//!
//! Holds the `original` / `current` / `last_modified` triple. All mutation goes
//! through `&mut self`, so the modification flag is always derived from a
//! consistent pair of vectors.

use tracing::trace;

use super::state::{AudioState, Field};

/// Three-vector parameter record with a derived modification flag
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterStore {
    original: AudioState,
    current: AudioState,
    last_modified: AudioState,
    has_modifications: bool,
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new(AudioState::default())
    }
}

impl ParameterStore {
    /// Create a store whose baseline is `state`
    pub fn new(state: AudioState) -> Self {
        Self {
            original: state,
            current: state,
            last_modified: state,
            has_modifications: false,
        }
    }

    /// Clamp and write one field; returns the stored value
    ///
    /// Never fails. The edit is mirrored into `last_modified`.
    pub fn update(&mut self, field: Field, value: f64) -> f64 {
        let stored = self.current.set(field, value);
        self.last_modified = self.current;
        self.has_modifications = self.current != self.original;
        trace!(%field, requested = value, stored, "parameter updated");
        stored
    }

    /// Make `state` the new baseline for all three vectors
    pub fn commit_original(&mut self, state: AudioState) {
        self.original = state;
        self.current = state;
        self.last_modified = state;
        self.has_modifications = false;
    }

    /// Restore the baseline; idempotent
    pub fn reset(&mut self) -> AudioState {
        self.current = self.original;
        self.last_modified = self.original;
        self.has_modifications = false;
        self.current
    }

    /// Put `last_modified` back into `current`
    pub fn restore_last_modified(&mut self) -> AudioState {
        self.current = self.last_modified;
        self.has_modifications = self.current != self.original;
        self.current
    }

    /// Fields where `current` differs from `original`
    pub fn diff(&self) -> Vec<Field> {
        self.current.diff(&self.original)
    }

    pub fn current(&self) -> &AudioState {
        &self.current
    }

    pub fn original(&self) -> &AudioState {
        &self.original
    }

    pub fn last_modified(&self) -> &AudioState {
        &self.last_modified
    }

    pub fn has_modifications(&self) -> bool {
        self.has_modifications
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(Field::Tempo, 1.26)]
    #[test_case(Field::Pitch, -7.4)]
    #[test_case(Field::Frequency, 25000.0)]
    #[test_case(Field::Volume, 150.2)]
    #[test_case(Field::Noise, 101.0)]
    #[test_case(Field::Echo, -1.0)]
    fn test_update_matches_quantize_formula(field: Field, value: f64) {
        let mut store = ParameterStore::default();
        let stored = store.update(field, value);

        let spec = field.spec();
        let expected = ((value / spec.step).round() * spec.step).clamp(spec.min, spec.max);
        assert_relative_eq!(stored, expected, epsilon = 1e-9);
        assert_eq!(store.current().get(field), stored);
        assert!(stored >= spec.min && stored <= spec.max);
    }

    #[test]
    fn test_update_mirrors_last_modified() {
        let mut store = ParameterStore::default();
        store.update(Field::Frequency, 432.0);
        assert_eq!(store.last_modified(), store.current());
        assert!(store.has_modifications());
    }

    #[test]
    fn test_modification_flag_follows_values() {
        let mut store = ParameterStore::default();
        assert!(!store.has_modifications());

        store.update(Field::Echo, 40.0);
        assert!(store.has_modifications());

        // Editing back to the baseline clears the flag
        store.update(Field::Echo, 0.0);
        assert!(!store.has_modifications());
        assert!(store.diff().is_empty());
    }

    #[test]
    fn test_reset_restores_committed_baseline() {
        let mut store = ParameterStore::default();
        let baseline = AudioState::default().with(Field::Volume, 120.0);
        store.commit_original(baseline);

        store.update(Field::Tempo, 1.7);
        store.update(Field::Noise, 33.0);
        store.update(Field::Volume, 10.0);

        let restored = store.reset();
        assert_eq!(restored, baseline);
        assert_eq!(*store.current(), baseline);
        assert_eq!(*store.last_modified(), baseline);
        assert!(!store.has_modifications());

        // Idempotent
        assert_eq!(store.reset(), baseline);
        assert!(!store.has_modifications());
    }

    #[test]
    fn test_commit_clears_modifications() {
        let mut store = ParameterStore::default();
        store.update(Field::Pitch, 5.0);
        let edited = *store.current();

        store.commit_original(edited);
        assert!(!store.has_modifications());
        assert_eq!(*store.original(), edited);
    }

    #[test]
    fn test_restore_last_modified() {
        let mut store = ParameterStore::default();
        store.update(Field::Frequency, 900.0);
        let edited = *store.current();

        let restored = store.restore_last_modified();
        assert_eq!(restored, edited);
        assert!(store.has_modifications());
        assert_eq!(store.diff(), vec![Field::Frequency]);
    }
}
