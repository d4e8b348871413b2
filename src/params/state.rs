//! The six-field parameter vector and its constraints.
//!
//! Every write into an [`AudioState`] goes through [`ParamSpec::clamp`], so a
//! vector can never hold a value outside its field's declared range.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ToneError};

/// One adjustable parameter of the coloration chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    /// Playback-rate multiplier
    Tempo,
    /// Semitone detune
    Pitch,
    /// Low-pass cutoff in Hz
    Frequency,
    /// Output level in percent
    Volume,
    /// Background noise mix in percent
    Noise,
    /// Feedback-delay mix in percent
    Echo,
}

impl Field {
    /// All fields, in application order
    pub const ALL: [Field; 6] = [
        Field::Tempo,
        Field::Pitch,
        Field::Frequency,
        Field::Volume,
        Field::Noise,
        Field::Echo,
    ];

    /// Range, step and default for this field
    pub fn spec(self) -> ParamSpec {
        match self {
            Field::Tempo => ParamSpec::new(0.5, 2.0, 0.1, 1.0),
            Field::Pitch => ParamSpec::new(-12.0, 12.0, 1.0, 0.0),
            Field::Frequency => ParamSpec::new(20.0, 20000.0, 1.0, 16000.0),
            Field::Volume => ParamSpec::new(0.0, 300.0, 1.0, 100.0),
            Field::Noise => ParamSpec::new(0.0, 100.0, 1.0, 0.0),
            Field::Echo => ParamSpec::new(0.0, 100.0, 1.0, 0.0),
        }
    }

    /// Lowercase identifier used in presets, configs and the CLI
    pub fn name(self) -> &'static str {
        match self {
            Field::Tempo => "tempo",
            Field::Pitch => "pitch",
            Field::Frequency => "frequency",
            Field::Volume => "volume",
            Field::Noise => "noise",
            Field::Echo => "echo",
        }
    }

    /// Whether the field belongs to the playing instance rather than a graph node
    pub fn is_transport(self) -> bool {
        matches!(self, Field::Tempo | Field::Pitch)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = ToneError;

    fn from_str(s: &str) -> Result<Self> {
        Field::ALL
            .into_iter()
            .find(|field| field.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ToneError::Config {
                reason: format!("unknown parameter '{}'", s),
            })
    }
}

/// Declared range and granularity of a field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub default: f64,
}

impl ParamSpec {
    const fn new(min: f64, max: f64, step: f64, default: f64) -> Self {
        Self {
            min,
            max,
            step,
            default,
        }
    }

    /// Quantize to the step grid and clamp into `[min, max]`
    ///
    /// Non-finite input never escapes: `+inf` maps to `max`, `-inf` to `min`
    /// and NaN to the default.
    pub fn clamp(&self, value: f64) -> f64 {
        let value = if value.is_nan() {
            self.default
        } else if value == f64::INFINITY {
            self.max
        } else if value == f64::NEG_INFINITY {
            self.min
        } else {
            value
        };

        let stepped = (value / self.step).round() * self.step;
        // Strip float noise such as 1.3000000000000003 left by the step multiply
        let factor = 10f64.powi(self.decimals());
        ((stepped * factor).round() / factor).clamp(self.min, self.max)
    }

    /// Number of whole steps between `min` and `max`
    pub fn steps(&self) -> u32 {
        ((self.max - self.min) / self.step + 1e-9).floor() as u32
    }

    fn decimals(&self) -> i32 {
        (-self.step.log10()).ceil().max(0.0) as i32
    }
}

/// Complete parameter vector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawAudioState")]
pub struct AudioState {
    tempo: f64,
    pitch: f64,
    frequency: f64,
    volume: f64,
    noise: f64,
    echo: f64,
}

impl Default for AudioState {
    fn default() -> Self {
        Self {
            tempo: Field::Tempo.spec().default,
            pitch: Field::Pitch.spec().default,
            frequency: Field::Frequency.spec().default,
            volume: Field::Volume.spec().default,
            noise: Field::Noise.spec().default,
            echo: Field::Echo.spec().default,
        }
    }
}

impl AudioState {
    /// Build a vector from raw values, clamping each one
    pub fn new(tempo: f64, pitch: f64, frequency: f64, volume: f64, noise: f64, echo: f64) -> Self {
        let mut state = Self::default();
        state.set(Field::Tempo, tempo);
        state.set(Field::Pitch, pitch);
        state.set(Field::Frequency, frequency);
        state.set(Field::Volume, volume);
        state.set(Field::Noise, noise);
        state.set(Field::Echo, echo);
        state
    }

    /// Read one field
    pub fn get(&self, field: Field) -> f64 {
        match field {
            Field::Tempo => self.tempo,
            Field::Pitch => self.pitch,
            Field::Frequency => self.frequency,
            Field::Volume => self.volume,
            Field::Noise => self.noise,
            Field::Echo => self.echo,
        }
    }

    /// Write one field, clamped to its range; returns the stored value
    pub fn set(&mut self, field: Field, value: f64) -> f64 {
        let clamped = field.spec().clamp(value);
        let slot = match field {
            Field::Tempo => &mut self.tempo,
            Field::Pitch => &mut self.pitch,
            Field::Frequency => &mut self.frequency,
            Field::Volume => &mut self.volume,
            Field::Noise => &mut self.noise,
            Field::Echo => &mut self.echo,
        };
        *slot = clamped;
        clamped
    }

    /// Copy with one field replaced
    pub fn with(mut self, field: Field, value: f64) -> Self {
        self.set(field, value);
        self
    }

    /// Iterate `(field, value)` pairs in application order
    pub fn iter(&self) -> impl Iterator<Item = (Field, f64)> + '_ {
        Field::ALL.into_iter().map(move |field| (field, self.get(field)))
    }

    /// Fields whose value differs from `other`
    pub fn diff(&self, other: &AudioState) -> Vec<Field> {
        Field::ALL
            .into_iter()
            .filter(|&field| self.get(field) != other.get(field))
            .collect()
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn noise(&self) -> f64 {
        self.noise
    }

    pub fn echo(&self) -> f64 {
        self.echo
    }
}

/// Wire form of [`AudioState`]; missing fields take their defaults
#[derive(Deserialize)]
struct RawAudioState {
    #[serde(default = "default_tempo")]
    tempo: f64,
    #[serde(default)]
    pitch: f64,
    #[serde(default = "default_frequency")]
    frequency: f64,
    #[serde(default = "default_volume")]
    volume: f64,
    #[serde(default)]
    noise: f64,
    #[serde(default)]
    echo: f64,
}

fn default_tempo() -> f64 {
    Field::Tempo.spec().default
}

fn default_frequency() -> f64 {
    Field::Frequency.spec().default
}

fn default_volume() -> f64 {
    Field::Volume.spec().default
}

impl From<RawAudioState> for AudioState {
    fn from(raw: RawAudioState) -> Self {
        AudioState::new(raw.tempo, raw.pitch, raw.frequency, raw.volume, raw.noise, raw.echo)
    }
}
