//! DSP primitives
//!
//! Sample-level building blocks of the coloration chain. Each primitive keeps
//! its own state and knows nothing about the graph it is wired into.

pub mod analyser;
pub mod biquad;
pub mod compressor;
pub mod delay;
pub mod noise;
pub mod ramp;

pub use analyser::Analyser;
pub use biquad::{Biquad, BiquadCoeffs, FilterKind};
pub use compressor::{Compressor, CompressorSettings};
pub use delay::{DelayLine, MAX_DELAY_SECS};
pub use noise::NoiseSource;
pub use ramp::ParamRamp;
