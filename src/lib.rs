//! Tonewarp - Real-time Audio Coloration Engine
//!
//! Tonewarp loads one recording and colours it through a fixed chain of
//! effects: low-pass tone shaping, tempo and pitch change, a synthesized
//! noise bed, feedback echo and output gain, glued by a compressor.
//!
//! # Architecture
//!
//! - [`params`]: the six-field parameter vector, the original / current /
//!   last-modified store, constrained randomization and presets
//! - [`dsp`]: smoothing ramps, filters, delay, compressor, noise, analysis
//! - [`graph`]: the validated node topology and the rendering graph
//! - [`engine`]: buffers, decoding, live and offline contexts, transport
//! - [`export`]: offline rendering and encoding
//! - [`processor`]: the [`AudioEngine`] facade tying them together
//!
//! The live path smooths every parameter change; the export path applies
//! the same parameters statically and renders the same samples once the
//! live ramps have settled.

pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod export;
pub mod graph;
pub mod params;
pub mod processor;

pub use config::EngineConfig;
pub use error::{Result, ToneError};
pub use params::{AudioState, Field};
pub use processor::{mixdown, AudioEngine};
