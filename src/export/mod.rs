//! Export Module
//!
//! Offline rendering of the current configuration into an encoded file.

pub mod encoder;
pub mod format;
pub mod renderer;

pub use encoder::{Encoder, EncoderRegistry, WavEncoder};
pub use format::{ExportFormat, ExportOptions, ExportQuality};
pub use renderer::{ExportRenderer, ExportedAudio};
