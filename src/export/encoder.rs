//! Encoders
//!
//! The engine only ships a WAV encoder. Lossy formats are handed to an
//! external codec that the host registers with the [`EncoderRegistry`].

use std::collections::HashMap;
use std::fmt;

use super::format::{ExportFormat, ExportQuality};
use crate::engine::buffer::AudioBuffer;
use crate::engine::io::encode_wav;
use crate::error::{Result, ToneError};

/// Turns rendered samples into a file payload
pub trait Encoder: Send + Sync {
    /// Format this encoder produces
    fn format(&self) -> ExportFormat;

    /// Encode `rendered`, already at `quality`'s sample rate
    fn encode(&self, rendered: &AudioBuffer, quality: ExportQuality) -> Result<Vec<u8>>;
}

/// Built-in PCM WAV encoder at the quality's bit depth
#[derive(Debug, Clone, Copy, Default)]
pub struct WavEncoder;

impl Encoder for WavEncoder {
    fn format(&self) -> ExportFormat {
        ExportFormat::Wav
    }

    fn encode(&self, rendered: &AudioBuffer, quality: ExportQuality) -> Result<Vec<u8>> {
        encode_wav(rendered, quality.bit_depth())
    }
}

/// Encoders by output format
pub struct EncoderRegistry {
    encoders: HashMap<ExportFormat, Box<dyn Encoder>>,
}

impl EncoderRegistry {
    /// Registry without any encoder
    pub fn empty() -> Self {
        Self {
            encoders: HashMap::new(),
        }
    }

    /// Registry with the built-in WAV encoder
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(WavEncoder));
        registry
    }

    /// Add an encoder, replacing any previous one for the same format
    pub fn register(&mut self, encoder: Box<dyn Encoder>) {
        self.encoders.insert(encoder.format(), encoder);
    }

    pub fn get(&self, format: ExportFormat) -> Result<&dyn Encoder> {
        self.encoders
            .get(&format)
            .map(|encoder| encoder.as_ref())
            .ok_or_else(|| ToneError::EncoderUnavailable {
                format: format.to_string(),
            })
    }

    pub fn supports(&self, format: ExportFormat) -> bool {
        self.encoders.contains_key(&format)
    }

    /// Registered formats in declaration order
    pub fn formats(&self) -> Vec<ExportFormat> {
        ExportFormat::ALL.into_iter().filter(|f| self.supports(*f)).collect()
    }
}

impl Default for EncoderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EncoderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncoderRegistry").field("formats", &self.formats()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::io::generate_test_tone;

    struct RawEncoder;

    impl Encoder for RawEncoder {
        fn format(&self) -> ExportFormat {
            ExportFormat::Mp3
        }

        fn encode(&self, rendered: &AudioBuffer, _quality: ExportQuality) -> Result<Vec<u8>> {
            Ok(rendered.to_interleaved().iter().flat_map(|s| s.to_le_bytes()).collect())
        }
    }

    #[test]
    fn test_default_registry_has_wav_only() {
        let registry = EncoderRegistry::default();
        assert_eq!(registry.formats(), vec![ExportFormat::Wav]);
        let err = registry.get(ExportFormat::Aac).err().unwrap();
        assert_eq!(err.error_code(), "ENCODER_UNAVAILABLE");
    }

    #[test]
    fn test_register_external_encoder() {
        let mut registry = EncoderRegistry::new();
        registry.register(Box::new(RawEncoder));
        assert!(registry.supports(ExportFormat::Mp3));

        let tone = generate_test_tone(440.0, 0.01, 8000, 1);
        let bytes = registry.get(ExportFormat::Mp3).unwrap().encode(&tone, ExportQuality::Low).unwrap();
        assert_eq!(bytes.len(), tone.frames() * 4);
    }

    #[test]
    fn test_wav_encoder_bit_depth_follows_quality() {
        let tone = generate_test_tone(440.0, 0.1, 48000, 2);
        let high = WavEncoder.encode(&tone, ExportQuality::High).unwrap();
        let medium = WavEncoder.encode(&tone, ExportQuality::Medium).unwrap();

        let reader = hound::WavReader::new(std::io::Cursor::new(&high)).unwrap();
        assert_eq!(reader.spec().bits_per_sample, 24);
        let reader = hound::WavReader::new(std::io::Cursor::new(&medium)).unwrap();
        assert_eq!(reader.spec().bits_per_sample, 16);
    }
}
