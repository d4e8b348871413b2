//! Export vocabulary: container formats, quality presets and render options

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ToneError};

/// Output container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Wav,
    /// 320 kbps, needs an external encoder
    Mp3,
    /// 256 kbps, needs an external encoder
    Aac,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Wav, ExportFormat::Mp3, ExportFormat::Aac];

    pub fn id(self) -> &'static str {
        match self {
            ExportFormat::Wav => "wav",
            ExportFormat::Mp3 => "mp3",
            ExportFormat::Aac => "aac",
        }
    }

    pub fn extension(self) -> &'static str {
        self.id()
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Wav => "audio/wav",
            ExportFormat::Mp3 => "audio/mpeg",
            ExportFormat::Aac => "audio/aac",
        }
    }

    /// Target bitrate of lossy formats
    pub fn bitrate_kbps(self) -> Option<u32> {
        match self {
            ExportFormat::Wav => None,
            ExportFormat::Mp3 => Some(320),
            ExportFormat::Aac => Some(256),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ExportFormat {
    type Err = ToneError;

    fn from_str(s: &str) -> Result<Self> {
        ExportFormat::ALL
            .into_iter()
            .find(|format| format.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ToneError::UnsupportedFormat { format: s.to_string() })
    }
}

/// Sample rate and bit depth preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportQuality {
    /// 48 kHz, 24-bit
    #[default]
    High,
    /// 44.1 kHz, 16-bit
    Medium,
    /// 22.05 kHz, 16-bit
    Low,
}

impl ExportQuality {
    pub const ALL: [ExportQuality; 3] = [ExportQuality::High, ExportQuality::Medium, ExportQuality::Low];

    pub fn id(self) -> &'static str {
        match self {
            ExportQuality::High => "high",
            ExportQuality::Medium => "medium",
            ExportQuality::Low => "low",
        }
    }

    pub fn sample_rate(self) -> u32 {
        match self {
            ExportQuality::High => 48000,
            ExportQuality::Medium => 44100,
            ExportQuality::Low => 22050,
        }
    }

    pub fn bit_depth(self) -> u16 {
        match self {
            ExportQuality::High => 24,
            ExportQuality::Medium | ExportQuality::Low => 16,
        }
    }
}

impl fmt::Display for ExportQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ExportQuality {
    type Err = ToneError;

    fn from_str(s: &str) -> Result<Self> {
        ExportQuality::ALL
            .into_iter()
            .find(|quality| quality.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ToneError::Config {
                reason: format!("unknown export quality '{}', expected high, medium or low", s),
            })
    }
}

/// Everything an export needs besides the audio and the parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub format: ExportFormat,
    pub quality: ExportQuality,
    /// File stem; the format's extension is appended
    pub filename: String,
    /// Extend the render until the echo loop has decayed below -60 dB
    pub include_echo_tail: bool,
    /// Peak-normalize the rendered audio before encoding
    pub normalize: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: ExportFormat::default(),
            quality: ExportQuality::default(),
            filename: "tonewarp-export".to_string(),
            include_echo_tail: false,
            normalize: false,
        }
    }
}

impl ExportOptions {
    /// Stem plus extension
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.filename, self.format.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(ExportFormat::Wav, "wav", "audio/wav", None)]
    #[test_case(ExportFormat::Mp3, "mp3", "audio/mpeg", Some(320))]
    #[test_case(ExportFormat::Aac, "aac", "audio/aac", Some(256))]
    fn test_format_table(format: ExportFormat, ext: &str, mime: &str, kbps: Option<u32>) {
        assert_eq!(format.extension(), ext);
        assert_eq!(format.mime_type(), mime);
        assert_eq!(format.bitrate_kbps(), kbps);
        assert_eq!(ext.parse::<ExportFormat>().unwrap(), format);
    }

    #[test_case(ExportQuality::High, 48000, 24)]
    #[test_case(ExportQuality::Medium, 44100, 16)]
    #[test_case(ExportQuality::Low, 22050, 16)]
    fn test_quality_table(quality: ExportQuality, rate: u32, bits: u16) {
        assert_eq!(quality.sample_rate(), rate);
        assert_eq!(quality.bit_depth(), bits);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!("flac".parse::<ExportFormat>().unwrap_err().error_code(), "UNSUPPORTED_FORMAT");
        assert_eq!("ultra".parse::<ExportQuality>().unwrap_err().error_code(), "CONFIG_ERROR");
        assert_eq!(" MP3 ".parse::<ExportFormat>().unwrap(), ExportFormat::Mp3);
    }

    #[test]
    fn test_default_options() {
        let options = ExportOptions::default();
        assert_eq!(options.format, ExportFormat::Wav);
        assert_eq!(options.quality, ExportQuality::High);
        assert_eq!(options.file_name(), "tonewarp-export.wav");
        assert!(!options.include_echo_tail && !options.normalize);
    }

    #[test]
    fn test_options_deserialize_partial() {
        let options: ExportOptions = serde_json::from_str(r#"{"format":"aac","normalize":true}"#).unwrap();
        assert_eq!(options.format, ExportFormat::Aac);
        assert_eq!(options.quality, ExportQuality::High);
        assert!(options.normalize);
    }
}
