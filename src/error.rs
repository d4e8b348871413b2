//! Error handling for Tonewarp
//!
//! Parameter range violations are never errors: out-of-range values are clamped
//! by the parameter store. Everything here is a genuine failure that must reach
//! the caller.

use thiserror::Error;

/// Result type alias for Tonewarp operations
pub type Result<T> = std::result::Result<T, ToneError>;

/// Main error type for Tonewarp operations
#[derive(Error, Debug)]
pub enum ToneError {
    // Load Errors
    #[error("Failed to decode audio: {reason}")]
    Decode {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    // Transport Errors
    #[error("Cannot start playback: no {missing} loaded")]
    PlaybackPrecondition { missing: &'static str },

    // Export Errors
    #[error("Export failed: {reason}")]
    Export { reason: String },

    #[error("No encoder registered for format '{format}'")]
    EncoderUnavailable { format: String },

    #[error("Encoder failed for format '{format}': {reason}")]
    Encode { format: String, reason: String },

    // Graph Errors
    #[error("Invalid graph topology: {reason}")]
    Topology { reason: String },

    // Configuration Errors
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("Unknown preset: {id}")]
    PresetNotFound { id: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ToneError {
    /// Shorthand for a decode failure without an underlying source
    pub fn decode(reason: impl Into<String>) -> Self {
        ToneError::Decode {
            reason: reason.into(),
            source: None,
        }
    }

    /// Shorthand for an export failure
    pub fn export(reason: impl Into<String>) -> Self {
        ToneError::Export {
            reason: reason.into(),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            ToneError::Decode { .. } => "DECODE_ERROR",
            ToneError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            ToneError::PlaybackPrecondition { .. } => "PLAYBACK_PRECONDITION",
            ToneError::Export { .. } => "EXPORT_ERROR",
            ToneError::EncoderUnavailable { .. } => "ENCODER_UNAVAILABLE",
            ToneError::Encode { .. } => "ENCODE_ERROR",
            ToneError::Topology { .. } => "TOPOLOGY_ERROR",
            ToneError::Config { .. } => "CONFIG_ERROR",
            ToneError::PresetNotFound { .. } => "PRESET_NOT_FOUND",
            ToneError::Io(_) => "IO_ERROR",
            ToneError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if the caller can reasonably retry after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ToneError::Decode { .. }
                | ToneError::UnsupportedFormat { .. }
                | ToneError::PlaybackPrecondition { .. }
                | ToneError::EncoderUnavailable { .. }
                | ToneError::PresetNotFound { .. }
        )
    }

    /// Returns a suggested recovery action for this error
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ToneError::Decode { .. } => "Check that the file plays elsewhere, or convert it to WAV",
            ToneError::UnsupportedFormat { .. } => "Convert to 8/16/24/32-bit PCM or 32-bit float WAV",
            ToneError::PlaybackPrecondition { .. } => "Load a track before starting playback",
            ToneError::Export { .. } => "Load a track and try the export again",
            ToneError::EncoderUnavailable { .. } => "Export as WAV or register an external encoder",
            ToneError::Config { .. } => "Fix the configuration value or remove it to use the default",
            ToneError::PresetNotFound { .. } => "List the catalog to see available preset ids",
            _ => "Check the error details and try again",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = ToneError::PlaybackPrecondition { missing: "track" };
        assert_eq!(err.error_code(), "PLAYBACK_PRECONDITION");
        assert_eq!(err.to_string(), "Cannot start playback: no track loaded");
    }

    #[test]
    fn test_recovery_hints() {
        let err = ToneError::EncoderUnavailable {
            format: "mp3".to_string(),
        };
        assert!(err.is_recoverable());
        assert!(err.recovery_hint().contains("WAV"));

        let err = ToneError::export("missing track");
        assert!(!err.is_recoverable());
    }
}
