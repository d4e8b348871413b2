//! Offline export
//!
//! Renders the loaded track through a static copy of the coloration graph,
//! then encodes the result.

use std::fmt::Write as _;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::encoder::EncoderRegistry;
use super::format::{ExportFormat, ExportOptions};
use crate::engine::buffer::{AudioBuffer, NORMALIZE_TARGET};
use crate::engine::context::OfflineContext;
use crate::engine::track::DecodedTrack;
use crate::error::{Result, ToneError};
use crate::graph::mapping::{echo_tail_secs, playback_rate};
use crate::graph::GraphSettings;
use crate::params::AudioState;

/// Encoded export payload
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedAudio {
    pub bytes: Vec<u8>,
    /// Lowercase hex SHA-256 of `bytes`
    pub sha256: String,
    pub format: ExportFormat,
    /// Stem plus extension
    pub file_name: String,
    pub sample_rate: u32,
    pub channels: usize,
    pub frames: usize,
}

impl ExportedAudio {
    pub fn extension(&self) -> &'static str {
        self.format.extension()
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames as f64 / f64::from(self.sample_rate)
    }
}

/// Renders and encodes exports
#[derive(Debug, Default)]
pub struct ExportRenderer {
    settings: GraphSettings,
    encoders: EncoderRegistry,
}

impl ExportRenderer {
    pub fn new(settings: GraphSettings, encoders: EncoderRegistry) -> Self {
        Self { settings, encoders }
    }

    pub fn encoders(&self) -> &EncoderRegistry {
        &self.encoders
    }

    pub fn encoders_mut(&mut self) -> &mut EncoderRegistry {
        &mut self.encoders
    }

    /// Length of the render: the track at its effective speed plus the optional echo tail
    pub fn render_length_secs(&self, track: &DecodedTrack, state: &AudioState, options: &ExportOptions) -> f64 {
        let rate = playback_rate(state.tempo(), state.pitch());
        let body = track.duration_secs() / rate;
        let tail = if options.include_echo_tail {
            echo_tail_secs(state.echo(), self.settings.echo_delay_secs)
        } else {
            0.0
        };
        body + tail
    }

    /// Render `source` with `params` and encode it per `options`
    ///
    /// Nothing is rendered when the source or parameters are missing or no
    /// encoder is registered for the format. The offline context is released
    /// on every path.
    pub fn render(
        &self,
        source: Option<&Arc<DecodedTrack>>,
        params: Option<&AudioState>,
        options: &ExportOptions,
    ) -> Result<ExportedAudio> {
        let track = source.ok_or_else(|| ToneError::export("no audio loaded"))?;
        let state = params.ok_or_else(|| ToneError::export("no parameters to render with"))?;
        let encoder = self.encoders.get(options.format)?;

        let sample_rate = options.quality.sample_rate();
        let frames = (self.render_length_secs(track, state, options) * f64::from(sample_rate)).ceil() as usize;
        if frames == 0 {
            return Err(ToneError::export("nothing to render: the track is empty"));
        }

        let rendered = self.render_samples(track, state, sample_rate, frames)?;
        if !rendered.is_finite() {
            return Err(ToneError::export("render produced non-finite samples"));
        }
        let rendered = if options.normalize {
            let mut rendered = rendered;
            let gain = rendered.normalize_peak(NORMALIZE_TARGET);
            debug!(gain, "export normalized");
            rendered
        } else {
            rendered
        };

        let bytes = encoder.encode(&rendered, options.quality)?;
        let sha256 = hex_digest(&bytes);

        info!(
            format = %options.format,
            quality = %options.quality,
            frames,
            bytes = bytes.len(),
            "export complete"
        );

        Ok(ExportedAudio {
            bytes,
            sha256,
            format: options.format,
            file_name: options.file_name(),
            sample_rate,
            channels: rendered.channels(),
            frames: rendered.frames(),
        })
    }

    /// Raw offline render without encoding
    pub fn render_samples(
        &self,
        track: &Arc<DecodedTrack>,
        state: &AudioState,
        sample_rate: u32,
        frames: usize,
    ) -> Result<AudioBuffer> {
        let mut ctx = OfflineContext::new(&self.settings, sample_rate, track.channels(), frames, state)?;
        let source = ctx.create_source(Arc::clone(track), state.tempo(), state.pitch());
        ctx.start_source(source, 0.0);
        Ok(ctx.render_to_completion())
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().fold(String::with_capacity(64), |mut out, byte| {
        let _ = write!(out, "{:02x}", byte);
        out
    })
}
