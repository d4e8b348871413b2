//! Audio engine facade
//!
//! [`AudioEngine`] wires the parameter store, the live context with its
//! effect graph, the transport, the randomizer, presets and the exporter
//! into the operations a front end calls. It is single-threaded: the host
//! pulls audio with [`AudioEngine::render_block`] and polls the playhead
//! with [`AudioEngine::tick`].

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::engine::buffer::{AudioBuffer, NORMALIZE_TARGET};
use crate::engine::clock::{Clock, SystemClock};
use crate::engine::context::LiveContext;
use crate::engine::io::{Decoder, WavDecoder};
use crate::engine::track::{DecodedTrack, TrackSpecs};
use crate::engine::transport::{PlaybackController, TransportState};
use crate::error::{Result, ToneError};
use crate::export::{Encoder, EncoderRegistry, ExportOptions, ExportRenderer, ExportedAudio};
use crate::params::{AudioState, Field, PresetCatalog, ParameterStore, RandomizationEngine};

/// One loaded track, its parameters and everything that plays or exports it
pub struct AudioEngine {
    config: EngineConfig,
    ctx: LiveContext,
    decoder: Box<dyn Decoder>,
    track: Option<Arc<DecodedTrack>>,
    store: ParameterStore,
    transport: PlaybackController,
    randomizer: RandomizationEngine,
    renderer: ExportRenderer,
    presets: PresetCatalog,
    active_preset: Option<String>,
}

impl AudioEngine {
    /// Engine on the system clock
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    /// Engine on an injected clock
    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let ctx = LiveContext::new(
            config.live_sample_rate,
            config.smoothing_secs,
            config.graph.clone(),
            Arc::clone(&clock),
        );
        let mut randomizer = match config.randomizer.seed {
            Some(seed) => RandomizationEngine::with_seed(clock, config.randomizer.cooldown_secs, seed),
            None => RandomizationEngine::new(clock, config.randomizer.cooldown_secs),
        };
        randomizer.set_locked(&config.randomizer.locked);
        let renderer = ExportRenderer::new(config.graph.clone(), EncoderRegistry::new());

        Ok(Self {
            config,
            ctx,
            decoder: Box::new(WavDecoder),
            track: None,
            store: ParameterStore::default(),
            transport: PlaybackController::new(),
            randomizer,
            renderer,
            presets: PresetCatalog::default(),
            active_preset: None,
        })
    }

    /// Replace the decoder used by [`load_bytes`](Self::load_bytes)
    pub fn with_decoder(mut self, decoder: Box<dyn Decoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Make an external codec available for export
    pub fn register_encoder(&mut self, encoder: Box<dyn Encoder>) {
        self.renderer.encoders_mut().register(encoder);
    }

    pub fn set_presets(&mut self, presets: PresetCatalog) {
        self.presets = presets;
        self.active_preset = None;
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Read and decode a file, then install it
    pub fn load_file(&mut self, path: &Path) -> Result<&DecodedTrack> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.load_bytes(&name, &bytes)
    }

    /// Decode `bytes` and replace the current track
    ///
    /// On failure the previous track, graph and parameters stay untouched.
    pub fn load_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<&DecodedTrack> {
        let track = self.decoder.decode(name, bytes)?;
        self.install(track)
    }

    /// Replace the current track with an already decoded one
    pub fn load_track(&mut self, track: DecodedTrack) -> Result<&DecodedTrack> {
        self.install(track)
    }

    fn install(&mut self, track: DecodedTrack) -> Result<&DecodedTrack> {
        let defaults = AudioState::default();
        // Build first so a failure leaves the previous graph in place
        self.ctx.build_graph(track.channels(), &defaults)?;

        self.transport.stop(&mut self.ctx);
        self.transport.load(track.duration_secs());
        self.store = ParameterStore::new(defaults);
        self.randomizer.clear();
        self.active_preset = None;

        info!(
            name = track.name(),
            sample_rate = track.sample_rate(),
            channels = track.channels(),
            duration = track.duration_secs(),
            "track loaded"
        );
        let track = self.track.insert(Arc::new(track));
        Ok(&**track)
    }

    /// Stop playback and drop the track and its graph
    pub fn clear(&mut self) {
        if self.track.is_none() && self.ctx.graph().is_none() {
            return;
        }
        self.transport.stop(&mut self.ctx);
        let disconnected = self.ctx.teardown_graph();
        self.track = None;
        self.transport.clear();
        self.store = ParameterStore::default();
        self.randomizer.clear();
        self.active_preset = None;
        debug!(disconnected, "track cleared");
    }

    // ========================================================================
    // Parameters
    // ========================================================================

    /// Store one field and route it to the graph and, for tempo and pitch, the transport
    ///
    /// Returns the clamped value that was stored.
    pub fn set_parameter(&mut self, field: Field, value: f64) -> f64 {
        let stored = self.store.update(field, value);
        self.route(field, stored);
        stored
    }

    /// Set every field of `state`
    pub fn apply_state(&mut self, state: &AudioState) {
        for (field, value) in state.iter() {
            self.set_parameter(field, value);
        }
    }

    /// Push a value to the graph and transport without touching the store
    fn route(&mut self, field: Field, value: f64) {
        if let Some(graph) = self.ctx.graph_mut() {
            graph.apply_parameter(field, value);
        }
        if field.is_transport() {
            self.transport.update_playback_params(&mut self.ctx, field, value);
        }
    }

    fn route_state(&mut self, state: &AudioState) {
        for (field, value) in state.iter() {
            self.route(field, value);
        }
    }

    /// Make the current vector the new baseline
    pub fn commit_original(&mut self) {
        let current = *self.store.current();
        self.store.commit_original(current);
    }

    /// Restore the original vector; playback keeps running
    fn reset_parameters(&mut self) -> AudioState {
        let state = self.store.reset();
        self.route_state(&state);
        state
    }

    /// Pause, rewind and restore the original vector everywhere
    ///
    /// `None` when nothing is loaded.
    pub fn reset(&mut self) -> Option<AudioState> {
        self.ctx.graph()?;

        self.transport.pause(&mut self.ctx);
        self.transport.seek(&mut self.ctx, 0.0);
        let state = self.reset_parameters();
        self.active_preset = None;
        debug!("engine reset");
        Some(state)
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Start playing from the current position
    pub fn play(&mut self) -> Result<()> {
        let from = self.transport.position();
        let looping = self.transport.is_looping();
        self.transport.play(&mut self.ctx, self.track.clone(), from, looping)
    }

    pub fn pause(&mut self) {
        self.transport.pause(&mut self.ctx);
    }

    pub fn stop(&mut self) {
        self.transport.stop(&mut self.ctx);
    }

    /// Play when halted, otherwise pause and bring back the last adjusted vector
    pub fn toggle_playback(&mut self) -> Result<TransportState> {
        if self.transport.is_playing() {
            self.transport.pause(&mut self.ctx);
            let state = self.store.restore_last_modified();
            self.route_state(&state);
        } else {
            self.play()?;
        }
        Ok(self.transport.state())
    }

    pub fn seek(&mut self, seconds: f64) -> f64 {
        self.transport.seek(&mut self.ctx, seconds)
    }

    /// Poll the playhead; `None` once playback is no longer running
    pub fn tick(&mut self) -> Option<f64> {
        self.transport.tick(&mut self.ctx)
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.transport.set_looping(&mut self.ctx, looping);
    }

    /// Flip looping; returns the new flag
    pub fn toggle_loop(&mut self) -> bool {
        let looping = !self.transport.is_looping();
        self.set_looping(looping);
        looping
    }

    /// Pull one block from the live context, as the host audio callback does
    pub fn render_block(&mut self, frames: usize) -> AudioBuffer {
        self.ctx.render_block(frames)
    }

    // ========================================================================
    // Randomization and presets
    // ========================================================================

    /// Draw and apply a random vector; `None` during the cooldown or without a track
    pub fn randomize(&mut self) -> Option<AudioState> {
        if self.ctx.graph().is_none() {
            warn!("randomize ignored: no track loaded");
            return None;
        }
        let state = self.randomizer.generate(self.store.current())?;
        self.apply_state(&state);
        Some(state)
    }

    /// Re-apply the last generated vector
    pub fn restore_random(&mut self) -> Option<AudioState> {
        let state = self.randomizer.restore()?;
        self.apply_state(&state);
        Some(state)
    }

    pub fn is_randomizing(&self) -> bool {
        self.randomizer.is_generating()
    }

    /// Apply a preset, or deselect it and reset to the original when it is already active
    ///
    /// Returns the active preset id afterwards.
    pub fn select_preset(&mut self, id: &str) -> Result<Option<&str>> {
        if self.active_preset.as_deref() == Some(id) {
            self.active_preset = None;
            self.reset_parameters();
            debug!(id, "preset deselected");
            return Ok(None);
        }

        let state = self.presets.get(id)?.state;
        self.apply_state(&state);
        debug!(id, "preset selected");
        Ok(Some(self.active_preset.insert(id.to_string()).as_str()))
    }

    // ========================================================================
    // Export
    // ========================================================================

    /// Render the current configuration offline and encode it
    ///
    /// Neither the parameters nor the transport change, whatever the outcome.
    pub fn export(&self, options: &ExportOptions) -> Result<ExportedAudio> {
        let params = self.ctx.graph().map(|_| self.store.current());
        self.renderer.render(self.track.as_ref(), params, options)
    }

    /// Export and write the payload to `path`
    pub fn export_to_file(&self, path: &Path, options: &ExportOptions) -> Result<ExportedAudio> {
        let exported = self.export(options)?;
        std::fs::write(path, &exported.bytes)?;
        info!(path = %path.display(), sha256 = %exported.sha256, "export written");
        Ok(exported)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &AudioState {
        self.store.current()
    }

    pub fn original_state(&self) -> &AudioState {
        self.store.original()
    }

    pub fn last_modified_state(&self) -> &AudioState {
        self.store.last_modified()
    }

    pub fn has_modifications(&self) -> bool {
        self.store.has_modifications()
    }

    pub fn modified_fields(&self) -> Vec<Field> {
        self.store.diff()
    }

    pub fn track(&self) -> Option<&DecodedTrack> {
        self.track.as_deref()
    }

    /// Format of the loaded file
    pub fn track_specs(&self) -> Option<TrackSpecs> {
        self.track.as_ref().map(|t| t.specs())
    }

    pub fn transport_state(&self) -> TransportState {
        self.transport.state()
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }

    pub fn position(&self) -> f64 {
        self.transport.position()
    }

    pub fn duration(&self) -> f64 {
        self.transport.duration()
    }

    pub fn is_looping(&self) -> bool {
        self.transport.is_looping()
    }

    pub fn active_preset(&self) -> Option<&str> {
        self.active_preset.as_deref()
    }

    pub fn presets(&self) -> &PresetCatalog {
        &self.presets
    }

    pub fn context(&self) -> &LiveContext {
        &self.ctx
    }

    pub fn renderer(&self) -> &ExportRenderer {
        &self.renderer
    }

    /// Last output frames of the analysis tap, oldest first
    pub fn time_domain(&self) -> Option<Vec<f32>> {
        self.ctx.graph().map(|g| g.analyser().time_domain())
    }

    /// Magnitude spectrum of the analysis tap in dB
    pub fn frequency_db(&self) -> Option<Vec<f32>> {
        self.ctx.graph().map(|g| g.analyser().frequency_db())
    }
}

/// Sum several buffers into one
///
/// Every input is resampled to the first buffer's rate. The output has as
/// many channels as the widest input; mono inputs feed every channel. The
/// sum is peak-normalized only when it would clip.
pub fn mixdown(buffers: &[AudioBuffer]) -> Result<AudioBuffer> {
    let first = buffers.first().ok_or_else(|| ToneError::export("nothing to mix"))?;
    let sample_rate = first.sample_rate;
    let resampled: Vec<AudioBuffer> = buffers.iter().map(|b| b.resampled(sample_rate)).collect();

    let channels = resampled.iter().map(AudioBuffer::channels).max().unwrap_or(1).max(1);
    let frames = resampled.iter().map(AudioBuffer::frames).max().unwrap_or(0);
    let mut mix = AudioBuffer::silent(channels, frames, sample_rate);

    for buffer in &resampled {
        for (ch, out) in mix.samples.iter_mut().enumerate() {
            let input = if buffer.channels() == 1 {
                buffer.channel(0)
            } else {
                buffer.channel(ch)
            };
            for (o, i) in out.iter_mut().zip(input) {
                *o += *i;
            }
        }
    }

    if mix.peak() > 1.0 {
        let gain = mix.normalize_peak(NORMALIZE_TARGET);
        debug!(gain, "mixdown normalized");
    }
    Ok(mix)
}
