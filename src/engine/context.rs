//! Rendering contexts
//!
//! A context owns the graph and the playing source instance and pulls audio
//! through them. [`LiveContext`] is driven block by block from the host's
//! audio callback; [`OfflineContext`] renders a fixed length to completion
//! and is released afterwards.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use super::buffer::AudioBuffer;
use super::clock::Clock;
use super::source::SourceInstance;
use super::track::DecodedTrack;
use crate::error::{Result, ToneError};
use crate::graph::{EffectGraph, GraphMode, GraphSettings};
use crate::params::AudioState;

/// Lifecycle of a live context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextState {
    /// Created but not yet producing audio
    #[default]
    Suspended,
    Running,
    /// Permanently shut down
    Closed,
}

impl fmt::Display for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextState::Suspended => write!(f, "suspended"),
            ContextState::Running => write!(f, "running"),
            ContextState::Closed => write!(f, "closed"),
        }
    }
}

/// Real-time rendering target
#[derive(Debug)]
pub struct LiveContext {
    sample_rate: u32,
    time_constant: f64,
    settings: GraphSettings,
    clock: Arc<dyn Clock>,
    state: ContextState,
    graph: Option<EffectGraph>,
    source: Option<SourceInstance>,
}

impl LiveContext {
    pub fn new(sample_rate: u32, time_constant: f64, settings: GraphSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            sample_rate,
            time_constant,
            settings,
            clock,
            state: ContextState::Suspended,
            graph: None,
            source: None,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    /// Seconds on the context's clock
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn resume(&mut self) {
        match self.state {
            ContextState::Suspended => {
                self.state = ContextState::Running;
                debug!("live context resumed");
            }
            ContextState::Running => {}
            ContextState::Closed => warn!("resume ignored: live context is closed"),
        }
    }

    pub fn suspend(&mut self) {
        if self.state == ContextState::Running {
            self.state = ContextState::Suspended;
            debug!("live context suspended");
        }
    }

    /// Shut down for good, releasing the graph and any source
    pub fn close(&mut self) {
        if self.state == ContextState::Closed {
            return;
        }
        self.stop_source();
        self.source = None;
        self.teardown_graph();
        self.state = ContextState::Closed;
        debug!("live context closed");
    }

    /// Replace the graph with a fresh one for `channels` at `state`
    pub fn build_graph(&mut self, channels: usize, state: &AudioState) -> Result<()> {
        if self.state == ContextState::Closed {
            return Err(ToneError::Topology {
                reason: "cannot build a graph on a closed context".to_string(),
            });
        }
        let graph = EffectGraph::build(
            &self.settings,
            GraphMode::Live {
                time_constant: self.time_constant,
            },
            f64::from(self.sample_rate),
            channels,
            state,
        )?;
        self.teardown_graph();
        self.graph = Some(graph);
        Ok(())
    }

    /// Disconnect and drop the graph; no-op without one
    pub fn teardown_graph(&mut self) -> usize {
        match self.graph.take() {
            Some(mut graph) => graph.teardown(),
            None => 0,
        }
    }

    pub fn graph(&self) -> Option<&EffectGraph> {
        self.graph.as_ref()
    }

    pub fn graph_mut(&mut self) -> Option<&mut EffectGraph> {
        self.graph.as_mut()
    }

    /// New, not yet started instance of `track`
    pub fn create_source(&self, track: Arc<DecodedTrack>, tempo: f64, pitch: f64) -> SourceInstance {
        SourceInstance::new(track, f64::from(self.sample_rate), self.time_constant, tempo, pitch)
    }

    /// Install `source` as the playing instance, stopping any previous one
    pub fn start_source(&mut self, mut source: SourceInstance, offset_secs: f64) {
        self.stop_source();
        source.start(offset_secs);
        self.source = Some(source);
    }

    /// Halt the playing instance; no-op when nothing plays
    pub fn stop_source(&mut self) {
        if let Some(source) = self.source.as_mut() {
            source.stop();
        }
    }

    pub fn source(&self) -> Option<&SourceInstance> {
        self.source.as_ref()
    }

    pub fn source_mut(&mut self) -> Option<&mut SourceInstance> {
        self.source.as_mut()
    }

    /// Pull `frames` frames of output, as the host audio callback would
    ///
    /// A suspended or closed context, or one without a graph, yields silence
    /// and advances nothing.
    pub fn render_block(&mut self, frames: usize) -> AudioBuffer {
        let channels = self.graph.as_ref().map_or(1, EffectGraph::channels);
        let mut out = AudioBuffer::silent(channels, frames, self.sample_rate);

        let Some(graph) = self.graph.as_mut() else {
            return out;
        };
        if self.state != ContextState::Running {
            return out;
        }

        let mut frame = vec![0.0f32; channels];
        for i in 0..frames {
            match self.source.as_mut() {
                Some(source) => source.next_frame(&mut frame),
                None => frame.fill(0.0),
            }
            graph.process_frame(&mut frame);
            for (ch, channel) in out.samples.iter_mut().enumerate() {
                channel[i] = frame[ch];
            }
        }
        out
    }
}

/// Fixed-length, faster-than-real-time rendering target
#[derive(Debug)]
pub struct OfflineContext {
    sample_rate: u32,
    frames: usize,
    graph: EffectGraph,
    source: Option<SourceInstance>,
}

impl OfflineContext {
    /// Context of `frames` frames with a static graph at `state`
    pub fn new(
        settings: &GraphSettings,
        sample_rate: u32,
        channels: usize,
        frames: usize,
        state: &AudioState,
    ) -> Result<Self> {
        let graph = EffectGraph::build(settings, GraphMode::Offline, f64::from(sample_rate), channels, state)?;
        debug!(sample_rate, channels, frames, "offline context created");
        Ok(Self {
            sample_rate,
            frames,
            graph,
            source: None,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn graph_mut(&mut self) -> &mut EffectGraph {
        &mut self.graph
    }

    /// New instance with tempo and pitch applied statically
    pub fn create_source(&self, track: Arc<DecodedTrack>, tempo: f64, pitch: f64) -> SourceInstance {
        SourceInstance::new(track, f64::from(self.sample_rate), 0.0, tempo, pitch)
    }

    pub fn start_source(&mut self, mut source: SourceInstance, offset_secs: f64) {
        source.start(offset_secs);
        self.source = Some(source);
    }

    /// Render every frame and hand back the result
    pub fn render_to_completion(mut self) -> AudioBuffer {
        let channels = self.graph.channels();
        let mut out = AudioBuffer::silent(channels, self.frames, self.sample_rate);
        let mut frame = vec![0.0f32; channels];

        for i in 0..self.frames {
            match self.source.as_mut() {
                Some(source) => source.next_frame(&mut frame),
                None => frame.fill(0.0),
            }
            self.graph.process_frame(&mut frame);
            for (ch, channel) in out.samples.iter_mut().enumerate() {
                channel[i] = frame[ch];
            }
        }
        out
    }
}

impl Drop for OfflineContext {
    fn drop(&mut self) {
        if let Some(source) = self.source.as_mut() {
            source.stop();
        }
        self.graph.teardown();
        debug!(frames = self.frames, "offline context released");
    }
}
