//! The coloration graph
//!
//! Owns every node of the chain and renders it frame by frame. Node settings
//! are the only mutable state; the wiring follows [`Topology::coloration`] and
//! is fixed for the lifetime of the graph.
//!
//! In [`GraphMode::Live`] every setting moves through a [`ParamRamp`]; in
//! [`GraphMode::Offline`] settings apply immediately. A live graph whose ramps
//! have settled renders exactly the same samples as an offline graph with the
//! same settings.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::mapping::{self, node_targets};
use super::topology::{NodeKind, Topology};
use crate::dsp::{
    Analyser, Biquad, Compressor, CompressorSettings, DelayLine, FilterKind, NoiseSource, ParamRamp,
    MAX_DELAY_SECS,
};
use crate::engine::buffer::AudioBuffer;
use crate::error::{Result, ToneError};
use crate::params::{AudioState, Field};

/// Fixed node settings that no parameter controls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    /// Resonance of the tone low-pass
    pub lowpass_q: f64,
    /// Echo delay in seconds
    pub echo_delay_secs: f64,
    /// Centre of the band-pass colouring the noise bed, Hz
    pub noise_center_hz: f64,
    pub noise_q: f64,
    /// Length of the looping noise buffer in seconds
    pub noise_length_secs: f64,
    /// Seed of the noise buffer; identical seeds give identical noise
    pub noise_seed: u64,
    pub compressor: CompressorSettings,
    /// Frames kept by the analysis tap
    pub analyser_fft_size: usize,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            lowpass_q: 1.0,
            echo_delay_secs: 0.5,
            noise_center_hz: 1000.0,
            noise_q: 0.5,
            noise_length_secs: 2.0,
            noise_seed: 0x5EED,
            compressor: CompressorSettings::default(),
            analyser_fft_size: 2048,
        }
    }
}

impl GraphSettings {
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(ToneError::Config { reason });

        if !(self.lowpass_q > 0.0) {
            return invalid(format!("lowpass_q must be positive, got {}", self.lowpass_q));
        }
        if !(self.echo_delay_secs > 0.0 && self.echo_delay_secs <= MAX_DELAY_SECS) {
            return invalid(format!(
                "echo_delay_secs must be in (0, {}], got {}",
                MAX_DELAY_SECS, self.echo_delay_secs
            ));
        }
        if !(self.noise_center_hz > 0.0) || !(self.noise_q > 0.0) {
            return invalid("noise band-pass needs a positive centre and Q".to_string());
        }
        if !(self.noise_length_secs > 0.0) {
            return invalid(format!("noise_length_secs must be positive, got {}", self.noise_length_secs));
        }
        if !self.analyser_fft_size.is_power_of_two() || self.analyser_fft_size < 32 {
            return invalid(format!(
                "analyser_fft_size must be a power of two >= 32, got {}",
                self.analyser_fft_size
            ));
        }
        self.compressor.validate()
    }
}

/// How settings reach the nodes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GraphMode {
    /// Smoothed with the given time constant in seconds
    Live { time_constant: f64 },
    /// Applied statically
    Offline,
}

/// Rendering graph for one loaded track
#[derive(Debug)]
pub struct EffectGraph {
    topology: Topology,
    mode: GraphMode,
    sample_rate: f64,
    channels: usize,

    volume: ParamRamp,
    cutoff: ParamRamp,
    noise_level: ParamRamp,
    wet: ParamRamp,
    feedback: ParamRamp,

    lowpass: Biquad,
    noise: NoiseSource,
    bandpass: Biquad,
    delay: DelayLine,
    compressor: Compressor,
    analyser: Analyser,
}

impl EffectGraph {
    /// Assemble, validate and connect the chain with every parameter at `state`
    pub fn build(
        settings: &GraphSettings,
        mode: GraphMode,
        sample_rate: f64,
        channels: usize,
        state: &AudioState,
    ) -> Result<Self> {
        if !(sample_rate > 0.0) {
            return Err(ToneError::Topology {
                reason: format!("sample rate must be positive, got {}", sample_rate),
            });
        }
        if channels == 0 {
            return Err(ToneError::Topology {
                reason: "graph needs at least one channel".to_string(),
            });
        }

        let mut topology = Topology::coloration();
        topology.validate(|node| match node {
            NodeKind::WetGain => mapping::MAX_WET_GAIN,
            NodeKind::FeedbackGain => mapping::MAX_FEEDBACK_GAIN,
            NodeKind::NoiseGain => mapping::MAX_NOISE_GAIN,
            NodeKind::VolumeGain => mapping::volume_gain(Field::Volume.spec().max),
            _ => 1.0,
        })?;
        topology.connect();

        let time_constant = match mode {
            GraphMode::Live { time_constant } => time_constant,
            GraphMode::Offline => 0.0,
        };
        let ramp = |value: f64| ParamRamp::new(value, time_constant, sample_rate);

        let mut graph = Self {
            topology,
            mode,
            sample_rate,
            channels,
            volume: ramp(mapping::volume_gain(state.volume())),
            cutoff: ramp(state.frequency()),
            noise_level: ramp(mapping::noise_gain(state.noise())),
            wet: ramp(mapping::wet_gain(state.echo())),
            feedback: ramp(mapping::feedback_gain(state.echo())),
            lowpass: Biquad::new(FilterKind::LowPass, sample_rate, state.frequency(), settings.lowpass_q, channels),
            noise: NoiseSource::new(settings.noise_length_secs, sample_rate, settings.noise_seed),
            bandpass: Biquad::new(FilterKind::BandPass, sample_rate, settings.noise_center_hz, settings.noise_q, 1),
            delay: DelayLine::new(settings.echo_delay_secs, sample_rate, channels),
            compressor: Compressor::new(settings.compressor, sample_rate),
            analyser: Analyser::new(settings.analyser_fft_size),
        };
        graph.apply_state(state, true);

        debug!(?mode, sample_rate, channels, "effect graph built");
        Ok(graph)
    }

    /// Route one field to its node settings
    ///
    /// The value is clamped to the field's range first. Tempo and pitch are
    /// ignored here; they belong to the playing source.
    pub fn apply_parameter(&mut self, field: Field, value: f64) {
        let value = field.spec().clamp(value);
        let immediate = self.mode == GraphMode::Offline;
        for (node, setting) in node_targets(field, value) {
            trace!(%field, %node, setting, "apply parameter");
            let Some(ramp) = self.ramp_mut(node) else {
                continue;
            };
            if immediate {
                ramp.set_immediate(setting);
            } else {
                ramp.set_target(setting);
            }
        }
    }

    /// Apply every field of `state`; `immediate` skips smoothing even when live
    pub fn apply_state(&mut self, state: &AudioState, immediate: bool) {
        for (field, value) in state.iter() {
            self.apply_parameter(field, value);
            if immediate {
                for (node, setting) in node_targets(field, value) {
                    if let Some(ramp) = self.ramp_mut(node) {
                        ramp.set_immediate(setting);
                    }
                }
            }
        }
    }

    fn ramp_mut(&mut self, node: NodeKind) -> Option<&mut ParamRamp> {
        match node {
            NodeKind::VolumeGain => Some(&mut self.volume),
            NodeKind::LowPass => Some(&mut self.cutoff),
            NodeKind::NoiseGain => Some(&mut self.noise_level),
            NodeKind::WetGain => Some(&mut self.wet),
            NodeKind::FeedbackGain => Some(&mut self.feedback),
            _ => None,
        }
    }

    fn ramp(&self, node: NodeKind) -> Option<&ParamRamp> {
        match node {
            NodeKind::VolumeGain => Some(&self.volume),
            NodeKind::LowPass => Some(&self.cutoff),
            NodeKind::NoiseGain => Some(&self.noise_level),
            NodeKind::WetGain => Some(&self.wet),
            NodeKind::FeedbackGain => Some(&self.feedback),
            _ => None,
        }
    }

    /// Current (possibly mid-ramp) setting of a controllable node
    pub fn node_value(&self, node: NodeKind) -> Option<f64> {
        self.ramp(node).map(ParamRamp::value)
    }

    /// Setting a controllable node is heading toward
    pub fn node_target(&self, node: NodeKind) -> Option<f64> {
        self.ramp(node).map(ParamRamp::target)
    }

    /// Whether every ramp has reached its target
    pub fn is_settled(&self) -> bool {
        [&self.volume, &self.cutoff, &self.noise_level, &self.wet, &self.feedback]
            .iter()
            .all(|r| r.is_settled())
    }

    /// Render one frame in place; `frame` holds the source output on entry
    ///
    /// A torn-down graph outputs silence.
    #[inline]
    pub fn process_frame(&mut self, frame: &mut [f32]) {
        if !self.topology.is_connected() {
            frame.fill(0.0);
            return;
        }

        let volume = self.volume.next_value();
        let cutoff = self.cutoff.next_value();
        let noise_level = self.noise_level.next_value();
        let wet = self.wet.next_value();
        let feedback = self.feedback.next_value();
        self.lowpass.set_frequency(cutoff);

        let noise = self.bandpass.process(0, f64::from(self.noise.next_sample())) * noise_level;

        for (ch, sample) in frame.iter_mut().enumerate().take(self.channels) {
            let filtered = self.lowpass.process(ch, f64::from(*sample) * volume);
            let echoed = f64::from(self.delay.read(ch)) * wet;
            self.delay.write(ch, (filtered + echoed * feedback) as f32);
            *sample = (filtered + echoed + noise) as f32;
        }
        self.delay.advance();

        self.compressor.process_frame(frame);
        self.analyser.push_frame(frame);
    }

    /// Render a whole buffer in place
    pub fn process_buffer(&mut self, buffer: &mut AudioBuffer) {
        let mut frame = vec![0.0f32; buffer.channels()];
        for i in 0..buffer.frames() {
            for (ch, channel) in buffer.samples.iter().enumerate() {
                frame[ch] = channel[i];
            }
            self.process_frame(&mut frame);
            for (ch, channel) in buffer.samples.iter_mut().enumerate() {
                channel[i] = frame[ch];
            }
        }
    }

    /// Disconnect every edge; returns the number disconnected (0 the second time)
    pub fn teardown(&mut self) -> usize {
        let disconnected = self.topology.disconnect();
        if disconnected > 0 {
            self.delay.reset();
            self.compressor.reset();
            self.analyser.reset();
            debug!(edges = disconnected, "effect graph torn down");
        }
        disconnected
    }

    pub fn is_connected(&self) -> bool {
        self.topology.is_connected()
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn mode(&self) -> GraphMode {
        self.mode
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn analyser(&self) -> &Analyser {
        &self.analyser
    }

    /// Compressor gain reduction in dB, for metering
    pub fn gain_reduction_db(&self) -> f64 {
        self.compressor.current_reduction_db()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SR: f64 = 48000.0;

    fn live(state: &AudioState) -> EffectGraph {
        EffectGraph::build(&GraphSettings::default(), GraphMode::Live { time_constant: 0.016 }, SR, 2, state)
            .unwrap()
    }

    fn offline(state: &AudioState) -> EffectGraph {
        EffectGraph::build(&GraphSettings::default(), GraphMode::Offline, SR, 2, state).unwrap()
    }

    fn tone(frames: usize) -> AudioBuffer {
        let data: Vec<f32> = (0..frames)
            .map(|i| 0.3 * (2.0 * std::f32::consts::PI * 220.0 * i as f32 / SR as f32).sin())
            .collect();
        AudioBuffer::from_channels(vec![data.clone(), data], SR as u32).unwrap()
    }

    #[test]
    fn test_build_applies_state_without_ramping() {
        let state = AudioState::default().with(Field::Volume, 150.0).with(Field::Echo, 40.0);
        let graph = live(&state);
        assert!(graph.is_settled());
        assert_relative_eq!(graph.node_value(NodeKind::VolumeGain).unwrap(), 2.25);
        assert_relative_eq!(graph.node_value(NodeKind::WetGain).unwrap(), 0.3);
        assert_relative_eq!(graph.node_value(NodeKind::FeedbackGain).unwrap(), 0.2);
        assert_eq!(graph.node_value(NodeKind::Compressor), None);
    }

    #[test]
    fn test_live_parameters_ramp() {
        let mut graph = live(&AudioState::default());
        graph.apply_parameter(Field::Frequency, 432.0);

        assert_eq!(graph.node_target(NodeKind::LowPass), Some(432.0));
        assert_eq!(graph.node_value(NodeKind::LowPass), Some(16000.0));

        // About 63% of the way after one time constant
        let mut frame = [0.0f32; 2];
        for _ in 0..(0.016 * SR) as usize {
            graph.process_frame(&mut frame);
        }
        let value = graph.node_value(NodeKind::LowPass).unwrap();
        let expected = 432.0 + (16000.0 - 432.0) * (-1.0f64).exp();
        assert_relative_eq!(value, expected, max_relative = 0.01);
    }

    #[test]
    fn test_offline_parameters_apply_immediately() {
        let mut graph = offline(&AudioState::default());
        graph.apply_parameter(Field::Volume, 50.0);
        assert_eq!(graph.node_value(NodeKind::VolumeGain), Some(0.25));
        assert!(graph.is_settled());
    }

    #[test]
    fn test_transport_fields_are_ignored() {
        let mut graph = offline(&AudioState::default());
        graph.apply_parameter(Field::Tempo, 2.0);
        graph.apply_parameter(Field::Pitch, -12.0);
        assert!(graph.is_settled());
        assert_eq!(graph.node_value(NodeKind::VolumeGain), Some(1.0));
    }

    #[test]
    fn test_out_of_range_parameter_is_clamped() {
        let mut graph = offline(&AudioState::default());
        graph.apply_parameter(Field::Echo, 500.0);
        assert_eq!(graph.node_value(NodeKind::FeedbackGain), Some(0.5));
    }

    #[test]
    fn test_settled_live_matches_offline() {
        let state = AudioState::new(1.0, 0.0, 2500.0, 180.0, 35.0, 60.0);
        let mut live_graph = live(&state);
        let mut offline_graph = offline(&state);

        let mut a = tone(24000);
        let mut b = a.clone();
        live_graph.process_buffer(&mut a);
        offline_graph.process_buffer(&mut b);
        assert_eq!(a, b);
        assert!(a.is_finite());
    }

    #[test]
    fn test_echo_repeats_impulse() {
        let state = AudioState::default().with(Field::Echo, 100.0);
        let delay = (0.5 * SR) as usize;
        let mut buffer = AudioBuffer::silent(1, delay * 2 + 10, SR as u32);
        buffer.samples[0][0] = 0.01;
        let mut mono = EffectGraph::build(&GraphSettings::default(), GraphMode::Offline, SR, 1, &state).unwrap();
        mono.process_buffer(&mut buffer);

        let around = |center: usize| {
            buffer.channel(0)[center.saturating_sub(50)..center + 50]
                .iter()
                .fold(0.0f32, |acc, s| acc.max(s.abs()))
        };
        // Nothing but filter ringing before the echo arrives
        assert!(around(delay) > around(delay / 2) * 2.0);
        assert!(around(delay * 2) > 0.0);
    }

    #[test]
    fn test_noise_bed_is_audible_and_bounded() {
        let state = AudioState::default().with(Field::Noise, 100.0);
        let mut graph = offline(&state);
        let mut buffer = AudioBuffer::silent(2, 48000, SR as u32);
        graph.process_buffer(&mut buffer);

        let peak = buffer.peak();
        assert!(peak > 0.0 && peak < 0.3, "peak {}", peak);
        // Noise is mono: both channels identical
        assert_eq!(buffer.channel(0), buffer.channel(1));
    }

    #[test]
    fn test_teardown_once() {
        let mut graph = live(&AudioState::default());
        assert!(graph.is_connected());
        assert_eq!(graph.teardown(), 13);
        assert_eq!(graph.teardown(), 0);

        let mut frame = [0.5f32, 0.5];
        graph.process_frame(&mut frame);
        assert_eq!(frame, [0.0, 0.0]);
    }

    #[test]
    fn test_analyser_sees_output() {
        let mut graph = offline(&AudioState::default());
        let mut buffer = tone(4096);
        graph.process_buffer(&mut buffer);
        let snapshot = graph.analyser().time_domain();
        assert_eq!(snapshot.len(), 2048);
        assert_eq!(*snapshot.last().unwrap(), buffer.channel(0)[4095]);
    }

    #[test]
    fn test_settings_validation() {
        assert!(GraphSettings::default().validate().is_ok());
        let bad = GraphSettings {
            echo_delay_secs: 3.0,
            ..GraphSettings::default()
        };
        assert!(bad.validate().is_err());
        let bad = GraphSettings {
            analyser_fft_size: 1000,
            ..GraphSettings::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_zero_channels_rejected() {
        let err = EffectGraph::build(&GraphSettings::default(), GraphMode::Offline, SR, 0, &AudioState::default())
            .unwrap_err();
        assert_eq!(err.error_code(), "TOPOLOGY_ERROR");
    }
}
