//! Transport State Machine
//!
//! [`PlaybackController`] drives the playing source instance inside a
//! [`LiveContext`] and tracks the playhead. Position is derived from the
//! context clock relative to a recorded start reference, never by counting
//! polls, so a late or missed [`tick`](PlaybackController::tick) never drifts.
//!
//! ```text
//! Stopped/Paused --play--> Playing --pause--> Paused
//! Playing --natural end (no loop)--> Stopped
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use super::context::LiveContext;
use super::track::DecodedTrack;
use crate::error::{Result, ToneError};
use crate::graph::mapping::playback_rate;
use crate::params::Field;

/// Transport states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    /// Nothing playing (default state)
    #[default]
    Stopped,
    /// Audio is actively playing
    Playing,
    /// Halted with position and playback parameters kept for resume
    Paused,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportState::Stopped => write!(f, "Stopped"),
            TransportState::Playing => write!(f, "Playing"),
            TransportState::Paused => write!(f, "Paused"),
        }
    }
}

/// Playback state, playhead tracking and source-instance parameters
#[derive(Debug, Clone)]
pub struct PlaybackController {
    state: TransportState,

    /// Last observed playhead position in seconds
    position: f64,

    /// Duration of the loaded track in seconds
    duration: f64,

    /// Position at the start reference
    start_offset: f64,

    /// Clock reading when the current segment started
    start_reference: f64,

    /// Saved tempo, applied to every new instance
    tempo: f64,

    /// Saved detune in semitones, applied to every new instance
    pitch: f64,

    looping: bool,
}

impl Default for PlaybackController {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackController {
    /// Create a stopped controller with looping on
    ///
    /// # Example
    /// ```
    /// use tonewarp::engine::{PlaybackController, TransportState};
    /// let transport = PlaybackController::new();
    /// assert_eq!(transport.state(), TransportState::Stopped);
    /// assert!(transport.is_looping());
    /// ```
    pub fn new() -> Self {
        Self {
            state: TransportState::Stopped,
            position: 0.0,
            duration: 0.0,
            start_offset: 0.0,
            start_reference: 0.0,
            tempo: Field::Tempo.spec().default,
            pitch: Field::Pitch.spec().default,
            looping: true,
        }
    }

    // ========================================================================
    // Track lifecycle
    // ========================================================================

    /// Prepare for a newly loaded track: stopped at 0 with default rate
    pub fn load(&mut self, duration_secs: f64) {
        self.state = TransportState::Stopped;
        self.position = 0.0;
        self.duration = duration_secs.max(0.0);
        self.start_offset = 0.0;
        self.tempo = Field::Tempo.spec().default;
        self.pitch = Field::Pitch.spec().default;
    }

    /// Forget the track entirely
    pub fn clear(&mut self) {
        self.load(0.0);
    }

    // ========================================================================
    // State transitions
    // ========================================================================

    /// Start a fresh instance of `track` at `from` seconds
    ///
    /// Any in-flight instance is stopped first. Fails with
    /// [`ToneError::PlaybackPrecondition`] when no track or no graph is
    /// available; the transport then stays where it was.
    pub fn play(
        &mut self,
        ctx: &mut LiveContext,
        track: Option<Arc<DecodedTrack>>,
        from: f64,
        looping: bool,
    ) -> Result<()> {
        let track = track.ok_or(ToneError::PlaybackPrecondition { missing: "track" })?;
        if ctx.graph().is_none() {
            return Err(ToneError::PlaybackPrecondition { missing: "effect graph" });
        }

        ctx.stop_source();
        ctx.resume();

        self.duration = track.duration_secs();
        let from = self.clamp_position(from);

        let mut source = ctx.create_source(track, self.tempo, self.pitch);
        source.set_loop(looping);
        ctx.start_source(source, from);

        self.looping = looping;
        self.position = from;
        self.start_offset = from;
        self.start_reference = ctx.now();
        self.state = TransportState::Playing;

        debug!(from, looping, tempo = self.tempo, pitch = self.pitch, "playback started");
        Ok(())
    }

    /// Halt and remember position, tempo and pitch
    ///
    /// No-op unless playing.
    pub fn pause(&mut self, ctx: &mut LiveContext) {
        if self.state != TransportState::Playing {
            return;
        }
        self.observe(ctx);
        if self.state != TransportState::Playing {
            // Reached the end during the final observation
            return;
        }

        if let Some(source) = ctx.source() {
            self.tempo = source.rate();
            self.pitch = source.detune();
        }
        ctx.stop_source();
        self.state = TransportState::Paused;
        debug!(position = self.position, "playback paused");
    }

    /// Halt and keep the position; idempotent
    pub fn stop(&mut self, ctx: &mut LiveContext) {
        if self.state == TransportState::Playing {
            self.observe(ctx);
        }
        ctx.stop_source();
        if self.state != TransportState::Stopped {
            self.state = TransportState::Stopped;
            debug!(position = self.position, "playback stopped");
        }
    }

    // ========================================================================
    // Position
    // ========================================================================

    /// Move the playhead; returns the clamped position
    ///
    /// While playing, the instance jumps too and tracking re-bases there.
    pub fn seek(&mut self, ctx: &mut LiveContext, seconds: f64) -> f64 {
        let target = self.clamp_position(seconds);
        self.position = target;

        if self.state == TransportState::Playing {
            if let Some(source) = ctx.source_mut() {
                source.seek(target);
            }
            self.start_offset = target;
            self.start_reference = ctx.now();
        }
        trace!(position = target, "seek");
        target
    }

    /// Recompute the playhead from the clock
    ///
    /// Returns `None` when not playing, including when this poll discovered
    /// the natural end of a non-looping track.
    pub fn tick(&mut self, ctx: &mut LiveContext) -> Option<f64> {
        if self.state != TransportState::Playing {
            return None;
        }
        self.observe(ctx);
        (self.state == TransportState::Playing).then_some(self.position)
    }

    fn observe(&mut self, ctx: &mut LiveContext) {
        if self.duration <= 0.0 {
            self.position = 0.0;
            return;
        }

        let elapsed = (ctx.now() - self.start_reference).max(0.0);
        let raw = self.start_offset + elapsed * self.rate();

        if raw < self.duration {
            self.position = raw;
        } else if self.looping {
            self.position = raw % self.duration;
        } else {
            // Position stays at the last value observed before the end
            ctx.stop_source();
            self.state = TransportState::Stopped;
            debug!(position = self.position, "playback reached the end");
        }
    }

    /// Restart position tracking from the current playhead
    fn rebase(&mut self, ctx: &mut LiveContext) {
        self.observe(ctx);
        self.start_offset = self.position;
        self.start_reference = ctx.now();
    }

    fn clamp_position(&self, seconds: f64) -> f64 {
        if self.duration <= 0.0 || !seconds.is_finite() {
            return 0.0;
        }
        // Largest representable value strictly below the duration
        let last = self.duration - self.duration * f64::EPSILON;
        seconds.clamp(0.0, last)
    }

    // ========================================================================
    // Playback parameters
    // ========================================================================

    /// Apply tempo or pitch to the playing instance and keep it for later plays
    ///
    /// Other fields are ignored.
    pub fn update_playback_params(&mut self, ctx: &mut LiveContext, field: Field, value: f64) {
        let value = field.spec().clamp(value);
        let playing = self.state == TransportState::Playing;
        if playing {
            self.rebase(ctx);
        }

        match field {
            Field::Tempo => self.tempo = value,
            Field::Pitch => self.pitch = value,
            _ => return,
        }

        if playing {
            if let Some(source) = ctx.source_mut() {
                match field {
                    Field::Tempo => source.set_rate(value),
                    _ => source.set_detune(value),
                }
            }
        }
        trace!(%field, value, "playback parameter updated");
    }

    /// Turn looping on or off for the controller and the playing instance
    pub fn set_looping(&mut self, ctx: &mut LiveContext, looping: bool) {
        if self.state == TransportState::Playing {
            self.rebase(ctx);
        }
        self.looping = looping;
        if let Some(source) = ctx.source_mut() {
            source.set_loop(looping);
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    /// Effective playback speed from the saved tempo and pitch
    pub fn rate(&self) -> f64 {
        playback_rate(self.tempo, self.pitch)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::buffer::AudioBuffer;
    use crate::engine::clock::ManualClock;
    use crate::graph::GraphSettings;
    use crate::params::AudioState;
    use approx::assert_relative_eq;

    struct Rig {
        clock: Arc<ManualClock>,
        ctx: LiveContext,
        track: Arc<DecodedTrack>,
        transport: PlaybackController,
    }

    fn rig(duration_secs: f64) -> Rig {
        let clock = Arc::new(ManualClock::new(100.0));
        let mut ctx = LiveContext::new(8000, 0.016, GraphSettings::default(), clock.clone());
        ctx.build_graph(1, &AudioState::default()).unwrap();
        let frames = (duration_secs * 1000.0) as usize;
        let track = Arc::new(DecodedTrack::new("t", AudioBuffer::silent(1, frames, 1000), None));
        let mut transport = PlaybackController::new();
        transport.load(track.duration_secs());
        Rig {
            clock,
            ctx,
            track,
            transport,
        }
    }

    impl Rig {
        fn play(&mut self, from: f64, looping: bool) {
            self.transport
                .play(&mut self.ctx, Some(self.track.clone()), from, looping)
                .unwrap();
        }
    }

    // ------------------------------------------------------------------------
    // Defaults
    // ------------------------------------------------------------------------

    #[test]
    fn test_default_state_is_stopped() {
        let transport = PlaybackController::default();
        assert_eq!(transport.state(), TransportState::Stopped);
        assert_eq!(transport.position(), 0.0);
        assert_eq!(transport.tempo(), 1.0);
        assert_eq!(transport.pitch(), 0.0);
        assert!(transport.is_looping());
    }

    #[test]
    fn test_transport_state_display() {
        assert_eq!(TransportState::Stopped.to_string(), "Stopped");
        assert_eq!(TransportState::Playing.to_string(), "Playing");
        assert_eq!(TransportState::Paused.to_string(), "Paused");
    }

    // ------------------------------------------------------------------------
    // Preconditions
    // ------------------------------------------------------------------------

    #[test]
    fn test_play_without_track_fails() {
        let mut r = rig(10.0);
        let err = r.transport.play(&mut r.ctx, None, 0.0, true).unwrap_err();
        assert!(matches!(err, ToneError::PlaybackPrecondition { missing: "track" }));
        assert_eq!(r.transport.state(), TransportState::Stopped);
    }

    #[test]
    fn test_play_without_graph_fails() {
        let mut r = rig(10.0);
        r.ctx.teardown_graph();
        let err = r
            .transport
            .play(&mut r.ctx, Some(r.track.clone()), 0.0, true)
            .unwrap_err();
        assert_eq!(err.error_code(), "PLAYBACK_PRECONDITION");
        assert_eq!(r.transport.state(), TransportState::Stopped);
        assert!(r.ctx.source().is_none());
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    #[test]
    fn test_play_resumes_context_and_starts_instance() {
        let mut r = rig(10.0);
        r.play(0.0, true);
        assert!(r.transport.is_playing());
        assert!(r.ctx.source().is_some_and(|s| s.is_playing()));
        assert_eq!(r.ctx.state(), crate::engine::context::ContextState::Running);
    }

    #[test]
    fn test_tick_tracks_wall_clock() {
        let mut r = rig(10.0);
        r.play(1.0, true);
        r.clock.advance(2.5);
        assert_relative_eq!(r.transport.tick(&mut r.ctx).unwrap(), 3.5, epsilon = 1e-9);
    }

    #[test]
    fn test_tick_when_not_playing_is_none() {
        let mut r = rig(10.0);
        assert_eq!(r.transport.tick(&mut r.ctx), None);
    }

    #[test]
    fn test_pause_freezes_position() {
        let mut r = rig(10.0);
        r.play(0.0, true);
        r.clock.advance(2.0);
        r.transport.pause(&mut r.ctx);

        assert_eq!(r.transport.state(), TransportState::Paused);
        assert_relative_eq!(r.transport.position(), 2.0, epsilon = 1e-9);
        assert!(r.ctx.source().is_some_and(|s| s.has_ended()));

        r.clock.advance(5.0);
        assert_eq!(r.transport.tick(&mut r.ctx), None);
        assert_relative_eq!(r.transport.position(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_pause_then_resume_continues() {
        let mut r = rig(10.0);
        r.play(0.0, true);
        r.clock.advance(2.0);
        r.transport.pause(&mut r.ctx);

        let resume_at = r.transport.position();
        r.play(resume_at, true);
        r.clock.advance(0.5);
        assert_relative_eq!(r.transport.tick(&mut r.ctx).unwrap(), 2.5, epsilon = 1e-9);
    }

    #[test]
    fn test_double_pause_no_op() {
        let mut r = rig(10.0);
        r.play(0.0, true);
        r.clock.advance(1.0);
        r.transport.pause(&mut r.ctx);
        r.clock.advance(1.0);
        r.transport.pause(&mut r.ctx);
        assert_relative_eq!(r.transport.position(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_stop_is_idempotent_and_keeps_position() {
        let mut r = rig(10.0);
        r.transport.stop(&mut r.ctx);
        r.play(0.0, true);
        r.clock.advance(3.0);
        r.transport.stop(&mut r.ctx);
        r.transport.stop(&mut r.ctx);
        assert_eq!(r.transport.state(), TransportState::Stopped);
        assert_relative_eq!(r.transport.position(), 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_second_play_replaces_instance() {
        let mut r = rig(10.0);
        r.play(0.0, true);
        r.clock.advance(1.0);
        r.play(5.0, true);
        assert_relative_eq!(r.transport.position(), 5.0);
        assert!(r.ctx.source().is_some_and(|s| s.is_playing()));
        assert_relative_eq!(r.ctx.source().unwrap().position_secs(), 5.0);
    }

    // ------------------------------------------------------------------------
    // End of track
    // ------------------------------------------------------------------------

    #[test]
    fn test_loop_wraps_position() {
        let mut r = rig(4.0);
        r.play(3.0, true);
        r.clock.advance(2.0);
        assert_relative_eq!(r.transport.tick(&mut r.ctx).unwrap(), 1.0, epsilon = 1e-9);
        assert!(r.transport.is_playing());
    }

    #[test]
    fn test_natural_end_stops_and_freezes() {
        let mut r = rig(4.0);
        r.play(0.0, false);
        r.clock.advance(3.9);
        assert_relative_eq!(r.transport.tick(&mut r.ctx).unwrap(), 3.9, epsilon = 1e-9);

        r.clock.advance(0.5);
        assert_eq!(r.transport.tick(&mut r.ctx), None);
        assert_eq!(r.transport.state(), TransportState::Stopped);
        // Frozen at the last observed value, not reset to zero
        assert_relative_eq!(r.transport.position(), 3.9, epsilon = 1e-9);
        assert!(r.ctx.source().is_some_and(|s| s.has_ended()));
    }

    #[test]
    fn test_set_looping_reaches_instance() {
        let mut r = rig(4.0);
        r.play(0.0, true);
        r.transport.set_looping(&mut r.ctx, false);
        assert!(!r.transport.is_looping());
        assert!(r.ctx.source().is_some_and(|s| !s.is_looping()));
    }

    // ------------------------------------------------------------------------
    // Seeking
    // ------------------------------------------------------------------------

    #[test]
    fn test_seek_clamps() {
        let mut r = rig(10.0);
        assert_eq!(r.transport.seek(&mut r.ctx, -4.0), 0.0);
        let end = r.transport.seek(&mut r.ctx, 50.0);
        assert!(end < 10.0 && end > 9.999);
        assert_eq!(r.transport.seek(&mut r.ctx, f64::NAN), 0.0);
    }

    #[test]
    fn test_seek_during_playback_rebases() {
        let mut r = rig(10.0);
        r.play(0.0, true);
        r.clock.advance(2.0);
        r.transport.seek(&mut r.ctx, 7.0);
        r.clock.advance(1.0);
        assert_relative_eq!(r.transport.tick(&mut r.ctx).unwrap(), 8.0, epsilon = 1e-9);
        assert_relative_eq!(r.ctx.source().unwrap().position_secs(), 7.0);
    }

    // ------------------------------------------------------------------------
    // Playback parameters
    // ------------------------------------------------------------------------

    #[test]
    fn test_tempo_change_rebases_tracking() {
        let mut r = rig(10.0);
        r.play(0.0, true);
        r.clock.advance(2.0);
        r.transport.update_playback_params(&mut r.ctx, Field::Tempo, 2.0);
        r.clock.advance(1.0);
        assert_relative_eq!(r.transport.tick(&mut r.ctx).unwrap(), 4.0, epsilon = 1e-9);
        assert_eq!(r.ctx.source().unwrap().rate(), 2.0);
    }

    #[test]
    fn test_pitch_changes_speed() {
        let mut r = rig(10.0);
        r.transport.update_playback_params(&mut r.ctx, Field::Pitch, 12.0);
        r.play(0.0, true);
        r.clock.advance(1.0);
        assert_relative_eq!(r.transport.tick(&mut r.ctx).unwrap(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_params_persist_while_stopped() {
        let mut r = rig(10.0);
        r.transport.update_playback_params(&mut r.ctx, Field::Tempo, 1.44);
        assert_eq!(r.transport.tempo(), 1.4);
        r.play(0.0, true);
        assert_eq!(r.ctx.source().unwrap().rate(), 1.4);
    }

    #[test]
    fn test_pause_saves_instance_params() {
        let mut r = rig(10.0);
        r.play(0.0, true);
        r.transport.update_playback_params(&mut r.ctx, Field::Pitch, -5.0);
        r.transport.pause(&mut r.ctx);
        assert_eq!(r.transport.pitch(), -5.0);

        r.play(r.transport.position(), true);
        assert_eq!(r.ctx.source().unwrap().detune(), -5.0);
    }

    #[test]
    fn test_non_transport_fields_ignored() {
        let mut r = rig(10.0);
        r.transport.update_playback_params(&mut r.ctx, Field::Volume, 200.0);
        assert_eq!(r.transport.tempo(), 1.0);
        assert_eq!(r.transport.pitch(), 0.0);
    }

    #[test]
    fn test_load_resets_transport() {
        let mut r = rig(10.0);
        r.transport.update_playback_params(&mut r.ctx, Field::Tempo, 2.0);
        r.play(0.0, true);
        r.clock.advance(1.0);
        r.transport.stop(&mut r.ctx);

        r.transport.load(3.0);
        assert_eq!(r.transport.position(), 0.0);
        assert_eq!(r.transport.duration(), 3.0);
        assert_eq!(r.transport.tempo(), 1.0);
    }
}
