//! Playing instance of a decoded track
//!
//! A [`SourceInstance`] reads the shared track at a fractional frame position.
//! Its step per output frame is `tempo * 2^(pitch/12) * track_rate / context_rate`,
//! so tempo and pitch both change speed the way a resampling player does.
//! Rate and detune are smoothed in live contexts.

use std::sync::Arc;

use tracing::trace;

use super::track::DecodedTrack;
use crate::dsp::ParamRamp;
use crate::graph::mapping::playback_rate;

/// One start/stop lifetime of a track inside a context
#[derive(Debug, Clone)]
pub struct SourceInstance {
    track: Arc<DecodedTrack>,
    /// Track frames advanced per context frame at rate 1.0
    base_step: f64,
    /// Fractional read position in track frames
    position: f64,
    rate: ParamRamp,
    detune: ParamRamp,
    looping: bool,
    started: bool,
    ended: bool,
}

impl SourceInstance {
    pub(crate) fn new(
        track: Arc<DecodedTrack>,
        context_rate: f64,
        time_constant: f64,
        tempo: f64,
        pitch: f64,
    ) -> Self {
        let base_step = f64::from(track.sample_rate()) / context_rate;
        Self {
            track,
            base_step,
            position: 0.0,
            rate: ParamRamp::new(tempo, time_constant, context_rate),
            detune: ParamRamp::new(pitch, time_constant, context_rate),
            looping: false,
            started: false,
            ended: false,
        }
    }

    /// Begin producing audio from `offset_secs` into the track
    pub fn start(&mut self, offset_secs: f64) {
        self.seek(offset_secs);
        self.started = true;
        self.ended = false;
    }

    /// Halt output; calling it again is a no-op
    pub fn stop(&mut self) {
        if self.started && !self.ended {
            trace!(position = self.position_secs(), "source stopped");
        }
        self.ended = true;
    }

    /// Jump to `offset_secs` (clamped into the track)
    pub fn seek(&mut self, offset_secs: f64) {
        let frames = self.track.frames() as f64;
        let target = offset_secs.max(0.0) * f64::from(self.track.sample_rate());
        self.position = if frames > 0.0 { target.min(frames - 1.0).max(0.0) } else { 0.0 };
    }

    pub fn set_rate(&mut self, tempo: f64) {
        self.rate.set_target(tempo);
    }

    pub fn set_detune(&mut self, semitones: f64) {
        self.detune.set_target(semitones);
    }

    pub fn set_loop(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Tempo the instance is heading toward
    pub fn rate(&self) -> f64 {
        self.rate.target()
    }

    /// Detune the instance is heading toward, in semitones
    pub fn detune(&self) -> f64 {
        self.detune.target()
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn is_playing(&self) -> bool {
        self.started && !self.ended
    }

    /// Reached the end without looping, or was stopped
    pub fn has_ended(&self) -> bool {
        self.ended
    }

    pub fn position_secs(&self) -> f64 {
        self.position / f64::from(self.track.sample_rate())
    }

    pub fn track(&self) -> &Arc<DecodedTrack> {
        &self.track
    }

    /// Write the next frame into `out`; silence once stopped
    ///
    /// Track channels map one-to-one onto `out`; a mono track feeds every
    /// output channel.
    #[inline]
    pub fn next_frame(&mut self, out: &mut [f32]) {
        let rate = self.rate.next_value();
        let detune = self.detune.next_value();

        if !self.is_playing() {
            out.fill(0.0);
            return;
        }

        let buffer = self.track.buffer();
        let frames = buffer.frames();
        let index = self.position.floor() as usize;
        let frac = (self.position - index as f64) as f32;
        let next = if index + 1 < frames {
            Some(index + 1)
        } else if self.looping {
            Some(0)
        } else {
            None
        };

        let channels = buffer.channels();
        for (ch, sample) in out.iter_mut().enumerate() {
            let data = buffer.channel(if channels == 1 { 0 } else { ch });
            *sample = match data.get(index) {
                Some(&a) => {
                    let b = next.and_then(|n| data.get(n).copied()).unwrap_or(0.0);
                    a + (b - a) * frac
                }
                None => 0.0,
            };
        }

        self.position += self.base_step * playback_rate(rate, detune);
        let length = frames as f64;
        if self.position >= length {
            if self.looping && length > 0.0 {
                self.position %= length;
            } else {
                self.ended = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::buffer::AudioBuffer;
    use approx::assert_relative_eq;

    fn ramp_track(frames: usize, sample_rate: u32) -> Arc<DecodedTrack> {
        let data: Vec<f32> = (0..frames).map(|i| i as f32).collect();
        let buffer = AudioBuffer::from_channels(vec![data], sample_rate).unwrap();
        Arc::new(DecodedTrack::new("ramp", buffer, None))
    }

    fn pull(source: &mut SourceInstance, n: usize) -> Vec<f32> {
        let mut frame = [0.0f32];
        (0..n)
            .map(|_| {
                source.next_frame(&mut frame);
                frame[0]
            })
            .collect()
    }

    #[test]
    fn test_unit_rate_reads_every_frame() {
        let mut source = SourceInstance::new(ramp_track(8, 1000), 1000.0, 0.0, 1.0, 0.0);
        source.start(0.0);
        assert_eq!(pull(&mut source, 4), vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_not_started_is_silent() {
        let mut source = SourceInstance::new(ramp_track(8, 1000), 1000.0, 0.0, 1.0, 0.0);
        source.start(0.002);
        source.stop();
        assert_eq!(pull(&mut source, 3), vec![0.0; 3]);
        assert!(source.has_ended());
        // Stopping again is harmless
        source.stop();
    }

    #[test]
    fn test_double_tempo_skips_frames() {
        let mut source = SourceInstance::new(ramp_track(16, 1000), 1000.0, 0.0, 2.0, 0.0);
        source.start(0.0);
        assert_eq!(pull(&mut source, 3), vec![0.0, 2.0, 4.0]);
    }

    #[test]
    fn test_octave_up_doubles_speed() {
        let mut source = SourceInstance::new(ramp_track(16, 1000), 1000.0, 0.0, 1.0, 12.0);
        source.start(0.0);
        assert_eq!(pull(&mut source, 3), vec![0.0, 2.0, 4.0]);
    }

    #[test]
    fn test_sample_rate_conversion_interpolates() {
        let mut source = SourceInstance::new(ramp_track(8, 1000), 2000.0, 0.0, 1.0, 0.0);
        source.start(0.0);
        assert_eq!(pull(&mut source, 4), vec![0.0, 0.5, 1.0, 1.5]);
    }

    #[test]
    fn test_natural_end_without_loop() {
        let mut source = SourceInstance::new(ramp_track(4, 1000), 1000.0, 0.0, 1.0, 0.0);
        source.start(0.0);
        let out = pull(&mut source, 6);
        assert_eq!(out, vec![0.0, 1.0, 2.0, 3.0, 0.0, 0.0]);
        assert!(source.has_ended());
    }

    #[test]
    fn test_loop_wraps() {
        let mut source = SourceInstance::new(ramp_track(3, 1000), 1000.0, 0.0, 1.0, 0.0);
        source.set_loop(true);
        source.start(0.0);
        assert_eq!(pull(&mut source, 7), vec![0.0, 1.0, 2.0, 0.0, 1.0, 2.0, 0.0]);
        assert!(source.is_playing());
    }

    #[test]
    fn test_start_offset_and_seek_clamp() {
        let mut source = SourceInstance::new(ramp_track(10, 1000), 1000.0, 0.0, 1.0, 0.0);
        source.start(0.005);
        assert_eq!(pull(&mut source, 1), vec![5.0]);

        source.seek(100.0);
        assert_relative_eq!(source.position_secs(), 0.009);
        source.seek(-1.0);
        assert_eq!(source.position_secs(), 0.0);
    }

    #[test]
    fn test_rate_changes_are_smoothed() {
        let mut source = SourceInstance::new(ramp_track(48000, 48000), 48000.0, 0.016, 1.0, 0.0);
        source.start(0.0);
        source.set_rate(2.0);
        assert_eq!(source.rate(), 2.0);
        let out = pull(&mut source, 3);
        // Still close to unit speed right after the change
        assert!(out[2] < 2.1, "{:?}", out);
    }
}
