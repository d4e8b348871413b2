//! Circular delay line
//!
//! Backs the echo loop. Reads happen before writes within a frame, so a
//! feedback path through the line always sees at least one full delay period.

/// Longest delay the line can be configured for, in seconds
pub const MAX_DELAY_SECS: f64 = 2.0;

/// Multi-channel fixed delay
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffers: Vec<Vec<f32>>,
    write_pos: usize,
    delay_samples: usize,
}

impl DelayLine {
    /// Create a line delaying by `delay_secs` (clamped to `(0, MAX_DELAY_SECS]`)
    pub fn new(delay_secs: f64, sample_rate: f64, channels: usize) -> Self {
        let delay_secs = delay_secs.clamp(0.0, MAX_DELAY_SECS);
        let delay_samples = ((delay_secs * sample_rate).round() as usize).max(1);
        // One extra slot so the read position never collides with the write position
        let size = delay_samples + 1;
        Self {
            buffers: vec![vec![0.0; size]; channels.max(1)],
            write_pos: 0,
            delay_samples,
        }
    }

    /// Sample written `delay_samples` frames ago on `channel`
    #[inline]
    pub fn read(&self, channel: usize) -> f32 {
        let Some(buffer) = self.buffers.get(channel) else {
            return 0.0;
        };
        let size = buffer.len();
        let read_pos = (self.write_pos + size - self.delay_samples) % size;
        buffer[read_pos]
    }

    /// Store the current frame's input for `channel`
    #[inline]
    pub fn write(&mut self, channel: usize, value: f32) {
        let pos = self.write_pos;
        if let Some(buffer) = self.buffers.get_mut(channel) {
            buffer[pos] = value;
        }
    }

    /// Move to the next frame; call once after all channels were written
    #[inline]
    pub fn advance(&mut self) {
        let size = self.buffers.first().map_or(1, Vec::len);
        self.write_pos = (self.write_pos + 1) % size;
    }

    pub fn reset(&mut self) {
        for buffer in &mut self.buffers {
            buffer.fill(0.0);
        }
        self.write_pos = 0;
    }

    pub fn delay_samples(&self) -> usize {
        self.delay_samples
    }
}
