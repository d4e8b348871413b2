//! Decoded source tracks

use serde::Serialize;
use uuid::Uuid;

use super::buffer::AudioBuffer;

/// Format of the file a track was decoded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrackSpecs {
    pub sample_rate: u32,
    pub channels: usize,
    /// Bits per sample in the source file, when the container states it
    pub bits_per_sample: Option<u16>,
}

/// Immutable decoded recording
///
/// Shared via `Arc` between the live graph and the exporter; a new load
/// replaces the whole track.
#[derive(Debug, Clone)]
pub struct DecodedTrack {
    id: Uuid,
    name: String,
    buffer: AudioBuffer,
    specs: TrackSpecs,
}

impl DecodedTrack {
    pub fn new(name: impl Into<String>, buffer: AudioBuffer, bits_per_sample: Option<u16>) -> Self {
        let specs = TrackSpecs {
            sample_rate: buffer.sample_rate,
            channels: buffer.channels(),
            bits_per_sample,
        };
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            buffer,
            specs,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn buffer(&self) -> &AudioBuffer {
        &self.buffer
    }

    pub fn specs(&self) -> TrackSpecs {
        self.specs
    }

    pub fn sample_rate(&self) -> u32 {
        self.buffer.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.buffer.channels()
    }

    pub fn frames(&self) -> usize {
        self.buffer.frames()
    }

    pub fn duration_secs(&self) -> f64 {
        self.buffer.duration_secs()
    }
}
