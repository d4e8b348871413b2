//! Audio Engine Module
//!
//! Everything between a decoded file and the speakers:
//! - Audio buffers and decoded tracks
//! - WAV decoding and encoding
//! - Live and offline rendering contexts
//! - Source instances and the transport state machine

pub mod buffer;
pub mod clock;
pub mod context;
pub mod io;
pub mod source;
pub mod track;
pub mod transport;

pub use buffer::AudioBuffer;
pub use clock::{Clock, ManualClock, SystemClock};
pub use context::{ContextState, LiveContext, OfflineContext};
pub use io::{encode_wav, generate_test_tone, read_track, write_wav_file, Decoder, WavDecoder};
pub use source::SourceInstance;
pub use track::{DecodedTrack, TrackSpecs};
pub use transport::{PlaybackController, TransportState};
