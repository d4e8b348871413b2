//! Audio file I/O
//!
//! Decoding goes through the [`Decoder`] trait so hosts can plug in other
//! container formats; the built-in [`WavDecoder`] reads PCM and float WAV with
//! hound. WAV writing is shared by the export encoder and the CLI.

use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::debug;

use super::buffer::AudioBuffer;
use super::track::DecodedTrack;
use crate::error::{Result, ToneError};

/// Turns encoded bytes into a decoded track
pub trait Decoder: Send + Sync {
    /// Decode `bytes`; `name` is only used for display
    fn decode(&self, name: &str, bytes: &[u8]) -> Result<DecodedTrack>;
}

/// hound-backed WAV decoder (8/16/24/32-bit int, 32-bit float, any channel count)
#[derive(Debug, Clone, Copy, Default)]
pub struct WavDecoder;

impl Decoder for WavDecoder {
    fn decode(&self, name: &str, bytes: &[u8]) -> Result<DecodedTrack> {
        let reader = WavReader::new(Cursor::new(bytes)).map_err(|e| ToneError::Decode {
            reason: format!("'{}' is not a readable WAV file: {}", name, e),
            source: Some(Box::new(e)),
        })?;

        let spec = reader.spec();
        let channels = usize::from(spec.channels);
        if channels == 0 {
            return Err(ToneError::decode(format!("'{}' declares zero channels", name)));
        }

        let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
        let buffer = AudioBuffer::from_interleaved(&interleaved, channels, spec.sample_rate)?;
        if buffer.is_empty() {
            return Err(ToneError::decode(format!("'{}' contains no audio", name)));
        }

        debug!(
            name,
            sample_rate = spec.sample_rate,
            channels,
            bits = spec.bits_per_sample,
            frames = buffer.frames(),
            "decoded WAV"
        );
        Ok(DecodedTrack::new(name, buffer, Some(spec.bits_per_sample)))
    }
}

/// Read and decode a file with `decoder`
pub fn read_track(path: &Path, decoder: &dyn Decoder) -> Result<DecodedTrack> {
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    decoder.decode(&name, &bytes)
}

/// Encode `buffer` as a WAV byte stream
///
/// 16 and 24 bit write integer PCM, 32 bit writes IEEE float.
pub fn encode_wav(buffer: &AudioBuffer, bits_per_sample: u16) -> Result<Vec<u8>> {
    let channels = u16::try_from(buffer.channels())
        .map_err(|_| ToneError::export(format!("{} channels cannot be written to WAV", buffer.channels())))?;

    let spec = WavSpec {
        channels,
        sample_rate: buffer.sample_rate,
        bits_per_sample,
        sample_format: if bits_per_sample == 32 {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        },
    };

    let mut bytes = Vec::new();
    let mut writer = WavWriter::new(Cursor::new(&mut bytes), spec).map_err(wav_error)?;

    let interleaved = buffer.to_interleaved();
    match bits_per_sample {
        16 => {
            for sample in interleaved {
                let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                writer.write_sample(scaled).map_err(wav_error)?;
            }
        }
        24 => {
            for sample in interleaved {
                // 24-bit stored as i32 in hound
                let scaled = (sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32;
                writer.write_sample(scaled).map_err(wav_error)?;
            }
        }
        32 => {
            for sample in interleaved {
                writer.write_sample(sample).map_err(wav_error)?;
            }
        }
        _ => {
            return Err(ToneError::UnsupportedFormat {
                format: format!("{}-bit WAV (only 16, 24, 32 supported)", bits_per_sample),
            });
        }
    }

    writer.finalize().map_err(wav_error)?;
    Ok(bytes)
}

/// Write `buffer` to a WAV file at `path`
pub fn write_wav_file(path: &Path, buffer: &AudioBuffer, bits_per_sample: u16) -> Result<()> {
    let bytes = encode_wav(buffer, bits_per_sample)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Sine test tone, mono or duplicated across `channels`
pub fn generate_test_tone(
    frequency: f32,
    duration_secs: f32,
    sample_rate: u32,
    channels: usize,
) -> AudioBuffer {
    let frames = (duration_secs * sample_rate as f32) as usize;
    let angular = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;
    let tone: Vec<f32> = (0..frames).map(|i| 0.5 * (angular * i as f32).sin()).collect();
    AudioBuffer {
        samples: vec![tone; channels.max(1)],
        sample_rate,
    }
}

fn wav_error(e: hound::Error) -> ToneError {
    ToneError::Encode {
        format: "wav".to_string(),
        reason: e.to_string(),
    }
}

fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    fn failed(bits: u16) -> impl Fn(hound::Error) -> ToneError {
        move |e| ToneError::Decode {
            reason: format!("failed to read {}-bit samples: {}", bits, e),
            source: Some(Box::new(e)),
        }
    }

    match sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(failed(bits_per_sample)),
        SampleFormat::Int => {
            let scale = match bits_per_sample {
                8 => 128.0,
                16 => 32768.0,
                24 => 8388608.0,
                32 => 2147483648.0,
                _ => {
                    return Err(ToneError::UnsupportedFormat {
                        format: format!("{}-bit integer audio", bits_per_sample),
                    })
                }
            };
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| (f64::from(v) / scale) as f32))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(failed(bits_per_sample))
        }
    }
}
