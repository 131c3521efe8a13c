//! Audio decoder using symphonia
//!
//! Decodes a whole encoded stream held in memory (MP3, FLAC, AAC, Vorbis,
//! WAV) to interleaved stereo f32 at the source sample rate.

use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Decoded PCM, always interleaved stereo
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

pub struct SimpleDecoder;

impl SimpleDecoder {
    /// Decode an entire in-memory stream
    ///
    /// `extension` helps the probe pick a container when the magic bytes are
    /// ambiguous. Corrupt packets are skipped; a stream that yields no audio at
    /// all is an error.
    pub fn decode_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<DecodedAudio> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| Error::Decode(format!("Failed to probe format: {}", e)))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;

        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| Error::Decode("Sample rate not found".to_string()))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

        let mut samples = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => {
                    warn!("Error reading packet: {}", e);
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Decode error: {}", e);
                    continue;
                }
                Err(e) => {
                    warn!("Decoder failed: {}", e);
                    break;
                }
            };

            let spec = *decoded.spec();
            let channels = spec.channels.count();
            let too_small = sample_buf
                .as_ref()
                .map_or(true, |buf| buf.capacity() < decoded.capacity() * channels);
            if too_small {
                sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
            }
            if let Some(buf) = sample_buf.as_mut() {
                buf.copy_interleaved_ref(decoded);
                Self::push_stereo(buf.samples(), channels, &mut samples);
            }
        }

        if samples.is_empty() {
            return Err(Error::Decode("Stream contained no audio".to_string()));
        }

        debug!(
            frames = samples.len() / 2,
            sample_rate, "Decoded audio stream"
        );

        Ok(DecodedAudio {
            samples,
            sample_rate,
        })
    }

    /// Append interleaved frames as stereo: mono is duplicated, extra channels
    /// beyond front left/right are dropped
    fn push_stereo(input: &[f32], channels: usize, output: &mut Vec<f32>) {
        match channels {
            0 => {}
            1 => {
                output.reserve(input.len() * 2);
                for &s in input {
                    output.push(s);
                    output.push(s);
                }
            }
            2 => output.extend_from_slice(input),
            n => {
                for frame in input.chunks_exact(n) {
                    output.push(frame[0]);
                    output.push(frame[1]);
                }
            }
        }
    }
}
