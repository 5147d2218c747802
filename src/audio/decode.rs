use std::io::Cursor;
use std::path::Path;

use anyhow::Context;
use symphonia::core::audio::{AudioBuffer, Signal};
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::backend::base_mime_type;

/// Planar PCM produced by a container decoder
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// One buffer per channel, equal lengths, samples in [-1.0, 1.0]
    pub channels: Vec<Vec<f32>>,
}

impl DecodedAudio {
    /// Build from planar buffers, checking the shape invariants
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self, DecodeError> {
        if channels.is_empty() {
            return Err(DecodeError::NoAudio);
        }
        let frames = channels[0].len();
        if channels.iter().any(|c| c.len() != frames) {
            return Err(DecodeError::Malformed(
                "channel buffers have different lengths".to_string(),
            ));
        }
        if sample_rate == 0 {
            return Err(DecodeError::Malformed("sample rate is zero".to_string()));
        }
        Ok(Self {
            sample_rate,
            channels,
        })
    }

    pub fn channel_count(&self) -> u16 {
        self.channels.len() as u16
    }

    /// Samples per channel
    pub fn frame_count(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unsupported container or codec: {0}")]
    Unsupported(String),

    #[error("container holds no decodable audio")]
    NoAudio,

    #[error("malformed audio: {0}")]
    Malformed(String),
}

/// Turns a complete recorder container into PCM
pub trait ContainerDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8], mime_type: &str) -> Result<DecodedAudio, DecodeError>;
}

/// Decoder backed by symphonia's default format and codec registries
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode an audio file from disk, using its extension as the format hint
    pub fn decode_file(&self, path: impl AsRef<Path>) -> anyhow::Result<DecodedAudio> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read audio file: {}", path.display()))?;

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(extension);
        }

        let audio = decode_with_hint(bytes, hint)
            .with_context(|| format!("Failed to decode {}", path.display()))?;

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels",
            audio.duration_seconds(),
            audio.sample_rate,
            audio.channel_count()
        );

        Ok(audio)
    }
}

impl ContainerDecoder for SymphoniaDecoder {
    fn decode(&self, bytes: &[u8], mime_type: &str) -> Result<DecodedAudio, DecodeError> {
        let mut hint = Hint::new();
        let base = base_mime_type(mime_type);
        hint.mime_type(base);
        if let Some(extension) = extension_for_mime(base) {
            hint.with_extension(extension);
        }

        decode_with_hint(bytes.to_vec(), hint)
    }
}

fn extension_for_mime(mime_type: &str) -> Option<&'static str> {
    match mime_type {
        "audio/webm" | "video/webm" => Some("webm"),
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => Some("m4a"),
        "audio/wav" | "audio/wave" | "audio/x-wav" => Some("wav"),
        "audio/ogg" => Some("ogg"),
        "audio/mpeg" => Some("mp3"),
        "audio/flac" => Some("flac"),
        _ => None,
    }
}

fn decode_with_hint(bytes: Vec<u8>, hint: Hint) -> Result<DecodedAudio, DecodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| DecodeError::Unsupported(e.to_string()))?;
    let mut format = probed.format;

    let track = format.default_track().ok_or(DecodeError::NoAudio)?;
    let track_id = track.id;
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Unsupported(e.to_string()))?;

    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels: Vec<Vec<f32>> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            // End of stream
            Err(SymphoniaError::IoError(_)) => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(DecodeError::Malformed(e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(DecodeError::Malformed(e.to_string())),
        };

        let spec = *decoded.spec();
        if channels.is_empty() {
            sample_rate = spec.rate;
            channels = vec![Vec::new(); spec.channels.count()];
        }

        let mut planar = AudioBuffer::<f32>::new(decoded.capacity() as u64, spec);
        decoded.convert(&mut planar);
        append_planar(&mut channels, &planar)?;
    }

    if channels.is_empty() || channels[0].is_empty() {
        return Err(DecodeError::NoAudio);
    }

    debug!(
        "Decoded {} frames x {} channels at {}Hz",
        channels[0].len(),
        channels.len(),
        sample_rate
    );

    DecodedAudio::new(sample_rate, channels)
}

/// Append one decoded packet; the channel layout may not change mid-stream
fn append_planar(channels: &mut [Vec<f32>], planar: &AudioBuffer<f32>) -> Result<(), DecodeError> {
    let count = planar.spec().channels.count();
    if count != channels.len() {
        return Err(DecodeError::Malformed(format!(
            "channel count changed from {} to {} mid-stream",
            channels.len(),
            count
        )));
    }

    for (index, out) in channels.iter_mut().enumerate() {
        out.extend(planar.chan(index).iter().map(|s| s.clamp(-1.0, 1.0)));
    }
    Ok(())
}
