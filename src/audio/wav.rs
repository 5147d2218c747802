//! Canonical 16-bit PCM WAV encoding
//!
//! Layout is always the plain 44-byte RIFF header followed by interleaved
//! little-endian samples. No `fmt ` extension, no `LIST`/`fact` chunks, no
//! padding, so `len == 44 + frames * channels * 2` for every input.

use super::decode::DecodedAudio;

pub const WAV_MIME_TYPE: &str = "audio/wav";

/// Size of the RIFF/WAVE header written by `encode_wav`
pub const WAV_HEADER_LEN: usize = 44;

const BITS_PER_SAMPLE: u16 = 16;
const BYTES_PER_SAMPLE: u16 = BITS_PER_SAMPLE / 8;
const PCM_FORMAT_TAG: u16 = 1;
const FMT_CHUNK_LEN: u32 = 16;

/// An immutable audio payload ready for playback or upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBlob {
    bytes: Vec<u8>,
    mime_type: String,
}

impl AudioBlob {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// True for encoder output, false for a raw-container fallback
    pub fn is_wav(&self) -> bool {
        self.mime_type == WAV_MIME_TYPE
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Encode planar PCM as a canonical WAV blob
///
/// Callers must pass audio that satisfies the `DecodedAudio` invariants
/// (at least one channel, equal channel lengths).
pub fn encode_wav(pcm: &DecodedAudio) -> AudioBlob {
    let channels = pcm.channel_count();
    let frames = pcm.frame_count();
    let data_len = frames * channels as usize * BYTES_PER_SAMPLE as usize;

    let mut buf = Vec::with_capacity(WAV_HEADER_LEN + data_len);
    write_header(&mut buf, channels, pcm.sample_rate, data_len as u32);

    for frame in 0..frames {
        for channel in &pcm.channels {
            buf.extend_from_slice(&quantize(channel[frame]).to_le_bytes());
        }
    }

    debug_assert_eq!(buf.len(), WAV_HEADER_LEN + data_len);

    AudioBlob::new(buf, WAV_MIME_TYPE)
}

fn write_header(buf: &mut Vec<u8>, channels: u16, sample_rate: u32, data_len: u32) {
    let block_align = channels * BYTES_PER_SAMPLE;
    let byte_rate = sample_rate * block_align as u32;

    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&(36 + data_len).to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    // fmt sub-chunk
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
    buf.extend_from_slice(&PCM_FORMAT_TAG.to_le_bytes());
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    // data sub-chunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_len.to_le_bytes());
}

/// Clamp to [-1, 1] and scale asymmetrically so +1.0 maps to 32767 without overflow
pub(crate) fn quantize(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_extremes() {
        assert_eq!(quantize(1.0), i16::MAX);
        assert_eq!(quantize(-1.0), i16::MIN);
        assert_eq!(quantize(0.0), 0);
    }

    #[test]
    fn test_quantize_truncates_toward_zero() {
        assert_eq!(quantize(0.5), 16383);
        assert_eq!(quantize(-0.5), -16384);
    }

    #[test]
    fn test_quantize_nan_is_silence() {
        assert_eq!(quantize(f32::NAN), 0);
    }
}
