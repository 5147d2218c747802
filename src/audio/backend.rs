use tokio::sync::mpsc;

use super::device::DeviceError;

/// Container preference order for the recorder (best first)
pub const PREFERRED_MIME_TYPES: &[&str] = &[
    "audio/webm;codecs=opus",
    "audio/webm",
    "audio/mp4",
    // Native PCM recorders (see `CpalBackend`) only emit WAV
    "audio/wav",
];

/// Encoded container bytes, delivered in arrival order
pub type ChunkReceiver = mpsc::UnboundedReceiver<Vec<u8>>;

/// Configuration for a capture backend
#[derive(Debug, Clone)]
pub struct CaptureBackendConfig {
    /// Upper bound on recording length, in seconds (older audio is dropped)
    pub max_duration_secs: u32,
}

impl Default for CaptureBackendConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: 300, // 5 minutes
        }
    }
}

/// Platform microphone access
///
/// Implementations:
/// - `CpalBackend`: default input device through cpal
/// - test fakes: deterministic chunk producers, no hardware required
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Request audio-only capture access
    ///
    /// The returned stream holds the device until `MediaStream::release` is called.
    async fn acquire(&self) -> Result<Box<dyn MediaStream>, DeviceError>;

    /// Whether the recorder can produce the given container
    fn is_type_supported(&self, mime_type: &str) -> bool;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// An open microphone stream plus the recorder encoding it
pub trait MediaStream: Send {
    /// Begin encoding into `mime_type`
    ///
    /// Returns a receiver of encoded chunks. The sender is dropped once the
    /// recorder has flushed its last chunk after `stop`.
    fn start(&mut self, mime_type: &str) -> Result<ChunkReceiver, DeviceError>;

    /// Suspend capture; no audio is encoded until `resume`
    fn pause(&mut self);

    fn resume(&mut self);

    /// Stop encoding and flush buffered data to the chunk channel
    fn stop(&mut self);

    /// Stop all tracks and give the hardware back. Must be idempotent.
    fn release(&mut self);

    /// Whether `release` has run
    fn is_released(&self) -> bool;
}

/// Pick the first container in `preferences` the backend supports
pub fn select_mime_type<'a>(
    backend: &dyn CaptureBackend,
    preferences: &'a [String],
) -> Option<&'a str> {
    preferences
        .iter()
        .map(String::as_str)
        .find(|mime| backend.is_type_supported(mime))
}

/// Strip codec parameters: `audio/webm;codecs=opus` -> `audio/webm`
pub fn base_mime_type(mime_type: &str) -> &str {
    mime_type.split(';').next().unwrap_or(mime_type).trim()
}
