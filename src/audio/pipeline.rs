use std::sync::Arc;

use tracing::{info, warn};

use super::decode::{ContainerDecoder, DecodedAudio};
use super::wav::{encode_wav, AudioBlob};

/// Decode a finished recording and re-encode it as WAV
///
/// When the container cannot be decoded the recording is kept as-is: the
/// returned blob carries the original bytes and mime type unchanged.
pub fn prepare_deliverable(
    decoder: &dyn ContainerDecoder,
    container: Vec<u8>,
    mime_type: &str,
) -> AudioBlob {
    let decoded = decoder.decode(&container, mime_type).map_err(|e| e.to_string());
    finish(decoded, container, mime_type)
}

/// `prepare_deliverable` with the decode step on the blocking pool
pub async fn prepare_deliverable_async(
    decoder: Arc<dyn ContainerDecoder>,
    container: Vec<u8>,
    mime_type: String,
) -> AudioBlob {
    let container = Arc::new(container);
    let shared = Arc::clone(&container);
    let hint = mime_type.clone();

    let decoded = tokio::task::spawn_blocking(move || decoder.decode(&shared, &hint))
        .await
        .map_err(|e| format!("decode task failed: {}", e))
        .and_then(|result| result.map_err(|e| e.to_string()));

    let container = Arc::try_unwrap(container).unwrap_or_else(|shared| shared.as_ref().clone());
    finish(decoded, container, &mime_type)
}

fn finish(decoded: Result<DecodedAudio, String>, container: Vec<u8>, mime_type: &str) -> AudioBlob {
    match decoded {
        Ok(pcm) => {
            let wav = encode_wav(&pcm);
            info!(
                "Converted {} byte {} recording to WAV ({} bytes, {}Hz, {} channels, {:.1}s)",
                container.len(),
                mime_type,
                wav.len(),
                pcm.sample_rate,
                pcm.channel_count(),
                pcm.duration_seconds()
            );
            wav
        }
        Err(e) => {
            warn!(
                "Error converting to WAV, keeping original {} container ({} bytes): {}",
                mime_type,
                container.len(),
                e
            );
            AudioBlob::new(container, mime_type)
        }
    }
}
