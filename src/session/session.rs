use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, error, info, warn};

use super::config::SessionConfig;
use super::stats::SessionStats;
use crate::audio::{select_mime_type, CaptureBackend, ChunkReceiver, DeviceError, MediaStream};

/// How long `stop` waits for the recorder to flush its last chunk
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Recorder lifecycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecorderState {
    #[default]
    Idle,
    Recording,
    Paused,
    Stopped,
}

/// Output of a stopped session: every chunk, concatenated in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRecording {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub chunk_count: usize,
}

/// A single microphone recording
///
/// Owns the device stream exclusively from `start` until `stop`/`abort`/drop,
/// and releases it on every one of those paths.
pub struct CaptureSession {
    id: String,
    config: SessionConfig,
    state: RecorderState,
    stream: Option<Box<dyn MediaStream>>,
    chunk_rx: Option<ChunkReceiver>,
    chunks: Vec<Vec<u8>>,
    mime_type: Option<String>,
    started_at: Option<DateTime<Utc>>,
    stopped_at: Option<DateTime<Utc>>,
}

impl CaptureSession {
    pub fn new(config: SessionConfig) -> Self {
        let id = format!("recording-{}", uuid::Uuid::new_v4());
        debug!("Creating capture session: {}", id);

        Self {
            id,
            config,
            state: RecorderState::Idle,
            stream: None,
            chunk_rx: None,
            chunks: Vec::new(),
            mime_type: None,
            started_at: None,
            stopped_at: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    /// Recording or paused
    pub fn is_active(&self) -> bool {
        matches!(self.state, RecorderState::Recording | RecorderState::Paused)
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    /// Chunks received so far, in arrival order
    pub fn chunks(&self) -> &[Vec<u8>] {
        &self.chunks
    }

    /// Whether this session still holds an unreleased device stream
    pub fn holds_device(&self) -> bool {
        self.stream.as_ref().is_some_and(|s| !s.is_released())
    }

    /// Acquire the microphone and start recording
    ///
    /// Only valid from `Idle`; any other state is a logged no-op. On failure the
    /// session stays `Idle` and no device is held.
    pub async fn start(&mut self, backend: &dyn CaptureBackend) -> Result<(), DeviceError> {
        if self.state != RecorderState::Idle {
            warn!("Session {} already started ({:?})", self.id, self.state);
            return Ok(());
        }

        let mime_type = match select_mime_type(backend, &self.config.mime_preferences) {
            Some(mime) => mime.to_string(),
            None => {
                error!(
                    "{} supports none of the recorder containers {:?}",
                    backend.name(),
                    self.config.mime_preferences
                );
                return Err(DeviceError::Unknown);
            }
        };

        info!(
            "Starting capture session {} on {} ({})",
            self.id,
            backend.name(),
            mime_type
        );

        let mut stream = backend.acquire().await?;

        let chunk_rx = match stream.start(&mime_type) {
            Ok(rx) => rx,
            Err(e) => {
                error!("Recorder failed to start: {}", e);
                stream.release();
                return Err(e);
            }
        };

        self.stream = Some(stream);
        self.chunk_rx = Some(chunk_rx);
        self.chunks.clear();
        self.mime_type = Some(mime_type);
        self.started_at = Some(Utc::now());
        self.state = RecorderState::Recording;

        info!("Capture session {} recording", self.id);

        Ok(())
    }

    /// Recording -> Paused; no-op otherwise
    pub fn pause(&mut self) {
        if self.state != RecorderState::Recording {
            debug!("pause ignored in {:?}", self.state);
            return;
        }
        if let Some(stream) = self.stream.as_mut() {
            stream.pause();
        }
        self.state = RecorderState::Paused;
        info!("Capture session {} paused", self.id);
    }

    /// Paused -> Recording; no-op otherwise
    pub fn resume(&mut self) {
        if self.state != RecorderState::Paused {
            debug!("resume ignored in {:?}", self.state);
            return;
        }
        if let Some(stream) = self.stream.as_mut() {
            stream.resume();
        }
        self.state = RecorderState::Recording;
        info!("Capture session {} resumed", self.id);
    }

    pub fn toggle_pause(&mut self) {
        match self.state {
            RecorderState::Recording => self.pause(),
            RecorderState::Paused => self.resume(),
            _ => debug!("toggle_pause ignored in {:?}", self.state),
        }
    }

    /// Append any chunks the recorder has delivered so far
    pub fn poll_chunks(&mut self) -> usize {
        let Some(rx) = self.chunk_rx.as_mut() else {
            return 0;
        };

        let mut received = 0;
        loop {
            match rx.try_recv() {
                Ok(chunk) => {
                    self.chunks.push(chunk);
                    received += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.chunk_rx = None;
                    break;
                }
            }
        }
        received
    }

    /// Stop recording, flush the recorder and release the device
    ///
    /// Returns `None` (and does nothing) unless the session is recording or paused.
    pub async fn stop(&mut self) -> Option<CapturedRecording> {
        if !self.is_active() {
            debug!("stop ignored in {:?}", self.state);
            return None;
        }

        info!("Stopping capture session {}", self.id);

        if let Some(stream) = self.stream.as_mut() {
            stream.stop();
        }

        if let Some(mut rx) = self.chunk_rx.take() {
            let chunks = &mut self.chunks;
            let drained = tokio::time::timeout(FLUSH_TIMEOUT, async {
                while let Some(chunk) = rx.recv().await {
                    chunks.push(chunk);
                }
            })
            .await;
            if drained.is_err() {
                warn!(
                    "Recorder did not finish flushing within {:?}, using {} chunks",
                    FLUSH_TIMEOUT,
                    self.chunks.len()
                );
            }
        }

        self.release_device();
        self.state = RecorderState::Stopped;
        self.stopped_at = Some(Utc::now());

        let recording = CapturedRecording {
            bytes: self.chunks.concat(),
            mime_type: self.mime_type.clone().unwrap_or_default(),
            chunk_count: self.chunks.len(),
        };

        info!(
            "Capture session {} stopped: {} chunks, {} bytes",
            self.id,
            recording.chunk_count,
            recording.bytes.len()
        );

        Some(recording)
    }

    /// Drop everything and release the device without producing output
    pub fn abort(&mut self) {
        if self.is_active() {
            info!("Aborting capture session {}", self.id);
            if let Some(stream) = self.stream.as_mut() {
                stream.stop();
            }
            self.state = RecorderState::Stopped;
            self.stopped_at = Some(Utc::now());
        }
        self.chunk_rx = None;
        self.chunks.clear();
        self.release_device();
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            session_id: self.id.clone(),
            state: self.state,
            mime_type: self.mime_type.clone(),
            started_at: self.started_at,
            stopped_at: self.stopped_at,
            chunks_count: self.chunks.len(),
            bytes_received: self.chunks.iter().map(Vec::len).sum(),
        }
    }

    fn release_device(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.release();
            debug!("Capture session {} released the device", self.id);
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.release_device();
    }
}
