// Test doubles shared by the integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};
use voice_task_capture::api::{
    Category, HealthStatus, ProcessVoiceResponse, SaveAudioResponse, TaskApi, TaskRecord,
    UploadError,
};
use voice_task_capture::audio::{
    AudioBlob, CaptureBackend, ChunkReceiver, ContainerDecoder, DecodeError, DecodedAudio,
    DeviceError, MediaStream, PlaybackError, PlaybackSink,
};

pub const WEBM_OPUS: &str = "audio/webm;codecs=opus";

// ---------------------------------------------------------------------------
// Capture
// ---------------------------------------------------------------------------

/// Shared view of what the fake device went through
#[derive(Default)]
pub struct DeviceLog {
    pub held: AtomicBool,
    pub acquisitions: AtomicUsize,
    pub releases: AtomicUsize,
    pub started_with: Mutex<Option<String>>,
}

impl DeviceLog {
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

/// Recorder that delivers its configured chunks when stopped
pub struct FakeBackend {
    pub supported: Vec<String>,
    /// Delivered as soon as the recorder starts
    pub early_chunks: Vec<Vec<u8>>,
    /// Delivered on stop
    pub chunks: Vec<Vec<u8>>,
    pub acquire_error: Option<DeviceError>,
    pub start_error: Option<DeviceError>,
    pub log: Arc<DeviceLog>,
}

impl FakeBackend {
    pub fn new(chunks: &[&[u8]]) -> Self {
        Self {
            supported: vec![WEBM_OPUS.to_string(), "audio/webm".to_string()],
            early_chunks: Vec::new(),
            chunks: chunks.iter().map(|c| c.to_vec()).collect(),
            acquire_error: None,
            start_error: None,
            log: Arc::new(DeviceLog::default()),
        }
    }

    pub fn failing(error: DeviceError) -> Self {
        Self {
            acquire_error: Some(error),
            ..Self::new(&[])
        }
    }

    pub fn streaming(early: &[&[u8]], late: &[&[u8]]) -> Self {
        Self {
            early_chunks: early.iter().map(|c| c.to_vec()).collect(),
            ..Self::new(late)
        }
    }

    pub fn supporting(mut self, supported: &[&str]) -> Self {
        self.supported = supported.iter().map(|s| s.to_string()).collect();
        self
    }
}

#[async_trait]
impl CaptureBackend for FakeBackend {
    async fn acquire(&self) -> Result<Box<dyn MediaStream>, DeviceError> {
        if let Some(e) = self.acquire_error {
            return Err(e);
        }
        self.log.acquisitions.fetch_add(1, Ordering::SeqCst);
        self.log.held.store(true, Ordering::SeqCst);
        Ok(Box::new(FakeStream {
            early_chunks: self.early_chunks.clone(),
            chunks: self.chunks.clone(),
            start_error: self.start_error,
            tx: None,
            released: false,
            log: Arc::clone(&self.log),
        }))
    }

    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.supported.iter().any(|s| s == mime_type)
    }

    fn name(&self) -> &str {
        "fake microphone"
    }
}

pub struct FakeStream {
    early_chunks: Vec<Vec<u8>>,
    chunks: Vec<Vec<u8>>,
    start_error: Option<DeviceError>,
    tx: Option<mpsc::UnboundedSender<Vec<u8>>>,
    released: bool,
    log: Arc<DeviceLog>,
}

impl MediaStream for FakeStream {
    fn start(&mut self, mime_type: &str) -> Result<ChunkReceiver, DeviceError> {
        if let Some(e) = self.start_error {
            return Err(e);
        }
        *self.log.started_with.lock().unwrap() = Some(mime_type.to_string());
        let (tx, rx) = mpsc::unbounded_channel();
        for chunk in self.early_chunks.drain(..) {
            let _ = tx.send(chunk);
        }
        self.tx = Some(tx);
        Ok(rx)
    }

    fn pause(&mut self) {}

    fn resume(&mut self) {}

    fn stop(&mut self) {
        if let Some(tx) = self.tx.take() {
            for chunk in self.chunks.drain(..) {
                let _ = tx.send(chunk);
            }
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.log.held.store(false, Ordering::SeqCst);
        self.log.releases.fetch_add(1, Ordering::SeqCst);
    }

    fn is_released(&self) -> bool {
        self.released
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decoder returning a fixed result and remembering its input
pub struct FakeDecoder {
    result: Result<DecodedAudio, DecodeError>,
    pub inputs: Mutex<Vec<(Vec<u8>, String)>>,
    /// Notified when a decode starts
    pub entered: Notify,
    gate: Option<(Mutex<bool>, Condvar)>,
}

impl FakeDecoder {
    pub fn decoding_to(audio: DecodedAudio) -> Self {
        Self {
            result: Ok(audio),
            inputs: Mutex::new(Vec::new()),
            entered: Notify::new(),
            gate: None,
        }
    }

    pub fn failing() -> Self {
        Self {
            result: Err(DecodeError::Unsupported("opus".to_string())),
            ..Self::decoding_to(DecodedAudio::new(16000, vec![Vec::new()]).unwrap())
        }
    }

    /// Decodes block the calling thread until `release` is called
    pub fn gated(mut self) -> Self {
        self.gate = Some((Mutex::new(false), Condvar::new()));
        self
    }

    pub fn release(&self) {
        if let Some((open, cvar)) = &self.gate {
            *open.lock().unwrap() = true;
            cvar.notify_all();
        }
    }

    /// Stereo, 16 kHz, 100 frames of silence
    pub fn stereo_100_frames() -> Self {
        Self::decoding_to(DecodedAudio::new(16000, vec![vec![0.0; 100], vec![0.0; 100]]).unwrap())
    }
}

impl ContainerDecoder for FakeDecoder {
    fn decode(&self, bytes: &[u8], mime_type: &str) -> Result<DecodedAudio, DecodeError> {
        self.inputs
            .lock()
            .unwrap()
            .push((bytes.to_vec(), mime_type.to_string()));
        self.entered.notify_one();
        if let Some((open, cvar)) = &self.gate {
            let mut open = open.lock().unwrap();
            while !*open {
                open = cvar.wait(open).unwrap();
            }
        }
        match &self.result {
            Ok(audio) => Ok(audio.clone()),
            Err(DecodeError::Unsupported(s)) => Err(DecodeError::Unsupported(s.clone())),
            Err(DecodeError::Malformed(s)) => Err(DecodeError::Malformed(s.clone())),
            Err(DecodeError::NoAudio) => Err(DecodeError::NoAudio),
        }
    }
}

// ---------------------------------------------------------------------------
// Backend API
// ---------------------------------------------------------------------------

/// Task API that can hold its responses until released
#[derive(Default)]
pub struct FakeApi {
    pub process_calls: AtomicUsize,
    pub save_calls: AtomicUsize,
    pub uploads: Mutex<Vec<AudioBlob>>,
    pub fail: AtomicBool,
    pub save_response: Mutex<SaveAudioResponse>,
    /// Notified when a request reaches the fake
    pub entered: Notify,
    gate: Option<Notify>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            save_response: Mutex::new(SaveAudioResponse {
                success: true,
                transcription: "fix the hvac in room 4".to_string(),
                task: Some(sample_task()),
                error: None,
            }),
            ..Default::default()
        }
    }

    /// Requests block until `release` is called
    pub fn gated() -> Self {
        Self {
            gate: Some(Notify::new()),
            ..Self::new()
        }
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn process_calls(&self) -> usize {
        self.process_calls.load(Ordering::SeqCst)
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    async fn respond(&self, audio: &AudioBlob) -> Result<(), UploadError> {
        self.uploads.lock().unwrap().push(audio.clone());
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(UploadError::Status {
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(())
    }
}

pub fn sample_task() -> TaskRecord {
    TaskRecord {
        title: Some("Fix HVAC".to_string()),
        assignee: Some("Mike".to_string()),
        priority: Some("high".to_string()),
        ..Default::default()
    }
}

#[async_trait]
impl TaskApi for FakeApi {
    async fn process_voice(&self, audio: &AudioBlob) -> Result<ProcessVoiceResponse, UploadError> {
        self.process_calls.fetch_add(1, Ordering::SeqCst);
        self.respond(audio).await?;
        Ok(ProcessVoiceResponse {
            transcription: "fix the hvac in room 4".to_string(),
            task: Some(sample_task()),
        })
    }

    async fn save_audio(&self, audio: &AudioBlob) -> Result<SaveAudioResponse, UploadError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        self.respond(audio).await?;
        Ok(self.save_response.lock().unwrap().clone())
    }

    async fn categories(&self) -> Result<Vec<Category>, UploadError> {
        Ok(Vec::new())
    }

    async fn health(&self) -> Result<HealthStatus, UploadError> {
        Ok(HealthStatus {
            status: "healthy".to_string(),
            service: Some("fake".to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// Playback
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct SinkLog {
    pub plays: AtomicUsize,
    pub stops: AtomicUsize,
    pub finished: AtomicBool,
}

pub struct FakeSink(pub Arc<SinkLog>);

impl PlaybackSink for FakeSink {
    fn play(&mut self, _blob: &AudioBlob) -> Result<(), PlaybackError> {
        self.0.plays.fetch_add(1, Ordering::SeqCst);
        self.0.finished.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&mut self) {}

    fn resume(&mut self) {}

    fn stop(&mut self) {
        self.0.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn is_finished(&self) -> bool {
        self.0.finished.load(Ordering::SeqCst)
    }
}
