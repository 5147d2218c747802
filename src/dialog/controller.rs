use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{error, info, warn};

use super::view::DialogView;
use crate::api::{SaveAudioResponse, TaskApi, TaskRecord};
use crate::audio::{
    prepare_deliverable_async, AudioBlob, CaptureBackend, ContainerDecoder, DeviceError, Playback,
    PlaybackError, PlaybackSink,
};
use crate::session::{CaptureSession, RecorderState, SessionConfig, SessionStats};

const PROCESS_FALLBACK_TRANSCRIPTION: &str = "Voice processed successfully";
const PROCESS_ERROR_MESSAGE: &str = "Error processing voice. Please try again.";
const SAVE_ERROR_MESSAGE: &str = "Error processing audio. Please try again.";

/// Result of a "create task" or "save audio" request
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// `/process-voice` answered
    TaskProcessed {
        transcription: String,
        task: Option<TaskRecord>,
    },
    /// `/save-audio` answered (check `success`)
    AudioSaved(SaveAudioResponse),
    /// Nothing recorded yet
    NoRecording,
    /// The same action is already running for this dialog
    AlreadyInFlight,
    /// The dialog was reset while the request was outstanding
    Discarded,
    /// Network or backend failure; the recording is kept for a retry
    Failed(String),
}

#[derive(Default)]
struct DialogState {
    open: bool,
    recorder_state: RecorderState,
    recording: Option<AudioBlob>,
    transcription: Option<String>,
    permission_error: Option<DeviceError>,
    notice: Option<String>,
    converting: bool,
}

/// Clears an in-flight flag when the request finishes, however it finishes
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Controller for the "Add Task with Voice" dialog
///
/// Owns the capture session (and through it the microphone), the current
/// recording, review playback and the backend client. Every method takes
/// `&self`, so UI events can interleave at await points; actions that must
/// not overlap are guarded explicitly.
pub struct VoiceDialog {
    backend: Arc<dyn CaptureBackend>,
    decoder: Arc<dyn ContainerDecoder>,
    api: Arc<dyn TaskApi>,
    session_config: SessionConfig,

    session: tokio::sync::Mutex<Option<CaptureSession>>,
    state: Mutex<DialogState>,
    playback: Mutex<Playback>,

    /// Bumped whenever the dialog is reset; late results from older generations are dropped
    generation: AtomicU64,
    processing: AtomicBool,
    submitting: AtomicBool,
}

impl VoiceDialog {
    pub fn new(
        backend: Arc<dyn CaptureBackend>,
        decoder: Arc<dyn ContainerDecoder>,
        api: Arc<dyn TaskApi>,
        playback_sink: Box<dyn PlaybackSink>,
        session_config: SessionConfig,
    ) -> Self {
        Self {
            backend,
            decoder,
            api,
            session_config,
            session: tokio::sync::Mutex::new(None),
            state: Mutex::new(DialogState::default()),
            playback: Mutex::new(Playback::new(playback_sink)),
            generation: AtomicU64::new(0),
            processing: AtomicBool::new(false),
            submitting: AtomicBool::new(false),
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Dialog became visible
    pub async fn open(&self) {
        self.discard_active_session().await;
        let mut state = self.state();
        self.reset_generation();
        state.open = true;
        state.permission_error = None;
        state.converting = false;
        state.recorder_state = RecorderState::Idle;
        info!("Voice dialog opened");
    }

    /// Dialog was dismissed: stop recording, release the microphone, forget everything
    pub async fn close(&self) {
        self.discard_active_session().await;
        self.playback().stop();

        let mut state = self.state();
        self.reset_generation();
        *state = DialogState::default();
        info!("Voice dialog closed");
    }

    pub fn is_open(&self) -> bool {
        self.state().open
    }

    // ------------------------------------------------------------------
    // Recording
    // ------------------------------------------------------------------

    /// Start a new recording, replacing any previous one
    ///
    /// Device errors are kept as the inline message until the next successful start.
    pub async fn start_recording(&self) -> Result<(), DeviceError> {
        let mut guard = self.session.lock().await;
        if guard.as_ref().is_some_and(CaptureSession::is_active) {
            warn!("Recording already in progress");
            return Ok(());
        }
        if !self.is_open() {
            warn!("Ignoring start request while the dialog is closed");
            return Ok(());
        }

        self.reset_generation();
        self.playback().stop();
        {
            let mut state = self.state();
            state.permission_error = None;
            state.recording = None;
            state.transcription = None;
            state.notice = None;
            state.converting = false;
        }

        let mut session = CaptureSession::new(self.session_config.clone());
        match session.start(self.backend.as_ref()).await {
            Ok(()) => {
                self.state().recorder_state = RecorderState::Recording;
                *guard = Some(session);
                Ok(())
            }
            Err(e) => {
                error!("Error accessing microphone: {:?}", e);
                let mut state = self.state();
                state.recorder_state = RecorderState::Idle;
                state.permission_error = Some(e);
                Err(e)
            }
        }
    }

    /// Stop recording, convert the capture to WAV and keep it for review
    ///
    /// Returns the new recording, or `None` when nothing was recording or the
    /// dialog was reset while converting.
    pub async fn stop_recording(&self) -> Option<AudioBlob> {
        let generation = self.generation.load(Ordering::SeqCst);

        let captured = {
            let mut guard = self.session.lock().await;
            let captured = guard.as_mut()?.stop().await?;
            *guard = None;

            // Marked while the session lock is still held, so a concurrent
            // close cannot reset the dialog in between
            let mut state = self.state();
            if self.generation.load(Ordering::SeqCst) != generation {
                info!("Dialog was reset while stopping, dropping recording");
                state.recorder_state = RecorderState::Idle;
                return None;
            }
            state.recorder_state = RecorderState::Stopped;
            state.permission_error = None;
            state.converting = true;
            captured
        };

        let blob =
            prepare_deliverable_async(Arc::clone(&self.decoder), captured.bytes, captured.mime_type)
                .await;

        let mut state = self.state();
        if self.generation.load(Ordering::SeqCst) != generation {
            info!("Dialog was reset during conversion, dropping recording");
            return None;
        }
        state.converting = false;
        state.recording = Some(blob.clone());
        Some(blob)
    }

    /// Record button: stop when recording, otherwise start
    pub async fn toggle_record(&self) -> Result<(), DeviceError> {
        if self.is_recording().await {
            self.stop_recording().await;
            Ok(())
        } else {
            self.start_recording().await
        }
    }

    pub async fn pause_recording(&self) {
        self.with_session(CaptureSession::pause).await;
    }

    pub async fn resume_recording(&self) {
        self.with_session(CaptureSession::resume).await;
    }

    pub async fn toggle_pause(&self) {
        self.with_session(CaptureSession::toggle_pause).await;
    }

    pub async fn is_recording(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(CaptureSession::is_active)
    }

    /// Whether a microphone stream is currently held
    pub async fn holds_device(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(CaptureSession::holds_device)
    }

    pub async fn session_stats(&self) -> Option<SessionStats> {
        self.session.lock().await.as_ref().map(CaptureSession::stats)
    }

    // ------------------------------------------------------------------
    // Review
    // ------------------------------------------------------------------

    pub fn current_recording(&self) -> Option<AudioBlob> {
        self.state().recording.clone()
    }

    pub fn play(&self) -> Result<(), PlaybackError> {
        let Some(blob) = self.current_recording() else {
            return Ok(());
        };
        self.playback().play(&blob)
    }

    pub fn pause_playback(&self) {
        self.playback().pause();
    }

    /// Output reached the end of the recording
    pub fn playback_ended(&self) {
        self.playback().ended();
    }

    /// Throw away the recording and any result, back to the pre-recording state
    pub fn delete_recording(&self) {
        self.playback().stop();

        let mut state = self.state();
        self.reset_generation();
        state.recording = None;
        state.transcription = None;
        state.permission_error = None;
        state.notice = None;
        state.converting = false;
        state.recorder_state = RecorderState::Idle;
        info!("Recording deleted");
    }

    // ------------------------------------------------------------------
    // Submission
    // ------------------------------------------------------------------

    /// "Create Task": send the recording to `/process-voice`
    pub async fn process_voice(&self) -> SubmitOutcome {
        let Some(audio) = self.current_recording() else {
            return SubmitOutcome::NoRecording;
        };
        let Some(_in_flight) = InFlight::acquire(&self.processing) else {
            warn!("Voice processing already in progress");
            return SubmitOutcome::AlreadyInFlight;
        };
        let generation = self.generation.load(Ordering::SeqCst);

        let result = self.api.process_voice(&audio).await;

        let mut state = self.state();
        if self.generation.load(Ordering::SeqCst) != generation {
            info!("Discarding process-voice response for a reset dialog");
            return SubmitOutcome::Discarded;
        }

        match result {
            Ok(response) => {
                let transcription = if response.transcription.is_empty() {
                    PROCESS_FALLBACK_TRANSCRIPTION.to_string()
                } else {
                    response.transcription
                };
                state.transcription = Some(transcription.clone());
                state.notice = None;
                info!("Voice processed (task: {})", response.task.is_some());
                SubmitOutcome::TaskProcessed {
                    transcription,
                    task: response.task,
                }
            }
            Err(e) => {
                error!("Error processing voice: {}", e);
                state.notice = Some(PROCESS_ERROR_MESSAGE.to_string());
                SubmitOutcome::Failed(e.to_string())
            }
        }
    }

    /// "Save Audio": send the recording to `/save-audio`
    pub async fn save_audio(&self) -> SubmitOutcome {
        let Some(audio) = self.current_recording() else {
            return SubmitOutcome::NoRecording;
        };
        let Some(_in_flight) = InFlight::acquire(&self.submitting) else {
            warn!("Audio save already in progress");
            return SubmitOutcome::AlreadyInFlight;
        };
        let generation = self.generation.load(Ordering::SeqCst);

        let result = self.api.save_audio(&audio).await;

        let mut state = self.state();
        if self.generation.load(Ordering::SeqCst) != generation {
            info!("Discarding save-audio response for a reset dialog");
            return SubmitOutcome::Discarded;
        }

        match result {
            Ok(response) => {
                if response.success {
                    state.transcription = Some(response.transcription.clone());
                } else {
                    warn!(
                        "Backend could not process audio: {}",
                        response.error.as_deref().unwrap_or("Unknown error")
                    );
                }
                state.notice = Some(response.summary());
                SubmitOutcome::AudioSaved(response)
            }
            Err(e) => {
                error!("Error processing audio: {}", e);
                state.notice = Some(SAVE_ERROR_MESSAGE.to_string());
                SubmitOutcome::Failed(e.to_string())
            }
        }
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    pub fn view(&self) -> DialogView {
        let playback_state = self.playback().state();
        let state = self.state();
        let recording = state.recording.as_ref();
        let recording_active = matches!(
            state.recorder_state,
            RecorderState::Recording | RecorderState::Paused
        );

        DialogView {
            open: state.open,
            recorder_state: state.recorder_state,
            has_recording: recording.is_some(),
            recording_mime_type: recording.map(|r| r.mime_type().to_string()),
            recording_bytes: recording.map_or(0, AudioBlob::len),
            playback_state,
            transcription: state.transcription.clone(),
            permission_error: state
                .permission_error
                .filter(|_| !recording_active)
                .map(|e| e.user_message()),
            notice: state.notice.clone(),
            is_converting: state.converting,
            is_processing: self.processing.load(Ordering::SeqCst),
            is_submitting: self.submitting.load(Ordering::SeqCst),
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn state(&self) -> MutexGuard<'_, DialogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn playback(&self) -> MutexGuard<'_, Playback> {
        self.playback.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Callers that reset dialog state do so while holding the state lock, so
    /// a result checked against the generation under that lock is never
    /// installed into a reset dialog
    fn reset_generation(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    async fn with_session(&self, f: impl FnOnce(&mut CaptureSession)) {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_mut() {
            f(session);
            self.state().recorder_state = session.state();
        }
    }

    /// Implicit stop on open/close: the device is released and the output dropped
    async fn discard_active_session(&self) {
        let mut guard = self.session.lock().await;
        if let Some(mut session) = guard.take() {
            if session.is_active() {
                self.reset_generation();
                if let Some(captured) = session.stop().await {
                    info!(
                        "Discarded {} byte recording from session {}",
                        captured.bytes.len(),
                        session.id()
                    );
                }
            }
            session.abort();
        }
        self.state().recorder_state = RecorderState::Idle;
    }
}
