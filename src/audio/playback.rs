//! Local review playback of a finished recording

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use super::wav::AudioBlob;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no audio output device: {0}")]
    Output(String),

    #[error("cannot play {mime_type}: {reason}")]
    Format { mime_type: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// Audio output used by `Playback`
pub trait PlaybackSink: Send {
    /// Start playing `blob` from the beginning
    fn play(&mut self, blob: &AudioBlob) -> Result<(), PlaybackError>;

    fn pause(&mut self);

    fn resume(&mut self);

    /// Stop and rewind
    fn stop(&mut self);

    /// Whether the media has played to its end
    fn is_finished(&self) -> bool;
}

/// Review player for the current recording
pub struct Playback {
    sink: Box<dyn PlaybackSink>,
    state: PlaybackState,
}

impl Playback {
    pub fn new(sink: Box<dyn PlaybackSink>) -> Self {
        Self {
            sink,
            state: PlaybackState::Stopped,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.refresh_state()
    }

    /// Play from the start when stopped (or ended), otherwise resume
    pub fn play(&mut self, blob: &AudioBlob) -> Result<(), PlaybackError> {
        match self.refresh_state() {
            PlaybackState::Playing => Ok(()),
            PlaybackState::Paused => {
                self.sink.resume();
                self.state = PlaybackState::Playing;
                Ok(())
            }
            PlaybackState::Stopped => match self.sink.play(blob) {
                Ok(()) => {
                    self.state = PlaybackState::Playing;
                    Ok(())
                }
                Err(e) => {
                    warn!("Error playing audio: {}", e);
                    self.state = PlaybackState::Stopped;
                    Err(e)
                }
            },
        }
    }

    pub fn pause(&mut self) {
        if self.refresh_state() == PlaybackState::Playing {
            self.sink.pause();
            self.state = PlaybackState::Paused;
        }
    }

    /// Media reached its end
    pub fn ended(&mut self) {
        self.state = PlaybackState::Stopped;
    }

    /// Halt and rewind, whatever the current state
    pub fn stop(&mut self) {
        if self.state != PlaybackState::Stopped {
            self.sink.stop();
        }
        self.state = PlaybackState::Stopped;
    }

    fn refresh_state(&self) -> PlaybackState {
        if self.state == PlaybackState::Playing && self.sink.is_finished() {
            PlaybackState::Stopped
        } else {
            self.state
        }
    }
}

enum SinkCommand {
    Pause,
    Resume,
    Stop,
}

struct ActivePlayback {
    command_tx: mpsc::Sender<SinkCommand>,
    finished: Arc<AtomicBool>,
    thread_handle: JoinHandle<()>,
}

/// Plays through the default output device with rodio
#[derive(Default)]
pub struct RodioSink {
    active: Option<ActivePlayback>,
}

impl RodioSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn halt(&mut self) {
        if let Some(active) = self.active.take() {
            let _ = active.command_tx.send(SinkCommand::Stop);
            if active.thread_handle.join().is_err() {
                error!("Playback thread panicked");
            }
        }
    }
}

impl PlaybackSink for RodioSink {
    fn play(&mut self, blob: &AudioBlob) -> Result<(), PlaybackError> {
        self.halt();

        // Decode up front so format errors surface to the caller
        rodio::Decoder::new(Cursor::new(blob.bytes().to_vec())).map_err(|e| PlaybackError::Format {
            mime_type: blob.mime_type().to_string(),
            reason: e.to_string(),
        })?;

        let bytes = blob.bytes().to_vec();
        let finished = Arc::new(AtomicBool::new(false));
        let (command_tx, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();

        let thread_finished = Arc::clone(&finished);
        let thread_handle = thread::spawn(move || {
            run_playback_thread(bytes, command_rx, ready_tx, thread_finished)
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = thread_handle.join();
                return Err(e);
            }
            Err(_) => {
                let _ = thread_handle.join();
                return Err(PlaybackError::Output("playback thread exited".to_string()));
            }
        }

        info!("Playing {} byte {} recording", blob.len(), blob.mime_type());

        self.active = Some(ActivePlayback {
            command_tx,
            finished,
            thread_handle,
        });
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(active) = &self.active {
            let _ = active.command_tx.send(SinkCommand::Pause);
        }
    }

    fn resume(&mut self) {
        if let Some(active) = &self.active {
            let _ = active.command_tx.send(SinkCommand::Resume);
        }
    }

    fn stop(&mut self) {
        self.halt();
    }

    fn is_finished(&self) -> bool {
        self.active
            .as_ref()
            .map_or(true, |active| active.finished.load(Ordering::SeqCst))
    }
}

impl Drop for RodioSink {
    fn drop(&mut self) {
        self.halt();
    }
}

fn run_playback_thread(
    bytes: Vec<u8>,
    command_rx: mpsc::Receiver<SinkCommand>,
    ready_tx: mpsc::Sender<Result<(), PlaybackError>>,
    finished: Arc<AtomicBool>,
) {
    let stream = match rodio::OutputStreamBuilder::open_default_stream() {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(PlaybackError::Output(e.to_string())));
            return;
        }
    };

    let source = match rodio::Decoder::new(Cursor::new(bytes)) {
        Ok(source) => source,
        Err(e) => {
            let _ = ready_tx.send(Err(PlaybackError::Output(e.to_string())));
            return;
        }
    };

    let sink = rodio::Sink::connect_new(stream.mixer());
    sink.append(source);
    let _ = ready_tx.send(Ok(()));

    loop {
        match command_rx.recv_timeout(Duration::from_millis(50)) {
            Ok(SinkCommand::Pause) => sink.pause(),
            Ok(SinkCommand::Resume) => sink.play(),
            Ok(SinkCommand::Stop) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                sink.stop();
                break;
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if sink.empty() {
                    break;
                }
            }
        }
    }

    finished.store(true, Ordering::SeqCst);
}
