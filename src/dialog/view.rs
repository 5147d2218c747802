use serde::Serialize;

use crate::audio::PlaybackState;
use crate::session::RecorderState;

/// Render snapshot of the recording dialog
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DialogView {
    pub open: bool,
    pub recorder_state: RecorderState,
    pub has_recording: bool,
    /// Mime type of the current recording (`audio/wav` unless conversion failed)
    pub recording_mime_type: Option<String>,
    pub recording_bytes: usize,
    pub playback_state: PlaybackState,
    pub transcription: Option<String>,
    /// Inline microphone error, hidden while recording
    pub permission_error: Option<String>,
    /// Result or failure message of the last submission
    pub notice: Option<String>,
    pub is_converting: bool,
    pub is_processing: bool,
    pub is_submitting: bool,
}

impl DialogView {
    pub fn is_recording(&self) -> bool {
        matches!(
            self.recorder_state,
            RecorderState::Recording | RecorderState::Paused
        )
    }

    /// The record button is usable
    pub fn can_record(&self) -> bool {
        self.open && !self.has_recording && !self.is_converting
    }

    pub fn can_process(&self) -> bool {
        self.has_recording && !self.is_processing
    }

    pub fn can_save(&self) -> bool {
        self.has_recording && !self.is_submitting
    }

    pub fn can_play(&self) -> bool {
        self.has_recording && self.playback_state != PlaybackState::Playing
    }

    /// Instruction line shown above the controls
    pub fn prompt(&self) -> &'static str {
        if self.has_recording {
            "Recording complete! Listen or process your voice"
        } else if self.recorder_state == RecorderState::Paused {
            "Recording paused. Click to resume"
        } else if self.is_recording() {
            "Recording... Click to stop"
        } else if self.is_converting {
            "Converting recording..."
        } else {
            "Click the microphone to start recording your task"
        }
    }
}
