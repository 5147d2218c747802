//! Client for the task backend
//!
//! - POST /process-voice - transcribe a recording and create a task
//! - POST /save-audio - store a recording and report the extracted task
//! - GET /categories - board categories with their tasks
//! - GET /health - health check

mod client;
mod messages;

pub use client::{HttpTaskApi, TaskApi, UploadError, AUDIO_FIELD, UPLOAD_FILENAME};
pub use messages::{Category, HealthStatus, ProcessVoiceResponse, SaveAudioResponse, TaskRecord};
