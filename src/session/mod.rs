//! Capture session management
//!
//! `CaptureSession` is the recorder state machine:
//! - container selection and device acquisition on `start`
//! - pause/resume while recording
//! - chunk accumulation in arrival order
//! - flush and mandatory device release on `stop`/`abort`/drop

mod config;
mod session;
mod stats;

pub use config::SessionConfig;
pub use session::{CaptureSession, CapturedRecording, RecorderState};
pub use stats::SessionStats;
