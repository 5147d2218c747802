//! Recording dialog controller
//!
//! Wires microphone capture, conversion, review playback and submission into
//! the dialog flow: record -> review -> create task / save audio.

mod controller;
mod view;

pub use controller::{SubmitOutcome, VoiceDialog};
pub use view::DialogView;
