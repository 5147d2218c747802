pub mod api;
pub mod audio;
pub mod config;
pub mod dialog;
pub mod session;

pub use api::{HttpTaskApi, TaskApi, TaskRecord, UploadError};
pub use audio::{
    encode_wav, prepare_deliverable, AudioBlob, CaptureBackend, ContainerDecoder, CpalBackend,
    DecodedAudio, DeviceError, MediaStream, PlaybackSink, RodioSink, SymphoniaDecoder,
};
pub use config::Config;
pub use dialog::{DialogView, SubmitOutcome, VoiceDialog};
pub use session::{CaptureSession, RecorderState, SessionConfig, SessionStats};
