pub mod backend;
pub mod cpal_backend;
pub mod decode;
pub mod device;
pub mod pipeline;
pub mod playback;
pub mod wav;

pub use backend::{
    base_mime_type, select_mime_type, CaptureBackend, CaptureBackendConfig, ChunkReceiver,
    MediaStream, PREFERRED_MIME_TYPES,
};
pub use cpal_backend::CpalBackend;
pub use decode::{ContainerDecoder, DecodeError, DecodedAudio, SymphoniaDecoder};
pub use device::DeviceError;
pub use pipeline::{prepare_deliverable, prepare_deliverable_async};
pub use playback::{Playback, PlaybackError, PlaybackSink, PlaybackState, RodioSink};
pub use wav::{encode_wav, AudioBlob, WAV_HEADER_LEN, WAV_MIME_TYPE};
