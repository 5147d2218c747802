// Microphone backend on the default cpal input device
//
// cpal::Stream is not Send, so each acquired stream lives on its own thread
// and is driven by commands. Samples are buffered as i16 and handed out as a
// single complete WAV container when the recorder stops.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use super::backend::{base_mime_type, CaptureBackend, CaptureBackendConfig, ChunkReceiver, MediaStream};
use super::device::DeviceError;
use super::wav::{quantize, WAV_MIME_TYPE};

/// Capture backend for the system default microphone
pub struct CpalBackend {
    config: CaptureBackendConfig,
}

impl CpalBackend {
    pub fn new(config: CaptureBackendConfig) -> Self {
        Self { config }
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new(CaptureBackendConfig::default())
    }
}

#[async_trait::async_trait]
impl CaptureBackend for CpalBackend {
    async fn acquire(&self) -> Result<Box<dyn MediaStream>, DeviceError> {
        let stream = CpalStream::open(&self.config).await?;
        Ok(Box::new(stream))
    }

    fn is_type_supported(&self, mime_type: &str) -> bool {
        base_mime_type(mime_type) == WAV_MIME_TYPE
    }

    fn name(&self) -> &str {
        "cpal default input"
    }
}

enum StreamCommand {
    Release,
}

struct InputFormat {
    sample_rate: u32,
    channels: u16,
}

/// Live input stream owned by a capture thread
pub struct CpalStream {
    command_tx: std_mpsc::Sender<StreamCommand>,
    thread_handle: Option<JoinHandle<()>>,
    capturing: Arc<AtomicBool>,
    buffer: Arc<Mutex<Vec<i16>>>,
    chunk_tx: Option<mpsc::UnboundedSender<Vec<u8>>>,
    sample_rate: u32,
    channels: u16,
    released: bool,
}

impl CpalStream {
    async fn open(config: &CaptureBackendConfig) -> Result<Self, DeviceError> {
        let (device, sample_format, stream_config) = {
            let host = cpal::default_host();
            let device = host.default_input_device().ok_or(DeviceError::DeviceNotFound)?;
            let supported = device.default_input_config()?;
            let sample_format = supported.sample_format();
            let stream_config: cpal::StreamConfig = supported.into();
            (device, sample_format, stream_config)
        };
        let format = InputFormat {
            sample_rate: stream_config.sample_rate.0,
            channels: stream_config.channels,
        };
        let max_samples = format.sample_rate as usize
            * format.channels as usize
            * config.max_duration_secs as usize;

        info!(
            "Microphone config: {} Hz, {} channels, {:?}",
            format.sample_rate, format.channels, sample_format
        );

        let capturing = Arc::new(AtomicBool::new(false));
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let (command_tx, command_rx) = std_mpsc::channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        let thread_capturing = Arc::clone(&capturing);
        let thread_buffer = Arc::clone(&buffer);
        let thread_handle = thread::spawn(move || {
            run_stream_thread(
                device,
                stream_config,
                sample_format,
                thread_capturing,
                thread_buffer,
                max_samples,
                command_rx,
                ready_tx,
            )
        });

        match ready_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = thread_handle.join();
                return Err(e);
            }
            Err(_) => {
                error!("Capture thread exited before reporting readiness");
                let _ = thread_handle.join();
                return Err(DeviceError::Unknown);
            }
        }

        Ok(Self {
            command_tx,
            thread_handle: Some(thread_handle),
            capturing,
            buffer,
            chunk_tx: None,
            sample_rate: format.sample_rate,
            channels: format.channels,
            released: false,
        })
    }

    fn take_wav_chunk(&self) -> Option<Vec<u8>> {
        let samples = match self.buffer.lock() {
            Ok(mut buf) => std::mem::take(&mut *buf),
            Err(_) => {
                error!("Capture buffer poisoned, dropping recording");
                return None;
            }
        };

        let spec = hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        let written = (|| -> Result<(), hound::Error> {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
            for &sample in &samples {
                writer.write_sample(sample)?;
            }
            writer.finalize()
        })();

        match written {
            Ok(()) => Some(cursor.into_inner()),
            Err(e) => {
                error!("Failed to write WAV container: {}", e);
                None
            }
        }
    }
}

impl MediaStream for CpalStream {
    fn start(&mut self, mime_type: &str) -> Result<ChunkReceiver, DeviceError> {
        if self.released {
            return Err(DeviceError::Unknown);
        }
        if base_mime_type(mime_type) != WAV_MIME_TYPE {
            warn!("cpal recorder cannot produce {}", mime_type);
            return Err(DeviceError::Unknown);
        }

        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.chunk_tx = Some(tx);
        self.capturing.store(true, Ordering::SeqCst);

        Ok(rx)
    }

    fn pause(&mut self) {
        self.capturing.store(false, Ordering::SeqCst);
    }

    fn resume(&mut self) {
        if self.chunk_tx.is_some() {
            self.capturing.store(true, Ordering::SeqCst);
        }
    }

    fn stop(&mut self) {
        self.capturing.store(false, Ordering::SeqCst);

        // Dropping the sender after the last chunk closes the channel
        if let Some(tx) = self.chunk_tx.take() {
            if let Some(chunk) = self.take_wav_chunk() {
                let _ = tx.send(chunk);
            }
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.capturing.store(false, Ordering::SeqCst);
        self.chunk_tx = None;
        let _ = self.command_tx.send(StreamCommand::Release);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                error!("Capture thread panicked");
            }
        }
        self.released = true;
        info!("Microphone released");
    }

    fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.release();
    }
}

#[allow(clippy::too_many_arguments)]
fn run_stream_thread(
    device: cpal::Device,
    config: cpal::StreamConfig,
    sample_format: SampleFormat,
    capturing: Arc<AtomicBool>,
    buffer: Arc<Mutex<Vec<i16>>>,
    max_samples: usize,
    command_rx: std_mpsc::Receiver<StreamCommand>,
    ready_tx: oneshot::Sender<Result<(), DeviceError>>,
) {
    let built = match sample_format {
        SampleFormat::F32 => build_input::<f32>(&device, &config, capturing, buffer, max_samples),
        SampleFormat::I16 => build_input::<i16>(&device, &config, capturing, buffer, max_samples),
        SampleFormat::U16 => build_input::<u16>(&device, &config, capturing, buffer, max_samples),
        other => {
            warn!("Unsupported input sample format: {:?}", other);
            Err(DeviceError::Unknown)
        }
    };

    let stream = match built.and_then(|stream| stream.play().map(|_| stream).map_err(DeviceError::from)) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    if ready_tx.send(Ok(())).is_err() {
        return;
    }

    // Hold the stream until released or the owner goes away
    let _ = command_rx.recv();
    drop(stream);
}

fn build_input<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    capturing: Arc<AtomicBool>,
    buffer: Arc<Mutex<Vec<i16>>>,
    max_samples: usize,
) -> Result<cpal::Stream, DeviceError>
where
    T: Sample + SizedSample + Send + 'static,
    f32: FromSample<T>,
{
    let err_fn = |err| error!("Audio stream error: {}", err);

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            if !capturing.load(Ordering::SeqCst) {
                return;
            }
            if let Ok(mut buf) = buffer.lock() {
                buf.extend(data.iter().map(|&s| sample_to_i16(s)));
                if buf.len() > max_samples {
                    let excess = buf.len() - max_samples;
                    buf.drain(..excess);
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

/// Same quantisation as the WAV encoder, from any cpal sample type
fn sample_to_i16<T>(sample: T) -> i16
where
    T: Sample,
    f32: FromSample<T>,
{
    quantize(sample.to_sample::<f32>())
}
