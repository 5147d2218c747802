use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use voice_task_capture::audio::{encode_wav, AudioBlob, PlaybackState};
use voice_task_capture::{
    Config, CpalBackend, HttpTaskApi, RodioSink, SubmitOutcome, SymphoniaDecoder, TaskApi,
    VoiceDialog,
};

#[derive(Parser)]
#[command(name = "voice-task")]
#[command(about = "Record a voice note and turn it into a task")]
struct Args {
    /// Configuration file (extension optional)
    #[arg(short, long, default_value = "config/voice-task")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record from the default microphone
    Record {
        /// Stop after this many seconds (Ctrl+C stops early)
        #[arg(short, long)]
        seconds: Option<u64>,

        /// Write the recording here
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Send the recording to the backend
        #[arg(long, value_enum)]
        submit: Option<SubmitMode>,

        /// Play the recording back before submitting
        #[arg(long)]
        play: bool,
    },
    /// Convert an audio file to 16-bit PCM WAV
    Encode {
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },
    /// List board categories
    Categories,
    /// Check the backend
    Health,
}

#[derive(Clone, Copy, ValueEnum)]
enum SubmitMode {
    /// Create a task (`/process-voice`)
    Process,
    /// Save the audio and extract a task (`/save-audio`)
    Save,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::Record {
            seconds,
            output,
            submit,
            play,
        } => record(&cfg, seconds, output.as_deref(), submit, play).await,
        Command::Encode { input, output } => encode(&input, &output),
        Command::Categories => categories(&cfg).await,
        Command::Health => health(&cfg).await,
    }
}

fn task_api(cfg: &Config) -> Result<HttpTaskApi> {
    HttpTaskApi::new(&cfg.backend.base_url, cfg.request_timeout())
        .context("Failed to create backend client")
}

async fn record(
    cfg: &Config,
    seconds: Option<u64>,
    output: Option<&Path>,
    submit: Option<SubmitMode>,
    play: bool,
) -> Result<()> {
    let dialog = VoiceDialog::new(
        Arc::new(CpalBackend::new(cfg.capture_config())),
        Arc::new(SymphoniaDecoder::new()),
        Arc::new(task_api(cfg)?),
        Box::new(RodioSink::new()),
        cfg.session_config(),
    );

    dialog.open().await;
    if let Err(e) = dialog.start_recording().await {
        bail!("{}", e.user_message());
    }

    let limit = seconds.unwrap_or(u64::from(cfg.audio.max_duration_secs));
    info!("Recording for up to {} seconds, press Ctrl+C to stop", limit);

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(limit)) => {}
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl+C")?;
            info!("Stopping early");
        }
    }

    let Some(recording) = dialog.stop_recording().await else {
        bail!("No audio was recorded");
    };
    report(&recording);

    if let Some(path) = output {
        std::fs::write(path, recording.bytes())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Saved recording to {}", path.display());
    }

    if play {
        match dialog.play() {
            Ok(()) => {
                while dialog.view().playback_state == PlaybackState::Playing {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
            Err(e) => warn!("Playback failed: {}", e),
        }
    }

    if let Some(mode) = submit {
        let outcome = match mode {
            SubmitMode::Process => dialog.process_voice().await,
            SubmitMode::Save => dialog.save_audio().await,
        };
        print_outcome(&outcome);
    }

    dialog.close().await;
    Ok(())
}

fn report(recording: &AudioBlob) {
    info!(
        "Recording ready: {} bytes ({})",
        recording.len(),
        recording.mime_type()
    );
    if !recording.is_wav() {
        warn!("Conversion failed, keeping the original container");
    }
}

fn print_outcome(outcome: &SubmitOutcome) {
    match outcome {
        SubmitOutcome::TaskProcessed { transcription, task } => {
            println!("Transcription: {}", transcription);
            if let Some(task) = task {
                for line in task.detail_lines() {
                    println!("{}", line);
                }
            }
        }
        SubmitOutcome::AudioSaved(response) => println!("{}", response.summary()),
        SubmitOutcome::Failed(e) => println!("Submission failed: {}", e),
        other => println!("{:?}", other),
    }
}

fn encode(input: &Path, output: &Path) -> Result<()> {
    let audio = SymphoniaDecoder::new().decode_file(input)?;

    info!(
        "Decoded {}: {:.1}s, {} Hz, {} channels",
        input.display(),
        audio.duration_seconds(),
        audio.sample_rate,
        audio.channel_count()
    );

    let wav = encode_wav(&audio);
    std::fs::write(output, wav.bytes())
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!("Wrote {} bytes to {}", wav.len(), output.display());
    Ok(())
}

async fn categories(cfg: &Config) -> Result<()> {
    let categories = task_api(cfg)?.categories().await?;

    if categories.is_empty() {
        println!("No categories");
    }
    for category in categories {
        println!(
            "{:>4}  {:<30} {} tasks",
            category.id,
            category.title,
            category.tasks.len()
        );
    }
    Ok(())
}

async fn health(cfg: &Config) -> Result<()> {
    let api = task_api(cfg)?;
    let status = api.health().await?;

    println!(
        "{}: {} ({})",
        api.base_url(),
        status.status,
        status.service.as_deref().unwrap_or("unknown service")
    );
    Ok(())
}
