use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::audio::{CaptureBackendConfig, PREFERRED_MIME_TYPES};
use crate::session::SessionConfig;

/// Environment override prefix, e.g. `VOICE_TASK__BACKEND__BASE_URL`
const ENV_PREFIX: &str = "VOICE_TASK";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub backend: BackendConfig,
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// Recorder containers to try, best first
    pub mime_preferences: Vec<String>,
    /// Hard cap on a single recording
    pub max_duration_secs: u32,
}

impl Config {
    /// Load `path` (any format the `config` crate understands, extension optional)
    /// over the built-in defaults, then apply `VOICE_TASK__*` overrides.
    ///
    /// A missing file is not an error.
    pub fn load(path: &str) -> Result<Self> {
        let mime_preferences: Vec<String> =
            PREFERRED_MIME_TYPES.iter().map(|m| m.to_string()).collect();

        let settings = config::Config::builder()
            .set_default("service.name", "voice-task")?
            .set_default("backend.base_url", "http://localhost:8000")?
            .set_default("backend.timeout_secs", 60)?
            .set_default("audio.mime_preferences", mime_preferences)?
            .set_default("audio.max_duration_secs", 300)?
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("Failed to build configuration from {}", path))?;

        settings
            .try_deserialize()
            .context("Invalid voice-task configuration")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.timeout_secs)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            mime_preferences: self.audio.mime_preferences.clone(),
        }
    }

    pub fn capture_config(&self) -> CaptureBackendConfig {
        CaptureBackendConfig {
            max_duration_secs: self.audio.max_duration_secs,
        }
    }
}
