use std::time::Duration;

use reqwest::multipart;
use thiserror::Error;
use tracing::{error, info};

use super::messages::{Category, HealthStatus, ProcessVoiceResponse, SaveAudioResponse};
use crate::audio::AudioBlob;

/// Multipart field carrying the recording
pub const AUDIO_FIELD: &str = "audio";

/// Filename sent with every upload
pub const UPLOAD_FILENAME: &str = "recording.wav";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Task backend operations used by the recording dialog
#[async_trait::async_trait]
pub trait TaskApi: Send + Sync {
    /// "Create task": transcribe and extract a task
    async fn process_voice(&self, audio: &AudioBlob) -> Result<ProcessVoiceResponse, UploadError>;

    /// "Save audio": store the recording and report the extracted task
    async fn save_audio(&self, audio: &AudioBlob) -> Result<SaveAudioResponse, UploadError>;

    async fn categories(&self) -> Result<Vec<Category>, UploadError>;

    async fn health(&self) -> Result<HealthStatus, UploadError>;
}

/// HTTP client for the task backend
pub struct HttpTaskApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTaskApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Use a preconfigured HTTP client
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn audio_form(audio: &AudioBlob) -> Result<multipart::Form, UploadError> {
        let part = multipart::Part::bytes(audio.bytes().to_vec())
            .file_name(UPLOAD_FILENAME)
            .mime_str(audio.mime_type())?;
        Ok(multipart::Form::new().part(AUDIO_FIELD, part))
    }

    async fn upload<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        audio: &AudioBlob,
    ) -> Result<T, UploadError> {
        let url = self.url(path);
        info!(
            "Uploading {} bytes ({}) to {}",
            audio.len(),
            audio.mime_type(),
            url
        );

        let response = self
            .client
            .post(&url)
            .multipart(Self::audio_form(audio)?)
            .send()
            .await?;

        Self::read_json(response).await
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, UploadError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Backend error ({}): {}", status, body);
            return Err(UploadError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| UploadError::InvalidResponse(e.to_string()))
    }
}

#[async_trait::async_trait]
impl TaskApi for HttpTaskApi {
    async fn process_voice(&self, audio: &AudioBlob) -> Result<ProcessVoiceResponse, UploadError> {
        self.upload("process-voice", audio).await
    }

    async fn save_audio(&self, audio: &AudioBlob) -> Result<SaveAudioResponse, UploadError> {
        self.upload("save-audio", audio).await
    }

    async fn categories(&self) -> Result<Vec<Category>, UploadError> {
        let response = self.client.get(self.url("categories")).send().await?;
        Self::read_json(response).await
    }

    async fn health(&self) -> Result<HealthStatus, UploadError> {
        let response = self.client.get(self.url("health")).send().await?;
        Self::read_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let api = HttpTaskApi::with_client(reqwest::Client::new(), "http://localhost:8000/");
        assert_eq!(api.base_url(), "http://localhost:8000");
        assert_eq!(api.url("/save-audio"), "http://localhost:8000/save-audio");
        assert_eq!(api.url("categories"), "http://localhost:8000/categories");
    }
}
