use serde::{Deserialize, Serialize};

/// Task extracted by the backend from a recording
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl TaskRecord {
    /// `Label: value` lines for every populated field
    pub fn detail_lines(&self) -> Vec<String> {
        [
            ("Title", &self.title),
            ("Description", &self.description),
            ("Assignee", &self.assignee),
            ("Deadline", &self.deadline),
            ("Priority", &self.priority),
            ("Category", &self.category),
        ]
        .into_iter()
        .filter_map(|(label, value)| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| format!("{}: {}", label, v))
        })
        .collect()
    }
}

/// Response of `POST /process-voice`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessVoiceResponse {
    #[serde(default)]
    pub transcription: String,
    #[serde(default)]
    pub task: Option<TaskRecord>,
}

/// Response of `POST /save-audio`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveAudioResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub transcription: String,
    #[serde(default)]
    pub task: Option<TaskRecord>,
    #[serde(default)]
    pub error: Option<String>,
}

impl SaveAudioResponse {
    /// Message shown to the user once the backend answered
    pub fn summary(&self) -> String {
        if !self.success {
            return format!(
                "Processing failed: {}",
                self.error.as_deref().unwrap_or("Unknown error")
            );
        }

        let mut message = String::from("Task processed successfully!\n\n");
        message.push_str(&format!("Transcription: {}\n\n", self.transcription));

        if let Some(task) = &self.task {
            message.push_str("Task Details:\n");
            for line in task.detail_lines() {
                message.push_str(&line);
                message.push('\n');
            }
        }

        message
    }
}

/// Board category from `GET /categories`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub tasks: Vec<TaskRecord>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

/// Response of `GET /health`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
}
