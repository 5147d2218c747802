use serde::{Deserialize, Serialize};

use crate::audio::PREFERRED_MIME_TYPES;

/// Configuration for a capture session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Recorder containers to try, best first
    pub mime_preferences: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mime_preferences: PREFERRED_MIME_TYPES.iter().map(|m| m.to_string()).collect(),
        }
    }
}
