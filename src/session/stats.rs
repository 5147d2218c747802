use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::session::RecorderState;

/// Statistics about a capture session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Session identifier used in logs
    pub session_id: String,

    /// Current recorder state
    pub state: RecorderState,

    /// Container the recorder was started with, if any
    pub mime_type: Option<String>,

    /// When recording started
    pub started_at: Option<DateTime<Utc>>,

    /// When recording stopped
    pub stopped_at: Option<DateTime<Utc>>,

    /// Number of encoded chunks received so far
    pub chunks_count: usize,

    /// Total encoded bytes received so far
    pub bytes_received: usize,
}
