use thiserror::Error;

/// Microphone acquisition failures, each with the message shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum DeviceError {
    #[error("Microphone access denied. Please allow microphone access in your browser settings and try again.")]
    PermissionDenied,

    #[error("No microphone found. Please connect a microphone and try again.")]
    DeviceNotFound,

    #[error("Microphone is already in use by another application. Please close other apps using the microphone.")]
    DeviceBusy,

    #[error("Unable to access microphone. Please check your browser settings and try again.")]
    Unknown,
}

impl DeviceError {
    /// Classify a platform error name (`NotAllowedError`, `NotFoundError`, ...)
    pub fn from_platform_name(name: &str) -> Self {
        match name {
            "NotAllowedError" | "SecurityError" | "PermissionDeniedError" => Self::PermissionDenied,
            "NotFoundError" | "OverconstrainedError" | "DevicesNotFoundError" => {
                Self::DeviceNotFound
            }
            "NotReadableError" | "AbortError" | "TrackStartError" => Self::DeviceBusy,
            _ => Self::Unknown,
        }
    }

    /// User-facing message for inline display
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

impl From<cpal::DevicesError> for DeviceError {
    fn from(_: cpal::DevicesError) -> Self {
        Self::DeviceNotFound
    }
}

impl From<cpal::DefaultStreamConfigError> for DeviceError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        match err {
            cpal::DefaultStreamConfigError::DeviceNotAvailable => Self::DeviceNotFound,
            cpal::DefaultStreamConfigError::BackendSpecific { err } => {
                classify_backend_message(&err.description)
            }
            _ => Self::Unknown,
        }
    }
}

impl From<cpal::BuildStreamError> for DeviceError {
    fn from(err: cpal::BuildStreamError) -> Self {
        match err {
            cpal::BuildStreamError::DeviceNotAvailable => Self::DeviceNotFound,
            cpal::BuildStreamError::StreamIdOverflow => Self::DeviceBusy,
            cpal::BuildStreamError::BackendSpecific { err } => classify_backend_message(&err.description),
            _ => Self::Unknown,
        }
    }
}

impl From<cpal::PlayStreamError> for DeviceError {
    fn from(err: cpal::PlayStreamError) -> Self {
        match err {
            cpal::PlayStreamError::DeviceNotAvailable => Self::DeviceNotFound,
            cpal::PlayStreamError::BackendSpecific { err } => classify_backend_message(&err.description),
            #[allow(unreachable_patterns)]
            _ => Self::Unknown,
        }
    }
}

// Host backends only hand us free text; look for the usual OS wording.
fn classify_backend_message(description: &str) -> DeviceError {
    let lower = description.to_lowercase();
    if lower.contains("permission") || lower.contains("not permitted") || lower.contains("denied") {
        DeviceError::PermissionDenied
    } else if lower.contains("busy") || lower.contains("in use") {
        DeviceError::DeviceBusy
    } else if lower.contains("no such device") || lower.contains("not found") {
        DeviceError::DeviceNotFound
    } else {
        DeviceError::Unknown
    }
}
