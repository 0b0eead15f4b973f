use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// The video source backend could not be reached at all
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Content not found: {0}")]
    ContentNotFound(String),

    /// The media element rejected or failed the stream
    #[error("Playback error: {0}")]
    Playback(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Skip timing error: {0}")]
    SkipTiming(String),

    #[error("Preferences error: {0}")]
    Preferences(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlRead(#[from] toml::de::Error),

    #[error("Failed to write TOML: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl AppError {
    /// Terminal errors end the session; the viewer has to reload or leave
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppError::ContentNotFound(_) | AppError::Playback(_))
    }

    /// Text shown to the viewer, phrased so the cause is actionable
    pub fn user_message(&self) -> String {
        match self {
            AppError::NetworkUnavailable(detail) => format!(
                "Cannot connect to the video backend ({detail}). Make sure the backend server is running."
            ),
            AppError::ContentNotFound(detail) => {
                format!("Could not find a video source for this content. {detail}")
            }
            AppError::Playback(detail) => format!(
                "Error playing video. The source may be unavailable or blocked. ({detail})"
            ),
            AppError::Preferences(detail) => format!(
                "Your preferences could not be saved and will reset on restart. ({detail})"
            ),
            other => format!("Failed to load video. Please try again. ({other})"),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
