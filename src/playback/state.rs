use serde::Serialize;

/// Where a playback session is in its lifecycle.
///
/// ```text
/// Initializing -> Ready -> Playing <-> Buffering
///                          Playing <-> IntroSkippable / OutroSkippable
///                          any of the above -> Ended -> CountdownActive | PromptIdle
/// any -> Error (terminal)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum PlaybackState {
    Initializing,
    Ready,
    Playing,
    Buffering,
    IntroSkippable,
    OutroSkippable,
    /// Ended with no overlay; also the dormant state after cancel/dismiss
    Ended,
    /// Seconds remaining before the next item starts
    CountdownActive(u32),
    /// Next item offered without a countdown
    PromptIdle,
    Error(String),
}

impl PlaybackState {
    pub fn is_error(&self) -> bool {
        matches!(self, PlaybackState::Error(_))
    }

    /// Position-driven states reached once media is ready
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PlaybackState::Ready
                | PlaybackState::Playing
                | PlaybackState::Buffering
                | PlaybackState::IntroSkippable
                | PlaybackState::OutroSkippable
        )
    }
}
