use serde::{Deserialize, Serialize};

/// Viewer preferences that outlive any single playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// Seek past intro/outro windows without user action
    #[serde(default)]
    pub auto_skip_segments: bool,

    /// Count down into the next item once playback ends
    #[serde(default = "default_true")]
    pub auto_advance_next: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            auto_skip_segments: false,
            auto_advance_next: true,
        }
    }
}

impl Preferences {
    /// Apply a partial update and return the merged value
    pub fn merged(self, update: PreferencesUpdate) -> Self {
        Self {
            auto_skip_segments: update
                .auto_skip_segments
                .unwrap_or(self.auto_skip_segments),
            auto_advance_next: update.auto_advance_next.unwrap_or(self.auto_advance_next),
        }
    }
}

/// Partial preference change; `None` fields are left untouched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreferencesUpdate {
    pub auto_skip_segments: Option<bool>,
    pub auto_advance_next: Option<bool>,
}

impl PreferencesUpdate {
    pub fn auto_skip_segments(enabled: bool) -> Self {
        Self {
            auto_skip_segments: Some(enabled),
            ..Default::default()
        }
    }

    pub fn auto_advance_next(enabled: bool) -> Self {
        Self {
            auto_advance_next: Some(enabled),
            ..Default::default()
        }
    }
}

fn default_true() -> bool {
    true
}
