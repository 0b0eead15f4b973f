mod content;
mod preferences;
mod skip;
mod video;

pub use content::{ContentKind, ContentRef, ParseContentRefError};
pub use preferences::{Preferences, PreferencesUpdate};
pub use skip::{SegmentKind, SkipWindow, SkipWindows};
pub use video::{QualityVariant, VideoSource, proxy_url};
