pub mod preferences;
pub mod skip_timing;
pub mod video_source;

pub use preferences::{FilePreferenceStore, MemoryPreferenceStore, PreferenceStore};
pub use skip_timing::{AniSkipProvider, SkipTimingProvider, SkipTimingResolver, TimedSegment};
pub use video_source::{BackendVideoSource, VideoSourceResolver};
