use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;

/// How much media data the engine has available, mirroring the ready
/// states of typical media elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Nothing,
    Metadata,
    CurrentData,
    FutureData,
    EnoughData,
}

/// Notifications a media clock pushes to its subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum ClockEvent {
    /// Duration became known
    MetadataLoaded,
    /// Playback position moved, by playback or by a seek
    PositionChanged,
    Buffering(bool),
    Ended,
    Error(String),
}

/// The narrow capability the playback controller needs from a media element.
///
/// One adapter exists per host environment; the controller only ever talks
/// to this trait.
pub trait MediaClock: Send + Sync {
    fn position(&self) -> Duration;

    /// `None` until metadata has loaded
    fn duration(&self) -> Option<Duration>;

    fn readiness(&self) -> Readiness;

    fn is_buffering(&self) -> bool;

    /// True while the position sits at the end of the media
    fn has_ended(&self) -> bool;

    fn seek(&self, position: Duration);

    /// Swap the media URL (quality change), keeping the timeline
    fn load(&self, url: &str);

    fn subscribe(&self) -> broadcast::Receiver<ClockEvent>;
}
