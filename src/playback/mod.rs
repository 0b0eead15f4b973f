//! The playback continuity controller: skip windows, end-of-content
//! countdown and session lifecycle on top of a [`MediaClock`](crate::player::MediaClock).

pub mod auto_advance;
pub mod controller;
pub mod events;
pub mod session;
pub mod skip_segments;
pub mod state;
pub mod timer;

pub use controller::{ControllerCommand, PlaybackController, PlaybackHandle};
pub use events::{PlaybackEvent, PlaybackEventBus, RecordedEvent};
pub use session::{PlaybackSession, PlaybackSnapshot, SessionSettings};
pub use state::PlaybackState;
pub use timer::SessionId;
