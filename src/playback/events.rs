use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tracing::trace;

use crate::models::ContentRef;

/// Notifications for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "value", rename_all = "snake_case")]
pub enum PlaybackEvent {
    Loading,
    /// Human-readable cause; the session is over
    Error(String),
    Ready,
    Buffering(bool),
    IntroSkippable(bool),
    OutroSkippable(bool),
    Ended,
    /// `Some(n)` while counting down, `None` for the idle "play next" prompt
    Countdown(Option<u32>),
    PromptDismissed,
    /// The host should open a session for this content
    Navigate(ContentRef),
    Quality(String),
    /// Non-fatal notice, e.g. a preference that could not be saved
    Toast(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordedEvent {
    pub at: DateTime<Utc>,
    pub event: PlaybackEvent,
}

/// Fan-out of playback notifications with a short history for debugging
#[derive(Debug, Clone)]
pub struct PlaybackEventBus {
    sender: broadcast::Sender<PlaybackEvent>,
    history: Arc<Mutex<VecDeque<RecordedEvent>>>,
    max_history_size: usize,
}

impl PlaybackEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            history: Arc::new(Mutex::new(VecDeque::new())),
            max_history_size: 100,
        }
    }

    pub fn publish(&self, event: PlaybackEvent) {
        trace!("Publishing {:?}", event);
        {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            if history.len() == self.max_history_size {
                history.pop_front();
            }
            history.push_back(RecordedEvent {
                at: Utc::now(),
                event: event.clone(),
            });
        }
        // Nobody listening is not an error
        let _ = self.sender.send(event);
    }

    pub fn publish_all(&self, events: impl IntoIterator<Item = PlaybackEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Most recent events, oldest first
    pub fn history(&self) -> Vec<RecordedEvent> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

impl Default for PlaybackEventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
