#![cfg(test)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;

use crate::models::SkipWindows;
use crate::playback::PlaybackEvent;
use crate::services::{SkipTimingProvider, TimedSegment};
use crate::utils::AppResult;

enum StubReply {
    Found(Vec<TimedSegment>),
    Missing,
}

/// Skip-timing provider with a canned reply that counts its calls
pub struct StubSkipProvider {
    reply: StubReply,
    calls: AtomicUsize,
}

impl StubSkipProvider {
    fn with_reply(reply: StubReply) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
        }
    }

    /// Reports `windows` as `op`/`ed` segments
    pub fn found(windows: SkipWindows) -> Self {
        let segments = [("op", windows.intro), ("ed", windows.outro)]
            .into_iter()
            .filter_map(|(category, window)| {
                window.map(|w| {
                    TimedSegment::new(category, w.start.as_secs_f64(), w.end.as_secs_f64())
                })
            })
            .collect();
        Self::with_reply(StubReply::Found(segments))
    }

    pub fn missing() -> Self {
        Self::with_reply(StubReply::Missing)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SkipTimingProvider for StubSkipProvider {
    async fn fetch_segments(&self, episode: u32) -> AppResult<Option<Vec<TimedSegment>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            StubReply::Found(segments) => Ok(Some(segments.clone())),
            StubReply::Missing => {
                tracing::debug!("Stub provider has no timing for episode {}", episode);
                Ok(None)
            }
        }
    }
}

/// Let every spawned task run until the runtime is idle. Only meaningful
/// with a paused clock, where the runtime advances time only when idle.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Collect notifications up to and including the first one matching
/// `predicate`. Panics if it does not arrive within two minutes.
pub async fn recv_until<F>(
    events: &mut broadcast::Receiver<PlaybackEvent>,
    mut predicate: F,
) -> Vec<PlaybackEvent>
where
    F: FnMut(&PlaybackEvent) -> bool,
{
    let mut seen = Vec::new();
    let result = timeout(Duration::from_secs(120), async {
        loop {
            let event = events.recv().await.expect("event bus closed");
            let done = predicate(&event);
            seen.push(event);
            if done {
                break;
            }
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for event, saw {seen:?}");
    seen
}
