#![allow(dead_code)]

pub mod mocks;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;

use tidewatch::catalog::SeriesCatalog;
use tidewatch::config::Config;
use tidewatch::models::{ContentRef, Preferences, SkipWindow, SkipWindows};
use tidewatch::playback::{PlaybackController, PlaybackEvent, PlaybackHandle, PlaybackSnapshot};
use tidewatch::player::SimulatedClock;
use tidewatch::services::{MemoryPreferenceStore, PreferenceStore, SkipTimingResolver};

use mocks::MockSkipProvider;

pub const EPISODE_LENGTH: Duration = Duration::from_secs(1420);

pub fn secs(secs: u64) -> Duration {
    Duration::from_secs(secs)
}

/// Windows most test episodes report: intro 60..150, outro 1300..1390
pub fn episode_windows() -> SkipWindows {
    SkipWindows::new(
        SkipWindow::new(secs(60), secs(150)),
        SkipWindow::new(secs(1300), secs(1390)),
    )
}

pub fn prefs(auto_skip_segments: bool, auto_advance_next: bool) -> Preferences {
    Preferences {
        auto_skip_segments,
        auto_advance_next,
    }
}

pub struct TestPlayer {
    pub handle: PlaybackHandle,
    pub provider: Arc<MockSkipProvider>,
    pub events: broadcast::Receiver<PlaybackEvent>,
}

impl TestPlayer {
    pub fn new(preferences: Preferences) -> Self {
        Self::with_parts(
            Arc::new(MockSkipProvider::found(episode_windows())),
            Arc::new(MemoryPreferenceStore::new(preferences)),
        )
    }

    pub fn with_parts(
        provider: Arc<MockSkipProvider>,
        store: Arc<dyn PreferenceStore>,
    ) -> Self {
        let mut config = Config::default();
        config.catalog.movie_ids = vec![1, 2, 3];
        config.catalog.special_ids = vec![1, 2];
        let fallback = config
            .playback
            .fallback_intro()
            .expect("default fallback window is valid");
        let resolver = Arc::new(SkipTimingResolver::new(provider.clone(), fallback));
        let catalog = Arc::new(SeriesCatalog::from_config(&config.catalog));

        let (handle, controller) = PlaybackController::new(&config, store, resolver, catalog);
        tokio::spawn(controller.run());
        let events = handle.subscribe();

        Self {
            handle,
            provider,
            events,
        }
    }

    /// Open `content` on a fresh, fully buffered clock and wait for its skip
    /// windows to resolve
    pub async fn open(&mut self, content: ContentRef) -> Arc<SimulatedClock> {
        let clock = Arc::new(SimulatedClock::with_duration(EPISODE_LENGTH));
        self.handle
            .open(content, clock.clone(), None)
            .await
            .expect("controller running");
        self.wait_for(|s| s.windows.is_some()).await;
        clock
    }

    pub async fn snapshot(&self) -> PlaybackSnapshot {
        self.handle
            .snapshot()
            .await
            .expect("controller running")
            .expect("a session is open")
    }

    /// Poll the snapshot until `condition` holds
    pub async fn wait_for<F>(&self, mut condition: F) -> PlaybackSnapshot
    where
        F: FnMut(&PlaybackSnapshot) -> bool,
    {
        let result = timeout(Duration::from_secs(10), async {
            loop {
                let snapshot = self.snapshot().await;
                if condition(&snapshot) {
                    return snapshot;
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await;
        result.expect("condition not reached in time")
    }

    /// Notifications up to and including the first match of `predicate`
    pub async fn recv_until<F>(&mut self, mut predicate: F) -> Vec<PlaybackEvent>
    where
        F: FnMut(&PlaybackEvent) -> bool,
    {
        let mut seen = Vec::new();
        let events = &mut self.events;
        let result = timeout(Duration::from_secs(120), async {
            loop {
                let event = events.recv().await.expect("event bus open");
                let done = predicate(&event);
                seen.push(event);
                if done {
                    return;
                }
            }
        })
        .await;
        assert!(result.is_ok(), "expected event never arrived, saw {seen:?}");
        seen
    }

    /// Everything published so far that has not been received yet
    pub fn drain(&mut self) -> Vec<PlaybackEvent> {
        std::iter::from_fn(|| self.events.try_recv().ok()).collect()
    }
}
