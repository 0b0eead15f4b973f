use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tidewatch::models::{Preferences, PreferencesUpdate, SkipWindows};
use tidewatch::services::{PreferenceStore, SkipTimingProvider, TimedSegment};
use tidewatch::utils::{AppError, AppResult};

#[derive(Clone)]
enum Reply {
    Found(Vec<TimedSegment>),
    /// Intro starts at the episode number in seconds and lasts 90s
    PerEpisode,
    Missing,
    Failing,
}

/// Skip-timing provider with a fixed answer; records which episodes were asked for
pub struct MockSkipProvider {
    reply: Reply,
    delay: Option<(u32, Duration)>,
    calls: AtomicUsize,
    episodes: Mutex<Vec<u32>>,
}

impl MockSkipProvider {
    fn with_reply(reply: Reply) -> Self {
        Self {
            reply,
            delay: None,
            calls: AtomicUsize::new(0),
            episodes: Mutex::new(Vec::new()),
        }
    }

    pub fn found(windows: SkipWindows) -> Self {
        let mut segments = Vec::new();
        if let Some(intro) = windows.intro {
            segments.push(TimedSegment::new(
                "op",
                intro.start.as_secs_f64(),
                intro.end.as_secs_f64(),
            ));
        }
        if let Some(outro) = windows.outro {
            segments.push(TimedSegment::new(
                "ed",
                outro.start.as_secs_f64(),
                outro.end.as_secs_f64(),
            ));
        }
        Self::with_reply(Reply::Found(segments))
    }

    /// Each episode gets its own intro window, so replies can be told apart
    pub fn per_episode() -> Self {
        Self::with_reply(Reply::PerEpisode)
    }

    /// Hold the reply for `episode` back by `delay`
    pub fn delayed(mut self, episode: u32, delay: Duration) -> Self {
        self.delay = Some((episode, delay));
        self
    }

    pub fn missing() -> Self {
        Self::with_reply(Reply::Missing)
    }

    pub fn failing() -> Self {
        Self::with_reply(Reply::Failing)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn episodes(&self) -> Vec<u32> {
        self.episodes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SkipTimingProvider for MockSkipProvider {
    async fn fetch_segments(&self, episode: u32) -> AppResult<Option<Vec<TimedSegment>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.episodes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(episode);
        if let Some((delayed, delay)) = self.delay {
            if delayed == episode {
                tokio::time::sleep(delay).await;
            }
        }
        match self.reply.clone() {
            Reply::Found(segments) => Ok(Some(segments)),
            Reply::PerEpisode => {
                let start = f64::from(episode);
                Ok(Some(vec![TimedSegment::new("op", start, start + 90.0)]))
            }
            Reply::Missing => Ok(None),
            Reply::Failing => Err(AppError::SkipTiming("connection reset".into())),
        }
    }
}

/// Preference store whose durable write always fails; the in-memory value
/// still changes
pub struct ReadOnlyPreferenceStore {
    current: Mutex<Preferences>,
}

impl ReadOnlyPreferenceStore {
    pub fn new(initial: Preferences) -> Self {
        Self {
            current: Mutex::new(initial),
        }
    }
}

impl PreferenceStore for ReadOnlyPreferenceStore {
    fn get(&self) -> Preferences {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, update: PreferencesUpdate) -> AppResult<Preferences> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current = current.merged(update);
        Err(AppError::Preferences("read-only file system".into()))
    }
}
