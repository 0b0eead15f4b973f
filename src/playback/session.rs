use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

use super::auto_advance::{AdvancePhase, AutoAdvanceManager};
use super::events::PlaybackEvent;
use super::skip_segments::{SkipAction, SkipSegmentTracker};
use super::state::PlaybackState;
use super::timer::{SessionId, SessionTask, TimerKind, TimerScheduler};
use crate::catalog::ContentNavigator;
use crate::config::Config;
use crate::models::{ContentRef, Preferences, SegmentKind, SkipWindows, VideoSource};
use crate::player::{ClockEvent, MediaClock, Readiness};
use crate::utils::AppError;

/// Per-session knobs taken from the configuration when the controller starts
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub countdown_seconds: u32,
    pub prompt_dismiss_after: Duration,
    pub readiness_threshold: Readiness,
    pub backend_url: String,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            countdown_seconds: config.playback.countdown_seconds,
            prompt_dismiss_after: config.playback.prompt_dismiss_after(),
            readiness_threshold: config.playback.readiness_threshold,
            backend_url: config.network.backend_url.clone(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Point-in-time view of a session for hosts and tests
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackSnapshot {
    pub session: SessionId,
    pub content: ContentRef,
    pub state: PlaybackState,
    /// `None` until the skip-timing lookup has completed
    pub windows: Option<SkipWindows>,
    pub intro_visible: bool,
    pub outro_visible: bool,
    pub intro_skipped: bool,
    pub outro_skipped: bool,
    pub countdown: Option<u32>,
    pub prompt_visible: bool,
    pub buffering: bool,
    pub quality: Option<String>,
    pub preferences: Preferences,
    pub next: Option<ContentRef>,
    pub previous: Option<ContentRef>,
}

/// Everything bound to one content item on one media clock. Created whole
/// when a content item is opened and dropped whole when it is replaced, so
/// no flag or timer can leak into the next session.
///
/// Handlers return the notifications to publish, in order.
pub struct PlaybackSession {
    id: SessionId,
    content: ContentRef,
    clock: Arc<dyn MediaClock>,
    source: Option<VideoSource>,
    quality: Option<String>,
    settings: SessionSettings,
    state: PlaybackState,
    preferences: Preferences,
    next: Option<ContentRef>,
    previous: Option<ContentRef>,
    skip: SkipSegmentTracker,
    advance: AutoAdvanceManager,
    timers: TimerScheduler,
    ended: bool,
    buffering: bool,
    tasks: Vec<SessionTask>,
}

impl PlaybackSession {
    pub fn new(
        content: ContentRef,
        clock: Arc<dyn MediaClock>,
        source: Option<VideoSource>,
        preferences: Preferences,
        navigator: &dyn ContentNavigator,
        settings: SessionSettings,
        timers: TimerScheduler,
    ) -> Self {
        let advance =
            AutoAdvanceManager::new(settings.countdown_seconds, settings.prompt_dismiss_after);
        Self {
            id: timers.session(),
            content,
            clock,
            source,
            quality: None,
            state: PlaybackState::Initializing,
            preferences,
            next: navigator.next(&content),
            previous: navigator.previous(&content),
            skip: SkipSegmentTracker::new(),
            advance,
            timers,
            ended: false,
            buffering: false,
            tasks: Vec::new(),
            settings,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn content(&self) -> ContentRef {
        self.content
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    /// Keep a background task alive for exactly as long as this session
    pub fn attach_task(&mut self, task: SessionTask) {
        self.tasks.push(task);
    }

    pub fn start(&mut self) -> Vec<PlaybackEvent> {
        info!("Opening session {} for {}", self.id, self.content);
        let mut events = vec![PlaybackEvent::Loading];

        let default_quality = self
            .source
            .as_ref()
            .and_then(|s| s.default_quality())
            .map(str::to_string);
        if let Some(quality) = default_quality {
            events.extend(self.load_quality(&quality));
        }

        events.extend(self.check_ready());
        events
    }

    /// The video source could not be resolved; the session goes straight
    /// to its terminal error state
    pub fn start_unavailable(&mut self, error: AppError) -> Vec<PlaybackEvent> {
        info!("Opening session {} for {} without a source", self.id, self.content);
        let mut events = vec![PlaybackEvent::Loading];
        events.extend(self.fail(error));
        events
    }

    pub fn on_clock_event(&mut self, event: ClockEvent) -> Vec<PlaybackEvent> {
        if self.state.is_error() {
            trace!("Session {} is in error, ignoring {:?}", self.id, event);
            return Vec::new();
        }

        match event {
            ClockEvent::MetadataLoaded => self.check_ready(),
            ClockEvent::PositionChanged => self.on_position(),
            ClockEvent::Buffering(buffering) => self.on_buffering(buffering),
            ClockEvent::Ended => self.on_ended(),
            ClockEvent::Error(reason) => self.fail(AppError::Playback(reason)),
        }
    }

    /// Rebuild buffering, readiness and end state from the clock after
    /// notifications were missed. A missed error cannot be recovered here.
    pub fn resync(&mut self) -> Vec<PlaybackEvent> {
        if self.state.is_error() {
            return Vec::new();
        }
        debug!("Resyncing session {} from the clock", self.id);
        let mut events = self.on_buffering(self.clock.is_buffering());
        events.extend(self.check_ready());
        if self.clock.has_ended() {
            events.extend(self.on_ended());
        } else {
            events.extend(self.on_position());
        }
        events
    }

    pub fn on_windows_resolved(&mut self, windows: Option<SkipWindows>) -> Vec<PlaybackEvent> {
        if self.state.is_error() {
            return Vec::new();
        }
        self.skip.load_windows(windows);
        // Don't wait for the next tick if the viewer is already inside a window
        self.on_position()
    }

    pub fn on_timer(&mut self, kind: TimerKind) -> Vec<PlaybackEvent> {
        if self.state.is_error() {
            return Vec::new();
        }
        let events = match kind {
            TimerKind::CountdownTick => self.advance.on_countdown_tick(),
            TimerKind::PromptDismiss => self.advance.on_prompt_timeout(),
        };
        self.sync_end_state();
        events
    }

    /// Viewer pressed skip-intro or skip-outro. Returns the seek target.
    pub fn skip(&mut self, kind: SegmentKind) -> Option<Duration> {
        if self.state.is_error() || self.ended {
            debug!("Ignoring {} skip on session {} in {:?}", kind, self.id, self.state);
            return None;
        }
        let position = self.clock.position();
        let Some(target) = self.skip.skip(kind, position, self.clock.duration()) else {
            warn!("No {} window at {:?} to skip for {}", kind, position, self.content);
            return None;
        };
        info!("Skipping {} of {} to {:?}", kind, self.content, target);
        self.clock.seek(target);
        Some(target)
    }

    /// "Play Now" or the next button
    pub fn play_next(&mut self) -> Vec<PlaybackEvent> {
        self.navigate(self.next)
    }

    pub fn play_previous(&mut self) -> Vec<PlaybackEvent> {
        self.navigate(self.previous)
    }

    fn navigate(&mut self, target: Option<ContentRef>) -> Vec<PlaybackEvent> {
        let Some(target) = target else {
            warn!("Nothing to navigate to from {}", self.content);
            return Vec::new();
        };
        self.advance.clear();
        self.sync_end_state();
        info!("Navigating from {} to {}", self.content, target);
        vec![PlaybackEvent::Navigate(target)]
    }

    pub fn cancel_auto_advance(&mut self) -> Vec<PlaybackEvent> {
        let events = self.advance.cancel();
        self.sync_end_state();
        events
    }

    /// Preferences changed through the controller's own mutators
    pub fn set_preferences(&mut self, preferences: Preferences) -> Vec<PlaybackEvent> {
        let previous = std::mem::replace(&mut self.preferences, preferences);
        if self.state.is_error() {
            return Vec::new();
        }

        let mut events = Vec::new();
        if previous.auto_advance_next != preferences.auto_advance_next && self.ended {
            events.extend(
                self.advance
                    .set_auto_advance(preferences.auto_advance_next, &self.timers),
            );
            self.sync_end_state();
        }
        if previous.auto_skip_segments != preferences.auto_skip_segments {
            events.extend(self.on_position());
        }
        events
    }

    pub fn select_quality(&mut self, quality: &str) -> Vec<PlaybackEvent> {
        if self.state.is_error() {
            warn!("Session {} is in error, not switching quality", self.id);
            return Vec::new();
        }
        match &self.source {
            None => {
                warn!("No video source for {}, cannot select {}", self.content, quality);
                Vec::new()
            }
            Some(source) if !source.has_quality(quality) => {
                warn!(
                    "Unknown quality '{}' for {} (available: {:?})",
                    quality,
                    self.content,
                    source.qualities().collect::<Vec<_>>()
                );
                Vec::new()
            }
            Some(_) if self.quality.as_deref() == Some(quality) => Vec::new(),
            Some(_) => self.load_quality(quality),
        }
    }

    fn load_quality(&mut self, quality: &str) -> Vec<PlaybackEvent> {
        let Some(source) = &self.source else {
            return Vec::new();
        };
        match source.proxied_url(&self.settings.backend_url, quality) {
            Ok(url) => {
                debug!("Loading {} quality {} from {}", self.content, quality, url);
                self.clock.load(&url);
                self.quality = Some(quality.to_string());
                vec![PlaybackEvent::Quality(quality.to_string())]
            }
            Err(e) => {
                warn!("Cannot load quality {} for {}: {}", quality, self.content, e);
                Vec::new()
            }
        }
    }

    /// Stop every timer and background task owned by the session
    pub fn teardown(&mut self) {
        debug!(
            "Tearing down session {} for {} (timer active: {})",
            self.id,
            self.content,
            self.advance.has_timer()
        );
        self.advance.clear();
        self.tasks.clear();
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            session: self.id,
            content: self.content,
            state: self.state.clone(),
            windows: self.skip.is_resolved().then(|| self.skip.windows()),
            intro_visible: self.skip.is_visible(SegmentKind::Intro),
            outro_visible: self.skip.is_visible(SegmentKind::Outro),
            intro_skipped: self.skip.is_skipped(SegmentKind::Intro),
            outro_skipped: self.skip.is_skipped(SegmentKind::Outro),
            countdown: self.advance.remaining(),
            prompt_visible: matches!(self.advance.phase(), AdvancePhase::Prompt { .. }),
            buffering: self.buffering,
            quality: self.quality.clone(),
            preferences: self.preferences,
            next: self.next,
            previous: self.previous,
        }
    }

    /// Duration known and enough data buffered to act on positions
    fn media_ready(&self) -> Option<Duration> {
        let duration = self.clock.duration().filter(|d| !d.is_zero())?;
        (self.clock.readiness() >= self.settings.readiness_threshold).then_some(duration)
    }

    fn check_ready(&mut self) -> Vec<PlaybackEvent> {
        if self.state != PlaybackState::Initializing || self.media_ready().is_none() {
            return Vec::new();
        }
        info!("Session {} ready", self.id);
        self.state = PlaybackState::Ready;
        vec![PlaybackEvent::Ready]
    }

    fn on_position(&mut self) -> Vec<PlaybackEvent> {
        if self.ended || self.state.is_error() {
            return Vec::new();
        }
        let Some(duration) = self.media_ready() else {
            trace!("Session {} not ready, ignoring position", self.id);
            return Vec::new();
        };

        let mut events = self.check_ready();
        if !self.skip.is_resolved() {
            self.refresh_state();
            return events;
        }

        let position = self.clock.position();
        let actions = self.skip.evaluate(
            position,
            duration,
            self.preferences.auto_skip_segments,
            self.next.is_some(),
        );
        for action in actions {
            match action {
                SkipAction::Seek { kind, target } => {
                    debug!("Auto-skip {} from {:?} to {:?}", kind, position, target);
                    self.clock.seek(target);
                }
                SkipAction::Visibility { kind, visible } => {
                    events.push(visibility_event(kind, visible));
                }
            }
        }
        self.refresh_state();
        events
    }

    fn on_buffering(&mut self, buffering: bool) -> Vec<PlaybackEvent> {
        if self.buffering == buffering {
            return Vec::new();
        }
        self.buffering = buffering;
        if self.state.is_active() {
            self.refresh_state();
        }
        vec![PlaybackEvent::Buffering(buffering)]
    }

    fn on_ended(&mut self) -> Vec<PlaybackEvent> {
        if self.ended {
            debug!("Session {} already ended", self.id);
            return Vec::new();
        }
        info!("Playback of {} ended", self.content);
        self.ended = true;
        self.buffering = false;

        let mut events = visibility_events(self.skip.hide_all());
        events.push(PlaybackEvent::Ended);
        events.extend(self.advance.on_ended(
            self.next,
            self.preferences.auto_advance_next,
            &self.timers,
        ));
        self.sync_end_state();
        events
    }

    fn fail(&mut self, error: AppError) -> Vec<PlaybackEvent> {
        error!("Session {} for {} failed: {}", self.id, self.content, error);
        self.teardown();
        let mut events = visibility_events(self.skip.hide_all());
        let message = error.user_message();
        self.state = PlaybackState::Error(message.clone());
        events.push(PlaybackEvent::Error(message));
        events
    }

    fn refresh_state(&mut self) {
        self.state = if self.buffering {
            PlaybackState::Buffering
        } else if self.skip.is_visible(SegmentKind::Intro) {
            PlaybackState::IntroSkippable
        } else if self.skip.is_visible(SegmentKind::Outro) {
            PlaybackState::OutroSkippable
        } else {
            PlaybackState::Playing
        };
    }

    fn sync_end_state(&mut self) {
        if !self.ended || self.state.is_error() {
            return;
        }
        self.state = match self.advance.phase() {
            AdvancePhase::Counting { remaining, .. } => PlaybackState::CountdownActive(remaining),
            AdvancePhase::Prompt { .. } => PlaybackState::PromptIdle,
            AdvancePhase::Dormant => PlaybackState::Ended,
        };
    }
}

fn visibility_event(kind: SegmentKind, visible: bool) -> PlaybackEvent {
    match kind {
        SegmentKind::Intro => PlaybackEvent::IntroSkippable(visible),
        SegmentKind::Outro => PlaybackEvent::OutroSkippable(visible),
    }
}

fn visibility_events(actions: Vec<SkipAction>) -> Vec<PlaybackEvent> {
    actions
        .into_iter()
        .filter_map(|action| match action {
            SkipAction::Visibility { kind, visible } => Some(visibility_event(kind, visible)),
            SkipAction::Seek { .. } => None,
        })
        .collect()
}
