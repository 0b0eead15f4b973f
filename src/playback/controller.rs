use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use super::events::{PlaybackEvent, PlaybackEventBus, RecordedEvent};
use super::session::{PlaybackSession, PlaybackSnapshot, SessionSettings};
use super::timer::{SessionId, SessionMessage, SessionPayload, SessionTask, TimerScheduler};
use crate::catalog::ContentNavigator;
use crate::config::Config;
use crate::models::{ContentRef, Preferences, PreferencesUpdate, SegmentKind, VideoSource};
use crate::player::{ClockEvent, MediaClock};
use crate::services::{PreferenceStore, SkipTimingResolver};
use crate::utils::{AppError, AppResult};

/// Commands that can be sent to the playback controller
pub enum ControllerCommand {
    /// Replace the current session with a new one for `content`. An `Err`
    /// source opens the session straight into its error state.
    Open {
        content: ContentRef,
        clock: Arc<dyn MediaClock>,
        source: AppResult<Option<VideoSource>>,
        respond_to: oneshot::Sender<SessionId>,
    },
    /// Tear down the current session (viewer left the player)
    Close { respond_to: oneshot::Sender<()> },
    Skip {
        kind: SegmentKind,
        respond_to: oneshot::Sender<Option<Duration>>,
    },
    PlayNext {
        respond_to: oneshot::Sender<Option<ContentRef>>,
    },
    PlayPrevious {
        respond_to: oneshot::Sender<Option<ContentRef>>,
    },
    CancelAutoAdvance { respond_to: oneshot::Sender<()> },
    UpdatePreferences {
        update: PreferencesUpdate,
        respond_to: oneshot::Sender<Preferences>,
    },
    GetPreferences {
        respond_to: oneshot::Sender<Preferences>,
    },
    /// Switch to another quality variant of the current source
    SelectQuality {
        quality: String,
        respond_to: oneshot::Sender<bool>,
    },
    GetSnapshot {
        respond_to: oneshot::Sender<Option<PlaybackSnapshot>>,
    },
}

enum ClockSignal {
    Event(ClockEvent),
    /// The subscription fell behind and dropped notifications
    Missed(u64),
}

/// Receive the next clock notification for the current session, or wait
/// forever when there is none
async fn next_clock_signal(
    events: &mut Option<broadcast::Receiver<ClockEvent>>,
) -> Option<ClockSignal> {
    let Some(receiver) = events.as_mut() else {
        return std::future::pending().await;
    };
    match receiver.recv().await {
        Ok(event) => Some(ClockSignal::Event(event)),
        Err(RecvError::Lagged(skipped)) => Some(ClockSignal::Missed(skipped)),
        Err(RecvError::Closed) => {
            debug!("Media clock went away");
            *events = None;
            None
        }
    }
}

/// Actor that owns the active playback session.
///
/// Clock notifications are drained before session messages and commands,
/// so anything the clock reported before a command was sent is applied
/// before that command runs.
pub struct PlaybackController {
    receiver: mpsc::UnboundedReceiver<ControllerCommand>,
    session_tx: mpsc::UnboundedSender<SessionMessage>,
    session_rx: mpsc::UnboundedReceiver<SessionMessage>,
    clock_events: Option<broadcast::Receiver<ClockEvent>>,
    session: Option<PlaybackSession>,
    next_session_id: SessionId,
    bus: PlaybackEventBus,
    preferences: Arc<dyn PreferenceStore>,
    resolver: Arc<SkipTimingResolver>,
    navigator: Arc<dyn ContentNavigator>,
    settings: SessionSettings,
}

impl PlaybackController {
    pub fn new(
        config: &Config,
        preferences: Arc<dyn PreferenceStore>,
        resolver: Arc<SkipTimingResolver>,
        navigator: Arc<dyn ContentNavigator>,
    ) -> (PlaybackHandle, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (session_tx, session_rx) = mpsc::unbounded_channel();
        let bus = PlaybackEventBus::default();

        let controller = Self {
            receiver,
            session_tx,
            session_rx,
            clock_events: None,
            session: None,
            next_session_id: 1,
            bus: bus.clone(),
            preferences,
            resolver,
            navigator,
            settings: SessionSettings::from_config(config),
        };

        (PlaybackHandle { sender, bus }, controller)
    }

    /// Run the controller until every handle has been dropped
    pub async fn run(mut self) {
        debug!("PlaybackController event loop started");

        loop {
            tokio::select! {
                biased;
                Some(signal) = next_clock_signal(&mut self.clock_events) => {
                    self.handle_clock_signal(signal);
                }
                Some(message) = self.session_rx.recv() => {
                    self.handle_session_message(message);
                }
                command = self.receiver.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
            }
        }

        self.close_session();
        debug!("PlaybackController event loop terminated");
    }

    fn handle_command(&mut self, command: ControllerCommand) {
        match command {
            ControllerCommand::Open {
                content,
                clock,
                source,
                respond_to,
            } => {
                let id = self.open_session(content, clock, source);
                let _ = respond_to.send(id);
            }
            ControllerCommand::Close { respond_to } => {
                self.close_session();
                let _ = respond_to.send(());
            }
            ControllerCommand::Skip { kind, respond_to } => {
                let target = self.session.as_mut().and_then(|s| s.skip(kind));
                let _ = respond_to.send(target);
            }
            ControllerCommand::PlayNext { respond_to } => {
                let target = self.navigate(PlaybackSession::play_next);
                let _ = respond_to.send(target);
            }
            ControllerCommand::PlayPrevious { respond_to } => {
                let target = self.navigate(PlaybackSession::play_previous);
                let _ = respond_to.send(target);
            }
            ControllerCommand::CancelAutoAdvance { respond_to } => {
                if let Some(session) = self.session.as_mut() {
                    let events = session.cancel_auto_advance();
                    self.bus.publish_all(events);
                }
                let _ = respond_to.send(());
            }
            ControllerCommand::UpdatePreferences { update, respond_to } => {
                let preferences = self.update_preferences(update);
                let _ = respond_to.send(preferences);
            }
            ControllerCommand::GetPreferences { respond_to } => {
                let _ = respond_to.send(self.preferences.get());
            }
            ControllerCommand::SelectQuality {
                quality,
                respond_to,
            } => {
                let events = self
                    .session
                    .as_mut()
                    .map(|s| s.select_quality(&quality))
                    .unwrap_or_default();
                let switched = !events.is_empty();
                self.bus.publish_all(events);
                let _ = respond_to.send(switched);
            }
            ControllerCommand::GetSnapshot { respond_to } => {
                let _ = respond_to.send(self.session.as_ref().map(|s| s.snapshot()));
            }
        }
    }

    fn open_session(
        &mut self,
        content: ContentRef,
        clock: Arc<dyn MediaClock>,
        source: AppResult<Option<VideoSource>>,
    ) -> SessionId {
        // The old session's timers and subscription go before anything new is wired
        self.close_session();

        let id = self.next_session_id;
        self.next_session_id += 1;

        let timers = TimerScheduler::new(id, self.session_tx.clone());
        let (source, failure) = match source {
            Ok(source) => (source, None),
            Err(e) => (None, Some(e)),
        };

        let mut session = PlaybackSession::new(
            content,
            clock.clone(),
            source,
            self.preferences.get(),
            self.navigator.as_ref(),
            self.settings.clone(),
            timers.clone(),
        );

        let events = match failure {
            Some(error) => session.start_unavailable(error),
            None => {
                self.clock_events = Some(clock.subscribe());
                let events = session.start();

                let resolver = Arc::clone(&self.resolver);
                session.attach_task(SessionTask::spawn(async move {
                    let windows = resolver.resolve(&content).await;
                    timers.send(SessionPayload::SkipWindowsResolved(windows));
                }));
                events
            }
        };

        self.session = Some(session);
        debug!(
            "Session {} open for {}, {} listeners",
            id,
            content,
            self.bus.subscriber_count()
        );
        self.bus.publish_all(events);
        id
    }

    fn close_session(&mut self) {
        self.clock_events = None;
        if let Some(mut session) = self.session.take() {
            info!("Closing session {} for {}", session.id(), session.content());
            session.teardown();
        }
    }

    fn navigate(
        &mut self,
        step: fn(&mut PlaybackSession) -> Vec<PlaybackEvent>,
    ) -> Option<ContentRef> {
        let session = self.session.as_mut()?;
        let events = step(session);
        let target = events.iter().find_map(|e| match e {
            PlaybackEvent::Navigate(target) => Some(*target),
            _ => None,
        });
        self.bus.publish_all(events);
        target
    }

    fn update_preferences(&mut self, update: PreferencesUpdate) -> Preferences {
        let preferences = match self.preferences.set(update) {
            Ok(preferences) => preferences,
            Err(e) => {
                warn!("Failed to save preferences: {}", e);
                self.bus.publish(PlaybackEvent::Toast(e.user_message()));
                // The store keeps the new value in memory even when the write fails
                self.preferences.get()
            }
        };
        debug!("Preferences now {:?}", preferences);

        if let Some(session) = self.session.as_mut() {
            let events = session.set_preferences(preferences);
            self.bus.publish_all(events);
        }
        preferences
    }

    fn handle_clock_signal(&mut self, signal: ClockSignal) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let events = match signal {
            ClockSignal::Event(event) => {
                trace!("Session {} clock event {:?}", session.id(), event);
                session.on_clock_event(event)
            }
            ClockSignal::Missed(skipped) => {
                warn!("Session {} missed {} clock events", session.id(), skipped);
                session.resync()
            }
        };
        self.bus.publish_all(events);
    }

    fn handle_session_message(&mut self, message: SessionMessage) {
        let Some(session) = self.session.as_mut() else {
            debug!("Discarding message for closed session {}", message.session);
            return;
        };
        if session.id() != message.session {
            debug!(
                "Discarding stale message for session {} (current {})",
                message.session,
                session.id()
            );
            return;
        }

        let events = match message.payload {
            SessionPayload::Timer(kind) => session.on_timer(kind),
            SessionPayload::SkipWindowsResolved(windows) => session.on_windows_resolved(windows),
        };
        self.bus.publish_all(events);
    }
}

/// Cloneable handle for talking to the playback controller
#[derive(Clone)]
pub struct PlaybackHandle {
    sender: mpsc::UnboundedSender<ControllerCommand>,
    bus: PlaybackEventBus,
}

impl PlaybackHandle {
    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> ControllerCommand,
    ) -> Result<T> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(command(respond_to))
            .map_err(|_| anyhow::anyhow!("Playback controller disconnected"))?;
        response
            .await
            .map_err(|_| anyhow::anyhow!("Failed to receive response from playback controller"))
    }

    /// Start a new session, tearing down whatever was playing
    pub async fn open(
        &self,
        content: ContentRef,
        clock: Arc<dyn MediaClock>,
        source: Option<VideoSource>,
    ) -> Result<SessionId> {
        self.request(|respond_to| ControllerCommand::Open {
            content,
            clock,
            source: Ok(source),
            respond_to,
        })
        .await
    }

    /// Open a session whose video source could not be resolved. It goes
    /// straight to the error state with the error's user message; a retry
    /// is another `open`.
    pub async fn open_failed(
        &self,
        content: ContentRef,
        clock: Arc<dyn MediaClock>,
        error: AppError,
    ) -> Result<SessionId> {
        self.request(|respond_to| ControllerCommand::Open {
            content,
            clock,
            source: Err(error),
            respond_to,
        })
        .await
    }

    pub async fn close(&self) -> Result<()> {
        self.request(|respond_to| ControllerCommand::Close { respond_to })
            .await
    }

    /// Returns the seek target, or `None` when there was nothing to skip
    pub async fn skip_intro(&self) -> Result<Option<Duration>> {
        self.request(|respond_to| ControllerCommand::Skip {
            kind: SegmentKind::Intro,
            respond_to,
        })
        .await
    }

    pub async fn skip_outro(&self) -> Result<Option<Duration>> {
        self.request(|respond_to| ControllerCommand::Skip {
            kind: SegmentKind::Outro,
            respond_to,
        })
        .await
    }

    /// "Play Now": skip the countdown and navigate to the next item
    pub async fn play_next(&self) -> Result<Option<ContentRef>> {
        self.request(|respond_to| ControllerCommand::PlayNext { respond_to })
            .await
    }

    pub async fn play_previous(&self) -> Result<Option<ContentRef>> {
        self.request(|respond_to| ControllerCommand::PlayPrevious { respond_to })
            .await
    }

    pub async fn cancel_auto_advance(&self) -> Result<()> {
        self.request(|respond_to| ControllerCommand::CancelAutoAdvance { respond_to })
            .await
    }

    pub async fn set_auto_skip_segments(&self, enabled: bool) -> Result<Preferences> {
        self.request(|respond_to| ControllerCommand::UpdatePreferences {
            update: PreferencesUpdate::auto_skip_segments(enabled),
            respond_to,
        })
        .await
    }

    pub async fn set_auto_advance_next(&self, enabled: bool) -> Result<Preferences> {
        self.request(|respond_to| ControllerCommand::UpdatePreferences {
            update: PreferencesUpdate::auto_advance_next(enabled),
            respond_to,
        })
        .await
    }

    pub async fn preferences(&self) -> Result<Preferences> {
        self.request(|respond_to| ControllerCommand::GetPreferences { respond_to })
            .await
    }

    /// Returns false when the quality is unknown or already selected
    pub async fn select_quality(&self, quality: &str) -> Result<bool> {
        let quality = quality.to_string();
        self.request(|respond_to| ControllerCommand::SelectQuality {
            quality,
            respond_to,
        })
        .await
    }

    pub async fn snapshot(&self) -> Result<Option<PlaybackSnapshot>> {
        self.request(|respond_to| ControllerCommand::GetSnapshot { respond_to })
            .await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.bus.subscribe()
    }

    pub fn history(&self) -> Vec<RecordedEvent> {
        self.bus.history()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SeriesCatalog;
    use crate::constants::CLOCK_EVENT_CAPACITY;
    use crate::models::{SkipWindow, SkipWindows};
    use crate::playback::PlaybackState;
    use crate::player::SimulatedClock;
    use crate::services::MemoryPreferenceStore;
    use crate::test_utils::{StubSkipProvider, recv_until, settle};

    fn s(secs: u64) -> Duration {
        Duration::from_secs(secs)
    }

    struct Harness {
        handle: PlaybackHandle,
        provider: Arc<StubSkipProvider>,
        store: Arc<MemoryPreferenceStore>,
    }

    fn spawn_controller(preferences: Preferences) -> Harness {
        let provider = Arc::new(StubSkipProvider::found(SkipWindows::new(
            SkipWindow::new(s(60), s(150)),
            SkipWindow::new(s(1300), s(1390)),
        )));
        let fallback = SkipWindow::new(s(5), s(90)).unwrap();
        let resolver = Arc::new(SkipTimingResolver::new(provider.clone(), fallback));
        let store = Arc::new(MemoryPreferenceStore::new(preferences));
        let navigator = Arc::new(SeriesCatalog::new(1100, vec![1, 2], vec![]));

        let (handle, controller) =
            PlaybackController::new(&Config::default(), store.clone(), resolver, navigator);
        tokio::spawn(controller.run());
        Harness {
            handle,
            provider,
            store,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_resolves_windows_for_episodes() {
        let h = spawn_controller(Preferences::default());
        let clock = Arc::new(SimulatedClock::with_duration(s(1420)));
        let mut events = h.handle.subscribe();

        let id = h.handle.open(ContentRef::Episode(45), clock, None).await.unwrap();
        assert_eq!(events.recv().await.unwrap(), PlaybackEvent::Loading);
        assert_eq!(events.recv().await.unwrap(), PlaybackEvent::Ready);

        settle().await;
        let snapshot = h.handle.snapshot().await.unwrap().unwrap();
        assert_eq!(snapshot.session, id);
        assert_eq!(snapshot.windows.unwrap().intro, SkipWindow::new(s(60), s(150)));
        assert_eq!(h.provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_movies_skip_the_provider() {
        let h = spawn_controller(Preferences::default());
        let clock = Arc::new(SimulatedClock::with_duration(s(5400)));
        h.handle.open(ContentRef::Movie(1), clock, None).await.unwrap();

        settle().await;
        let snapshot = h.handle.snapshot().await.unwrap().unwrap();
        assert_eq!(snapshot.windows, Some(SkipWindows::default()));
        assert_eq!(h.provider.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missed_end_is_recovered_from_the_clock() {
        let h = spawn_controller(Preferences::default());
        let clock = Arc::new(SimulatedClock::with_duration(s(1420)));
        h.handle
            .open(ContentRef::Episode(45), clock.clone(), None)
            .await
            .unwrap();
        settle().await;

        // Overflow the subscription so the Ended notification is dropped
        clock.finish();
        for _ in 0..=CLOCK_EVENT_CAPACITY {
            clock.advance_to(s(1420));
        }

        let snapshot = h.handle.snapshot().await.unwrap().unwrap();
        assert_eq!(snapshot.state, PlaybackState::CountdownActive(5));
        assert_eq!(snapshot.countdown, Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missed_buffering_is_recovered_from_the_clock() {
        let h = spawn_controller(Preferences::default());
        let clock = Arc::new(SimulatedClock::with_duration(s(1420)));
        let mut events = h.handle.subscribe();
        h.handle
            .open(ContentRef::Episode(45), clock.clone(), None)
            .await
            .unwrap();
        settle().await;

        clock.set_buffering(true);
        for secs in 0..=CLOCK_EVENT_CAPACITY as u64 {
            clock.advance_to(s(200 + secs / 10));
        }

        let snapshot = h.handle.snapshot().await.unwrap().unwrap();
        assert!(snapshot.buffering);
        assert_eq!(snapshot.state, PlaybackState::Buffering);
        recv_until(&mut events, |e| *e == PlaybackEvent::Buffering(true)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_events_apply_before_later_commands() {
        let h = spawn_controller(Preferences::default());
        let clock = Arc::new(SimulatedClock::with_duration(s(1420)));
        h.handle
            .open(ContentRef::Episode(45), clock.clone(), None)
            .await
            .unwrap();
        settle().await;

        clock.advance_to(s(70));
        let snapshot = h.handle.snapshot().await.unwrap().unwrap();
        assert!(snapshot.intro_visible);
        assert_eq!(snapshot.state, PlaybackState::IntroSkippable);

        assert_eq!(h.handle.skip_intro().await.unwrap(), Some(s(150)));
        let snapshot = h.handle.snapshot().await.unwrap().unwrap();
        assert!(!snapshot.intro_visible);
        assert!(snapshot.intro_skipped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reopening_cancels_countdown() {
        let h = spawn_controller(Preferences::default());
        let clock = Arc::new(SimulatedClock::with_duration(s(1420)));
        let mut events = h.handle.subscribe();
        h.handle
            .open(ContentRef::Episode(45), clock.clone(), None)
            .await
            .unwrap();
        settle().await;

        clock.finish();
        recv_until(&mut events, |e| *e == PlaybackEvent::Countdown(Some(5))).await;

        let other = Arc::new(SimulatedClock::with_duration(s(1420)));
        h.handle.open(ContentRef::Episode(10), other, None).await.unwrap();

        tokio::time::sleep(s(30)).await;
        let seen: Vec<_> = std::iter::from_fn(|| events.try_recv().ok()).collect();
        assert!(!seen.iter().any(|e| matches!(e, PlaybackEvent::Navigate(_))));
        assert!(!seen.iter().any(|e| matches!(e, PlaybackEvent::Countdown(Some(n)) if *n < 5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_preference_toggle_updates_store_and_session() {
        let h = spawn_controller(Preferences::default());
        let clock = Arc::new(SimulatedClock::with_duration(s(1420)));
        h.handle
            .open(ContentRef::Episode(45), clock.clone(), None)
            .await
            .unwrap();
        settle().await;

        clock.advance_to(s(70));
        let prefs = h.handle.set_auto_skip_segments(true).await.unwrap();
        assert!(prefs.auto_skip_segments);
        assert!(h.store.get().auto_skip_segments);
        // Switching auto-skip on while inside the intro takes effect at once
        assert_eq!(clock.seeks(), vec![s(150)]);
        assert_eq!(h.handle.preferences().await.unwrap(), prefs);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_then_commands_are_noops() {
        let h = spawn_controller(Preferences::default());
        let clock = Arc::new(SimulatedClock::with_duration(s(1420)));
        h.handle
            .open(ContentRef::Episode(45), clock, None)
            .await
            .unwrap();
        h.handle.close().await.unwrap();

        assert!(h.handle.snapshot().await.unwrap().is_none());
        assert_eq!(h.handle.skip_intro().await.unwrap(), None);
        assert_eq!(h.handle.play_next().await.unwrap(), None);
        assert!(!h.handle.select_quality("720p").await.unwrap());
    }

    #[tokio::test]
    async fn test_handle_errors_when_controller_is_gone() {
        let h = spawn_controller(Preferences::default());
        let handle = h.handle.clone();
        drop(h);
        // Controller still alive through the clone
        assert!(handle.preferences().await.is_ok());

        let (handle, controller) = PlaybackController::new(
            &Config::default(),
            Arc::new(MemoryPreferenceStore::default()),
            Arc::new(SkipTimingResolver::new(
                Arc::new(StubSkipProvider::missing()),
                SkipWindow::new(s(5), s(90)).unwrap(),
            )),
            Arc::new(SeriesCatalog::new(10, vec![], vec![])),
        );
        drop(controller);
        let err = handle.preferences().await.unwrap_err();
        assert!(err.to_string().contains("disconnected"));
    }
}
