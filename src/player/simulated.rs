use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::clock::{ClockEvent, MediaClock, Readiness};
use crate::constants::{CLOCK_EVENT_CAPACITY, CLOCK_UPDATE_INTERVAL};

#[derive(Debug)]
struct ClockState {
    position: Duration,
    duration: Option<Duration>,
    readiness: Readiness,
    buffering: bool,
    ended: bool,
    seeks: Vec<Duration>,
    loaded_urls: Vec<String>,
}

/// Headless media clock with no decoder behind it.
///
/// Position moves only when driven, either by the test/host calling
/// [`advance_to`](Self::advance_to) or by [`spawn_realtime`](Self::spawn_realtime).
/// Reaching the duration fires `Ended` once; seeking back re-arms it.
#[derive(Debug)]
pub struct SimulatedClock {
    state: Mutex<ClockState>,
    events: broadcast::Sender<ClockEvent>,
}

impl SimulatedClock {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(CLOCK_EVENT_CAPACITY);
        Self {
            state: Mutex::new(ClockState {
                position: Duration::ZERO,
                duration: None,
                readiness: Readiness::Nothing,
                buffering: false,
                ended: false,
                seeks: Vec::new(),
                loaded_urls: Vec::new(),
            }),
            events,
        }
    }

    /// Clock whose metadata is already loaded and fully buffered
    pub fn with_duration(duration: Duration) -> Self {
        let clock = Self::new();
        {
            let mut state = clock.state();
            state.duration = Some(duration);
            state.readiness = Readiness::EnoughData;
        }
        clock
    }

    fn state(&self) -> MutexGuard<'_, ClockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: ClockEvent) {
        trace!("Clock event: {:?}", event);
        // No subscribers is fine; the controller may not be attached yet
        let _ = self.events.send(event);
    }

    pub fn load_metadata(&self, duration: Duration) {
        {
            let mut state = self.state();
            state.duration = Some(duration);
            state.readiness = Readiness::EnoughData;
        }
        self.emit(ClockEvent::MetadataLoaded);
    }

    pub fn set_readiness(&self, readiness: Readiness) {
        self.state().readiness = readiness;
    }

    /// Move the playhead as natural playback would
    pub fn advance_to(&self, position: Duration) {
        let reached_end = self.move_to(position);
        self.emit(ClockEvent::PositionChanged);
        if reached_end {
            self.emit(ClockEvent::Ended);
        }
    }

    /// Play through to the very end
    pub fn finish(&self) {
        let duration = self.state().duration;
        if let Some(duration) = duration {
            self.advance_to(duration);
        }
    }

    pub fn set_buffering(&self, buffering: bool) {
        self.state().buffering = buffering;
        self.emit(ClockEvent::Buffering(buffering));
    }

    pub fn fail(&self, reason: impl Into<String>) {
        self.emit(ClockEvent::Error(reason.into()));
    }

    pub fn seeks(&self) -> Vec<Duration> {
        self.state().seeks.clone()
    }

    pub fn loaded_urls(&self) -> Vec<String> {
        self.state().loaded_urls.clone()
    }

    /// Returns true when this move is the one that reached the end
    fn move_to(&self, position: Duration) -> bool {
        let mut state = self.state();
        let position = match state.duration {
            Some(duration) => position.min(duration),
            None => position,
        };
        state.position = position;

        match state.duration {
            Some(duration) if position >= duration => {
                let first = !state.ended;
                state.ended = true;
                first
            }
            _ => {
                state.ended = false;
                false
            }
        }
    }

    /// Advance the position in real time at the engine cadence until the
    /// end is reached. `rate` scales playback speed.
    pub fn spawn_realtime(self: &Arc<Self>, rate: f64) -> JoinHandle<()> {
        let clock = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLOCK_UPDATE_INTERVAL);
            let step = CLOCK_UPDATE_INTERVAL.mul_f64(rate.max(0.0));
            loop {
                interval.tick().await;
                let (position, ready, buffering, ended) = {
                    let state = clock.state();
                    (
                        state.position,
                        state.duration.is_some(),
                        state.buffering,
                        state.ended,
                    )
                };
                if ended {
                    debug!("Simulated playback reached the end");
                    break;
                }
                if ready && !buffering {
                    clock.advance_to(position + step);
                }
            }
        })
    }
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaClock for SimulatedClock {
    fn position(&self) -> Duration {
        self.state().position
    }

    fn duration(&self) -> Option<Duration> {
        self.state().duration
    }

    fn readiness(&self) -> Readiness {
        self.state().readiness
    }

    fn is_buffering(&self) -> bool {
        self.state().buffering
    }

    fn has_ended(&self) -> bool {
        self.state().ended
    }

    fn seek(&self, position: Duration) {
        self.state().seeks.push(position);
        let reached_end = self.move_to(position);
        self.emit(ClockEvent::PositionChanged);
        if reached_end {
            self.emit(ClockEvent::Ended);
        }
    }

    fn load(&self, url: &str) {
        debug!("Simulated clock loading {}", url);
        self.state().loaded_urls.push(url.to_string());
    }

    fn subscribe(&self) -> broadcast::Receiver<ClockEvent> {
        self.events.subscribe()
    }
}
