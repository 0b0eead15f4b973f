use std::time::Duration;
use tracing::{debug, info};

use super::events::PlaybackEvent;
use super::timer::{SessionTask, TimerKind, TimerScheduler};
use crate::constants::COUNTDOWN_TICK;
use crate::models::ContentRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvancePhase {
    /// No overlay: not ended yet, no next item, or cancelled/dismissed
    Dormant,
    Counting { remaining: u32, next: ContentRef },
    Prompt { next: ContentRef },
}

/// Owns the end-of-content overlay: the numeric countdown into the next
/// item, or the idle "play next" prompt with its dismiss timer.
///
/// At most one timer is held at a time; every transition replaces or
/// clears it before anything else happens.
pub struct AutoAdvanceManager {
    phase: AdvancePhase,
    timer: Option<SessionTask>,
    countdown_seconds: u32,
    prompt_dismiss_after: Duration,
}

impl AutoAdvanceManager {
    pub fn new(countdown_seconds: u32, prompt_dismiss_after: Duration) -> Self {
        Self {
            phase: AdvancePhase::Dormant,
            timer: None,
            countdown_seconds,
            prompt_dismiss_after,
        }
    }

    pub fn phase(&self) -> AdvancePhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase != AdvancePhase::Dormant
    }

    pub fn has_timer(&self) -> bool {
        self.timer.is_some()
    }

    pub fn remaining(&self) -> Option<u32> {
        match self.phase {
            AdvancePhase::Counting { remaining, .. } => Some(remaining),
            _ => None,
        }
    }

    /// Playback reached the end
    pub fn on_ended(
        &mut self,
        next: Option<ContentRef>,
        auto_advance: bool,
        timers: &TimerScheduler,
    ) -> Vec<PlaybackEvent> {
        self.clear();
        let Some(next) = next else {
            debug!("Nothing plays next, staying on ended content");
            return Vec::new();
        };

        if auto_advance {
            info!("Starting {}s countdown to {}", self.countdown_seconds, next);
            self.start_countdown(next, timers)
        } else {
            info!("Offering {} without countdown", next);
            self.start_prompt(next, timers)
        }
    }

    fn start_countdown(&mut self, next: ContentRef, timers: &TimerScheduler) -> Vec<PlaybackEvent> {
        self.phase = AdvancePhase::Counting {
            remaining: self.countdown_seconds,
            next,
        };
        self.timer = Some(timers.repeating(TimerKind::CountdownTick, COUNTDOWN_TICK));
        vec![PlaybackEvent::Countdown(Some(self.countdown_seconds))]
    }

    fn start_prompt(&mut self, next: ContentRef, timers: &TimerScheduler) -> Vec<PlaybackEvent> {
        self.phase = AdvancePhase::Prompt { next };
        self.timer = Some(timers.once(TimerKind::PromptDismiss, self.prompt_dismiss_after));
        vec![PlaybackEvent::Countdown(None)]
    }

    /// One second elapsed. Reaching zero stops the timer and navigates.
    pub fn on_countdown_tick(&mut self) -> Vec<PlaybackEvent> {
        let AdvancePhase::Counting { remaining, next } = self.phase else {
            debug!("Ignoring stale countdown tick");
            return Vec::new();
        };

        let remaining = remaining.saturating_sub(1);
        if remaining > 0 {
            self.phase = AdvancePhase::Counting { remaining, next };
            return vec![PlaybackEvent::Countdown(Some(remaining))];
        }

        self.clear();
        info!("Countdown finished, advancing to {}", next);
        vec![
            PlaybackEvent::Countdown(Some(0)),
            PlaybackEvent::Navigate(next),
        ]
    }

    /// The idle prompt went untouched
    pub fn on_prompt_timeout(&mut self) -> Vec<PlaybackEvent> {
        if !matches!(self.phase, AdvancePhase::Prompt { .. }) {
            debug!("Ignoring stale prompt timeout");
            return Vec::new();
        }
        self.clear();
        debug!("Play-next prompt dismissed after timeout");
        vec![PlaybackEvent::PromptDismissed]
    }

    /// Viewer dismissed the overlay
    pub fn cancel(&mut self) -> Vec<PlaybackEvent> {
        if !self.is_active() {
            return Vec::new();
        }
        self.clear();
        info!("Auto-advance cancelled");
        vec![PlaybackEvent::PromptDismissed]
    }

    /// The auto-advance preference changed mid-session. Turning it off
    /// converts a running countdown into the idle prompt.
    pub fn set_auto_advance(&mut self, enabled: bool, timers: &TimerScheduler) -> Vec<PlaybackEvent> {
        match self.phase {
            AdvancePhase::Counting { next, .. } if !enabled => {
                self.clear();
                info!("Auto-advance disabled during countdown, showing prompt");
                self.start_prompt(next, timers)
            }
            _ => Vec::new(),
        }
    }

    /// Stop any timer and drop the overlay without notifying
    pub fn clear(&mut self) {
        self.timer = None;
        self.phase = AdvancePhase::Dormant;
    }
}
