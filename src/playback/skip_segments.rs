use std::time::Duration;
use tracing::{debug, info, warn};

use crate::models::{SegmentKind, SkipWindow, SkipWindows};

/// What the session must do after a position has been evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipAction {
    Seek { kind: SegmentKind, target: Duration },
    Visibility { kind: SegmentKind, visible: bool },
}

#[derive(Debug, Default)]
struct SegmentSlot {
    window: Option<SkipWindow>,
    visible: bool,
    /// One-shot: set by the first auto or manual skip, never cleared
    skipped: bool,
}

/// Tracks the skip-intro and skip-outro affordances of one session,
/// including the auto-skip one-shot flags.
#[derive(Debug, Default)]
pub struct SkipSegmentTracker {
    resolved: bool,
    intro: SegmentSlot,
    outro: SegmentSlot,
    outro_unreachable_logged: bool,
}

impl SkipSegmentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the resolved windows. `None` means skipping does not apply.
    pub fn load_windows(&mut self, windows: Option<SkipWindows>) {
        let windows = windows.unwrap_or_default();
        self.resolved = true;
        for kind in [SegmentKind::Intro, SegmentKind::Outro] {
            self.slot_mut(kind).window = windows.get(kind);
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    pub fn windows(&self) -> SkipWindows {
        SkipWindows::new(self.intro.window, self.outro.window)
    }

    pub fn is_visible(&self, kind: SegmentKind) -> bool {
        self.slot(kind).visible
    }

    pub fn is_skipped(&self, kind: SegmentKind) -> bool {
        self.slot(kind).skipped
    }

    fn slot(&self, kind: SegmentKind) -> &SegmentSlot {
        match kind {
            SegmentKind::Intro => &self.intro,
            SegmentKind::Outro => &self.outro,
        }
    }

    fn slot_mut(&mut self, kind: SegmentKind) -> &mut SegmentSlot {
        match kind {
            SegmentKind::Intro => &mut self.intro,
            SegmentKind::Outro => &mut self.outro,
        }
    }

    /// Evaluate a position update against both windows. Safe to call for
    /// every clock tick; repeated positions produce no actions.
    pub fn evaluate(
        &mut self,
        position: Duration,
        duration: Duration,
        auto_skip: bool,
        has_next: bool,
    ) -> Vec<SkipAction> {
        let mut actions = Vec::new();
        for kind in [SegmentKind::Intro, SegmentKind::Outro] {
            if auto_skip {
                self.evaluate_auto(kind, position, duration, has_next, &mut actions);
            } else {
                self.evaluate_manual(kind, position, &mut actions);
            }
        }
        actions
    }

    fn evaluate_manual(
        &mut self,
        kind: SegmentKind,
        position: Duration,
        actions: &mut Vec<SkipAction>,
    ) {
        let slot = self.slot_mut(kind);
        let inside = slot.window.is_some_and(|w| w.contains(position));
        if slot.visible != inside {
            slot.visible = inside;
            actions.push(SkipAction::Visibility {
                kind,
                visible: inside,
            });
        }
    }

    fn evaluate_auto(
        &mut self,
        kind: SegmentKind,
        position: Duration,
        duration: Duration,
        has_next: bool,
        actions: &mut Vec<SkipAction>,
    ) {
        // The manual button is never offered while auto-skip is on
        if self.slot(kind).visible {
            self.slot_mut(kind).visible = false;
            actions.push(SkipAction::Visibility {
                kind,
                visible: false,
            });
        }

        let slot = self.slot(kind);
        let Some(window) = slot.window else {
            return;
        };
        if slot.skipped || !window.contains(position) {
            return;
        }

        match kind {
            SegmentKind::Intro => {
                if window.end >= duration {
                    debug!("Intro window {:?} reaches the end of the media, not skipping", window);
                    return;
                }
                info!(
                    "Auto-skipping {:?} of intro to {:?}",
                    window.length(),
                    window.end
                );
                self.intro.skipped = true;
                actions.push(SkipAction::Seek {
                    kind,
                    target: window.end,
                });
            }
            SegmentKind::Outro => {
                if !has_next {
                    if !self.outro_unreachable_logged {
                        self.outro_unreachable_logged = true;
                        warn!("Outro window {:?} is unreachable: nothing plays next", window);
                    }
                    return;
                }
                info!("Auto-skipping outro");
                self.outro.skipped = true;
                actions.push(SkipAction::Seek {
                    kind,
                    target: outro_target(duration),
                });
            }
        }
    }

    /// Viewer pressed a skip button. Only acts while `position` is inside
    /// the window; consumes the one-shot flag and returns the seek target.
    pub fn skip(
        &mut self,
        kind: SegmentKind,
        position: Duration,
        duration: Option<Duration>,
    ) -> Option<Duration> {
        let window = self.slot(kind).window?;
        if !window.contains(position) {
            debug!("Position {:?} is outside the {} window {:?}", position, kind, window);
            return None;
        }
        let target = match kind {
            SegmentKind::Intro => window.end,
            SegmentKind::Outro => outro_target(duration?),
        };
        debug!("Manual {} skip to {:?}", kind, target);
        self.slot_mut(kind).skipped = true;
        Some(target)
    }

    /// Hide both buttons, e.g. once playback has ended
    pub fn hide_all(&mut self) -> Vec<SkipAction> {
        let mut actions = Vec::new();
        for kind in [SegmentKind::Intro, SegmentKind::Outro] {
            let slot = self.slot_mut(kind);
            if slot.visible {
                slot.visible = false;
                actions.push(SkipAction::Visibility {
                    kind,
                    visible: false,
                });
            }
        }
        actions
    }
}

/// Outro skips drive the clock to its final second and let it end naturally
fn outro_target(duration: Duration) -> Duration {
    duration.saturating_sub(Duration::from_secs(1))
}
