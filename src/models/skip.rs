use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The two skippable segment slots of a content item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Intro,
    Outro,
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentKind::Intro => f.write_str("intro"),
            SegmentKind::Outro => f.write_str("outro"),
        }
    }
}

/// A half-open `[start, end)` interval on a content item's timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipWindow {
    pub start: Duration,
    pub end: Duration,
}

impl SkipWindow {
    /// Returns `None` unless `start < end`
    pub fn new(start: Duration, end: Duration) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    /// Build a window from provider seconds, rejecting negative, non-finite
    /// or empty intervals
    pub fn from_secs_f64(start: f64, end: f64) -> Option<Self> {
        if !start.is_finite() || !end.is_finite() || start < 0.0 || end < 0.0 {
            return None;
        }
        Self::new(Duration::from_secs_f64(start), Duration::from_secs_f64(end))
    }

    pub fn contains(&self, position: Duration) -> bool {
        position >= self.start && position < self.end
    }

    pub fn length(&self) -> Duration {
        self.end - self.start
    }
}

/// Resolved windows for one session. Both slots absent means skipping is
/// not offered at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipWindows {
    pub intro: Option<SkipWindow>,
    pub outro: Option<SkipWindow>,
}

impl SkipWindows {
    pub fn new(intro: Option<SkipWindow>, outro: Option<SkipWindow>) -> Self {
        Self { intro, outro }
    }

    /// Intro-only window used when timing data cannot be fetched
    pub fn fallback(intro: SkipWindow) -> Self {
        Self {
            intro: Some(intro),
            outro: None,
        }
    }

    pub fn get(&self, kind: SegmentKind) -> Option<SkipWindow> {
        match kind {
            SegmentKind::Intro => self.intro,
            SegmentKind::Outro => self.outro,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.intro.is_none() && self.outro.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_requires_start_before_end() {
        assert!(SkipWindow::new(Duration::from_secs(10), Duration::from_secs(10)).is_none());
        assert!(SkipWindow::new(Duration::from_secs(11), Duration::from_secs(10)).is_none());
        assert!(SkipWindow::new(Duration::from_secs(5), Duration::from_secs(90)).is_some());
    }

    #[test]
    fn test_from_secs_rejects_invalid_values() {
        assert!(SkipWindow::from_secs_f64(-1.0, 20.0).is_none());
        assert!(SkipWindow::from_secs_f64(f64::NAN, 20.0).is_none());
        assert!(SkipWindow::from_secs_f64(0.0, f64::INFINITY).is_none());
        let window = SkipWindow::from_secs_f64(1.5, 88.25).unwrap();
        assert_eq!(window.start, Duration::from_millis(1500));
        assert_eq!(window.end, Duration::from_millis(88250));
    }

    #[test]
    fn test_contains_is_half_open() {
        let window = SkipWindow::new(Duration::from_secs(5), Duration::from_secs(90)).unwrap();
        assert!(!window.contains(Duration::from_millis(4999)));
        assert!(window.contains(Duration::from_secs(5)));
        assert!(window.contains(Duration::from_millis(89999)));
        assert!(!window.contains(Duration::from_secs(90)));
        assert_eq!(window.length(), Duration::from_secs(85));
    }

    #[test]
    fn test_windows_slots() {
        let intro = SkipWindow::new(Duration::from_secs(5), Duration::from_secs(90)).unwrap();
        let windows = SkipWindows::fallback(intro);
        assert_eq!(windows.get(SegmentKind::Intro), Some(intro));
        assert_eq!(windows.get(SegmentKind::Outro), None);
        assert!(!windows.is_empty());
        assert!(SkipWindows::default().is_empty());
    }
}
