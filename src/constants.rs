// Playback continuity tuning constants
// Defaults for the values that can also be overridden in config.toml

use std::time::Duration;

// === Auto-advance ===
/// Seconds counted down before the next item starts
pub const DEFAULT_COUNTDOWN_SECONDS: u32 = 5;
/// Seconds before an untouched "play next" prompt hides itself
pub const DEFAULT_PROMPT_DISMISS_SECONDS: u64 = 10;
pub const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

// === Skip timing ===
/// Most episodes of the series share roughly this opening
pub const FALLBACK_INTRO_START_SECS: u64 = 5;
pub const FALLBACK_INTRO_END_SECS: u64 = 90;
/// Series id on the skip-timing provider (MyAnimeList id)
pub const DEFAULT_SKIP_TIMING_SERIES_ID: u32 = 21;
pub const DEFAULT_SKIP_TIMING_URL: &str = "https://api.aniskip.com";

// === Backend ===
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 30;

// === Catalog ===
pub const DEFAULT_TOTAL_EPISODES: u32 = 1100;

// === Headless clock ===
/// Position update cadence of the simulated media engine
pub const CLOCK_UPDATE_INTERVAL: Duration = Duration::from_millis(250);
pub const CLOCK_EVENT_CAPACITY: usize = 256;
