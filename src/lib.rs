// Playback continuity core: skip windows, auto-advance and preferences.
// The headless runner in src/main.rs drives it with a simulated clock.

#![allow(clippy::result_large_err)]

pub mod catalog;
pub mod config;
pub mod constants;
pub mod models;
pub mod playback;
pub mod player;
pub mod services;
pub mod utils;

#[cfg(test)]
mod test_utils;
