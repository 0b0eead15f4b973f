use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::constants::*;
use crate::models::SkipWindow;
use crate::player::Readiness;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_countdown_seconds")]
    pub countdown_seconds: u32,

    #[serde(default = "default_prompt_dismiss_seconds")]
    pub prompt_dismiss_seconds: u64,

    #[serde(default = "default_fallback_intro_start")]
    pub fallback_intro_start: u64,

    #[serde(default = "default_fallback_intro_end")]
    pub fallback_intro_end: u64,

    /// Position updates below this readiness are ignored
    #[serde(default = "default_readiness_threshold")]
    pub readiness_threshold: Readiness,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    #[serde(default = "default_skip_timing_url")]
    pub skip_timing_url: String,

    #[serde(default = "default_skip_timing_series_id")]
    pub skip_timing_series_id: u32,

    #[serde(default = "default_timeout")]
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_total_episodes")]
    pub total_episodes: u32,

    #[serde(default)]
    pub movie_ids: Vec<u32>,

    #[serde(default)]
    pub special_ids: Vec<u32>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            info!("No config file found, using defaults");
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", path);
        let contents = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;
        info!("Config loaded successfully");
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents).context("Failed to write config file")?;

        debug!("Config saved to {:?}", path);
        Ok(())
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Failed to get config directory")?;
        Ok(config_dir.join("tidewatch"))
    }

    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }
}

impl PlaybackConfig {
    /// The intro window assumed when skip timing cannot be fetched
    pub fn fallback_intro(&self) -> Option<SkipWindow> {
        SkipWindow::new(
            Duration::from_secs(self.fallback_intro_start),
            Duration::from_secs(self.fallback_intro_end),
        )
    }

    pub fn prompt_dismiss_after(&self) -> Duration {
        Duration::from_secs(self.prompt_dismiss_seconds)
    }
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout)
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            countdown_seconds: default_countdown_seconds(),
            prompt_dismiss_seconds: default_prompt_dismiss_seconds(),
            fallback_intro_start: default_fallback_intro_start(),
            fallback_intro_end: default_fallback_intro_end(),
            readiness_threshold: default_readiness_threshold(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            skip_timing_url: default_skip_timing_url(),
            skip_timing_series_id: default_skip_timing_series_id(),
            connection_timeout: default_timeout(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            total_episodes: default_total_episodes(),
            movie_ids: Vec::new(),
            special_ids: Vec::new(),
        }
    }
}

// Default value functions
fn default_countdown_seconds() -> u32 { DEFAULT_COUNTDOWN_SECONDS }
fn default_prompt_dismiss_seconds() -> u64 { DEFAULT_PROMPT_DISMISS_SECONDS }
fn default_fallback_intro_start() -> u64 { FALLBACK_INTRO_START_SECS }
fn default_fallback_intro_end() -> u64 { FALLBACK_INTRO_END_SECS }
fn default_readiness_threshold() -> Readiness { Readiness::FutureData }
fn default_backend_url() -> String { DEFAULT_BACKEND_URL.to_string() }
fn default_skip_timing_url() -> String { DEFAULT_SKIP_TIMING_URL.to_string() }
fn default_skip_timing_series_id() -> u32 { DEFAULT_SKIP_TIMING_SERIES_ID }
fn default_timeout() -> u64 { DEFAULT_CONNECTION_TIMEOUT_SECS }
fn default_total_episodes() -> u32 { DEFAULT_TOTAL_EPISODES }
