use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info, warn};

use crate::models::{Preferences, PreferencesUpdate};
use crate::utils::{AppError, AppResult};

/// Durable home of the viewer's playback preferences.
///
/// `set` updates the in-memory value before persisting, so a failed write
/// never leaves the running session on a stale value.
pub trait PreferenceStore: Send + Sync {
    fn get(&self) -> Preferences;

    /// Merge `update` into the stored preferences and return the result
    fn set(&self, update: PreferencesUpdate) -> AppResult<Preferences>;
}

fn apply(current: &RwLock<Preferences>, update: PreferencesUpdate) -> Preferences {
    let mut guard = current.write().unwrap_or_else(PoisonError::into_inner);
    *guard = guard.merged(update);
    *guard
}

/// Preferences kept only for the lifetime of the process
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    current: RwLock<Preferences>,
}

impl MemoryPreferenceStore {
    pub fn new(initial: Preferences) -> Self {
        Self {
            current: RwLock::new(initial),
        }
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self) -> Preferences {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, update: PreferencesUpdate) -> AppResult<Preferences> {
        Ok(apply(&self.current, update))
    }
}

/// Preferences persisted as a small TOML file:
///
/// ```toml
/// auto_skip_segments = false
/// auto_advance_next = true
/// ```
#[derive(Debug)]
pub struct FilePreferenceStore {
    path: PathBuf,
    current: RwLock<Preferences>,
}

impl FilePreferenceStore {
    /// Open the store at `path`. A missing or unreadable file yields the
    /// defaults; it is only created on the first `set`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = match Self::read(&path) {
            Ok(Some(prefs)) => {
                debug!("Loaded preferences from {:?}", path);
                prefs
            }
            Ok(None) => {
                info!("No preferences file at {:?}, using defaults", path);
                Preferences::default()
            }
            Err(e) => {
                warn!("Ignoring unreadable preferences file {:?}: {}", path, e);
                Preferences::default()
            }
        };

        Self {
            path,
            current: RwLock::new(current),
        }
    }

    /// Open `preferences.toml` in the application config directory
    pub fn open_default() -> AppResult<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| AppError::Preferences("no config directory on this system".into()))?;
        Ok(Self::open(dir.join("tidewatch").join("preferences.toml")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(path: &Path) -> AppResult<Option<Preferences>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)?;
        Ok(Some(toml::from_str(&contents)?))
    }

    fn persist(&self, prefs: &Preferences) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string(prefs)?;

        // Write-then-rename so a crash never leaves a half-written file
        let tmp = self.path.with_extension("toml.tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &self.path)?;

        debug!("Preferences saved to {:?}", self.path);
        Ok(())
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self) -> Preferences {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, update: PreferencesUpdate) -> AppResult<Preferences> {
        let prefs = apply(&self.current, update);
        self.persist(&prefs).map_err(|e| {
            AppError::Preferences(format!("could not save to {}: {e}", self.path.display()))
        })?;
        Ok(prefs)
    }
}
