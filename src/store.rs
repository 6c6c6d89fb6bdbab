//! Persisted settings shared by all trackers

use crate::{
    config::minutes_to_duration,
    constants::{DEFAULT_MIN_TIME_BETWEEN_REQUESTS_MINUTES, STORAGE_KEY, STORAGE_VERSION},
    error::SettingsError,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;

/// Values shared across every tracker of the process
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SharedSettings {
    /// Minimum time between two upstream requests of any tracker, in minutes
    #[serde(default = "default_min_time_between_requests")]
    pub min_time_between_requests: f64,
}

fn default_min_time_between_requests() -> f64 {
    DEFAULT_MIN_TIME_BETWEEN_REQUESTS_MINUTES
}

impl Default for SharedSettings {
    fn default() -> Self {
        Self {
            min_time_between_requests: default_min_time_between_requests(),
        }
    }
}

/// On-disk document wrapping the settings
#[derive(Debug, Serialize, Deserialize)]
struct StoredDocument {
    version: u32,
    key: String,
    data: SharedSettings,
}

/// Durable store for [`SharedSettings`]
///
/// Reads come from memory and never touch the disk. Every change is written
/// to a sibling temporary file that is then renamed over the document, and
/// only reaches memory once that write succeeded.
pub struct SettingsStore {
    path: Option<PathBuf>,
    settings: RwLock<SharedSettings>,
    /// Held for the whole write so saves never share the temporary file
    save_lock: Mutex<()>,
}

impl SettingsStore {
    /// Loads the settings document at `path`
    ///
    /// A missing file yields the defaults; it is created on the first save.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();

        let settings = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                let document: StoredDocument = serde_json::from_str(&contents)?;
                if document.version != STORAGE_VERSION || document.key != STORAGE_KEY {
                    tracing::warn!(
                        path = %path.display(),
                        version = document.version,
                        key = %document.key,
                        "Settings document has an unexpected header, reading data anyway"
                    );
                }
                check_min_time(document.data.min_time_between_requests)?;
                document.data
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No settings stored yet, using defaults");
                SharedSettings::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path: Some(path),
            settings: RwLock::new(settings),
            save_lock: Mutex::new(()),
        })
    }

    /// Creates a store that is never written to disk
    pub fn in_memory(settings: SharedSettings) -> Self {
        Self {
            path: None,
            settings: RwLock::new(settings),
            save_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn settings(&self) -> SharedSettings {
        *self.settings.read()
    }

    /// Shared spacing in minutes
    pub fn min_time_between_requests(&self) -> f64 {
        self.settings.read().min_time_between_requests
    }

    /// Shared spacing as a duration
    pub fn min_spacing(&self) -> Duration {
        // Stored values are checked on load and on set
        minutes_to_duration(self.min_time_between_requests()).unwrap_or(Duration::MAX)
    }

    /// Persists a new shared spacing, then makes it visible to readers
    ///
    /// On error the previous value stays in effect.
    pub async fn set_min_time_between_requests(&self, minutes: f64) -> Result<(), SettingsError> {
        check_min_time(minutes)?;

        let _guard = self.save_lock.lock().await;
        let mut updated = self.settings();
        updated.min_time_between_requests = minutes;
        self.write_document(updated).await?;
        *self.settings.write() = updated;
        Ok(())
    }

    /// Writes the current settings to disk
    pub async fn save(&self) -> Result<(), SettingsError> {
        let _guard = self.save_lock.lock().await;
        self.write_document(self.settings()).await
    }

    async fn write_document(&self, settings: SharedSettings) -> Result<(), SettingsError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let document = StoredDocument {
            version: STORAGE_VERSION,
            key: STORAGE_KEY.to_string(),
            data: settings,
        };
        let contents = serde_json::to_string_pretty(&document)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, path).await?;

        tracing::debug!(path = %path.display(), "Saved shared settings");
        Ok(())
    }
}

fn check_min_time(minutes: f64) -> Result<(), SettingsError> {
    match minutes_to_duration(minutes) {
        Some(_) => Ok(()),
        None => Err(SettingsError::InvalidValue {
            key: "min_time_between_requests",
            value: minutes,
        }),
    }
}
