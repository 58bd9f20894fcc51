//! The settings seam the engine persists its configuration through.
//!
//! The engine only consumes this interface; what backs it is up to the
//! surrounding application. Values round-trip via their textual
//! representation (e.g. `Engine::Status::on`); unreadable text is a
//! `BadValue`: logged, default substituted.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use tracing::{info, warn};

use crate::error::{Error, Result};

// ── Interface ─────────────────────────────────────────────────────────────────

pub trait Settings: Send + Sync {
    fn get_string(&self, key: &str) -> Option<String>;
    fn set_string(&self, key: &str, value: &str);

    /// Flushes pending writes to the backing store, if any.
    fn sync(&self) -> Result<()> {
        Ok(())
    }
}

/// Typed access on top of the string store.
pub trait SettingsExt {
    fn get_enum<T>(&self, key: &str, default: T) -> T
    where
        T: FromStr + Display;

    fn set_enum<T>(&self, key: &str, value: T)
    where
        T: Display;
}

impl<S: Settings + ?Sized> SettingsExt for S {
    fn get_enum<T>(&self, key: &str, default: T) -> T
    where
        T: FromStr + Display,
    {
        match self.get_string(key) {
            None => default,
            Some(text) => match text.parse() {
                Ok(value) => value,
                Err(_) => {
                    let err = Error::BadValue {
                        key: key.to_string(),
                        value: text,
                    };
                    warn!("{err}; substituting default {default}");
                    default
                }
            },
        }
    }

    fn set_enum<T>(&self, key: &str, value: T)
    where
        T: Display,
    {
        self.set_string(key, &value.to_string());
    }
}

// ── In-memory store ───────────────────────────────────────────────────────────

/// Volatile store, used by tests and as a null object.
#[derive(Default)]
pub struct InMemorySettings {
    values: Mutex<BTreeMap<String, String>>,
}

impl InMemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Settings for InMemorySettings {
    fn get_string(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn set_string(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }
}

// ── File-backed store ─────────────────────────────────────────────────────────

/// Flat JSON object on disk. A missing or corrupt file falls back to an
/// empty store so the engine starts with its defaults.
pub struct FileSettings {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileSettings {
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str::<BTreeMap<String, String>>(&data) {
                Ok(values) => {
                    info!("loaded {} settings from {}", values.len(), path.display());
                    values
                }
                Err(e) => {
                    warn!("failed to parse {}: {e}, starting with defaults", path.display());
                    BTreeMap::new()
                }
            },
            Err(_) => {
                info!("no settings file at {}, starting with defaults", path.display());
                BTreeMap::new()
            }
        };

        Self {
            path,
            values: Mutex::new(values),
        }
    }
}

impl Settings for FileSettings {
    fn get_string(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn set_string(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    fn sync(&self) -> Result<()> {
        let json = {
            let values = self.values.lock().unwrap();
            serde_json::to_string_pretty(&*values).expect("string map serializes")
        };
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl Drop for FileSettings {
    fn drop(&mut self) {
        if let Err(e) = self.sync() {
            warn!("failed to persist settings to {}: {e}", self.path.display());
        }
    }
}
