//! Persisted connection parameters
//!
//! The menu writes a [`SessionConfig`] into the [`Preferences`] store before the game
//! scene loads; the session reads it once when the scene starts.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use shared::{DEFAULT_PORT, DEFAULT_SERVER_ADDR};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

const ROLE_KEY: &str = "session.role";
const ADDRESS_KEY: &str = "session.address";
const PORT_KEY: &str = "session.port";

/// Environment variable overriding where preferences live
pub const PREFS_PATH_ENV: &str = "SESSION_PREFS";
const DEFAULT_PREFS_FILE: &str = "session.ron";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("preferences I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not encode preferences: {0}")]
    Encode(#[from] ron::Error),
}

/// Which side of a session this process plays
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionRole {
    Host,
    #[default]
    Client,
}

impl SessionRole {
    fn as_key(self) -> &'static str {
        match self {
            SessionRole::Host => "host",
            SessionRole::Client => "client",
        }
    }
}

impl FromStr for SessionRole {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "host" => Ok(SessionRole::Host),
            "client" => Ok(SessionRole::Client),
            _ => Err(()),
        }
    }
}

/// Where preferences are stored on disk
pub fn prefs_path() -> PathBuf {
    std::env::var_os(PREFS_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PREFS_FILE))
}

/// Flat key/value preferences persisted as RON
#[derive(Resource, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Preferences {
    values: BTreeMap<String, String>,
}

impl Preferences {
    /// Load preferences from `path`.
    ///
    /// A missing file is not an error (fresh install). A corrupt file is logged and
    /// replaced with defaults rather than blocking startup.
    pub fn load(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!("Failed to read preferences {}: {}", path.display(), e);
                return Self::default();
            }
        };

        ron::from_str(&text).unwrap_or_else(|e| {
            warn!("Ignoring corrupt preferences {}: {}", path.display(), e);
            Self::default()
        })
    }

    /// Save preferences (atomic write via temp file)
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, text)?;
        std::fs::rename(&temp_path, path)?;
        debug!("Saved preferences to {}", path.display());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    /// Typed read; missing or unparsable values fall back to `default`.
    pub fn get_parsed_or<T: FromStr>(&self, key: &str, default: T) -> T {
        self.get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    pub fn set(&mut self, key: &str, value: impl ToString) {
        self.values.insert(key.to_string(), value.to_string());
    }
}

/// Snapshot of how to start the network session.
///
/// Treated as immutable for the lifetime of a game scene.
#[derive(Resource, Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub role: SessionRole,
    pub server_address: String,
    pub port: u16,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            role: SessionRole::default(),
            server_address: DEFAULT_SERVER_ADDR.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl SessionConfig {
    pub fn read(prefs: &Preferences) -> Self {
        let defaults = Self::default();
        Self {
            role: prefs.get_parsed_or(ROLE_KEY, defaults.role),
            server_address: prefs.get_or(ADDRESS_KEY, &defaults.server_address),
            port: prefs.get_parsed_or(PORT_KEY, defaults.port),
        }
    }

    pub fn write(&self, prefs: &mut Preferences) {
        prefs.set(ROLE_KEY, self.role.as_key());
        prefs.set(ADDRESS_KEY, &self.server_address);
        prefs.set(PORT_KEY, self.port);
    }
}
