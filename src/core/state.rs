//! On-disk application state that survives between runs.
//!
//! Written explicitly at session teardown; the in-memory stores decide what
//! goes in through their `persisted()` functions.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::api::Chat;
use crate::core::config::io::{project_dirs, write_atomically, ConfigError};
use crate::core::session::PersistedSession;

pub const STATE_FILE_NAME: &str = "state.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub session: PersistedSession,
    #[serde(default)]
    pub chats: Vec<Chat>,
}

impl PersistedState {
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)?;
        write_atomically(path, contents.as_bytes())
    }

    pub fn default_path() -> Result<PathBuf, ConfigError> {
        Ok(project_dirs()?.data_dir().join(STATE_FILE_NAME))
    }
}
