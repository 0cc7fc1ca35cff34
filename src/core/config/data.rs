use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// On disk the keys use the same kebab-case names as `streamchat set`.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Backend API root, e.g. `http://127.0.0.1:8000/api/v1`
    pub base_url: Option<String>,
    /// Wall-clock limit for one streamed reply, in seconds. Unset or 0 means no limit.
    pub stream_timeout: Option<u64>,
    /// Timeout for the non-streaming endpoints, in seconds
    pub request_timeout: Option<u64>,
    /// Account name used for the keyring entry
    pub username: Option<String>,
    pub remember_me: Option<bool>,
}

/// Keys accepted by `streamchat set` / `streamchat unset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    BaseUrl,
    StreamTimeout,
    RequestTimeout,
    Username,
    RememberMe,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 5] = [
        ConfigKey::BaseUrl,
        ConfigKey::StreamTimeout,
        ConfigKey::RequestTimeout,
        ConfigKey::Username,
        ConfigKey::RememberMe,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConfigKey::BaseUrl => "base-url",
            ConfigKey::StreamTimeout => "stream-timeout",
            ConfigKey::RequestTimeout => "request-timeout",
            ConfigKey::Username => "username",
            ConfigKey::RememberMe => "remember-me",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigKey {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        ConfigKey::ALL
            .into_iter()
            .find(|key| key.as_str() == normalized)
            .ok_or_else(|| {
                let known: Vec<_> = ConfigKey::ALL.iter().map(|key| key.as_str()).collect();
                format!("Unknown config key '{value}'. Known keys: {}", known.join(", "))
            })
    }
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
///
/// # Examples
/// - Unix: `/home/user/.config/streamchat/config.toml` → `~/.config/streamchat/config.toml`
/// - Windows: paths are shown unchanged
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
