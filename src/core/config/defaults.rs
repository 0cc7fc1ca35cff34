use std::time::Duration;

use crate::core::config::data::{Config, ConfigKey};
use crate::utils::url::{validate_base_url, InvalidBaseUrl, DEFAULT_BASE_URL};

pub const BASE_URL_ENV_VAR: &str = "STREAMCHAT_BASE_URL";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

impl Config {
    /// Picks the base URL: command line, then environment, then config file.
    pub fn resolve_base_url(
        &self,
        cli_override: Option<&str>,
        env_override: Option<&str>,
    ) -> Result<String, InvalidBaseUrl> {
        let candidate = cli_override
            .filter(|value| !value.trim().is_empty())
            .or(env_override.filter(|value| !value.trim().is_empty()))
            .or(self.base_url.as_deref())
            .unwrap_or(DEFAULT_BASE_URL);
        validate_base_url(candidate)
    }

    pub fn stream_timeout(&self) -> Option<Duration> {
        self.stream_timeout
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn remember_me(&self) -> bool {
        self.remember_me.unwrap_or(false)
    }

    /// Applies `streamchat set <key> <value>` and returns the stored value.
    pub fn set_value(&mut self, key: ConfigKey, value: &str) -> Result<String, String> {
        let value = value.trim();
        if value.is_empty() {
            return Err(format!("A value is required for {key}"));
        }

        match key {
            ConfigKey::BaseUrl => {
                let url = validate_base_url(value).map_err(|err| err.to_string())?;
                self.base_url = Some(url.clone());
                Ok(url)
            }
            ConfigKey::StreamTimeout => {
                let secs = parse_seconds(key, value)?;
                self.stream_timeout = Some(secs);
                Ok(secs.to_string())
            }
            ConfigKey::RequestTimeout => {
                let secs = parse_seconds(key, value)?;
                if secs == 0 {
                    return Err(format!("{key} must be at least 1 second"));
                }
                self.request_timeout = Some(secs);
                Ok(secs.to_string())
            }
            ConfigKey::Username => {
                self.username = Some(value.to_string());
                Ok(value.to_string())
            }
            ConfigKey::RememberMe => {
                let enabled = parse_toggle(value)
                    .ok_or_else(|| format!("{key} expects on/off, got '{value}'"))?;
                self.remember_me = Some(enabled);
                Ok(if enabled { "on" } else { "off" }.to_string())
            }
        }
    }

    pub fn unset_value(&mut self, key: ConfigKey) {
        match key {
            ConfigKey::BaseUrl => self.base_url = None,
            ConfigKey::StreamTimeout => self.stream_timeout = None,
            ConfigKey::RequestTimeout => self.request_timeout = None,
            ConfigKey::Username => self.username = None,
            ConfigKey::RememberMe => self.remember_me = None,
        }
    }
}

fn parse_seconds(key: ConfigKey, value: &str) -> Result<u64, String> {
    value
        .trim_end_matches('s')
        .parse::<u64>()
        .map_err(|_| format!("{key} expects a whole number of seconds, got '{value}'"))
}

fn parse_toggle(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}
