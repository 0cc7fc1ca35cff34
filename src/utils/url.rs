//! URL utilities for the backend base URL
//!
//! The base URL comes from the CLI, the environment or the config file and
//! endpoints are appended to it, so trailing slashes are normalized away and
//! the scheme is checked before anything is stored.

use std::fmt;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api/v1";

/// Normalize a base URL by removing trailing slashes
///
/// # Examples
///
/// ```
/// use streamchat::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://localhost:8000/api/v1/"), "http://localhost:8000/api/v1");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Construct a complete API endpoint URL from a base URL and endpoint path
///
/// # Examples
///
/// ```
/// use streamchat::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("http://localhost:8000/api/v1/", "/chat/messages"),
///     "http://localhost:8000/api/v1/chat/messages"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalized_base, endpoint)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidBaseUrl(pub String);

impl fmt::Display for InvalidBaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid base URL '{}': expected an http:// or https:// address",
            self.0
        )
    }
}

impl std::error::Error for InvalidBaseUrl {}

/// Normalizes `base_url` and rejects anything that is not http(s).
pub fn validate_base_url(base_url: &str) -> Result<String, InvalidBaseUrl> {
    let normalized = normalize_base_url(base_url);
    let lower = normalized.to_ascii_lowercase();
    let host = lower
        .strip_prefix("http://")
        .or_else(|| lower.strip_prefix("https://"));

    match host {
        Some(rest) if !rest.is_empty() && !rest.starts_with('/') => Ok(normalized),
        _ => Err(InvalidBaseUrl(base_url.to_string())),
    }
}
