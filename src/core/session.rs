//! Session context shared by every backend call.
//!
//! A [`Session`] is created when the application starts, handed to the API
//! client and the stream orchestrator by reference, and consumed by
//! [`Session::teardown`] when the application exits. Nothing reads the token
//! from ambient global state.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::keyring::{CredentialStore, KeyringAccessError, DEFAULT_ACCOUNT};

pub const TOKEN_ENV_VAR: &str = "STREAMCHAT_TOKEN";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Explicit,
    Environment,
    Keyring,
}

impl TokenSource {
    pub fn describe(self) -> &'static str {
        match self {
            TokenSource::Explicit => "command line",
            TokenSource::Environment => TOKEN_ENV_VAR,
            TokenSource::Keyring => "system keyring",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionInit {
    /// Token given explicitly (e.g. `--token`). Wins over everything else.
    pub token: Option<String>,
    /// Token read from [`TOKEN_ENV_VAR`] by the caller.
    pub env_token: Option<String>,
    pub username: Option<String>,
    pub remember_me: bool,
    /// Skip the credential store lookup entirely.
    pub skip_store: bool,
}

/// The subset of session state that outlives the process.
///
/// The token is session-scoped and never part of it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Debug)]
pub struct Session {
    token: Option<String>,
    token_source: Option<TokenSource>,
    username: Option<String>,
    remember_me: bool,
}

fn non_empty(token: Option<String>) -> Option<String> {
    token
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl Session {
    pub fn init(
        init: SessionInit,
        credentials: &dyn CredentialStore,
    ) -> Result<Self, KeyringAccessError> {
        let SessionInit {
            token,
            env_token,
            username,
            remember_me,
            skip_store,
        } = init;

        let account = username.as_deref().unwrap_or(DEFAULT_ACCOUNT);

        let (token, token_source) = if let Some(token) = non_empty(token) {
            (Some(token), Some(TokenSource::Explicit))
        } else if let Some(token) = non_empty(env_token) {
            (Some(token), Some(TokenSource::Environment))
        } else if skip_store {
            (None, None)
        } else {
            match credentials.load_token(account) {
                Ok(stored) => match non_empty(stored) {
                    Some(token) => (Some(token), Some(TokenSource::Keyring)),
                    None => (None, None),
                },
                Err(err) if err.is_recoverable() => {
                    warn!(error = %err, "Keyring unavailable, continuing without a stored token");
                    (None, None)
                }
                Err(err) => return Err(err),
            }
        };

        debug!(
            account,
            source = token_source.map(TokenSource::describe),
            "Session initialized"
        );

        Ok(Self {
            token,
            token_source,
            username,
            remember_me,
        })
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn token_source(&self) -> Option<TokenSource> {
        self.token_source
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Keyring account the token is stored under.
    pub fn account(&self) -> &str {
        self.username.as_deref().unwrap_or(DEFAULT_ACCOUNT)
    }

    pub fn remember_me(&self) -> bool {
        self.remember_me
    }

    pub fn persisted(&self) -> PersistedSession {
        PersistedSession {
            username: if self.remember_me {
                self.username.clone()
            } else {
                None
            },
            remember_me: self.remember_me,
        }
    }

    /// Ends the session, dropping the token, and returns what should be kept.
    pub fn teardown(self) -> PersistedSession {
        let persisted = self.persisted();
        debug!(account = self.account(), "Session ended");
        persisted
    }
}
