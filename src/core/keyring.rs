use std::error::Error;
use std::fmt;
use std::sync::Mutex;

use keyring::Entry;

pub const KEYRING_SERVICE: &str = "streamchat";
pub const DEFAULT_ACCOUNT: &str = "default";

/// Describes failures when attempting to access the system keyring.
///
/// Recoverable errors indicate that the credential backend was
/// temporarily unavailable (for example when the keychain service is
/// locked or inaccessible). Permanent errors surface the underlying
/// cause directly so callers can report them to the user.
#[derive(Debug)]
pub enum KeyringAccessError {
    Recoverable(keyring::Error),
    Permanent(keyring::Error),
}

impl KeyringAccessError {
    fn inner(&self) -> &keyring::Error {
        match self {
            KeyringAccessError::Recoverable(err) | KeyringAccessError::Permanent(err) => err,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, KeyringAccessError::Recoverable(_))
    }
}

impl From<keyring::Error> for KeyringAccessError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::PlatformFailure(_) | keyring::Error::NoStorageAccess(_) => {
                KeyringAccessError::Recoverable(err)
            }
            other => KeyringAccessError::Permanent(other),
        }
    }
}

impl fmt::Display for KeyringAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner())
    }
}

impl Error for KeyringAccessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.inner())
    }
}

/// Where the bearer token lives between runs.
///
/// Read once when a session starts; streaming and REST calls only see the
/// token through the session.
pub trait CredentialStore {
    fn load_token(&self, account: &str) -> Result<Option<String>, KeyringAccessError>;
    fn store_token(&self, account: &str, token: &str) -> Result<(), KeyringAccessError>;
    /// Returns false when there was nothing to remove.
    fn remove_token(&self, account: &str) -> Result<bool, KeyringAccessError>;
}

#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service: String,
}

impl KeyringCredentialStore {
    pub fn new() -> Self {
        Self {
            service: KEYRING_SERVICE.to_string(),
        }
    }

    fn entry(&self, account: &str) -> Result<Entry, KeyringAccessError> {
        Entry::new(&self.service, account).map_err(KeyringAccessError::from)
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn load_token(&self, account: &str) -> Result<Option<String>, KeyringAccessError> {
        match self.entry(account)?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn store_token(&self, account: &str, token: &str) -> Result<(), KeyringAccessError> {
        self.entry(account)?
            .set_password(token)
            .map_err(KeyringAccessError::from)
    }

    fn remove_token(&self, account: &str) -> Result<bool, KeyringAccessError> {
        match self.entry(account)?.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

/// In-process store for tests and callers that manage tokens themselves.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    tokens: Mutex<Vec<(String, String)>>,
}

impl MemoryCredentialStore {
    pub fn with_token(account: &str, token: &str) -> Self {
        Self {
            tokens: Mutex::new(vec![(account.to_string(), token.to_string())]),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load_token(&self, account: &str) -> Result<Option<String>, KeyringAccessError> {
        let tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        Ok(tokens
            .iter()
            .find(|(name, _)| name == account)
            .map(|(_, token)| token.clone()))
    }

    fn store_token(&self, account: &str, token: &str) -> Result<(), KeyringAccessError> {
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        tokens.retain(|(name, _)| name != account);
        tokens.push((account.to_string(), token.to_string()));
        Ok(())
    }

    fn remove_token(&self, account: &str) -> Result<bool, KeyringAccessError> {
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        let before = tokens.len();
        tokens.retain(|(name, _)| name != account);
        Ok(tokens.len() != before)
    }
}
