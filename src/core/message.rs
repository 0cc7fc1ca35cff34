use serde::{Deserialize, Serialize};

use crate::api::ChatMessage;

/// Who a transcript line belongs to. `AppInfo` and `AppError` are notes the
/// client adds itself and are never sent to or accepted from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TranscriptRole {
    User,
    Assistant,
    System,
    AppInfo,
    AppError,
}

impl TranscriptRole {
    const BACKEND_ROLES: [TranscriptRole; 3] = [
        TranscriptRole::User,
        TranscriptRole::Assistant,
        TranscriptRole::System,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TranscriptRole::User => "user",
            TranscriptRole::Assistant => "assistant",
            TranscriptRole::System => "system",
            TranscriptRole::AppInfo => "app/info",
            TranscriptRole::AppError => "app/error",
        }
    }

    /// Parses a role string sent by the backend.
    pub fn from_backend(role: &str) -> Option<Self> {
        Self::BACKEND_ROLES
            .into_iter()
            .find(|candidate| candidate.as_str() == role)
    }

    /// Prefix used when printing a transcript line.
    pub fn label(self) -> &'static str {
        match self {
            TranscriptRole::User => "You",
            TranscriptRole::Assistant => "Assistant",
            TranscriptRole::System => "System",
            TranscriptRole::AppInfo => "Info",
            TranscriptRole::AppError => "Error",
        }
    }
}

impl TryFrom<String> for TranscriptRole {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "app/info" => Ok(TranscriptRole::AppInfo),
            "app/error" => Ok(TranscriptRole::AppError),
            other => Self::from_backend(other)
                .ok_or_else(|| format!("invalid transcript role: {other}")),
        }
    }
}

impl From<TranscriptRole> for String {
    fn from(value: TranscriptRole) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: TranscriptRole,
    pub content: String,
}

impl Message {
    pub fn new(role: TranscriptRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TranscriptRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(TranscriptRole::Assistant, content)
    }

    pub fn app_info(content: impl Into<String>) -> Self {
        Self::new(TranscriptRole::AppInfo, content)
    }

    pub fn app_error(content: impl Into<String>) -> Self {
        Self::new(TranscriptRole::AppError, content)
    }

    pub fn is_assistant(&self) -> bool {
        self.role == TranscriptRole::Assistant
    }
}

impl TryFrom<ChatMessage> for Message {
    type Error = String;

    fn try_from(value: ChatMessage) -> Result<Self, Self::Error> {
        let role = TranscriptRole::from_backend(&value.role)
            .ok_or_else(|| format!("unexpected role from backend: {}", value.role))?;
        Ok(Self::new(role, value.content))
    }
}
