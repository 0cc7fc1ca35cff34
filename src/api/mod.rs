use serde::{Deserialize, Serialize};

pub mod client;

pub use client::{ApiClient, ApiError, ApiRequest, Method, RequestData};

pub const ROLE_USER: &str = "user";

/// Conversation summary as returned by `GET /chats` and `POST /chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Chat {
    /// A chat known only by id, e.g. one named on the command line.
    pub fn untitled(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            owner_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            "(untitled)"
        } else {
            &self.title
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Body of the streaming `POST /chat/messages` call.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest {
    pub chat_id: String,
    pub role: String,
    pub content: String,
}

impl SendMessageRequest {
    pub fn user(chat_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            role: ROLE_USER.to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RenameChatRequest {
    pub chat_id: String,
    pub title: String,
}
