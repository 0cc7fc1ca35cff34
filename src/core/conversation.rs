//! In-process conversation state: the chat list, each chat's transcript and
//! the pending indicator shown while a reply is streaming.
//!
//! Streamed text reaches the store through [`TranscriptSink`], which is the
//! [`StreamHandler`] for a single chat. Only [`ConversationStore::persisted`]
//! crosses the persistence boundary.

use std::error::Error;
use std::fmt;

use tracing::{debug, warn};

use crate::api::{Chat, ChatMessage};
use crate::core::chat_stream::{StreamError, StreamHandler};
use crate::core::message::Message;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationError {
    UnknownChat(String),
    AlreadySending(String),
}

impl fmt::Display for ConversationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationError::UnknownChat(id) => write!(f, "Unknown chat: {id}"),
            ConversationError::AlreadySending(id) => {
                write!(f, "Chat {id} is still waiting for a reply")
            }
        }
    }
}

impl Error for ConversationError {}

#[derive(Debug, Clone)]
pub struct ConversationEntry {
    pub chat: Chat,
    pub is_sending: bool,
    pub transcript: Vec<Message>,
}

impl ConversationEntry {
    fn new(chat: Chat) -> Self {
        Self {
            chat,
            is_sending: false,
            transcript: Vec::new(),
        }
    }

    fn drop_empty_placeholder(&mut self) {
        if self
            .transcript
            .last()
            .is_some_and(|message| message.is_assistant() && message.content.is_empty())
        {
            self.transcript.pop();
        }
    }
}

#[derive(Debug, Default)]
pub struct ConversationStore {
    entries: Vec<ConversationEntry>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_persisted(chats: Vec<Chat>) -> Self {
        Self {
            entries: chats.into_iter().map(ConversationEntry::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn chats(&self) -> impl Iterator<Item = &Chat> {
        self.entries.iter().map(|entry| &entry.chat)
    }

    pub fn entry(&self, chat_id: &str) -> Option<&ConversationEntry> {
        self.entries.iter().find(|entry| entry.chat.id == chat_id)
    }

    fn entry_mut(&mut self, chat_id: &str) -> Option<&mut ConversationEntry> {
        self.entries.iter_mut().find(|entry| entry.chat.id == chat_id)
    }

    pub fn is_sending(&self, chat_id: &str) -> bool {
        self.entry(chat_id).is_some_and(|entry| entry.is_sending)
    }

    /// Replaces the chat list with a fresh copy from the backend.
    ///
    /// Transcripts of chats that are still listed are kept; every pending
    /// indicator is reset.
    pub fn replace_chats(&mut self, chats: Vec<Chat>) {
        let mut previous = std::mem::take(&mut self.entries);
        self.entries = chats
            .into_iter()
            .map(|chat| {
                let transcript = previous
                    .iter_mut()
                    .find(|entry| entry.chat.id == chat.id)
                    .map(|entry| std::mem::take(&mut entry.transcript))
                    .unwrap_or_default();
                ConversationEntry {
                    chat,
                    is_sending: false,
                    transcript,
                }
            })
            .collect();
    }

    /// Puts `chat` at the top of the list, replacing an entry with the same id.
    pub fn add_chat(&mut self, chat: Chat) {
        self.entries.retain(|entry| entry.chat.id != chat.id);
        self.entries.insert(0, ConversationEntry::new(chat));
    }

    /// Returns the entry for `chat_id`, creating an untitled one if needed.
    pub fn ensure_chat(&mut self, chat_id: &str) -> &mut ConversationEntry {
        let index = match self.entries.iter().position(|entry| entry.chat.id == chat_id) {
            Some(index) => index,
            None => {
                self.entries.push(ConversationEntry::new(Chat::untitled(chat_id)));
                self.entries.len() - 1
            }
        };
        &mut self.entries[index]
    }

    pub fn rename(&mut self, chat_id: &str, title: &str) -> bool {
        match self.entry_mut(chat_id) {
            Some(entry) => {
                entry.chat.title = title.to_string();
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, chat_id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.chat.id != chat_id);
        self.entries.len() != before
    }

    /// Loads a backend history into the transcript, skipping unknown roles.
    pub fn set_history(&mut self, chat_id: &str, history: Vec<ChatMessage>) -> bool {
        let Some(entry) = self.entry_mut(chat_id) else {
            return false;
        };
        entry.transcript = history
            .into_iter()
            .filter_map(|message| match Message::try_from(message) {
                Ok(message) => Some(message),
                Err(err) => {
                    warn!(chat_id, error = %err, "Skipping history entry");
                    None
                }
            })
            .collect();
        true
    }

    /// Records the prompt, opens an empty assistant reply and raises the
    /// pending indicator.
    pub fn begin_send(&mut self, chat_id: &str, prompt: &str) -> Result<(), ConversationError> {
        let entry = self
            .entry_mut(chat_id)
            .ok_or_else(|| ConversationError::UnknownChat(chat_id.to_string()))?;
        if entry.is_sending {
            return Err(ConversationError::AlreadySending(chat_id.to_string()));
        }
        entry.transcript.push(Message::user(prompt));
        entry.transcript.push(Message::assistant(String::new()));
        entry.is_sending = true;
        Ok(())
    }

    pub fn append_chunk(&mut self, chat_id: &str, chunk: &str) {
        let Some(entry) = self.entry_mut(chat_id) else {
            return;
        };
        match entry.transcript.last_mut() {
            Some(last) if last.is_assistant() => last.content.push_str(chunk),
            _ => entry.transcript.push(Message::assistant(chunk)),
        }
    }

    pub fn finish_send(&mut self, chat_id: &str) {
        if let Some(entry) = self.entry_mut(chat_id) {
            entry.drop_empty_placeholder();
            entry.is_sending = false;
        }
    }

    /// Rolls back the pending indicator; a visible error is kept in the
    /// transcript.
    pub fn fail_send(&mut self, chat_id: &str, error: &StreamError) {
        let Some(entry) = self.entry_mut(chat_id) else {
            return;
        };
        entry.drop_empty_placeholder();
        entry.is_sending = false;
        if error.is_user_visible() {
            entry.transcript.push(Message::app_error(error.to_string()));
        }
    }

    /// Chat summaries without the transient pending indicator.
    pub fn persisted(&self) -> Vec<Chat> {
        self.entries.iter().map(|entry| entry.chat.clone()).collect()
    }

    pub fn sink(&mut self, chat_id: impl Into<String>) -> TranscriptSink<'_> {
        TranscriptSink {
            store: self,
            chat_id: chat_id.into(),
        }
    }
}

/// Writes a streamed reply into one chat of a [`ConversationStore`].
pub struct TranscriptSink<'a> {
    store: &'a mut ConversationStore,
    chat_id: String,
}

impl StreamHandler for TranscriptSink<'_> {
    fn on_message(&mut self, payload: String) {
        self.store.append_chunk(&self.chat_id, &payload);
    }

    fn on_complete(&mut self) {
        debug!(chat_id = %self.chat_id, "Reply complete");
        self.store.finish_send(&self.chat_id);
    }

    fn on_error(&mut self, error: StreamError) {
        self.store.fail_send(&self.chat_id, &error);
    }

    fn on_cancelled(&mut self) {
        self.store.fail_send(&self.chat_id, &StreamError::Cancelled);
    }
}
