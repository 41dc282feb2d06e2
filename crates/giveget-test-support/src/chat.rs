//! Test chat sinks.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use giveget_core::chat::{ChatMessage, ChatSink};
use giveget_core::error::DomainError;

/// A chat sink that keeps every posted message and push in memory.
#[derive(Debug, Default)]
pub struct RecordingChatSink {
    messages: Mutex<Vec<ChatMessage>>,
    pushes: Mutex<Vec<(i64, serde_json::Value)>>,
}

impl RecordingChatSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of posted messages.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.lock().unwrap().clone()
    }

    /// Returns a snapshot of `(user_id, event)` pushes.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn pushes(&self) -> Vec<(i64, serde_json::Value)> {
        self.pushes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatSink for RecordingChatSink {
    async fn post_message(
        &self,
        sender_id: i64,
        receiver_id: i64,
        listing_id: i64,
        text: &str,
    ) -> Result<ChatMessage, DomainError> {
        let mut messages = self.messages.lock().unwrap();
        let message = ChatMessage {
            id: i64::try_from(messages.len()).unwrap_or(i64::MAX - 1) + 1,
            sender_id,
            receiver_id,
            listing_id,
            text: text.to_owned(),
            created_at: Utc::now(),
        };
        messages.push(message.clone());
        Ok(message)
    }

    async fn push_to_user(
        &self,
        user_id: i64,
        event: &serde_json::Value,
    ) -> Result<(), DomainError> {
        self.pushes.lock().unwrap().push((user_id, event.clone()));
        Ok(())
    }
}

/// A chat sink whose every call fails with an infrastructure error.
#[derive(Debug, Default)]
pub struct FailingChatSink;

#[async_trait]
impl ChatSink for FailingChatSink {
    async fn post_message(
        &self,
        _sender_id: i64,
        _receiver_id: i64,
        _listing_id: i64,
        _text: &str,
    ) -> Result<ChatMessage, DomainError> {
        Err(DomainError::Infrastructure("chat service unavailable".into()))
    }

    async fn push_to_user(
        &self,
        _user_id: i64,
        _event: &serde_json::Value,
    ) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("chat service unavailable".into()))
    }
}
