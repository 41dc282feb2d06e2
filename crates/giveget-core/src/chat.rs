//! Chat and real-time notification port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A chat message as stored by the chat system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message id.
    pub id: i64,
    /// Author.
    pub sender_id: i64,
    /// Recipient.
    pub receiver_id: i64,
    /// The listing the conversation is about.
    pub listing_id: i64,
    /// Message body.
    pub text: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Outbound messaging capability.
#[async_trait]
pub trait ChatSink: Send + Sync {
    /// Stores a chat message and returns it.
    async fn post_message(
        &self,
        sender_id: i64,
        receiver_id: i64,
        listing_id: i64,
        text: &str,
    ) -> Result<ChatMessage, DomainError>;

    /// Delivers a real-time event to a connected user. Delivery to an
    /// offline user is not an error.
    async fn push_to_user(
        &self,
        user_id: i64,
        event: &serde_json::Value,
    ) -> Result<(), DomainError>;
}
