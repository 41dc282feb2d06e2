//! `PostgreSQL` implementation of the `ChatSink` trait.
//!
//! Messages are stored in the `messages` table. Real-time pushes are
//! published on an in-process broadcast channel; whatever transport delivers
//! them to clients subscribes with [`PgChatSink::subscribe`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::broadcast;
use tracing::debug;

use giveget_core::chat::{ChatMessage, ChatSink};
use giveget_core::error::DomainError;

use crate::infrastructure;

/// A real-time event addressed to one user.
#[derive(Debug, Clone, PartialEq)]
pub struct UserPush {
    /// Recipient.
    pub user_id: i64,
    /// Event payload.
    pub event: serde_json::Value,
}

/// Chat sink backed by the `messages` table and a broadcast channel.
#[derive(Debug, Clone)]
pub struct PgChatSink {
    pool: PgPool,
    pushes: broadcast::Sender<UserPush>,
}

impl PgChatSink {
    /// Creates a new `PgChatSink` whose push channel buffers up to
    /// `push_capacity` events per lagging subscriber.
    #[must_use]
    pub fn new(pool: PgPool, push_capacity: usize) -> Self {
        let (pushes, _) = broadcast::channel(push_capacity);
        Self { pool, pushes }
    }

    /// Subscribes to every push published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<UserPush> {
        self.pushes.subscribe()
    }
}

#[async_trait]
impl ChatSink for PgChatSink {
    async fn post_message(
        &self,
        sender_id: i64,
        receiver_id: i64,
        listing_id: i64,
        text: &str,
    ) -> Result<ChatMessage, DomainError> {
        let (id, created_at): (i64, DateTime<Utc>) = sqlx::query_as(
            r"
            INSERT INTO messages (sender_id, receiver_id, listing_id, text)
            VALUES ($1, $2, $3, $4)
            RETURNING id, created_at
            ",
        )
        .bind(sender_id)
        .bind(receiver_id)
        .bind(listing_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await
        .map_err(infrastructure)?;

        Ok(ChatMessage {
            id,
            sender_id,
            receiver_id,
            listing_id,
            text: text.to_owned(),
            created_at,
        })
    }

    async fn push_to_user(
        &self,
        user_id: i64,
        event: &serde_json::Value,
    ) -> Result<(), DomainError> {
        let push = UserPush {
            user_id,
            event: event.clone(),
        };
        if self.pushes.send(push).is_err() {
            debug!(user_id, "no push subscribers connected");
        }
        Ok(())
    }
}
