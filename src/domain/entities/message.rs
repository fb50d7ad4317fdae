use super::User;
use chrono::{DateTime, Utc};

/// A message created in a channel
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub id: String,
    pub channel_id: String,
    pub author: User,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl MessageEvent {
    pub fn new(channel_id: impl Into<String>, author: User, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            channel_id: channel_id.into(),
            author,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A reaction added to a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionEvent {
    pub channel_id: String,
    pub message_id: String,
    pub user_id: String,
    pub emoji: String,
}

impl ReactionEvent {
    pub fn new(
        channel_id: impl Into<String>,
        message_id: impl Into<String>,
        user_id: impl Into<String>,
        emoji: impl Into<String>,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            message_id: message_id.into(),
            user_id: user_id.into(),
            emoji: emoji.into(),
        }
    }
}

/// Inbound platform event
#[derive(Debug, Clone)]
pub enum Event {
    Message(MessageEvent),
    Reaction(ReactionEvent),
}
