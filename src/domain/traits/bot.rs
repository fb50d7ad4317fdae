use async_trait::async_trait;
use crate::domain::entities::Embed;
use crate::application::errors::BotError;

/// Bot trait - abstraction for messaging platform adapters
#[async_trait]
pub trait Bot: Send + Sync {
    /// Identity of the running bot
    fn bot_info(&self) -> BotInfo;

    /// Send a message to a channel, returning the new message id
    async fn send_message(&self, channel_id: &str, text: &str) -> Result<String, BotError>;

    /// Send an embed to a channel
    async fn send_embed(&self, channel_id: &str, embed: &Embed) -> Result<String, BotError>;

    /// Send text and an embed as one message
    async fn send_complex(&self, channel_id: &str, text: &str, embed: &Embed) -> Result<String, BotError>;

    /// Replace the embed of a previously sent message
    async fn edit_embed(&self, channel_id: &str, message_id: &str, embed: &Embed) -> Result<(), BotError>;

    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<(), BotError>;

    async fn add_reaction(&self, channel_id: &str, message_id: &str, emoji: &str) -> Result<(), BotError>;

    /// Remove the reaction `emoji` placed by `user_id`
    async fn remove_reaction(&self, channel_id: &str, message_id: &str, emoji: &str, user_id: &str) -> Result<(), BotError>;
}

/// Bot information
#[derive(Debug, Clone)]
pub struct BotInfo {
    pub id: String,
    pub name: String,
    pub username: String,
}

impl BotInfo {
    /// True if `content` is nothing but a mention of this bot
    pub fn is_mentioned_alone(&self, content: &str) -> bool {
        content == format!("<@{}>", self.id) || content == format!("<@!{}>", self.id)
    }
}
