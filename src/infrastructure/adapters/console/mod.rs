//! Console adapter for development/testing

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use crate::domain::entities::{Embed, Event, MessageEvent, ReactionEvent, User};
use crate::domain::traits::{Bot, BotInfo};
use crate::application::errors::BotError;

const CHANNEL: &str = "console";
const REACT_COMMAND: &str = ":react";

/// Console bot adapter for local development
pub struct ConsoleAdapter {
    info: BotInfo,
    user: User,
}

impl ConsoleAdapter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            info: BotInfo {
                id: "0".to_string(),
                name: name.into(),
                username: "console".to_string(),
            },
            user: User::new("1").with_username("you"),
        }
    }

    /// Read stdin until EOF, turning each line into an inbound event.
    /// `:react <message id> <emoji>` produces a reaction instead of a message.
    pub async fn read_events(&self, events: mpsc::Sender<Event>) -> Result<(), BotError> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        while let Some(line) = lines.next_line().await? {
            let Some(event) = self.parse_line(&line) else {
                continue;
            };
            if events.send(event).await.is_err() {
                break;
            }
        }

        tracing::info!("Console input closed");
        Ok(())
    }

    fn parse_line(&self, line: &str) -> Option<Event> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return None;
        }

        if let Some(rest) = line.strip_prefix(REACT_COMMAND) {
            let mut parts = rest.split_whitespace();
            let (Some(message_id), Some(emoji)) = (parts.next(), parts.next()) else {
                println!("Usage: {} <message id> <emoji>", REACT_COMMAND);
                return None;
            };
            return Some(Event::Reaction(ReactionEvent::new(CHANNEL, message_id, &self.user.id, emoji)));
        }

        Some(Event::Message(MessageEvent::new(CHANNEL, self.user.clone(), line)))
    }

    fn print(&self, text: &str) -> String {
        let id = short_id();
        println!("[BOT #{}] {}", id, text);
        id
    }
}

impl Default for ConsoleAdapter {
    fn default() -> Self {
        Self::new("chat-router")
    }
}

fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn render(embed: &Embed) -> Result<String, BotError> {
    serde_json::to_string_pretty(embed).map_err(|e| BotError::Delivery(e.to_string()))
}

#[async_trait]
impl Bot for ConsoleAdapter {
    fn bot_info(&self) -> BotInfo {
        self.info.clone()
    }

    async fn send_message(&self, _channel_id: &str, text: &str) -> Result<String, BotError> {
        Ok(self.print(text))
    }

    async fn send_embed(&self, _channel_id: &str, embed: &Embed) -> Result<String, BotError> {
        Ok(self.print(&render(embed)?))
    }

    async fn send_complex(&self, _channel_id: &str, text: &str, embed: &Embed) -> Result<String, BotError> {
        Ok(self.print(&format!("{}\n{}", text, render(embed)?)))
    }

    async fn edit_embed(&self, _channel_id: &str, message_id: &str, embed: &Embed) -> Result<(), BotError> {
        println!("[BOT #{} edited] {}", message_id, render(embed)?);
        Ok(())
    }

    async fn delete_message(&self, _channel_id: &str, message_id: &str) -> Result<(), BotError> {
        println!("[BOT #{} deleted]", message_id);
        Ok(())
    }

    async fn add_reaction(&self, _channel_id: &str, message_id: &str, emoji: &str) -> Result<(), BotError> {
        println!("[BOT #{}] +{}", message_id, emoji);
        Ok(())
    }

    async fn remove_reaction(&self, _channel_id: &str, message_id: &str, emoji: &str, _user_id: &str) -> Result<(), BotError> {
        println!("[BOT #{}] -{}", message_id, emoji);
        Ok(())
    }
}
