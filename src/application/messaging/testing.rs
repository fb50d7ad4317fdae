//! Test doubles shared by the messaging unit tests

use std::sync::Arc;
use async_trait::async_trait;

use crate::application::errors::BotError;
use crate::domain::entities::{Arguments, Command, Embed, MessageEvent, User};
use crate::domain::traits::{Bot, BotInfo};
use super::context::Context;
use super::router::Router;

/// Bot that accepts everything and records nothing
pub struct NullBot;

#[async_trait]
impl Bot for NullBot {
    fn bot_info(&self) -> BotInfo {
        BotInfo {
            id: "0".to_string(),
            name: "null".to_string(),
            username: "null".to_string(),
        }
    }

    async fn send_message(&self, _channel_id: &str, _text: &str) -> Result<String, BotError> {
        Ok("null".to_string())
    }

    async fn send_embed(&self, _channel_id: &str, _embed: &Embed) -> Result<String, BotError> {
        Ok("null".to_string())
    }

    async fn send_complex(&self, _channel_id: &str, _text: &str, _embed: &Embed) -> Result<String, BotError> {
        Ok("null".to_string())
    }

    async fn edit_embed(&self, _channel_id: &str, _message_id: &str, _embed: &Embed) -> Result<(), BotError> {
        Ok(())
    }

    async fn delete_message(&self, _channel_id: &str, _message_id: &str) -> Result<(), BotError> {
        Ok(())
    }

    async fn add_reaction(&self, _channel_id: &str, _message_id: &str, _emoji: &str) -> Result<(), BotError> {
        Ok(())
    }

    async fn remove_reaction(&self, _channel_id: &str, _message_id: &str, _emoji: &str, _user_id: &str) -> Result<(), BotError> {
        Ok(())
    }
}

/// Context executing `command` with `raw` arguments on an empty router
pub fn context_for(bot: Arc<dyn Bot>, command: Command, raw: &str) -> Context {
    let event = Arc::new(MessageEvent::new("channel", User::new("user"), raw));
    let mut ctx = Context::new(Router::builder().build(), bot, event, Arguments::parse(raw));
    ctx.command = Some(Arc::new(command));
    ctx
}
