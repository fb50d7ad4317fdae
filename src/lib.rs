//! Command routing for chat bots: prefix and alias recognition, argument
//! tokenization, sub-command resolution, middleware and per-user rate limiting.

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use application::errors::BotError;
pub use application::messaging::{Context, Dispatch, Router, RouterBuilder};
pub use domain::entities::{Arguments, Command, MessageEvent};
pub use domain::traits::Bot;
