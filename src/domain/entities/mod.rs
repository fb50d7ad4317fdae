//! Domain entities - Core business objects

pub mod user;
pub mod message;
pub mod embed;
pub mod arguments;
pub mod command;
mod languages;

pub use user::User;
pub use message::{Event, MessageEvent, ReactionEvent};
pub use embed::{Embed, EmbedField};
pub use arguments::{Argument, Arguments, Codeblock};
pub use command::Command;
