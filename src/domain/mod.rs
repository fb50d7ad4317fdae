//! Domain layer - Core business objects and collaborator abstractions
//! 
//! This layer contains:
//! - Entities: Users, inbound events, embeds, arguments, the command tree
//! - Traits: Abstractions for the messaging platform (Bot)

pub mod entities;
pub mod traits;
