//! Infrastructure layer - External concerns
//! 
//! This layer contains:
//! - Config: Configuration loading
//! - Adapters: Platform integrations (console)

pub mod config;
pub mod adapters;
