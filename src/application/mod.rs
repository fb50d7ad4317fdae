//! Application layer - Command dispatch and services
//! 
//! This layer contains:
//! - Errors: Domain-specific errors
//! - Messaging: Context, middleware, rate limiting, routing
//! - Services: The default help command

pub mod errors;
pub mod messaging;
pub mod services;
