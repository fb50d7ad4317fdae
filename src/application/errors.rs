//! Application layer errors

use std::num::ParseIntError;
use thiserror::Error;

/// General bot errors
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Argument error: {0}")]
    Argument(#[from] ArgumentError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Command execution errors
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

/// Argument coercion errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("'{0}' is not a boolean")]
    InvalidBool(String),

    #[error("'{value}' is not an integer: {source}")]
    InvalidInt {
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("'{0}' is not a duration")]
    InvalidDuration(String),
}

/// Context store access errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("No value stored under '{0}'")]
    Missing(String),

    #[error("Value under '{key}' is not a {expected}")]
    TypeMismatch { key: String, expected: &'static str },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
