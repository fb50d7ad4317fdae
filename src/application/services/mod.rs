//! Application services - Built-in commands

pub mod help;

pub use help::{HelpPaginator, HELP_STORAGE};
