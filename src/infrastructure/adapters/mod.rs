//! Messaging platform adapters

pub mod console;
