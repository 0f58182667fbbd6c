//! Joinwarden - Telegram join-request approval service
//!
//! This library provides the approval engine plus the platform adapter,
//! HTTP trigger, and chat-command trigger around it.

pub mod cli;
pub mod config;
pub mod engine;
pub mod platform;
pub mod server;
pub mod trigger;

#[cfg(test)]
pub mod test_utils;

// Re-export Args for the binary
pub use cli::Args;
