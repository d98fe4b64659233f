// Discord layer - commands, event handlers and the Serenity adapters.

#[path = "commands/command_catalog.rs"]
pub mod commands;

#[path = "moderation/automod_handler.rs"]
pub mod automod_handler;

#[path = "moderation/gateway.rs"]
pub mod gateway;

#[path = "moderation/mod_logger.rs"]
pub mod mod_logger;

// Re-export command types for convenience
pub use commands::moderation::{Context, Data, Error};
