// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "automod/mod.rs"]
pub mod automod;

#[path = "config/mod.rs"]
pub mod config;

#[path = "locale/mod.rs"]
pub mod locale;

#[path = "moderation/mod.rs"]
pub mod moderation;

#[path = "modlog/mod.rs"]
pub mod modlog;
