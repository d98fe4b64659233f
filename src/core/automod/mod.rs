// Core automod module - the detection pipeline.
// Pure domain logic; the Discord layer feeds it `GuildMessage`s.

pub mod automod_models;
pub mod automod_service;
mod detectors;
pub mod tracker;

pub use automod_models::*;
pub use automod_service::*;
