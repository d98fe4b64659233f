// Core moderation module - punishment resolution and enforcement.

pub mod action_service;
pub mod moderation_models;

pub use action_service::*;
pub use moderation_models::*;
