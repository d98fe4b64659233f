// Moderation case ledger module.

pub mod modlog_models;
pub mod modlog_service;

pub use modlog_models::*;
pub use modlog_service::*;
