// Guild configuration module.

pub mod config_models;
pub mod config_service;

pub use config_models::*;
pub use config_service::*;
