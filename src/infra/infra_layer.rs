// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "config/sqlite_config_store.rs"]
pub mod config;

#[path = "modlog/sqlite_case_store.rs"]
pub mod modlog;

#[path = "phishing/phishing_fetcher.rs"]
pub mod phishing;
