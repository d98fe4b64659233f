// Modlog domain models - persisted moderation case records and their
// hydrated form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModlogError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("case {0} not found")]
    CaseNotFound(String),

    /// The guild or a referenced user could not be resolved at all.
    #[error("unknown {0} {1}")]
    EntityNotFound(&'static str, u64),
}

/// The punitive record types a case can carry. Verbal actions never
/// produce a case, so there is no Verbal variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseType {
    Warn,
    Mute,
    Kick,
    Softban,
    Ban,
}

impl std::fmt::Display for CaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CaseType::Warn => "WARN",
            CaseType::Mute => "MUTE",
            CaseType::Kick => "KICK",
            CaseType::Softban => "SOFTBAN",
            CaseType::Ban => "BAN",
        };
        write!(f, "{name}")
    }
}

impl std::str::FromStr for CaseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WARN" => Ok(CaseType::Warn),
            "MUTE" => Ok(CaseType::Mute),
            "KICK" => Ok(CaseType::Kick),
            "SOFTBAN" => Ok(CaseType::Softban),
            "BAN" => Ok(CaseType::Ban),
            other => Err(format!("unknown case type: {other}")),
        }
    }
}

/// Composite case id, the storage key.
pub fn case_id(guild_id: u64, case_number: u32) -> String {
    format!("{guild_id}-{case_number}")
}

/// A persisted case row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: String,
    pub guild_id: u64,
    /// Starts at 1; always max(live numbers) + 1 at creation time.
    pub case_number: u32,
    pub member_id: u64,
    pub moderator_id: u64,
    pub case_type: CaseType,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Input for creating a case; the ledger assigns id and number.
#[derive(Debug, Clone)]
pub struct NewCase {
    pub guild_id: u64,
    pub member_id: u64,
    pub moderator_id: u64,
    pub case_type: CaseType,
    pub reason: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Partial update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct CaseUpdate {
    pub reason: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A user reference resolved through the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUser {
    pub id: u64,
    pub tag: String,
}

/// A fully hydrated case: the record plus resolved guild and user
/// entities, ready for display.
#[derive(Debug, Clone)]
pub struct Modlog {
    pub record: CaseRecord,
    pub guild_name: String,
    pub member: ResolvedUser,
    pub moderator: ResolvedUser,
}

impl std::fmt::Display for Modlog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.record.case_number)
    }
}
