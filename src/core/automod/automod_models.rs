// Automod domain models - data structures for the detection pipeline.
//
// These are pure domain types with no Discord dependencies.
// The Discord layer converts gateway messages into `GuildMessage` and
// converts `Violation`s back into platform actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("invite lookup failed: {0}")]
    InviteLookup(String),

    #[error("invite lookup timed out")]
    InviteTimeout,
}

/// A cheap reference to a message, enough to delete it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub channel_id: u64,
    pub message_id: u64,
}

/// A user mentioned in a message.
#[derive(Debug, Clone, Copy)]
pub struct MentionRef {
    pub user_id: u64,
    pub is_bot: bool,
}

/// A guild message as the core sees it. Read-only: detectors never mutate
/// the transport object, normalization produces a derived copy.
#[derive(Debug, Clone)]
pub struct GuildMessage {
    pub message_id: u64,
    pub guild_id: u64,
    pub channel_id: u64,
    pub author_id: u64,
    pub author_is_bot: bool,
    pub author_is_webhook: bool,
    pub author_is_owner: bool,
    pub author_is_admin: bool,
    pub author_role_ids: Vec<u64>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub mentions: Vec<MentionRef>,
}

impl GuildMessage {
    pub fn msg_ref(&self) -> MessageRef {
        MessageRef {
            channel_id: self.channel_id,
            message_id: self.message_id,
        }
    }

    /// Mentions that count towards mass-mention tracking: other humans.
    pub fn counted_mentions(&self) -> u32 {
        self.mentions
            .iter()
            .filter(|m| !m.is_bot && m.user_id != self.author_id)
            .count() as u32
    }
}

/// The violation categories the detector set can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    Invite,
    DuplicateText,
    Phishing,
    Zalgo,
    Spam,
    MassMention,
    BannedWords,
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationKind::Invite => write!(f, "Invite Link"),
            ViolationKind::DuplicateText => write!(f, "Duplicate Text"),
            ViolationKind::Phishing => write!(f, "Phishing Link"),
            ViolationKind::Zalgo => write!(f, "Zalgo"),
            ViolationKind::Spam => write!(f, "Spam"),
            ViolationKind::MassMention => write!(f, "Mass Mention"),
            ViolationKind::BannedWords => write!(f, "Banned Words"),
        }
    }
}

/// Ephemeral result of a detector match. Produced by one detector,
/// consumed once by the action dispatcher, never persisted directly.
#[derive(Debug, Clone)]
pub struct Violation {
    pub guild_id: u64,
    pub user_id: u64,
    pub kind: ViolationKind,
    pub at: DateTime<Utc>,
    pub channel_id: u64,
    pub message_id: u64,
    /// Accumulated messages for bulk deletion (spam / mass mention).
    pub bulk: Vec<MessageRef>,
    /// Template variables for the localized reason / response.
    pub vars: HashMap<String, String>,
}

impl Violation {
    pub fn new(kind: ViolationKind, msg: &GuildMessage) -> Self {
        Self {
            guild_id: msg.guild_id,
            user_id: msg.author_id,
            kind,
            at: Utc::now(),
            channel_id: msg.channel_id,
            message_id: msg.message_id,
            bulk: Vec::new(),
            vars: HashMap::new(),
        }
    }

    pub fn var(mut self, key: &str, value: impl Into<String>) -> Self {
        self.vars.insert(key.to_string(), value.into());
        self
    }

    pub fn with_bulk(mut self, bulk: Vec<MessageRef>) -> Self {
        self.bulk = bulk;
        self
    }
}

/// Configured enforcement level for a detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Verbal,
    Warn,
    Mute,
    Kick,
    Softban,
    Ban,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Action::Verbal => "Verbal",
            Action::Warn => "Warn",
            Action::Mute => "Mute",
            Action::Kick => "Kick",
            Action::Softban => "Softban",
            Action::Ban => "Ban",
        };
        write!(f, "{name}")
    }
}

/// One whitelist entry, stored as a tagged string (`CHANNEL-<id>`,
/// `ROLE-<id>`, `USER-<id>`) in persisted config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WhitelistEntry {
    Channel(u64),
    Role(u64),
    User(u64),
}

impl From<WhitelistEntry> for String {
    fn from(entry: WhitelistEntry) -> Self {
        match entry {
            WhitelistEntry::Channel(id) => format!("CHANNEL-{id}"),
            WhitelistEntry::Role(id) => format!("ROLE-{id}"),
            WhitelistEntry::User(id) => format!("USER-{id}"),
        }
    }
}

impl TryFrom<String> for WhitelistEntry {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let (tag, id) = value
            .split_once('-')
            .ok_or_else(|| format!("malformed whitelist entry: {value}"))?;
        let id: u64 = id
            .parse()
            .map_err(|_| format!("malformed whitelist entry: {value}"))?;
        match tag {
            "CHANNEL" => Ok(WhitelistEntry::Channel(id)),
            "ROLE" => Ok(WhitelistEntry::Role(id)),
            "USER" => Ok(WhitelistEntry::User(id)),
            _ => Err(format!("unknown whitelist tag: {tag}")),
        }
    }
}

/// Check whether a message's author or channel is exempted by a whitelist.
pub fn is_whitelisted(entries: &[WhitelistEntry], msg: &GuildMessage) -> bool {
    entries.iter().any(|entry| match entry {
        WhitelistEntry::Channel(id) => *id == msg.channel_id,
        WhitelistEntry::Role(id) => msg.author_role_ids.contains(id),
        WhitelistEntry::User(id) => *id == msg.author_id,
    })
}

/// Per-detector configuration shared by all seven detectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub enabled: bool,
    pub action: Action,
    /// Delete the triggering message(s) when the detector fires.
    pub delete_message: bool,
    pub whitelist: Vec<WhitelistEntry>,
}

impl DetectorConfig {
    fn new(enabled: bool, action: Action, delete_message: bool) -> Self {
        Self {
            enabled,
            action,
            delete_message,
            whitelist: Vec::new(),
        }
    }
}

/// Per-guild automod configuration. One composed struct with named
/// sub-sections instead of one flat dynamic bag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomodConfig {
    pub module_enabled: bool,
    /// Applies to every detector, checked before any per-detector list.
    pub global_whitelist: Vec<WhitelistEntry>,

    /// Default timeout length applied by automod mutes, in seconds.
    pub mute_duration_secs: u64,
    /// Default ban expiry recorded on automod bans, in seconds.
    pub ban_duration_secs: u64,

    pub invite: DetectorConfig,
    pub invite_code_whitelist: Vec<String>,

    pub dup_text: DetectorConfig,
    /// Repeats required before duplicate-text fires (2 = fire on first repeat).
    pub dup_text_amount: u32,
    pub dup_text_duration_secs: u64,

    pub spam: DetectorConfig,
    pub spam_amount: u32,
    pub spam_duration_secs: u64,

    pub mass_mention: DetectorConfig,
    pub mass_mention_amount: u32,
    pub mass_mention_duration_secs: u64,

    pub phishing: DetectorConfig,

    pub zalgo: DetectorConfig,

    pub badwords: DetectorConfig,
    pub badwords_blocked: Vec<String>,
    pub badwords_allowed: Vec<String>,
}

impl Default for AutomodConfig {
    fn default() -> Self {
        Self {
            module_enabled: false,
            global_whitelist: Vec::new(),
            mute_duration_secs: 600,    // 10 minutes
            ban_duration_secs: 86_400,  // 1 day
            invite: DetectorConfig::new(true, Action::Warn, true),
            invite_code_whitelist: Vec::new(),
            dup_text: DetectorConfig::new(true, Action::Verbal, false),
            dup_text_amount: 2,
            dup_text_duration_secs: 60,
            spam: DetectorConfig::new(true, Action::Mute, true),
            spam_amount: 7,
            spam_duration_secs: 5,
            mass_mention: DetectorConfig::new(true, Action::Mute, true),
            mass_mention_amount: 7,
            mass_mention_duration_secs: 5,
            phishing: DetectorConfig::new(true, Action::Ban, true),
            zalgo: DetectorConfig::new(true, Action::Warn, true),
            badwords: DetectorConfig::new(true, Action::Warn, true),
            badwords_blocked: Vec::new(),
            badwords_allowed: Vec::new(),
        }
    }
}

impl AutomodConfig {
    /// The config slice for a violation category. Total over the enum so a
    /// new detector cannot be forgotten here.
    pub fn slice(&self, kind: ViolationKind) -> &DetectorConfig {
        match kind {
            ViolationKind::Invite => &self.invite,
            ViolationKind::DuplicateText => &self.dup_text,
            ViolationKind::Phishing => &self.phishing,
            ViolationKind::Zalgo => &self.zalgo,
            ViolationKind::Spam => &self.spam,
            ViolationKind::MassMention => &self.mass_mention,
            ViolationKind::BannedWords => &self.badwords,
        }
    }

    pub fn slice_mut(&mut self, kind: ViolationKind) -> &mut DetectorConfig {
        match kind {
            ViolationKind::Invite => &mut self.invite,
            ViolationKind::DuplicateText => &mut self.dup_text,
            ViolationKind::Phishing => &mut self.phishing,
            ViolationKind::Zalgo => &mut self.zalgo,
            ViolationKind::Spam => &mut self.spam,
            ViolationKind::MassMention => &mut self.mass_mention,
            ViolationKind::BannedWords => &mut self.badwords,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> GuildMessage {
        GuildMessage {
            message_id: 1,
            guild_id: 10,
            channel_id: 20,
            author_id: 30,
            author_is_bot: false,
            author_is_webhook: false,
            author_is_owner: false,
            author_is_admin: false,
            author_role_ids: vec![100, 101],
            content: "hello".to_string(),
            created_at: Utc::now(),
            mentions: Vec::new(),
        }
    }

    #[test]
    fn whitelist_entry_round_trips_through_tagged_string() {
        let entry = WhitelistEntry::Role(42);
        let s: String = entry.into();
        assert_eq!(s, "ROLE-42");
        assert_eq!(WhitelistEntry::try_from(s).unwrap(), entry);

        assert!(WhitelistEntry::try_from("GIBBERISH".to_string()).is_err());
        assert!(WhitelistEntry::try_from("ROLE-abc".to_string()).is_err());
    }

    #[test]
    fn whitelist_matches_channel_role_and_user() {
        let msg = message();
        assert!(is_whitelisted(&[WhitelistEntry::Channel(20)], &msg));
        assert!(is_whitelisted(&[WhitelistEntry::Role(101)], &msg));
        assert!(is_whitelisted(&[WhitelistEntry::User(30)], &msg));
        assert!(!is_whitelisted(&[WhitelistEntry::Role(999)], &msg));
        assert!(!is_whitelisted(&[], &msg));
    }

    #[test]
    fn counted_mentions_skip_bots_and_self() {
        let mut msg = message();
        msg.mentions = vec![
            MentionRef {
                user_id: 30,
                is_bot: false,
            },
            MentionRef {
                user_id: 31,
                is_bot: true,
            },
            MentionRef {
                user_id: 32,
                is_bot: false,
            },
        ];
        assert_eq!(msg.counted_mentions(), 1);
    }
}
