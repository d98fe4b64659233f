// The seven automod detectors. Each consumes one (already normalized)
// message plus the guild's config slice and produces at most one
// `Violation`. Rate-tracking detectors keep their sliding windows in the
// `TrackerCache`; everything else is stateless.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::time::Duration;

use super::automod_models::{AutomodConfig, GuildMessage, MessageRef, Violation, ViolationKind};
use super::automod_service::{AutomodService, InviteResolver};
use super::tracker::{TrackedDetector, TrackerKey, TrackerState};

/// Messages closer together than this count towards the same spam window.
const MAX_GAP_MS: i64 = 2500;

static INVITE_RE: Lazy<Regex> = Lazy::new(|| {
    // The case-insensitive Unicode `\w` repetition compiles past the
    // default 10 MiB program size limit, so raise it.
    RegexBuilder::new(r"(?i)discord(?:(?:app)?\.com/invite|\.gg(?:/invite)?)/([\w-]{2,255})")
        .size_limit(1 << 28)
        .build()
        .expect("invite regex")
});

// A run of three or more combining marks (0xCC/0xCD lead bytes in UTF-8)
// in the percent-encoded form of the text.
static ZALGO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:%C[CD]%[0-9A-F]{2}){3,}").expect("zalgo regex"));

fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len() * 3);
    for byte in input.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~' | b' ') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

impl<R: InviteResolver> AutomodService<R> {
    /// Invite-link detector. The first extracted code that resolves, is
    /// not whitelisted and does not point back to this guild triggers.
    /// Resolution failures are swallowed: an unresolvable code is simply
    /// not an invite.
    pub(crate) async fn detect_invite(
        &self,
        msg: &GuildMessage,
        config: &AutomodConfig,
    ) -> Option<Violation> {
        for caps in INVITE_RE.captures_iter(&msg.content) {
            let code = &caps[1];
            if config
                .invite_code_whitelist
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(code))
            {
                continue;
            }

            let resolved = match self.resolver.resolve_invite(code).await {
                Ok(resolved) => resolved,
                Err(err) => {
                    tracing::debug!(code, error = %err, "invite did not resolve");
                    None
                }
            };
            let Some(invite) = resolved else { continue };
            if invite.guild_id == Some(msg.guild_id) {
                continue;
            }

            return Some(
                Violation::new(ViolationKind::Invite, msg)
                    .var("code", invite.code)
                    .var("channel", format!("<#{}>", msg.channel_id))
                    .var("target", invite.target_name),
            );
        }
        None
    }

    /// Duplicate-text detector. Every message refreshes the cached last
    /// message and slides the window; only a repeat reaching the
    /// configured amount triggers.
    pub(crate) fn detect_duplicate_text(
        &self,
        msg: &GuildMessage,
        config: &AutomodConfig,
    ) -> Option<Violation> {
        let lower = msg.content.to_lowercase();
        let key = TrackerKey {
            detector: TrackedDetector::DupText,
            guild_id: msg.guild_id,
            user_id: msg.author_id,
        };

        let mut fired = false;
        self.tracker.upsert(
            key,
            Duration::from_secs(config.dup_text_duration_secs),
            |prev| {
                let count = match prev {
                    Some(prev) if prev.last_content == lower => prev.count + 1,
                    _ => 1,
                };
                if config.dup_text_amount > 0 && count >= config.dup_text_amount {
                    // Reset on a trigger: the next repeat starts a fresh
                    // count instead of refiring immediately.
                    fired = true;
                    return TrackerState {
                        count: 0,
                        last_content: String::new(),
                        last_at: Some(msg.created_at),
                        messages: Vec::new(),
                    };
                }
                TrackerState {
                    count,
                    last_content: lower.clone(),
                    last_at: Some(msg.created_at),
                    messages: Vec::new(),
                }
            },
        );

        fired.then(|| {
            Violation::new(ViolationKind::DuplicateText, msg)
                .var("count", config.dup_text_amount.to_string())
        })
    }

    /// Phishing-domain detector: case-insensitive substring match against
    /// the two externally refreshed domain lists.
    pub(crate) fn detect_phishing(
        &self,
        msg: &GuildMessage,
        _config: &AutomodConfig,
    ) -> Option<Violation> {
        let content = msg.content.to_lowercase();
        let lists = match self.phishing_lists.read() {
            Ok(lists) => lists,
            Err(_) => return None,
        };

        let hit = lists
            .guaranteed
            .iter()
            .map(|d| (d, "guaranteed"))
            .chain(lists.suspicious.iter().map(|d| (d, "suspicious")))
            .find(|(domain, _)| !domain.is_empty() && content.contains(domain.as_str()));

        hit.map(|(domain, list)| {
            Violation::new(ViolationKind::Phishing, msg)
                .var("domain", domain.clone())
                .var("list", list)
        })
    }

    /// Zalgo detector. Runs on the raw (pre-normalization) content, since
    /// normalization strips the combining marks it looks for.
    pub(crate) fn detect_zalgo(
        &self,
        msg: &GuildMessage,
        _config: &AutomodConfig,
    ) -> Option<Violation> {
        if ZALGO_RE.is_match(&percent_encode(&msg.content)) {
            Some(Violation::new(ViolationKind::Zalgo, msg))
        } else {
            None
        }
    }

    /// Spam-rate detector: messages with an inter-message gap of at most
    /// 2500 ms accumulate; a larger gap resets the window to 1. Reaching
    /// the configured amount fires once and restarts the window.
    pub(crate) fn detect_spam(
        &self,
        msg: &GuildMessage,
        config: &AutomodConfig,
    ) -> Option<Violation> {
        let key = TrackerKey {
            detector: TrackedDetector::Spam,
            guild_id: msg.guild_id,
            user_id: msg.author_id,
        };

        let mut fired: Option<Vec<MessageRef>> = None;
        self.tracker.upsert(
            key,
            Duration::from_secs(config.spam_duration_secs),
            |prev| {
                let mut count = 1;
                let mut messages = vec![msg.msg_ref()];
                if let Some(prev) = prev {
                    if within_gap(prev, msg) {
                        count = prev.count + 1;
                        messages = prev.messages.clone();
                        messages.push(msg.msg_ref());
                    }
                }
                if config.spam_amount > 0 && count >= config.spam_amount {
                    fired = Some(messages.clone());
                    count = 1;
                    messages.clear();
                }
                TrackerState {
                    count,
                    last_content: String::new(),
                    last_at: Some(msg.created_at),
                    messages,
                }
            },
        );

        fired.map(|bulk| {
            Violation::new(ViolationKind::Spam, msg)
                .var("amount", config.spam_amount.to_string())
                .var("duration", config.spam_duration_secs.to_string())
                .with_bulk(bulk)
        })
    }

    /// Mass-mention detector: same windowing as spam, but accumulating
    /// mention counts (bots and self-mentions excluded).
    pub(crate) fn detect_mass_mention(
        &self,
        msg: &GuildMessage,
        config: &AutomodConfig,
    ) -> Option<Violation> {
        let mentions = msg.counted_mentions();
        if mentions == 0 {
            return None;
        }

        let key = TrackerKey {
            detector: TrackedDetector::MassMention,
            guild_id: msg.guild_id,
            user_id: msg.author_id,
        };

        let mut fired: Option<Vec<MessageRef>> = None;
        self.tracker.upsert(
            key,
            Duration::from_secs(config.mass_mention_duration_secs),
            |prev| {
                let mut count = mentions;
                let mut messages = vec![msg.msg_ref()];
                if let Some(prev) = prev {
                    if within_gap(prev, msg) {
                        count = prev.count + mentions;
                        messages = prev.messages.clone();
                        messages.push(msg.msg_ref());
                    }
                }
                if config.mass_mention_amount > 0 && count >= config.mass_mention_amount {
                    fired = Some(messages.clone());
                    count = 0;
                    messages.clear();
                }
                TrackerState {
                    count,
                    last_content: String::new(),
                    last_at: Some(msg.created_at),
                    messages,
                }
            },
        );

        fired.map(|bulk| {
            Violation::new(ViolationKind::MassMention, msg)
                .var("amount", config.mass_mention_amount.to_string())
                .var("duration", config.mass_mention_duration_secs.to_string())
                .with_bulk(bulk)
        })
    }

    /// Banned-words detector: a whitespace token triggers when it
    /// contains a blacklisted substring and no whitelisted substring.
    pub(crate) fn detect_banned_words(
        &self,
        msg: &GuildMessage,
        config: &AutomodConfig,
    ) -> Option<Violation> {
        if config.badwords_blocked.is_empty() {
            return None;
        }

        let blocked: Vec<String> = config
            .badwords_blocked
            .iter()
            .map(|w| w.to_lowercase())
            .collect();
        let allowed: Vec<String> = config
            .badwords_allowed
            .iter()
            .map(|w| w.to_lowercase())
            .collect();

        let content = msg.content.to_lowercase();
        let matched: Vec<&str> = content
            .split_whitespace()
            .filter(|token| {
                blocked.iter().any(|b| token.contains(b.as_str()))
                    && !allowed.iter().any(|a| token.contains(a.as_str()))
            })
            .collect();

        if matched.is_empty() {
            None
        } else {
            Some(
                Violation::new(ViolationKind::BannedWords, msg).var("words", matched.join(", ")),
            )
        }
    }
}

fn within_gap(prev: &TrackerState, msg: &GuildMessage) -> bool {
    prev.last_at
        .map(|last| (msg.created_at - last) <= chrono::Duration::milliseconds(MAX_GAP_MS))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::super::automod_service::tests::{service_with, StubResolver};
    use super::super::automod_service::PhishingLists;
    use super::*;
    use chrono::Utc;

    fn message(content: &str) -> GuildMessage {
        GuildMessage {
            message_id: 1,
            guild_id: 10,
            channel_id: 20,
            author_id: 30,
            author_is_bot: false,
            author_is_webhook: false,
            author_is_owner: false,
            author_is_admin: false,
            author_role_ids: Vec::new(),
            content: content.to_string(),
            created_at: Utc::now(),
            mentions: Vec::new(),
        }
    }

    #[tokio::test]
    async fn duplicate_text_fires_on_second_identical_message() {
        let service = service_with(StubResolver::default(), PhishingLists::default());
        let config = AutomodConfig::default();

        assert!(service
            .detect_duplicate_text(&message("Hello There"), &config)
            .is_none());
        // Case-insensitive repeat.
        assert!(service
            .detect_duplicate_text(&message("hello there"), &config)
            .is_some());
        // A distinct message afterwards does not retroactively trigger.
        assert!(service
            .detect_duplicate_text(&message("something else"), &config)
            .is_none());
    }

    #[tokio::test]
    async fn duplicate_text_rearms_after_firing() {
        let service = service_with(StubResolver::default(), PhishingLists::default());
        let config = AutomodConfig::default(); // amount = 2

        assert!(service
            .detect_duplicate_text(&message("again"), &config)
            .is_none());
        assert!(service
            .detect_duplicate_text(&message("again"), &config)
            .is_some());
        // The window resets on a trigger: the next repeat starts a fresh
        // count rather than refiring on every message.
        assert!(service
            .detect_duplicate_text(&message("again"), &config)
            .is_none());
        assert!(service
            .detect_duplicate_text(&message("again"), &config)
            .is_some());
    }

    #[tokio::test]
    async fn spam_fires_exactly_on_the_configured_amount() {
        let service = service_with(StubResolver::default(), PhishingLists::default());
        let config = AutomodConfig::default(); // amount = 7
        let start = Utc::now();

        for i in 0..6 {
            let mut msg = message("hi");
            msg.message_id = i + 1;
            msg.created_at = start + chrono::Duration::milliseconds(i as i64 * 100);
            assert!(service.detect_spam(&msg, &config).is_none(), "message {i}");
        }

        let mut seventh = message("hi");
        seventh.message_id = 7;
        seventh.created_at = start + chrono::Duration::milliseconds(600);
        let violation = service.detect_spam(&seventh, &config).expect("7th fires");
        assert_eq!(violation.bulk.len(), 7);
        // Vars feed the "{amount} messages in {duration} seconds" reason.
        assert_eq!(violation.vars.get("amount").map(String::as_str), Some("7"));
        assert_eq!(violation.vars.get("duration").map(String::as_str), Some("5"));
    }

    #[tokio::test]
    async fn spam_window_resets_on_a_large_gap() {
        let service = service_with(StubResolver::default(), PhishingLists::default());
        let config = AutomodConfig::default();
        let start = Utc::now();

        for i in 0..6 {
            let mut msg = message("hi");
            msg.created_at = start + chrono::Duration::milliseconds(i as i64 * 100);
            assert!(service.detect_spam(&msg, &config).is_none());
        }

        // Gap of 3000ms before the 7th: counter resets, no violation.
        let mut seventh = message("hi");
        seventh.created_at = start + chrono::Duration::milliseconds(500 + 3000);
        assert!(service.detect_spam(&seventh, &config).is_none());
    }

    #[tokio::test]
    async fn mass_mention_accumulates_mention_counts() {
        let service = service_with(StubResolver::default(), PhishingLists::default());
        let mut config = AutomodConfig::default();
        config.mass_mention_amount = 5;
        let start = Utc::now();

        let mentions = |n: u64| {
            (0..n)
                .map(|i| crate::core::automod::MentionRef {
                    user_id: 1000 + i,
                    is_bot: false,
                })
                .collect::<Vec<_>>()
        };

        let mut first = message("hey @everyone-ish");
        first.mentions = mentions(3);
        first.created_at = start;
        assert!(service.detect_mass_mention(&first, &config).is_none());

        let mut second = message("more pings");
        second.mentions = mentions(2);
        second.created_at = start + chrono::Duration::milliseconds(500);
        let violation = service
            .detect_mass_mention(&second, &config)
            .expect("threshold reached");
        assert_eq!(violation.bulk.len(), 2);
        assert_eq!(violation.vars.get("amount").map(String::as_str), Some("5"));
        assert_eq!(violation.vars.get("duration").map(String::as_str), Some("5"));
    }

    #[tokio::test]
    async fn phishing_matches_either_list() {
        let lists = PhishingLists {
            suspicious: vec!["discorcl.com".to_string()],
            guaranteed: vec!["free-nitro.example".to_string()],
        };
        let service = service_with(StubResolver::default(), lists);
        let config = AutomodConfig::default();

        let hit = service
            .detect_phishing(&message("claim at https://FREE-NITRO.example/now"), &config)
            .expect("guaranteed hit");
        assert_eq!(hit.vars.get("list").map(String::as_str), Some("guaranteed"));

        assert!(service
            .detect_phishing(&message("visit discorcl.com please"), &config)
            .is_some());
        assert!(service
            .detect_phishing(&message("normal message"), &config)
            .is_none());
    }

    #[tokio::test]
    async fn zalgo_flags_combining_mark_runs() {
        let service = service_with(StubResolver::default(), PhishingLists::default());
        let config = AutomodConfig::default();

        let zalgo = "h\u{0335}\u{0321}\u{0347}e\u{0330}\u{0322}\u{0353}llo";
        assert!(service.detect_zalgo(&message(zalgo), &config).is_some());
        assert!(service.detect_zalgo(&message("héllo café"), &config).is_none());
    }

    #[tokio::test]
    async fn banned_words_respects_the_allowed_list() {
        let service = service_with(StubResolver::default(), PhishingLists::default());
        let mut config = AutomodConfig::default();
        config.badwords_blocked = vec!["ass".to_string()];
        config.badwords_allowed = vec!["grass".to_string()];

        let violation = service
            .detect_banned_words(&message("nice Assumption there"), &config)
            .expect("blocked substring");
        assert_eq!(
            violation.vars.get("words").map(String::as_str),
            Some("assumption")
        );

        assert!(service
            .detect_banned_words(&message("touch grass"), &config)
            .is_none());
        assert!(service
            .detect_banned_words(&message("hello world"), &config)
            .is_none());
    }

    #[tokio::test]
    async fn invite_skips_whitelisted_codes_and_own_guild() {
        let resolver = StubResolver::default()
            .with_invite("abc123", Some(10), "Home Guild")
            .with_invite("xyz789", Some(99), "Other Guild")
            .with_invite("friend", Some(50), "Friends");
        let service = service_with(resolver, PhishingLists::default());
        let mut config = AutomodConfig::default();
        config.invite_code_whitelist = vec!["friend".to_string()];

        // Same guild: not a violation.
        assert!(service
            .detect_invite(&message("join discord.gg/abc123"), &config)
            .await
            .is_none());
        // Whitelisted code: skipped.
        assert!(service
            .detect_invite(&message("join discord.gg/friend"), &config)
            .await
            .is_none());
        // Unresolvable code: swallowed.
        assert!(service
            .detect_invite(&message("join discord.gg/deadlink"), &config)
            .await
            .is_none());

        let violation = service
            .detect_invite(&message("join https://discord.com/invite/xyz789"), &config)
            .await
            .expect("foreign invite");
        assert_eq!(
            violation.vars.get("target").map(String::as_str),
            Some("Other Guild")
        );
    }
}
