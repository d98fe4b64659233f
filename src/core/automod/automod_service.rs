// Automod orchestrator - per-message entry point for the detection
// pipeline.
//
// Normalizes once, applies the global whitelist / privilege filter once,
// then fans out to the enabled detectors concurrently. Detectors are
// independent: one failing or timing out is logged and treated as "no
// violation" for that detector only. No action is taken here - the
// collected violations go to the action dispatcher.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use super::automod_models::{
    is_whitelisted, AutomodConfig, DetectorConfig, DetectorError, GuildMessage, Violation,
};
use super::tracker::TrackerCache;

/// How long the invite detector may wait on the external lookup before
/// degrading to "no violation".
const INVITE_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// The two externally refreshed phishing domain lists. The refresh task
/// swaps both under one write lock so detectors never observe a
/// half-updated view.
#[derive(Debug, Clone, Default)]
pub struct PhishingLists {
    pub suspicious: Vec<String>,
    pub guaranteed: Vec<String>,
}

/// A successfully resolved invite code.
#[derive(Debug, Clone)]
pub struct ResolvedInvite {
    pub code: String,
    pub guild_id: Option<u64>,
    pub target_name: String,
}

/// External invite lookup collaborator.
#[async_trait]
pub trait InviteResolver: Send + Sync {
    /// `Ok(None)` means "this code is not a valid invite"; errors are
    /// treated the same way by the invite detector.
    async fn resolve_invite(&self, code: &str) -> Result<Option<ResolvedInvite>, DetectorError>;
}

pub struct AutomodService<R: InviteResolver> {
    pub(crate) tracker: TrackerCache,
    pub(crate) resolver: R,
    pub(crate) phishing_lists: Arc<RwLock<PhishingLists>>,
}

impl<R: InviteResolver> AutomodService<R> {
    pub fn new(resolver: R, phishing_lists: Arc<RwLock<PhishingLists>>) -> Self {
        Self {
            tracker: TrackerCache::new(),
            resolver,
            phishing_lists,
        }
    }

    /// Run the full pipeline over one message and collect the violations.
    pub async fn run(&self, msg: &GuildMessage, config: &AutomodConfig) -> Vec<Violation> {
        if msg.author_is_bot || msg.author_is_webhook {
            return Vec::new();
        }
        if !config.module_enabled {
            return Vec::new();
        }
        // Global whitelist, owner and admin exemptions are checked once
        // here, not per detector.
        if msg.author_is_owner || msg.author_is_admin {
            return Vec::new();
        }
        if is_whitelisted(&config.global_whitelist, msg) {
            return Vec::new();
        }

        let normalized = normalize_message(msg);
        let runs = |slice: &DetectorConfig| slice.enabled && !is_whitelisted(&slice.whitelist, msg);

        let invite = async {
            if !runs(&config.invite) {
                return None;
            }
            match tokio::time::timeout(INVITE_LOOKUP_TIMEOUT, self.detect_invite(&normalized, config))
                .await
            {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(
                        guild_id = msg.guild_id,
                        "invite lookup timed out, skipping detector"
                    );
                    None
                }
            }
        };

        let (invite, dup_text, phishing, zalgo, spam, mass_mention, badwords) = tokio::join!(
            invite,
            async { runs(&config.dup_text).then(|| self.detect_duplicate_text(&normalized, config)) },
            async { runs(&config.phishing).then(|| self.detect_phishing(&normalized, config)) },
            // Zalgo inspects the raw content: normalization already
            // stripped the combining marks from the derived copy.
            async { runs(&config.zalgo).then(|| self.detect_zalgo(msg, config)) },
            async { runs(&config.spam).then(|| self.detect_spam(&normalized, config)) },
            async {
                runs(&config.mass_mention).then(|| self.detect_mass_mention(&normalized, config))
            },
            async { runs(&config.badwords).then(|| self.detect_banned_words(&normalized, config)) },
        );

        [
            invite,
            dup_text.flatten(),
            phishing.flatten(),
            zalgo.flatten(),
            spam.flatten(),
            mass_mention.flatten(),
            badwords.flatten(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Produce the derived, de-obfuscated copy all detectors except zalgo
/// see: NFKD-decompose, then drop combining marks.
fn normalize_message(msg: &GuildMessage) -> GuildMessage {
    let mut normalized = msg.clone();
    normalized.content = msg
        .content
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect();
    normalized
}

#[cfg(test)]
pub(crate) mod tests {
    use super::super::automod_models::{Action, MentionRef, ViolationKind, WhitelistEntry};
    use super::*;
    use chrono::Utc;
    use dashmap::DashMap;

    #[derive(Default)]
    pub struct StubResolver {
        invites: DashMap<String, ResolvedInvite>,
    }

    impl StubResolver {
        pub fn with_invite(self, code: &str, guild_id: Option<u64>, target: &str) -> Self {
            self.invites.insert(
                code.to_string(),
                ResolvedInvite {
                    code: code.to_string(),
                    guild_id,
                    target_name: target.to_string(),
                },
            );
            self
        }
    }

    #[async_trait]
    impl InviteResolver for StubResolver {
        async fn resolve_invite(
            &self,
            code: &str,
        ) -> Result<Option<ResolvedInvite>, DetectorError> {
            Ok(self.invites.get(code).map(|i| i.clone()))
        }
    }

    pub fn service_with(
        resolver: StubResolver,
        lists: PhishingLists,
    ) -> AutomodService<StubResolver> {
        AutomodService::new(resolver, Arc::new(RwLock::new(lists)))
    }

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
            author_role_ids: vec![500],
            content: content.to_string(),
            created_at: Utc::now(),
            mentions: Vec::new(),
        }
    }

    fn enabled_config() -> AutomodConfig {
        AutomodConfig {
            module_enabled: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn disabled_module_produces_no_violations() {
        let service = service_with(StubResolver::default(), PhishingLists::default());
        let mut config = enabled_config();
        config.module_enabled = false;
        config.badwords_blocked = vec!["bad".to_string()];

        assert!(service.run(&message("bad bad bad"), &config).await.is_empty());
    }

    #[tokio::test]
    async fn bots_admins_and_owner_are_exempt() {
        let service = service_with(StubResolver::default(), PhishingLists::default());
        let mut config = enabled_config();
        config.badwords_blocked = vec!["bad".to_string()];

        let mut bot = message("bad");
        bot.author_is_bot = true;
        assert!(service.run(&bot, &config).await.is_empty());

        let mut admin = message("bad");
        admin.author_is_admin = true;
        assert!(service.run(&admin, &config).await.is_empty());

        let mut owner = message("bad");
        owner.author_is_owner = true;
        assert!(service.run(&owner, &config).await.is_empty());
    }

    #[tokio::test]
    async fn global_whitelist_exempts_all_detectors() {
        let service = service_with(StubResolver::default(), PhishingLists::default());
        let mut config = enabled_config();
        config.badwords_blocked = vec!["bad".to_string()];
        config.global_whitelist = vec![WhitelistEntry::Role(500)];

        assert!(service.run(&message("bad bad"), &config).await.is_empty());
    }

    #[tokio::test]
    async fn detector_whitelist_exempts_only_that_detector() {
        let lists = PhishingLists {
            guaranteed: vec!["scam.example".to_string()],
            suspicious: Vec::new(),
        };
        let service = service_with(StubResolver::default(), lists);
        let mut config = enabled_config();
        config.badwords_blocked = vec!["scam".to_string()];
        config.badwords.whitelist = vec![WhitelistEntry::Role(500)];

        let violations = service.run(&message("go to scam.example"), &config).await;
        let kinds: Vec<ViolationKind> = violations.iter().map(|v| v.kind).collect();
        assert!(kinds.contains(&ViolationKind::Phishing));
        assert!(!kinds.contains(&ViolationKind::BannedWords));
    }

    #[tokio::test]
    async fn obfuscated_banned_words_are_caught_after_normalization() {
        let service = service_with(StubResolver::default(), PhishingLists::default());
        let mut config = enabled_config();
        config.badwords_blocked = vec!["heck".to_string()];
        config.badwords.action = Action::Warn;

        // Combining marks between the letters.
        let disguised = "h\u{0336}e\u{0336}c\u{0336}k\u{0336}";
        let violations = service.run(&message(disguised), &config).await;
        assert!(violations
            .iter()
            .any(|v| v.kind == ViolationKind::BannedWords));
    }

    #[tokio::test]
    async fn multiple_detectors_can_fire_for_one_message() {
        let resolver = StubResolver::default().with_invite("evil", Some(99), "Elsewhere");
        let service = service_with(resolver, PhishingLists::default());
        let mut config = enabled_config();
        config.badwords_blocked = vec!["crypto".to_string()];
        config.mass_mention_amount = 2;

        let mut msg = message("crypto giveaway discord.gg/evil");
        msg.mentions = vec![
            MentionRef {
                user_id: 40,
                is_bot: false,
            },
            MentionRef {
                user_id: 41,
                is_bot: false,
            },
        ];

        let violations = service.run(&msg, &config).await;
        let kinds: Vec<ViolationKind> = violations.iter().map(|v| v.kind).collect();
        assert!(kinds.contains(&ViolationKind::Invite));
        assert!(kinds.contains(&ViolationKind::BannedWords));
        assert!(kinds.contains(&ViolationKind::MassMention));
    }
}
