// Action dispatcher - turns a decided punishment into a case record plus
// platform side effects, and resolves automod violations into punishments.
//
// Ordering invariant: the case is persisted BEFORE enforcement, and
// rolled back if enforcement fails, so the ledger never logs a punishment
// that did not happen. The courtesy DM is sent before enforcement because
// kicks and bans close the shared DM channel.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use super::moderation_models::{case_type_for, is_moderatable, MemberState, ModerationError};
use crate::core::automod::{Action, MessageRef, Violation, ViolationKind};
use crate::core::config::GuildConfig;
use crate::core::locale::Localizer;
use crate::core::modlog::{CaseStore, CaseType, Directory, Modlog, ModlogService, NewCase};

/// Fallback timeout length when a mute request carries no duration.
const DEFAULT_MUTE_MS: u64 = 600_000;

// ============================================================================
// PLATFORM TRAITS (PORTS)
// ============================================================================

/// Platform operations that change member state. Implementations map
/// their transport errors onto the matching `ModerationError` variant.
#[async_trait]
pub trait Enforcer: Send + Sync {
    /// `Ok(None)` when the user is not a member of the guild.
    async fn member_state(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Option<MemberState>, ModerationError>;

    /// The bot's own member state in the guild.
    async fn bot_state(&self, guild_id: u64) -> Result<MemberState, ModerationError>;

    async fn timeout_member(
        &self,
        guild_id: u64,
        user_id: u64,
        duration_ms: u64,
        reason: &str,
    ) -> Result<(), ModerationError>;

    async fn remove_timeout(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: &str,
    ) -> Result<(), ModerationError>;

    async fn kick_member(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: &str,
    ) -> Result<(), ModerationError>;

    async fn ban_member(
        &self,
        guild_id: u64,
        user_id: u64,
        purge_days: u8,
        reason: &str,
    ) -> Result<(), ModerationError>;

    async fn unban_member(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: &str,
    ) -> Result<(), ModerationError>;
}

/// Best-effort messaging side effects. Every operation degrades to a
/// boolean or silence: a failed DM or delete never aborts enforcement.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// `false` when the user blocks DMs or the channel cannot be opened.
    async fn direct_message(&self, user_id: u64, content: &str) -> bool;

    /// Reply to a message in-channel; `false` when the target is gone.
    async fn reply(&self, channel_id: u64, message_id: u64, content: &str) -> bool;

    async fn send_to_channel(&self, channel_id: u64, content: &str) -> bool;

    async fn delete_message(&self, msg: MessageRef);

    async fn bulk_delete(&self, channel_id: u64, messages: &[MessageRef]);
}

// ============================================================================
// SERVICE
// ============================================================================

/// A decided punishment, ready to be recorded and enforced.
#[derive(Debug, Clone)]
pub struct PunishRequest {
    pub guild_id: u64,
    pub member_id: u64,
    pub moderator_id: u64,
    pub action: Action,
    pub reason: String,
    /// Timeout length for mutes, expiry for bans, in milliseconds.
    pub duration_ms: Option<u64>,
    pub locale: String,
}

pub struct ActionService<S: CaseStore, D: Directory, E: Enforcer, N: Notifier> {
    modlog: Arc<ModlogService<S, D>>,
    enforcer: E,
    notifier: N,
    locales: Arc<Localizer>,
    bot_user_id: u64,
}

impl<S: CaseStore, D: Directory, E: Enforcer, N: Notifier> ActionService<S, D, E, N> {
    pub fn new(
        modlog: Arc<ModlogService<S, D>>,
        enforcer: E,
        notifier: N,
        locales: Arc<Localizer>,
        bot_user_id: u64,
    ) -> Self {
        Self {
            modlog,
            enforcer,
            notifier,
            locales,
            bot_user_id,
        }
    }

    /// Record and enforce one punishment. Returns the created case, or
    /// `None` for verbal actions which never produce one.
    pub async fn punish(&self, req: PunishRequest) -> Result<Option<Modlog>, ModerationError> {
        let Some(case_type) = case_type_for(req.action) else {
            return Ok(None);
        };

        let target = self
            .enforcer
            .member_state(req.guild_id, req.member_id)
            .await?;

        // Bans may target users who already left; everything else needs
        // a present member.
        if target.is_none() && req.action != Action::Ban {
            return Err(ModerationError::MemberNotFound);
        }

        if let Some(target) = &target {
            if req.action == Action::Mute && target.is_timed_out {
                return Err(ModerationError::AlreadyMuted);
            }

            let actor = self
                .enforcer
                .member_state(req.guild_id, req.moderator_id)
                .await?
                .ok_or(ModerationError::MemberNotFound)?;
            let bot = self.enforcer.bot_state(req.guild_id).await?;
            if let Some(refusal) = is_moderatable(target, &actor, &bot) {
                return Err(ModerationError::NotModeratable(refusal));
            }
        }

        let expires_at = match req.action {
            Action::Mute => {
                let ms = req.duration_ms.unwrap_or(DEFAULT_MUTE_MS);
                Some(Utc::now() + Duration::milliseconds(ms as i64))
            }
            Action::Ban => req
                .duration_ms
                .map(|ms| Utc::now() + Duration::milliseconds(ms as i64)),
            _ => None,
        };

        let case = self
            .modlog
            .create(NewCase {
                guild_id: req.guild_id,
                member_id: req.member_id,
                moderator_id: req.moderator_id,
                case_type,
                reason: req.reason.clone(),
                expires_at,
            })
            .await?;

        let dm_key = match case_type {
            CaseType::Warn => "mod.dm.warn",
            CaseType::Mute => "mod.dm.mute",
            CaseType::Kick => "mod.dm.kick",
            CaseType::Softban => "mod.dm.softban",
            CaseType::Ban => "mod.dm.ban",
        };
        let dm_vars = HashMap::from([
            ("guild".to_string(), case.guild_name.clone()),
            ("reason".to_string(), req.reason.clone()),
        ]);
        let dm = self.locales.translate(&req.locale, dm_key, &dm_vars);
        if !self.notifier.direct_message(req.member_id, &dm).await {
            tracing::debug!(user_id = req.member_id, "could not DM punished member");
        }

        let enforcement = match req.action {
            Action::Verbal | Action::Warn => Ok(()),
            Action::Mute => {
                let ms = req.duration_ms.unwrap_or(DEFAULT_MUTE_MS);
                self.enforcer
                    .timeout_member(req.guild_id, req.member_id, ms, &req.reason)
                    .await
            }
            Action::Kick => {
                self.enforcer
                    .kick_member(req.guild_id, req.member_id, &req.reason)
                    .await
            }
            Action::Softban => self.softban(req.guild_id, req.member_id, &req.reason).await,
            Action::Ban => {
                self.enforcer
                    .ban_member(req.guild_id, req.member_id, 0, &req.reason)
                    .await
            }
        };

        if let Err(err) = enforcement {
            // Roll the case back so the ledger matches reality.
            if let Err(rollback) = self.modlog.delete(&case.record.id).await {
                tracing::error!(
                    case_id = %case.record.id,
                    error = %rollback,
                    "failed to roll back case after enforcement failure"
                );
            }
            return Err(err);
        }

        Ok(Some(case))
    }

    /// Ban with a one-day message purge, then immediately unban. Both
    /// step failures surface as softban errors.
    async fn softban(&self, guild_id: u64, user_id: u64, reason: &str) -> Result<(), ModerationError> {
        let steps = async {
            self.enforcer.ban_member(guild_id, user_id, 1, reason).await?;
            self.enforcer.unban_member(guild_id, user_id, reason).await
        };
        steps.await.map_err(|err| match err {
            ModerationError::BanError(inner) | ModerationError::UnbanError(inner) => {
                ModerationError::SoftbanError(inner)
            }
            other => other,
        })
    }

    /// Lift a timeout. No case is created for reversals.
    pub async fn unmute(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: &str,
    ) -> Result<(), ModerationError> {
        let member = self
            .enforcer
            .member_state(guild_id, user_id)
            .await?
            .ok_or(ModerationError::MemberNotFound)?;
        if !member.is_timed_out {
            return Err(ModerationError::UnmuteError(
                "member is not muted".to_string(),
            ));
        }
        self.enforcer.remove_timeout(guild_id, user_id, reason).await
    }

    /// Lift a ban. No case is created for reversals.
    pub async fn unban(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: &str,
    ) -> Result<(), ModerationError> {
        self.enforcer.unban_member(guild_id, user_id, reason).await
    }

    /// Resolve automod violations into deletions, channel responses and
    /// punishments. Violations are isolated: a failure on one never
    /// blocks the rest. Returns the cases that were created.
    pub async fn handle_violations(
        &self,
        violations: Vec<Violation>,
        config: &GuildConfig,
    ) -> Vec<Modlog> {
        let mut cases = Vec::new();

        for violation in violations {
            let slice = config.automod.slice(violation.kind);
            let suffix = kind_suffix(violation.kind);

            if slice.delete_message {
                if violation.bulk.len() > 1 {
                    self.notifier
                        .bulk_delete(violation.channel_id, &violation.bulk)
                        .await;
                } else {
                    self.notifier
                        .delete_message(MessageRef {
                            channel_id: violation.channel_id,
                            message_id: violation.message_id,
                        })
                        .await;
                }
            }

            let mut response_vars = violation.vars.clone();
            response_vars.insert("user".to_string(), violation.user_id.to_string());
            let response = self.locales.translate(
                &config.locale,
                &format!("automod.response.{suffix}"),
                &response_vars,
            );
            // The triggering message may just have been deleted, in which
            // case the reply target is gone.
            let replied = if slice.delete_message {
                false
            } else {
                self.notifier
                    .reply(violation.channel_id, violation.message_id, &response)
                    .await
            };
            if !replied {
                self.notifier
                    .send_to_channel(violation.channel_id, &response)
                    .await;
            }

            if slice.action == Action::Verbal {
                continue;
            }

            let reason = self.locales.translate(
                &config.locale,
                &format!("automod.reason.{suffix}"),
                &violation.vars,
            );
            let duration_ms = match slice.action {
                Action::Mute => Some(config.automod.mute_duration_secs * 1000),
                Action::Ban => Some(config.automod.ban_duration_secs * 1000),
                _ => None,
            };

            let result = self
                .punish(PunishRequest {
                    guild_id: violation.guild_id,
                    member_id: violation.user_id,
                    moderator_id: self.bot_user_id,
                    action: slice.action,
                    reason,
                    duration_ms,
                    locale: config.locale.clone(),
                })
                .await;

            match result {
                Ok(Some(case)) => cases.push(case),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(
                        guild_id = violation.guild_id,
                        user_id = violation.user_id,
                        kind = %violation.kind,
                        error = %err,
                        "automod punishment failed"
                    );
                }
            }
        }

        cases
    }
}

/// Locale key suffix for a violation category.
fn kind_suffix(kind: ViolationKind) -> &'static str {
    match kind {
        ViolationKind::Invite => "invite",
        ViolationKind::DuplicateText => "dup_text",
        ViolationKind::Phishing => "phishing",
        ViolationKind::Zalgo => "zalgo",
        ViolationKind::Spam => "spam",
        ViolationKind::MassMention => "mass_mention",
        ViolationKind::BannedWords => "badwords",
    }
}

// ============================================================================
// TESTS
// ============================================================================
