// Serenity-backed implementations of the core ports.
//
// One adapter struct implements invite resolution, entity lookup,
// enforcement and messaging, so the composition root hands a single
// clone-able handle to every service.

use crate::core::automod::{DetectorError, InviteResolver, MessageRef, ResolvedInvite};
use crate::core::moderation::{Enforcer, MemberState, ModerationError, Notifier};
use crate::core::modlog::{Directory, ResolvedUser};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct SerenityGateway {
    http: Arc<serenity::Http>,
    cache: Arc<serenity::Cache>,
}

impl SerenityGateway {
    pub fn new(http: Arc<serenity::Http>, cache: Arc<serenity::Cache>) -> Self {
        Self { http, cache }
    }

    /// Guild owner and role positions, from the cache when possible.
    async fn guild_meta(
        &self,
        guild_id: serenity::GuildId,
    ) -> Result<(u64, HashMap<serenity::RoleId, i64>), ModerationError> {
        if let Some(guild) = self.cache.guild(guild_id) {
            return Ok((
                guild.owner_id.get(),
                guild
                    .roles
                    .iter()
                    .map(|(id, role)| (*id, role.position as i64))
                    .collect(),
            ));
        }

        let guild = self
            .http
            .get_guild(guild_id)
            .await
            .map_err(|e| ModerationError::Gateway(e.to_string()))?;
        Ok((
            guild.owner_id.get(),
            guild
                .roles
                .iter()
                .map(|(id, role)| (*id, role.position as i64))
                .collect(),
        ))
    }
}

#[async_trait]
impl InviteResolver for SerenityGateway {
    async fn resolve_invite(&self, code: &str) -> Result<Option<ResolvedInvite>, DetectorError> {
        match self.http.get_invite(code, false, false, None).await {
            Ok(invite) => Ok(Some(ResolvedInvite {
                code: invite.code.clone(),
                guild_id: invite.guild.as_ref().map(|g| g.id.get()),
                target_name: invite
                    .guild
                    .as_ref()
                    .map(|g| g.name.clone())
                    .unwrap_or_else(|| "a group DM".to_string()),
            })),
            Err(err) => {
                // Unknown and expired codes come back as HTTP errors.
                tracing::debug!(code, error = %err, "invite lookup failed");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl Directory for SerenityGateway {
    async fn guild_name(&self, guild_id: u64) -> Option<String> {
        self.cache
            .guild(serenity::GuildId::new(guild_id))
            .map(|g| g.name.clone())
    }

    async fn resolve_user(&self, user_id: u64) -> Option<ResolvedUser> {
        let id = serenity::UserId::new(user_id);
        if let Some(user) = self.cache.user(id) {
            return Some(ResolvedUser {
                id: user_id,
                tag: user.tag(),
            });
        }

        match self.http.get_user(id).await {
            Ok(user) => Some(ResolvedUser {
                id: user_id,
                tag: user.tag(),
            }),
            Err(err) => {
                tracing::debug!(user_id, error = %err, "user lookup failed");
                None
            }
        }
    }
}

#[async_trait]
impl Enforcer for SerenityGateway {
    async fn member_state(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Option<MemberState>, ModerationError> {
        let gid = serenity::GuildId::new(guild_id);
        let member = match gid
            .member((&self.cache, &*self.http), serenity::UserId::new(user_id))
            .await
        {
            Ok(member) => member,
            Err(err) => {
                tracing::debug!(guild_id, user_id, error = %err, "member lookup failed");
                return Ok(None);
            }
        };

        let (owner_id, positions) = self.guild_meta(gid).await?;
        let top_role_position = member
            .roles
            .iter()
            .filter_map(|role| positions.get(role).copied())
            .max()
            .unwrap_or(-1);

        Ok(Some(MemberState {
            user_id,
            is_bot: member.user.bot,
            is_owner: owner_id == user_id,
            is_timed_out: member
                .communication_disabled_until
                .map(|until| until.unix_timestamp() > chrono::Utc::now().timestamp())
                .unwrap_or(false),
            top_role_position,
        }))
    }

    async fn bot_state(&self, guild_id: u64) -> Result<MemberState, ModerationError> {
        let bot_id = self.cache.current_user().id.get();
        self.member_state(guild_id, bot_id)
            .await?
            .ok_or_else(|| ModerationError::Gateway("bot is not a member of the guild".to_string()))
    }

    async fn timeout_member(
        &self,
        guild_id: u64,
        user_id: u64,
        duration_ms: u64,
        reason: &str,
    ) -> Result<(), ModerationError> {
        let until = serenity::Timestamp::from_unix_timestamp(
            chrono::Utc::now().timestamp() + (duration_ms / 1000) as i64,
        )
        .map_err(|e| ModerationError::MuteError(e.to_string()))?;

        serenity::GuildId::new(guild_id)
            .edit_member(
                &self.http,
                serenity::UserId::new(user_id),
                serenity::EditMember::new()
                    .disable_communication_until_datetime(until)
                    .audit_log_reason(reason),
            )
            .await
            .map(|_| ())
            .map_err(|e| ModerationError::MuteError(e.to_string()))
    }

    async fn remove_timeout(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: &str,
    ) -> Result<(), ModerationError> {
        serenity::GuildId::new(guild_id)
            .edit_member(
                &self.http,
                serenity::UserId::new(user_id),
                serenity::EditMember::new()
                    .enable_communication()
                    .audit_log_reason(reason),
            )
            .await
            .map(|_| ())
            .map_err(|e| ModerationError::UnmuteError(e.to_string()))
    }

    async fn kick_member(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: &str,
    ) -> Result<(), ModerationError> {
        serenity::GuildId::new(guild_id)
            .kick_with_reason(&self.http, serenity::UserId::new(user_id), reason)
            .await
            .map_err(|e| ModerationError::KickError(e.to_string()))
    }

    async fn ban_member(
        &self,
        guild_id: u64,
        user_id: u64,
        purge_days: u8,
        reason: &str,
    ) -> Result<(), ModerationError> {
        serenity::GuildId::new(guild_id)
            .ban_with_reason(&self.http, serenity::UserId::new(user_id), purge_days, reason)
            .await
            .map_err(|e| ModerationError::BanError(e.to_string()))
    }

    async fn unban_member(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: &str,
    ) -> Result<(), ModerationError> {
        self.http
            .remove_ban(
                serenity::GuildId::new(guild_id),
                serenity::UserId::new(user_id),
                Some(reason),
            )
            .await
            .map_err(|e| ModerationError::UnbanError(e.to_string()))
    }
}

#[async_trait]
impl Notifier for SerenityGateway {
    async fn direct_message(&self, user_id: u64, content: &str) -> bool {
        let channel = match serenity::UserId::new(user_id)
            .create_dm_channel((&self.cache, &*self.http))
            .await
        {
            Ok(channel) => channel,
            Err(err) => {
                tracing::debug!(user_id, error = %err, "could not open DM channel");
                return false;
            }
        };
        channel.say(&self.http, content).await.is_ok()
    }

    async fn reply(&self, channel_id: u64, message_id: u64, content: &str) -> bool {
        let builder = serenity::CreateMessage::new().content(content).reference_message((
            serenity::ChannelId::new(channel_id),
            serenity::MessageId::new(message_id),
        ));
        serenity::ChannelId::new(channel_id)
            .send_message(&self.http, builder)
            .await
            .is_ok()
    }

    async fn send_to_channel(&self, channel_id: u64, content: &str) -> bool {
        serenity::ChannelId::new(channel_id)
            .say(&self.http, content)
            .await
            .is_ok()
    }

    async fn delete_message(&self, msg: MessageRef) {
        if let Err(err) = serenity::ChannelId::new(msg.channel_id)
            .delete_message(&self.http, serenity::MessageId::new(msg.message_id))
            .await
        {
            tracing::warn!(
                channel_id = msg.channel_id,
                message_id = msg.message_id,
                error = %err,
                "failed to delete message"
            );
        }
    }

    async fn bulk_delete(&self, channel_id: u64, messages: &[MessageRef]) {
        let ids: Vec<serenity::MessageId> = messages
            .iter()
            .map(|m| serenity::MessageId::new(m.message_id))
            .collect();
        if let Err(err) = serenity::ChannelId::new(channel_id)
            .delete_messages(&self.http, ids)
            .await
        {
            tracing::warn!(channel_id, error = %err, "failed to bulk delete messages");
        }
    }
}
