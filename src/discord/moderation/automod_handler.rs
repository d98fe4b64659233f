// Discord-specific automod handling - converts gateway messages into the
// core's transport shape, runs the pipeline and dispatches the results.

use crate::core::automod::{GuildMessage, MentionRef};
use crate::discord::{mod_logger, Data, Error};
use chrono::{DateTime, Utc};
use poise::serenity_prelude as serenity;

/// Run the automod pipeline over one message (new or edited).
pub async fn handle_message(
    ctx: &serenity::Context,
    data: &Data,
    msg: &serenity::Message,
) -> Result<(), Error> {
    // DMs are never moderated; bot/webhook filtering happens in the core.
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };

    let config = data.config.get(guild_id.get()).await?;
    if !config.automod.module_enabled {
        return Ok(());
    }

    let message = to_guild_message(ctx, msg, guild_id);
    let violations = data.automod.run(&message, &config.automod).await;
    if violations.is_empty() {
        return Ok(());
    }

    tracing::info!(
        guild_id = guild_id.get(),
        user_id = message.author_id,
        count = violations.len(),
        "automod violations detected"
    );

    let cases = data.actions.handle_violations(violations, &config).await;
    for case in &cases {
        mod_logger::post_case(&ctx.http, &config, case).await;
    }
    Ok(())
}

/// Flatten a Serenity message plus cached guild data into the core's
/// transport shape.
fn to_guild_message(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    guild_id: serenity::GuildId,
) -> GuildMessage {
    let author_id = msg.author.id;
    let role_ids: Vec<u64> = msg
        .member
        .as_ref()
        .map(|m| m.roles.iter().map(|r| r.get()).collect())
        .unwrap_or_default();

    // Owner and admin exemptions come from the guild cache; without it we
    // conservatively treat the author as a regular member.
    let (is_owner, is_admin) = ctx
        .cache
        .guild(guild_id)
        .map(|guild| {
            let is_owner = guild.owner_id == author_id;
            let is_admin = role_ids.iter().any(|role_id| {
                guild
                    .roles
                    .get(&serenity::RoleId::new(*role_id))
                    .map(|role| role.permissions.administrator())
                    .unwrap_or(false)
            });
            (is_owner, is_admin)
        })
        .unwrap_or((false, false));

    let created_at = snowflake_created_at(msg.id);

    GuildMessage {
        message_id: msg.id.get(),
        guild_id: guild_id.get(),
        channel_id: msg.channel_id.get(),
        author_id: author_id.get(),
        author_is_bot: msg.author.bot,
        author_is_webhook: msg.webhook_id.is_some(),
        author_is_owner: is_owner,
        author_is_admin: is_admin,
        author_role_ids: role_ids,
        content: msg.content.clone(),
        created_at,
        mentions: msg
            .mentions
            .iter()
            .map(|user| MentionRef {
                user_id: user.id.get(),
                is_bot: user.bot,
            })
            .collect(),
    }
}

/// Snowflake creation time, millisecond precision.
fn snowflake_created_at(id: serenity::MessageId) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(id.created_at().timestamp_millis())
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snowflake_creation_time_is_millisecond_precise() {
        // The documented example snowflake: 2016-04-30T11:18:25.796Z.
        let created = snowflake_created_at(serenity::MessageId::new(175_928_847_299_117_063));
        assert_eq!(created.timestamp_millis(), 1_462_015_105_796);
    }
}
