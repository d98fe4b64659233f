// Posts case embeds to the guild's configured mod-log channel.
// Posting is best-effort: a missing or deleted channel never fails the
// moderation action that produced the case.

use crate::core::config::GuildConfig;
use crate::core::modlog::Modlog;
use poise::serenity_prelude as serenity;

/// The embed shown for a case, in the mod log and in command replies.
pub fn case_embed(case: &Modlog) -> serenity::CreateEmbed {
    let record = &case.record;
    let mut embed = serenity::CreateEmbed::new()
        .title(format!("Case #{} · {}", record.case_number, record.case_type))
        .color(serenity::Color::ORANGE)
        .field(
            "Member",
            format!("{} (<@{}>)", case.member.tag, case.member.id),
            true,
        )
        .field(
            "Moderator",
            format!("{} (<@{}>)", case.moderator.tag, case.moderator.id),
            true,
        )
        .field("Reason", record.reason.clone(), false)
        .footer(serenity::CreateEmbedFooter::new(format!(
            "Case ID: {}",
            record.id
        )))
        .timestamp(serenity::Timestamp::now());

    if let Some(expires) = record.expires_at {
        embed = embed.field("Expires", format!("<t:{}:R>", expires.timestamp()), true);
    }
    embed
}

/// Send a case to the mod-log channel, if the guild has one enabled.
pub async fn post_case(http: &serenity::Http, config: &GuildConfig, case: &Modlog) {
    if !config.logging.module_enabled || !config.logging.mod_enabled {
        return;
    }
    let Some(channel_id) = config.logging.mod_channel else {
        return;
    };

    let message = serenity::CreateMessage::new().embed(case_embed(case));
    if let Err(err) = serenity::ChannelId::new(channel_id)
        .send_message(http, message)
        .await
    {
        tracing::warn!(
            guild_id = case.record.guild_id,
            channel_id,
            error = %err,
            "failed to post case to mod log"
        );
    }
}
