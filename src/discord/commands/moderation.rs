// Moderator slash commands.
//
// **Notice the pattern:**
// 1. Extract primitive data from Discord types
// 2. Call core service
// 3. Format the response based on the result
//
// This layer is THIN - no business logic, just translation.

use crate::core::automod::{Action, AutomodService};
use crate::core::config::ConfigService;
use crate::core::locale::Localizer;
use crate::core::moderation::{ActionService, ModerationError, PunishRequest};
use crate::core::modlog::{CaseUpdate, ModlogService};
use crate::discord::gateway::SerenityGateway;
use crate::discord::mod_logger;
use crate::infra::config::SqliteConfigStore;
use crate::infra::modlog::SqliteCaseStore;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

/// Type alias for our bot's context.
/// This is what every command receives as its first parameter.
pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

pub type BotModlog = ModlogService<SqliteCaseStore, SerenityGateway>;
pub type BotActions = ActionService<SqliteCaseStore, SerenityGateway, SerenityGateway, SerenityGateway>;
pub type BotAutomod = AutomodService<SerenityGateway>;

/// Data that's shared across all commands.
/// This is where we store our services and configuration.
pub struct Data {
    pub config: Arc<ConfigService<SqliteConfigStore>>,
    pub automod: Arc<BotAutomod>,
    pub modlog: Arc<BotModlog>,
    pub actions: Arc<BotActions>,
    pub locales: Arc<Localizer>,
}

/// Parse a compact duration string like `30s`, `10m`, `1h30m` or `2d`
/// into milliseconds.
pub fn parse_duration(input: &str) -> Option<u64> {
    let input = input.trim().to_lowercase();
    if input.is_empty() {
        return None;
    }

    let mut total_ms: u64 = 0;
    let mut digits = String::new();
    for c in input.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let value: u64 = digits.parse().ok()?;
        digits.clear();
        let unit_ms: u64 = match c {
            's' => 1_000,
            'm' => 60_000,
            'h' => 3_600_000,
            'd' => 86_400_000,
            'w' => 604_800_000,
            _ => return None,
        };
        total_ms = value
            .checked_mul(unit_ms)
            .and_then(|ms| total_ms.checked_add(ms))?;
    }
    // Trailing bare digits are minutes.
    if !digits.is_empty() {
        total_ms = digits
            .parse::<u64>()
            .ok()?
            .checked_mul(60_000)
            .and_then(|ms| total_ms.checked_add(ms))?;
    }

    (total_ms > 0).then_some(total_ms)
}

/// Accept either a bare case number or a full `<guild>-<number>` id.
fn qualify_case_id(guild_id: u64, input: &str) -> String {
    if input.contains('-') {
        input.to_string()
    } else {
        format!("{guild_id}-{input}")
    }
}

/// Shared punish flow: resolve config and reason, run the action,
/// answer with the case embed or the refusal text.
async fn run_punish(
    ctx: Context<'_>,
    user: &serenity::User,
    action: Action,
    duration_ms: Option<u64>,
    reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let data = ctx.data();
    let config = data.config.get(guild_id).await?;
    let reason = reason.unwrap_or_else(|| data.locales.t(&config.locale, "mod.no_reason"));

    let result = data
        .actions
        .punish(PunishRequest {
            guild_id,
            member_id: user.id.get(),
            moderator_id: ctx.author().id.get(),
            action,
            reason,
            duration_ms,
            locale: config.locale.clone(),
        })
        .await;

    match result {
        Ok(Some(case)) => {
            mod_logger::post_case(&ctx.serenity_context().http, &config, &case).await;
            ctx.send(poise::CreateReply::default().embed(mod_logger::case_embed(&case)))
                .await?;
        }
        Ok(None) => {
            ctx.say("No action taken.").await?;
        }
        Err(ModerationError::NotModeratable(key)) => {
            ctx.say(data.locales.t(&config.locale, key)).await?;
        }
        Err(ModerationError::MemberNotFound) => {
            ctx.say(data.locales.t(&config.locale, "mod.member_not_found"))
                .await?;
        }
        Err(ModerationError::AlreadyMuted) => {
            ctx.say(data.locales.t(&config.locale, "mod.already_muted"))
                .await?;
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

/// Warn a member and record a case.
#[poise::command(slash_command, guild_only, required_permissions = "MODERATE_MEMBERS")]
pub async fn warn(
    ctx: Context<'_>,
    #[description = "Member to warn"] user: serenity::User,
    #[description = "Reason for the warning"] reason: Option<String>,
) -> Result<(), Error> {
    run_punish(ctx, &user, Action::Warn, None, reason).await
}

/// Time a member out and record a case.
#[poise::command(slash_command, guild_only, required_permissions = "MODERATE_MEMBERS")]
pub async fn mute(
    ctx: Context<'_>,
    #[description = "Member to mute"] user: serenity::User,
    #[description = "Duration like 10m, 1h30m (default from config)"] duration: Option<String>,
    #[description = "Reason for the mute"] reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let config = ctx.data().config.get(guild_id).await?;

    let duration_ms = match duration {
        Some(raw) => match parse_duration(&raw) {
            Some(ms) => Some(ms),
            None => {
                ctx.say(format!("Could not parse duration `{raw}`. Try `10m` or `1h30m`."))
                    .await?;
                return Ok(());
            }
        },
        None => Some(config.automod.mute_duration_secs * 1000),
    };

    run_punish(ctx, &user, Action::Mute, duration_ms, reason).await
}

/// Remove a member's timeout.
#[poise::command(slash_command, guild_only, required_permissions = "MODERATE_MEMBERS")]
pub async fn unmute(
    ctx: Context<'_>,
    #[description = "Member to unmute"] user: serenity::User,
    #[description = "Reason"] reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let data = ctx.data();
    let config = data.config.get(guild_id).await?;
    let reason = reason.unwrap_or_else(|| data.locales.t(&config.locale, "mod.no_reason"));

    match data.actions.unmute(guild_id, user.id.get(), &reason).await {
        Ok(()) => {
            let vars = std::collections::HashMap::from([(
                "user".to_string(),
                format!("<@{}>", user.id.get()),
            )]);
            ctx.say(data.locales.translate(&config.locale, "mod.unmuted", &vars))
                .await?;
        }
        Err(ModerationError::MemberNotFound) => {
            ctx.say(data.locales.t(&config.locale, "mod.member_not_found"))
                .await?;
        }
        Err(ModerationError::UnmuteError(msg)) => {
            ctx.say(format!("Could not unmute: {msg}")).await?;
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

/// Kick a member and record a case.
#[poise::command(slash_command, guild_only, required_permissions = "KICK_MEMBERS")]
pub async fn kick(
    ctx: Context<'_>,
    #[description = "Member to kick"] user: serenity::User,
    #[description = "Reason for the kick"] reason: Option<String>,
) -> Result<(), Error> {
    run_punish(ctx, &user, Action::Kick, None, reason).await
}

/// Ban a member, purge their last day of messages and immediately
/// unban them. Records a case.
#[poise::command(slash_command, guild_only, required_permissions = "BAN_MEMBERS")]
pub async fn softban(
    ctx: Context<'_>,
    #[description = "Member to softban"] user: serenity::User,
    #[description = "Reason for the softban"] reason: Option<String>,
) -> Result<(), Error> {
    run_punish(ctx, &user, Action::Softban, None, reason).await
}

/// Ban a user and record a case. Works for users who already left.
#[poise::command(slash_command, guild_only, required_permissions = "BAN_MEMBERS")]
pub async fn ban(
    ctx: Context<'_>,
    #[description = "User to ban"] user: serenity::User,
    #[description = "Ban length like 7d (permanent if omitted)"] duration: Option<String>,
    #[description = "Reason for the ban"] reason: Option<String>,
) -> Result<(), Error> {
    let duration_ms = match duration {
        Some(raw) => match parse_duration(&raw) {
            Some(ms) => Some(ms),
            None => {
                ctx.say(format!("Could not parse duration `{raw}`. Try `7d` or `1h30m`."))
                    .await?;
                return Ok(());
            }
        },
        None => None,
    };
    run_punish(ctx, &user, Action::Ban, duration_ms, reason).await
}

/// Lift a ban.
#[poise::command(slash_command, guild_only, required_permissions = "BAN_MEMBERS")]
pub async fn unban(
    ctx: Context<'_>,
    #[description = "User to unban"] user: serenity::User,
    #[description = "Reason"] reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let data = ctx.data();
    let config = data.config.get(guild_id).await?;
    let reason = reason.unwrap_or_else(|| data.locales.t(&config.locale, "mod.no_reason"));

    match data.actions.unban(guild_id, user.id.get(), &reason).await {
        Ok(()) => {
            let vars = std::collections::HashMap::from([(
                "user".to_string(),
                format!("<@{}>", user.id.get()),
            )]);
            ctx.say(data.locales.translate(&config.locale, "mod.unbanned", &vars))
                .await?;
        }
        Err(ModerationError::UnbanError(msg)) => {
            ctx.say(format!("Could not unban: {msg}")).await?;
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

/// Inspect and manage moderation cases.
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "MODERATE_MEMBERS",
    subcommands("case_view", "case_list", "case_edit", "case_delete")
)]
pub async fn case(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Show one case.
#[poise::command(slash_command, guild_only, rename = "view")]
pub async fn case_view(
    ctx: Context<'_>,
    #[description = "Case number"] case: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let case_id = qualify_case_id(guild_id, &case);

    match ctx.data().modlog.get(&case_id).await {
        Ok(case) => {
            ctx.send(poise::CreateReply::default().embed(mod_logger::case_embed(&case)))
                .await?;
        }
        Err(crate::core::modlog::ModlogError::CaseNotFound(id)) => {
            ctx.say(format!("Case `{id}` does not exist.")).await?;
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

/// List cases in this server, optionally for one user.
#[poise::command(slash_command, guild_only, rename = "list")]
pub async fn case_list(
    ctx: Context<'_>,
    #[description = "Only show cases for this user"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();

    let mut records = ctx.data().modlog.cases(guild_id).await?;
    if let Some(user) = &user {
        records.retain(|r| r.member_id == user.id.get());
    }

    if records.is_empty() {
        ctx.say("No cases found.").await?;
        return Ok(());
    }

    let total = records.len();
    let lines: Vec<String> = records
        .iter()
        .rev()
        .take(15)
        .map(|r| {
            format!(
                "`#{}` **{}** <@{}> — {}",
                r.case_number, r.case_type, r.member_id, r.reason
            )
        })
        .collect();

    let embed = serenity::CreateEmbed::new()
        .title(match &user {
            Some(user) => format!("Cases for {}", user.name),
            None => "Recent cases".to_string(),
        })
        .color(serenity::Color::ORANGE)
        .description(lines.join("\n"))
        .footer(serenity::CreateEmbedFooter::new(format!(
            "{total} case(s) total"
        )));
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Change the recorded reason of a case.
#[poise::command(slash_command, guild_only, rename = "edit")]
pub async fn case_edit(
    ctx: Context<'_>,
    #[description = "Case number"] case: String,
    #[description = "New reason"] reason: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let case_id = qualify_case_id(guild_id, &case);

    match ctx
        .data()
        .modlog
        .update(
            &case_id,
            CaseUpdate {
                reason: Some(reason),
                ..Default::default()
            },
        )
        .await
    {
        Ok(case) => {
            ctx.send(poise::CreateReply::default().embed(mod_logger::case_embed(&case)))
                .await?;
        }
        Err(crate::core::modlog::ModlogError::CaseNotFound(id)) => {
            ctx.say(format!("Case `{id}` does not exist.")).await?;
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

/// Delete a case from the ledger.
#[poise::command(
    slash_command,
    guild_only,
    rename = "delete",
    required_permissions = "ADMINISTRATOR"
)]
pub async fn case_delete(
    ctx: Context<'_>,
    #[description = "Case number"] case: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let case_id = qualify_case_id(guild_id, &case);

    match ctx.data().modlog.delete(&case_id).await {
        Ok(deleted) => {
            ctx.say(format!(
                "🗑️ Deleted case `#{}` ({}).",
                deleted.record.case_number, deleted.record.case_type
            ))
            .await?;
        }
        Err(crate::core::modlog::ModlogError::CaseNotFound(id)) => {
            ctx.say(format!("Case `{id}` does not exist.")).await?;
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_and_compound_durations() {
        assert_eq!(parse_duration("30s"), Some(30_000));
        assert_eq!(parse_duration("10m"), Some(600_000));
        assert_eq!(parse_duration("1h30m"), Some(5_400_000));
        assert_eq!(parse_duration("2d"), Some(172_800_000));
        assert_eq!(parse_duration("1w"), Some(604_800_000));
    }

    #[test]
    fn bare_numbers_are_minutes() {
        assert_eq!(parse_duration("15"), Some(900_000));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("soon"), None);
        assert_eq!(parse_duration("10x"), None);
        assert_eq!(parse_duration("0m"), None);
    }

    #[test]
    fn rejects_overflowing_durations() {
        // u64::MAX seconds; the millisecond conversion must not wrap.
        assert_eq!(parse_duration("18446744073709551615s"), None);
        assert_eq!(parse_duration("18446744073709551615"), None);
        assert_eq!(parse_duration("99999999999999999999w"), None);
    }

    #[test]
    fn qualifies_bare_case_numbers() {
        assert_eq!(qualify_case_id(10, "3"), "10-3");
        assert_eq!(qualify_case_id(10, "10-3"), "10-3");
    }
}
