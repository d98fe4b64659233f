// Automod configuration commands.

use crate::core::automod::{Action, ViolationKind, WhitelistEntry};
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum DetectorChoice {
    #[name = "Invite Links"]
    Invite,
    #[name = "Duplicate Text"]
    DuplicateText,
    #[name = "Phishing Links"]
    Phishing,
    #[name = "Zalgo"]
    Zalgo,
    #[name = "Spam"]
    Spam,
    #[name = "Mass Mentions"]
    MassMention,
    #[name = "Banned Words"]
    BannedWords,
}

impl DetectorChoice {
    fn kind(self) -> ViolationKind {
        match self {
            DetectorChoice::Invite => ViolationKind::Invite,
            DetectorChoice::DuplicateText => ViolationKind::DuplicateText,
            DetectorChoice::Phishing => ViolationKind::Phishing,
            DetectorChoice::Zalgo => ViolationKind::Zalgo,
            DetectorChoice::Spam => ViolationKind::Spam,
            DetectorChoice::MassMention => ViolationKind::MassMention,
            DetectorChoice::BannedWords => ViolationKind::BannedWords,
        }
    }
}

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum ActionChoice {
    #[name = "Verbal (respond only)"]
    Verbal,
    Warn,
    Mute,
    Kick,
    Softban,
    Ban,
}

impl ActionChoice {
    fn action(self) -> Action {
        match self {
            ActionChoice::Verbal => Action::Verbal,
            ActionChoice::Warn => Action::Warn,
            ActionChoice::Mute => Action::Mute,
            ActionChoice::Kick => Action::Kick,
            ActionChoice::Softban => Action::Softban,
            ActionChoice::Ban => Action::Ban,
        }
    }
}

/// Manage automatic moderation.
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "ADMINISTRATOR",
    subcommands(
        "status",
        "enable",
        "disable",
        "set_action",
        "set_delete",
        "whitelist_add",
        "whitelist_remove",
        "badwords_add",
        "badwords_remove"
    )
)]
pub async fn automod(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Show the current automod configuration.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let config = ctx.data().config.get(guild_id).await?;
    let automod = &config.automod;

    let detector_line = |kind: ViolationKind| {
        let slice = automod.slice(kind);
        format!(
            "{} — {} / {}{}",
            kind,
            if slice.enabled { "on" } else { "off" },
            slice.action,
            if slice.delete_message { " / delete" } else { "" },
        )
    };

    let detectors = [
        ViolationKind::Invite,
        ViolationKind::DuplicateText,
        ViolationKind::Phishing,
        ViolationKind::Zalgo,
        ViolationKind::Spam,
        ViolationKind::MassMention,
        ViolationKind::BannedWords,
    ]
    .into_iter()
    .map(detector_line)
    .collect::<Vec<_>>()
    .join("\n");

    let embed = serenity::CreateEmbed::new()
        .title("Automod Configuration")
        .color(serenity::Color::BLURPLE)
        .field(
            "Module",
            if automod.module_enabled {
                "Enabled"
            } else {
                "Disabled"
            },
            false,
        )
        .field("Detectors", detectors, false)
        .field(
            "Durations",
            format!(
                "Mute: {}s · Ban: {}s",
                automod.mute_duration_secs, automod.ban_duration_secs
            ),
            false,
        )
        .field(
            "Banned words",
            if automod.badwords_blocked.is_empty() {
                "None".to_string()
            } else {
                automod.badwords_blocked.join(", ")
            },
            false,
        )
        .footer(serenity::CreateEmbedFooter::new(format!(
            "Guild ID: {guild_id}"
        )))
        .timestamp(serenity::Timestamp::now());

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Enable automod, or a single detector.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn enable(
    ctx: Context<'_>,
    #[description = "Detector to enable (whole module if omitted)"] detector: Option<DetectorChoice>,
) -> Result<(), Error> {
    set_enabled(ctx, detector, true).await
}

/// Disable automod, or a single detector.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn disable(
    ctx: Context<'_>,
    #[description = "Detector to disable (whole module if omitted)"] detector: Option<DetectorChoice>,
) -> Result<(), Error> {
    set_enabled(ctx, detector, false).await
}

async fn set_enabled(
    ctx: Context<'_>,
    detector: Option<DetectorChoice>,
    enabled: bool,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();

    ctx.data()
        .config
        .update(guild_id, |config| match detector {
            Some(choice) => config.automod.slice_mut(choice.kind()).enabled = enabled,
            None => config.automod.module_enabled = enabled,
        })
        .await?;

    let subject = detector
        .map(|d| d.kind().to_string())
        .unwrap_or_else(|| "Automod".to_string());
    ctx.say(format!(
        "{} {} {}.",
        if enabled { "✅" } else { "🛑" },
        subject,
        if enabled { "enabled" } else { "disabled" }
    ))
    .await?;
    Ok(())
}

/// Set the enforcement action of a detector.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn set_action(
    ctx: Context<'_>,
    #[description = "Detector to configure"] detector: DetectorChoice,
    #[description = "Action to apply on a violation"] action: ActionChoice,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();

    ctx.data()
        .config
        .update(guild_id, |config| {
            config.automod.slice_mut(detector.kind()).action = action.action();
        })
        .await?;

    ctx.say(format!(
        "✅ {} violations now apply **{}**.",
        detector.kind(),
        action.action()
    ))
    .await?;
    Ok(())
}

/// Choose whether a detector deletes the triggering message.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn set_delete(
    ctx: Context<'_>,
    #[description = "Detector to configure"] detector: DetectorChoice,
    #[description = "Delete the message on a violation"] delete: bool,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();

    ctx.data()
        .config
        .update(guild_id, |config| {
            config.automod.slice_mut(detector.kind()).delete_message = delete;
        })
        .await?;

    ctx.say(format!(
        "✅ {} will {} the triggering message.",
        detector.kind(),
        if delete { "delete" } else { "keep" }
    ))
    .await?;
    Ok(())
}

fn entry_from(
    channel: Option<&serenity::Channel>,
    role: Option<&serenity::Role>,
    user: Option<&serenity::User>,
) -> Option<WhitelistEntry> {
    if let Some(channel) = channel {
        return Some(WhitelistEntry::Channel(channel.id().get()));
    }
    if let Some(role) = role {
        return Some(WhitelistEntry::Role(role.id.get()));
    }
    user.map(|user| WhitelistEntry::User(user.id.get()))
}

/// Exempt a channel, role or user from automod.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn whitelist_add(
    ctx: Context<'_>,
    #[description = "Detector to exempt from (all if omitted)"] detector: Option<DetectorChoice>,
    #[description = "Channel to exempt"] channel: Option<serenity::Channel>,
    #[description = "Role to exempt"] role: Option<serenity::Role>,
    #[description = "User to exempt"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let Some(entry) = entry_from(channel.as_ref(), role.as_ref(), user.as_ref()) else {
        ctx.say("Give a channel, role or user to whitelist.").await?;
        return Ok(());
    };

    ctx.data()
        .config
        .update(guild_id, |config| {
            let list = match detector {
                Some(choice) => &mut config.automod.slice_mut(choice.kind()).whitelist,
                None => &mut config.automod.global_whitelist,
            };
            if !list.contains(&entry) {
                list.push(entry);
            }
        })
        .await?;

    let scope = detector
        .map(|d| d.kind().to_string())
        .unwrap_or_else(|| "all detectors".to_string());
    ctx.say(format!("✅ Whitelisted `{}` for {}.", String::from(entry), scope))
        .await?;
    Ok(())
}

/// Remove a whitelist exemption.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn whitelist_remove(
    ctx: Context<'_>,
    #[description = "Detector the exemption is on (all if omitted)"] detector: Option<DetectorChoice>,
    #[description = "Channel to remove"] channel: Option<serenity::Channel>,
    #[description = "Role to remove"] role: Option<serenity::Role>,
    #[description = "User to remove"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let Some(entry) = entry_from(channel.as_ref(), role.as_ref(), user.as_ref()) else {
        ctx.say("Give a channel, role or user to remove.").await?;
        return Ok(());
    };

    ctx.data()
        .config
        .update(guild_id, |config| {
            let list = match detector {
                Some(choice) => &mut config.automod.slice_mut(choice.kind()).whitelist,
                None => &mut config.automod.global_whitelist,
            };
            list.retain(|e| *e != entry);
        })
        .await?;

    ctx.say(format!("✅ Removed `{}` from the whitelist.", String::from(entry)))
        .await?;
    Ok(())
}

/// Add a word to the banned-words list.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn badwords_add(
    ctx: Context<'_>,
    #[description = "Word to ban"] word: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let word = word.trim().to_lowercase();
    if word.is_empty() {
        ctx.say("Give a word to ban.").await?;
        return Ok(());
    }

    ctx.data()
        .config
        .update(guild_id, |config| {
            if !config.automod.badwords_blocked.contains(&word) {
                config.automod.badwords_blocked.push(word.clone());
            }
        })
        .await?;

    ctx.say("✅ Added to the banned-words list.").await?;
    Ok(())
}

/// Remove a word from the banned-words list.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn badwords_remove(
    ctx: Context<'_>,
    #[description = "Word to unban"] word: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let word = word.trim().to_lowercase();

    ctx.data()
        .config
        .update(guild_id, |config| {
            config.automod.badwords_blocked.retain(|w| *w != word);
        })
        .await?;

    ctx.say("✅ Removed from the banned-words list.").await?;
    Ok(())
}
