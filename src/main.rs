// This is the entry point of the Discord bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (databases, APIs)
// - `discord/` = Discord-specific adapters (commands, events)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Register commands and event handlers

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::core::automod::{AutomodService, PhishingLists};
use crate::core::config::ConfigService;
use crate::core::locale::Localizer;
use crate::core::moderation::ActionService;
use crate::core::modlog::ModlogService;
use crate::discord::automod_handler;
use crate::discord::gateway::SerenityGateway;
use crate::discord::{Data, Error};
use crate::infra::config::SqliteConfigStore;
use crate::infra::modlog::SqliteCaseStore;
use crate::infra::phishing::PhishingListFetcher;
use poise::serenity_prelude as serenity;
use std::sync::{Arc, RwLock};

/// How often the phishing domain lists are re-fetched.
const PHISHING_REFRESH_SECS: u64 = 600;

/// Event handler for non-command Discord events.
/// Every created and edited guild message goes through the automod
/// pipeline.
async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Message { new_message } => {
            automod_handler::handle_message(ctx, data, new_message).await?;
        }
        serenity::FullEvent::MessageUpdate { new, .. } => {
            // Edits re-run the pipeline so slipping a link in after the
            // fact does not dodge detection.
            if let Some(message) = new {
                automod_handler::handle_message(ctx, data, message).await?;
            }
        }
        _ => {}
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    // Get Discord bot token from environment
    let token = std::env::var("DISCORD_TOKEN").expect(
        "Missing DISCORD_TOKEN environment variable! Create a .env file with your bot token.",
    );

    // Keep runtime databases in a dedicated folder so the repo root stays tidy.
    let data_dir = "data";
    std::fs::create_dir_all(data_dir).expect("Failed to create data directory for SQLite files");
    let db_path = format!("{}/modguard.db", data_dir);

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Create our stores here; the services that need gateway access are
    // wired in the framework setup below, once Discord handles exist.

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .connect(&format!("sqlite://{}?mode=rwc", db_path))
        .await
        .expect("Failed to connect to SQLite database");

    let case_store = SqliteCaseStore::new(pool.clone());
    case_store
        .migrate()
        .await
        .expect("Failed to migrate case tables");

    let config_store = SqliteConfigStore::new(pool.clone());
    config_store
        .migrate()
        .await
        .expect("Failed to migrate config tables");

    // Shared phishing domain lists, populated by the background fetcher.
    let phishing_lists = Arc::new(RwLock::new(PhishingLists::default()));

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================
    // Configure the poise framework with our commands and settings.

    let intents = serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT // Required to read message content
        | serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_MODERATION;

    let setup_lists = Arc::clone(&phishing_lists);
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            // Register all our commands here
            commands: vec![
                discord::commands::moderation::warn(),
                discord::commands::moderation::mute(),
                discord::commands::moderation::unmute(),
                discord::commands::moderation::kick(),
                discord::commands::moderation::softban(),
                discord::commands::moderation::ban(),
                discord::commands::moderation::unban(),
                discord::commands::moderation::case(),
                discord::commands::automod::automod(),
            ],
            // Event handler for messages and other events
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                tracing::info!("Bot is starting up...");

                // Register slash commands globally (can take up to an hour to propagate)
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                // The gateway adapter backs every core port that talks to
                // Discord: invite lookups, entity resolution, enforcement
                // and messaging.
                let gateway = SerenityGateway::new(ctx.http.clone(), ctx.cache.clone());
                let bot_user_id = ctx.cache.current_user().id.get();

                let locales = Arc::new(Localizer::new());
                let config = Arc::new(ConfigService::new(config_store));
                let modlog = Arc::new(ModlogService::new(case_store, gateway.clone()));
                let automod = Arc::new(AutomodService::new(
                    gateway.clone(),
                    Arc::clone(&setup_lists),
                ));
                let actions = Arc::new(ActionService::new(
                    Arc::clone(&modlog),
                    gateway.clone(),
                    gateway.clone(),
                    Arc::clone(&locales),
                    bot_user_id,
                ));

                // Background phishing list refresh. The first fetch runs
                // immediately so the detector is armed from the start.
                let fetcher = PhishingListFetcher::new(Arc::clone(&setup_lists));
                tokio::spawn(async move {
                    loop {
                        match fetcher.refresh().await {
                            Ok((guaranteed, suspicious)) => tracing::info!(
                                guaranteed,
                                suspicious,
                                "phishing domain lists refreshed"
                            ),
                            Err(err) => {
                                tracing::warn!(error = %err, "phishing list refresh failed")
                            }
                        }
                        tokio::time::sleep(std::time::Duration::from_secs(PHISHING_REFRESH_SECS))
                            .await;
                    }
                });

                tracing::info!("Bot is ready");

                Ok(Data {
                    config,
                    automod,
                    modlog,
                    actions,
                    locales,
                })
            })
        })
        .build();

    // Create the client and start the bot
    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await
        .expect("Error creating client");

    client.start().await.expect("Error running bot");
}
