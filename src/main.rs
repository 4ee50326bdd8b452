// This is the entry point of the Discord bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (Discord HTTP/cache, stores)
// - `discord/` = Discord-specific adapters (commands, events)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Start the background loops

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

mod config;

use crate::config::BotConfig;
use crate::core::cards::CardService;
use crate::core::community::CommunityChannelService;
use crate::core::member_counter::MemberCounterService;
use crate::core::rooms::{EventRouter, RoomLifecycleManager};
use crate::discord::commands::member_counter::update_member_counts;
use crate::discord::commands::presence;
use crate::discord::voice_events;
use crate::discord::{Data, Error};
use crate::infra::member_counter::InMemoryCounterStore;
use crate::infra::platform::SerenityPlatform;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// How long Ctrl-C waits for in-flight room creations before aborting them.
const ROUTER_DRAIN_TIMEOUT: Duration = Duration::from_secs(15);

/// Event handler for non-command Discord events.
async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::VoiceStateUpdate { old, new } => {
            if let Err(e) =
                voice_events::handle_voice_state_update(ctx, data, old.as_ref(), new).await
            {
                tracing::error!("Error handling voice state update: {}", e);
            }
        }
        serenity::FullEvent::GuildMemberAddition { new_member } => {
            if let Err(e) =
                update_member_counts(ctx, &data.member_counter, new_member.guild_id).await
            {
                tracing::error!("Error updating member counter on join: {}", e);
            }
        }
        serenity::FullEvent::GuildMemberRemoval { guild_id, .. } => {
            if let Err(e) = update_member_counts(ctx, &data.member_counter, *guild_id).await {
                tracing::error!("Error updating member counter on leave: {}", e);
            }
        }
        serenity::FullEvent::PresenceUpdate { new_data } => {
            // The cache already holds the new status, so throttle instead of diffing.
            if let Some(guild_id) = new_data.guild_id {
                if data
                    .member_counter
                    .claim_presence_refresh(guild_id.get(), tokio::time::Instant::now())
                {
                    if let Err(e) =
                        update_member_counts(ctx, &data.member_counter, guild_id).await
                    {
                        tracing::error!("Error updating member counter on presence: {}", e);
                    }
                }
            }
        }

        _ => {}
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = BotConfig::from_env().unwrap_or_else(|e| {
        panic!("Invalid configuration: {e}. Create a .env file with at least DISCORD_TOKEN.")
    });

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================

    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_VOICE_STATES
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_PRESENCES; // Online count for the member counter

    let token = config.token.clone();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: discord::commands::all(),
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            on_error: |error| {
                Box::pin(async move {
                    match error {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            tracing::error!(command = %ctx.command().name, "Command failed: {}", error);
                            let _ = ctx.say("Something went wrong, please try again.").await;
                        }
                        other => {
                            if let Err(e) = poise::builtins::on_error(other).await {
                                tracing::error!("Error while handling error: {}", e);
                            }
                        }
                    }
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                tracing::info!("🤖 Bot is starting up...");

                // ================================================================
                // DEPENDENCY INJECTION
                // ================================================================
                // The platform needs the client's HTTP handle and cache, so the
                // composition root lives here rather than before the client.

                let platform = SerenityPlatform::new(ctx.http.clone(), ctx.cache.clone());
                let cards = Arc::new(CardService::new(platform.clone(), config.card_log_channel_id));
                let rooms = Arc::new(RoomLifecycleManager::new(platform, config.rooms.clone()));
                let community = Arc::new(CommunityChannelService::new());
                let member_counter = Arc::new(MemberCounterService::new(InMemoryCounterStore::new()));

                let (router, router_task) =
                    EventRouter::spawn(Arc::clone(&rooms), Arc::clone(&community));

                let data = Data {
                    rooms: Arc::clone(&rooms),
                    router,
                    community,
                    member_counter: Arc::clone(&member_counter),
                    cards,
                    dev_guild_id: config.dev_guild_id,
                };

                let commands = &framework.options().commands;
                match config.dev_guild_id {
                    Some(guild_id) => {
                        poise::builtins::register_in_guild(
                            ctx,
                            commands,
                            serenity::GuildId::new(guild_id),
                        )
                        .await?;
                        tracing::info!(guild_id, "✅ Commands registered in dev guild");
                    }
                    None => {
                        // Global registration can take a while to propagate
                        poise::builtins::register_globally(ctx, commands).await?;
                        tracing::info!("✅ Commands registered globally");
                    }
                }

                presence::on_ready(ctx);
                tracing::info!("🚀 Bot is ready!");

                // Drop cooldown entries nobody has touched for a while.
                let sweep_rooms = Arc::clone(&rooms);
                let sweep_interval = config.sweep_interval;
                tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(sweep_interval);
                    loop {
                        ticker.tick().await;
                        sweep_rooms.sweep_expired(tokio::time::Instant::now());
                    }
                });

                // Periodic member counter refresh for every configured guild.
                let counter_ctx = ctx.clone();
                let counter_interval = config.counter_interval;
                tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(counter_interval);
                    loop {
                        ticker.tick().await;
                        let configs = match member_counter.all_configs().await {
                            Ok(configs) => configs,
                            Err(e) => {
                                tracing::warn!("Failed to load member counter configs: {}", e);
                                continue;
                            }
                        };
                        for counter in configs {
                            let guild_id = serenity::GuildId::new(counter.guild_id);
                            if let Err(e) =
                                update_member_counts(&counter_ctx, &member_counter, guild_id).await
                            {
                                tracing::warn!(
                                    guild_id = counter.guild_id,
                                    "Member counter refresh failed: {}",
                                    e
                                );
                            }
                        }
                    }
                });

                // Ctrl-C: stop taking voice events and let creations finish,
                // then stop pending room deletions, then the gateway.
                let shard_manager = framework.shard_manager().clone();
                tokio::spawn(async move {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!("Failed to listen for shutdown signal: {}", e);
                        return;
                    }
                    tracing::info!("Shutting down...");
                    if !router_task.shutdown(ROUTER_DRAIN_TIMEOUT).await {
                        tracing::warn!("Voice event router did not stop cleanly");
                    }
                    rooms.shutdown().await;
                    shard_manager.shutdown_all().await;
                });

                Ok(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await
        .expect("Error creating client");

    client.start().await.expect("Error running bot");
}
