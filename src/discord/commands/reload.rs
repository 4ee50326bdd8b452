use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

/// Re-register the bot's slash commands (Admin only).
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn reload(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;

    let commands = &ctx.framework().options().commands;
    let result = match ctx.data().dev_guild_id {
        Some(guild_id) => {
            poise::builtins::register_in_guild(ctx.http(), commands, serenity::GuildId::new(guild_id))
                .await
        }
        None => poise::builtins::register_globally(ctx.http(), commands).await,
    };

    match result {
        Ok(()) => {
            tracing::info!(user_id = ctx.author().id.get(), "Commands reloaded");
            ctx.say("✅ Commands reloaded successfully!").await?;
        }
        Err(e) => {
            tracing::error!("Failed to reload commands: {}", e);
            ctx.say(format!("❌ Failed to reload commands: {}", e)).await?;
        }
    }

    Ok(())
}
