use crate::discord::{Context, Error};

/// Responds with pong.
#[poise::command(slash_command)]
pub async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    tracing::info!(user_id = ctx.author().id.get(), "Ping command used");
    ctx.say("Pong!").await?;
    Ok(())
}
