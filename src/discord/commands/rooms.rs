// Discord commands for personal voice rooms.
//
// Thin layer: extract ids, call the room/community services, format a reply.

use super::author_is_room_admin;
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

// Keeps the embed field under Discord's 1024 character limit.
const MAX_LISTED_ROOMS: usize = 10;

const NOT_ALLOWED: &str = "You need to be a Founder or Co-founder to use this command!";

async fn reply_ephemeral(ctx: Context<'_>, content: impl Into<String>) -> Result<(), Error> {
    ctx.send(
        poise::CreateReply::default()
            .content(content)
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Select a voice channel as community channel (Founder/Co-founder only).
#[poise::command(slash_command, guild_only)]
pub async fn select_community_channels(
    ctx: Context<'_>,
    #[description = "Voice channel that creates personal rooms"]
    #[channel_types("Voice")]
    channel: serenity::GuildChannel,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();

    if !author_is_room_admin(ctx).await? {
        tracing::warn!(
            user_id = ctx.author().id.get(),
            "Unauthorized select_community_channels attempt"
        );
        return reply_ephemeral(ctx, NOT_ALLOWED).await;
    }

    ctx.data()
        .community
        .set_triggers(guild_id, [channel.id.get()]);
    tracing::info!(
        guild_id,
        channel_id = channel.id.get(),
        "Community channel set by {}",
        ctx.author().name
    );

    reply_ephemeral(ctx, format!("Community channel set to: <#{}>!", channel.id)).await
}

/// Add another community channel next to the existing ones (Founder/Co-founder only).
#[poise::command(slash_command, guild_only)]
pub async fn add_community_channel(
    ctx: Context<'_>,
    #[description = "Voice channel that creates personal rooms"]
    #[channel_types("Voice")]
    channel: serenity::GuildChannel,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();

    if !author_is_room_admin(ctx).await? {
        tracing::warn!(
            user_id = ctx.author().id.get(),
            "Unauthorized add_community_channel attempt"
        );
        return reply_ephemeral(ctx, NOT_ALLOWED).await;
    }

    if !ctx.data().community.add_trigger(guild_id, channel.id.get()) {
        return reply_ephemeral(ctx, format!("<#{}> is already a community channel.", channel.id)).await;
    }

    tracing::info!(guild_id, channel_id = channel.id.get(), "Community channel added");
    reply_ephemeral(ctx, format!("Added community channel: <#{}>", channel.id)).await
}

/// Stop a voice channel from creating rooms (Founder/Co-founder only).
#[poise::command(slash_command, guild_only)]
pub async fn remove_community_channel(
    ctx: Context<'_>,
    #[description = "Community channel to remove"]
    #[channel_types("Voice")]
    channel: serenity::GuildChannel,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();

    if !author_is_room_admin(ctx).await? {
        tracing::warn!(
            user_id = ctx.author().id.get(),
            "Unauthorized remove_community_channel attempt"
        );
        return reply_ephemeral(ctx, NOT_ALLOWED).await;
    }

    if !ctx.data().community.remove_trigger(guild_id, channel.id.get()) {
        return reply_ephemeral(ctx, format!("<#{}> is not a community channel.", channel.id)).await;
    }

    tracing::info!(guild_id, channel_id = channel.id.get(), "Community channel removed");
    reply_ephemeral(ctx, format!("Removed community channel: <#{}>", channel.id)).await
}

/// Remove a room by selection (Founder/Co-founder only).
#[poise::command(slash_command, guild_only)]
pub async fn remove_room(
    ctx: Context<'_>,
    #[description = "Voice or text channel of the room"]
    #[channel_types("Voice", "Text")]
    room: serenity::GuildChannel,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();

    if !author_is_room_admin(ctx).await? {
        tracing::warn!(user_id = ctx.author().id.get(), "Unauthorized remove_room attempt");
        return reply_ephemeral(ctx, NOT_ALLOWED).await;
    }

    let removed = ctx.data().rooms.remove_room(guild_id, room.id.get()).await;

    if removed.is_empty() {
        tracing::warn!(channel_id = room.id.get(), "No channels found to remove");
        return reply_ephemeral(ctx, format!("No channels found with name '{}'!", room.name)).await;
    }

    let deleted: Vec<&str> = removed.deleted.iter().map(|(_, name)| name.as_str()).collect();
    let mut message = if deleted.is_empty() {
        format!("❌ Could not remove {}.", room.name)
    } else {
        format!("✅ Removed {}: {}", room.name, deleted.join(", "))
    };
    if !removed.failed.is_empty() {
        message.push_str(&format!(
            "\n⚠️ {} channel(s) could not be deleted, check my permissions.",
            removed.failed.len()
        ));
    }

    tracing::info!(
        guild_id,
        deleted = removed.deleted.len(),
        failed = removed.failed.len(),
        "Room removed by {}",
        ctx.author().name
    );
    reply_ephemeral(ctx, message).await
}

/// List the personal rooms that are currently open.
#[poise::command(slash_command, guild_only)]
pub async fn rooms(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let data = ctx.data();

    let rooms = data.rooms.rooms_in_guild(guild_id).await;
    let triggers = data.community.triggers(guild_id);

    let trigger_list = if triggers.is_empty() {
        "Not set - use `/select_community_channels`".to_string()
    } else {
        triggers
            .iter()
            .map(|id| format!("<#{}>", id))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut room_list = if rooms.is_empty() {
        "No rooms open right now.".to_string()
    } else {
        rooms
            .iter()
            .take(MAX_LISTED_ROOMS)
            .map(|room| {
                format!(
                    "🔊 <#{}> · 💬 <#{}> · <@{}> · opened <t:{}:R>",
                    room.voice_id,
                    room.text_id,
                    room.owner_id,
                    room.created_at.timestamp()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };
    if rooms.len() > MAX_LISTED_ROOMS {
        room_list.push_str(&format!("\n…and {} more", rooms.len() - MAX_LISTED_ROOMS));
    }

    let embed = serenity::CreateEmbed::new()
        .title("Voice Rooms")
        .color(serenity::Color::BLURPLE)
        .field("Community channels", trigger_list, false)
        .field(format!("Open rooms ({})", rooms.len()), room_list, false)
        .timestamp(serenity::Timestamp::now());

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}
