use super::author_is_room_admin;
use crate::core::member_counter::{
    CounterError, MemberCounterConfig, MemberCounterService, MemberCounts,
};
use crate::discord::{Context, Error};
use crate::infra::member_counter::InMemoryCounterStore;
use poise::serenity_prelude as serenity;

/// Set up member counter channels (Founder/Co-founder only).
#[poise::command(slash_command, guild_only)]
pub async fn setup_member_counter(
    ctx: Context<'_>,
    #[description = "Channel showing the total member count"] total: serenity::GuildChannel,
    #[description = "Channel showing the online member count"] online: serenity::GuildChannel,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?;

    if !author_is_room_admin(ctx).await? {
        tracing::warn!(
            user_id = ctx.author().id.get(),
            "Unauthorized setup_member_counter attempt"
        );
        ctx.say("You need to be a Founder or Co-founder to use this command!")
            .await?;
        return Ok(());
    }

    let config = MemberCounterConfig {
        guild_id: guild_id.get(),
        total_channel_id: total.id.get(),
        online_channel_id: online.id.get(),
    };
    if let Err(e) = ctx.data().member_counter.configure(config).await {
        return match e {
            CounterError::SameChannel => {
                ctx.say(format!("❌ {}", e)).await?;
                Ok(())
            }
            other => Err(other.into()),
        };
    }

    update_member_counts(ctx.serenity_context(), &ctx.data().member_counter, guild_id).await?;

    tracing::info!(guild_id = guild_id.get(), "Member counter configured");
    ctx.say(format!(
        "✅ Member counter set up!\n📊 Total members: <#{}>\n🟢 Online members: <#{}>\n🔄 Updates automatically",
        total.id, online.id
    ))
    .await?;

    Ok(())
}

/// Show member counter configuration and current counts.
#[poise::command(slash_command, guild_only)]
pub async fn member_counter_status(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?;

    let config = match ctx.data().member_counter.get_config(guild_id.get()).await? {
        Some(c) => c,
        None => {
            ctx.send(
                poise::CreateReply::default()
                    .content("❌ Member counter is not set up for this server!")
                    .ephemeral(true),
            )
            .await?;
            return Ok(());
        }
    };

    let (counts, cached) = match guild_counts(ctx.serenity_context(), guild_id) {
        Some(c) => c,
        None => return Err("Guild not found in cache".into()),
    };

    let embed = serenity::CreateEmbed::default()
        .title("📊 Member Counter Status")
        .color(0x3498db)
        .field("Total channel", format!("<#{}>", config.total_channel_id), true)
        .field("Online channel", format!("<#{}>", config.online_channel_id), true)
        .field(
            "Current counts",
            format!(
                "• Total members: {}\n• Cached members: {}\n• Online: {}",
                counts.total, cached, counts.online
            ),
            false,
        );

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// Update the member counter right now (Founder/Co-founder only).
#[poise::command(slash_command, guild_only)]
pub async fn force_update_counter(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?;

    if !author_is_room_admin(ctx).await? {
        ctx.say("You need to be a Founder or Co-founder to use this command!")
            .await?;
        return Ok(());
    }

    match ctx.data().member_counter.require_config(guild_id.get()).await {
        Ok(_) => {}
        Err(CounterError::NotConfigured) => {
            ctx.say("❌ Member counter is not set up!").await?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    update_member_counts(ctx.serenity_context(), &ctx.data().member_counter, guild_id).await?;
    ctx.say("✅ Member counter updated!").await?;
    Ok(())
}

/// Stop updating the member counter channels (Founder/Co-founder only).
#[poise::command(slash_command, guild_only)]
pub async fn remove_member_counter(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?;

    if !author_is_room_admin(ctx).await? {
        ctx.say("You need to be a Founder or Co-founder to use this command!")
            .await?;
        return Ok(());
    }

    match ctx.data().member_counter.remove(guild_id.get()).await {
        Ok(()) => {
            tracing::info!(guild_id = guild_id.get(), "Member counter removed");
            ctx.say("✅ Member counter removed. The channels keep their last names.")
                .await?;
        }
        Err(CounterError::NotConfigured) => {
            ctx.say("❌ Member counter is not set up!").await?;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Total and online counts from the cache, plus how many members are cached.
fn guild_counts(ctx: &serenity::Context, guild_id: serenity::GuildId) -> Option<(MemberCounts, usize)> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;

    let online = guild
        .presences
        .values()
        .filter(|p| {
            !matches!(
                p.status,
                serenity::OnlineStatus::Offline | serenity::OnlineStatus::Invisible
            )
        })
        .count() as u64;

    Some((
        MemberCounts {
            total: guild.member_count,
            online,
        },
        guild.members.len(),
    ))
}

/// Helper function to refresh the counter channel names for a guild
pub async fn update_member_counts(
    ctx: &serenity::Context,
    counters: &MemberCounterService<InMemoryCounterStore>,
    guild_id: serenity::GuildId,
) -> Result<(), Error> {
    let config = match counters.get_config(guild_id.get()).await? {
        Some(c) => c,
        None => return Ok(()), // Not configured
    };

    let Some((counts, _)) = guild_counts(ctx, guild_id) else {
        return Ok(());
    };

    // Clone the names out so no cache guard is held across the awaits below.
    let current_names = guild_id.to_guild_cached(&ctx.cache).map(|guild| {
        let name_of = |id: u64| {
            guild
                .channels
                .get(&serenity::ChannelId::new(id))
                .map(|c| c.name.clone())
        };
        (name_of(config.total_channel_id), name_of(config.online_channel_id))
    });

    let Some((Some(current_total), Some(current_online))) = current_names else {
        tracing::warn!(guild_id = guild_id.get(), "Member counter channels not found");
        return Ok(());
    };

    let (total_name, online_name) = counters.channel_names(counts);
    let renames = [
        (config.total_channel_id, current_total, total_name),
        (config.online_channel_id, current_online, online_name),
    ];

    for (channel_id, current, wanted) in renames {
        if !counters.needs_rename(&current, &wanted) {
            continue;
        }
        match serenity::ChannelId::new(channel_id)
            .edit(ctx, serenity::EditChannel::new().name(&wanted))
            .await
        {
            Ok(_) => tracing::info!(channel_id, "Updated member counter to {}", wanted),
            Err(e) => tracing::error!(channel_id, "Failed to update member counter: {}", e),
        }
    }

    Ok(())
}
