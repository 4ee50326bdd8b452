use crate::core::rooms::VoiceUpdate;
use crate::discord::Data;
use anyhow::Result;
use poise::serenity_prelude::{self as serenity, Context};

/// Forward a voice state change to the room router.
pub async fn handle_voice_state_update(
    ctx: &Context,
    data: &Data,
    old: Option<&serenity::VoiceState>,
    new: &serenity::VoiceState,
) -> Result<()> {
    let guild_id = match new.guild_id {
        Some(id) => id,
        None => return Ok(()),
    };

    // The gateway usually attaches the member; fall back to the cache otherwise.
    let member = match new.member.clone() {
        Some(m) => Some(m),
        None => ctx
            .cache
            .guild(guild_id)
            .and_then(|g| g.members.get(&new.user_id).cloned()),
    };
    let Some(member) = member else {
        tracing::debug!(user_id = new.user_id.get(), "Voice update without member data");
        return Ok(());
    };

    if member.user.bot {
        return Ok(());
    }

    let update = VoiceUpdate {
        guild_id: guild_id.get(),
        user_id: member.user.id.get(),
        display_name: member.display_name().to_string(),
        before: old.and_then(|s| s.channel_id.map(|id| id.get())),
        after: new.channel_id.map(|id| id.get()),
    };

    tracing::debug!(
        guild_id = update.guild_id,
        user_id = update.user_id,
        before = ?update.before,
        after = ?update.after,
        "Voice state update"
    );

    if !data.router.submit(update) {
        tracing::warn!("Room router has stopped, voice update dropped");
    }

    Ok(())
}
