// Bot presence. Discord-layer glue only.

use poise::serenity_prelude as serenity;

/// Called once the bot is ready so the member list shows what the bot does.
pub fn on_ready(ctx: &serenity::Context) {
    let activity = serenity::ActivityData::watching("voice rooms");
    ctx.set_presence(Some(activity), serenity::OnlineStatus::Online);
}
