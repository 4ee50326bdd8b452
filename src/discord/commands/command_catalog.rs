// Discord commands module.
// Each feature gets its own command file.

pub mod cards;

pub mod member_counter;

pub mod ping;

pub mod presence;

pub mod reload;

pub mod rooms;

use crate::core::community::is_room_admin;
use crate::discord::{Context, Error};

/// Everything registered with the framework.
pub fn all() -> Vec<poise::Command<crate::discord::Data, Error>> {
    vec![
        ping::ping(),
        reload::reload(),
        rooms::select_community_channels(),
        rooms::add_community_channel(),
        rooms::remove_community_channel(),
        rooms::remove_room(),
        rooms::rooms(),
        member_counter::setup_member_counter(),
        member_counter::member_counter_status(),
        member_counter::force_update_counter(),
        member_counter::remove_member_counter(),
        cards::bad_slip(),
        cards::good_slip(),
        cards::complaint(),
        cards::mentee(),
    ]
}

/// Founder/co-founder/admin role check shared by the management commands.
pub(crate) async fn author_is_room_admin(ctx: Context<'_>) -> Result<bool, Error> {
    let Some(member) = ctx.author_member().await else {
        return Ok(false);
    };
    let Some(guild) = ctx.guild() else {
        return Ok(false);
    };

    let role_names = member
        .roles
        .iter()
        .filter_map(|role_id| guild.roles.get(role_id))
        .map(|role| role.name.as_str());

    Ok(is_room_admin(role_names))
}
