// Discord layer - commands and event handlers.

use crate::core::cards::CardService;
use crate::core::community::CommunityChannelService;
use crate::core::member_counter::MemberCounterService;
use crate::core::rooms::{RoomLifecycleManager, RouterHandle};
use crate::infra::member_counter::InMemoryCounterStore;
use crate::infra::platform::SerenityPlatform;
use std::sync::Arc;

#[path = "commands/command_catalog.rs"]
pub mod commands;

#[path = "rooms/voice_events.rs"]
pub mod voice_events;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// Shared state handed to every command and event handler.
pub struct Data {
    pub rooms: Arc<RoomLifecycleManager<SerenityPlatform>>,
    pub router: RouterHandle,
    pub community: Arc<CommunityChannelService>,
    pub member_counter: Arc<MemberCounterService<InMemoryCounterStore>>,
    pub cards: Arc<CardService<SerenityPlatform>>,
    /// Register commands in this guild only instead of globally.
    pub dev_guild_id: Option<u64>,
}
