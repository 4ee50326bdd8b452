// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "rooms/mod.rs"]
pub mod rooms;

#[path = "community/community_service.rs"]
pub mod community;

#[path = "member_counter/mod.rs"]
pub mod member_counter;

#[path = "cards/mod.rs"]
pub mod cards;
