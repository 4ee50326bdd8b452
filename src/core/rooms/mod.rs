// Core voice-room module - temporary voice+text room pairs per user.
// Following the same port/service split as the other core modules.

pub mod cooldown_registry;
pub mod event_router;
pub mod gather;
pub mod pairing_table;
pub mod room_models;
pub mod room_platform;
pub mod room_service;

pub use event_router::{EventRouter, RouterHandle};
pub use room_models::*;
pub use room_platform::{ChannelInfo, ChannelKind, ChannelPlatform, PlatformError};
pub use room_service::RoomLifecycleManager;
