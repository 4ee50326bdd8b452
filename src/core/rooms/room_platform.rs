// The chat platform as seen by the room lifecycle.
//
// This is the "port": core decides what it needs from Discord, infra provides it.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Voice,
    Text,
    Other,
}

/// Snapshot of a guild channel as read from the platform cache.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelInfo {
    pub id: u64,
    pub guild_id: u64,
    pub name: String,
    pub kind: ChannelKind,
    pub category_id: Option<u64>,
    pub position: u16,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlatformError {
    #[error("Missing permissions for this operation")]
    PermissionDenied,

    #[error("Channel or member not found")]
    NotFound,

    #[error("Operation timed out")]
    Timeout,

    #[error("Remote error: {0}")]
    Transient(String),
}

/// Remote operations and cached reads the room lifecycle consumes.
///
/// Every async method is independently fallible; reads may be briefly stale
/// right after a channel was created or deleted.
#[async_trait]
pub trait ChannelPlatform: Send + Sync + 'static {
    async fn create_voice_channel(
        &self,
        guild_id: u64,
        name: &str,
        category_id: Option<u64>,
    ) -> Result<ChannelInfo, PlatformError>;

    async fn create_text_channel(
        &self,
        guild_id: u64,
        name: &str,
        category_id: Option<u64>,
    ) -> Result<ChannelInfo, PlatformError>;

    async fn delete_channel(&self, channel_id: u64) -> Result<(), PlatformError>;

    async fn edit_channel_position(
        &self,
        channel_id: u64,
        position: u16,
    ) -> Result<(), PlatformError>;

    async fn move_member(
        &self,
        guild_id: u64,
        user_id: u64,
        channel_id: u64,
    ) -> Result<(), PlatformError>;

    async fn send_message(&self, channel_id: u64, content: &str) -> Result<(), PlatformError>;

    fn channel(&self, guild_id: u64, channel_id: u64) -> Option<ChannelInfo>;

    fn guild_channels(&self, guild_id: u64) -> Vec<ChannelInfo>;

    /// User ids currently connected to a voice channel.
    fn channel_members(&self, guild_id: u64, channel_id: u64) -> Vec<u64>;
}
