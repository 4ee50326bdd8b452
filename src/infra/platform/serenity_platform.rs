// Serenity implementation of the ChannelPlatform port.
//
// Writes go through the HTTP client, reads come from the gateway cache.

use crate::core::rooms::{ChannelInfo, ChannelKind, ChannelPlatform, PlatformError};
use async_trait::async_trait;
use serenity::all::{
    Cache, ChannelId, ChannelType, CreateChannel, EditChannel, GuildChannel, GuildId, Http,
    UserId,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct SerenityPlatform {
    http: Arc<Http>,
    cache: Arc<Cache>,
}

impl SerenityPlatform {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>) -> Self {
        Self { http, cache }
    }

    async fn create_channel(
        &self,
        guild_id: u64,
        name: &str,
        kind: ChannelType,
        category_id: Option<u64>,
    ) -> Result<ChannelInfo, PlatformError> {
        let mut builder = CreateChannel::new(name).kind(kind);
        if let Some(category_id) = category_id {
            builder = builder.category(ChannelId::new(category_id));
        }

        let channel = GuildId::new(guild_id)
            .create_channel(&self.http, builder)
            .await
            .map_err(map_serenity_error)?;
        Ok(to_channel_info(&channel))
    }
}

/// Map Discord failures onto the room error taxonomy.
fn map_serenity_error(err: serenity::Error) -> PlatformError {
    match &err {
        serenity::Error::Http(http_err) => match http_err.status_code().map(|s| s.as_u16()) {
            Some(403) => PlatformError::PermissionDenied,
            Some(404) => PlatformError::NotFound,
            _ => PlatformError::Transient(err.to_string()),
        },
        serenity::Error::Model(serenity::model::ModelError::InvalidPermissions { .. }) => {
            PlatformError::PermissionDenied
        }
        _ => PlatformError::Transient(err.to_string()),
    }
}

fn to_channel_info(channel: &GuildChannel) -> ChannelInfo {
    let kind = match channel.kind {
        ChannelType::Voice => ChannelKind::Voice,
        ChannelType::Text => ChannelKind::Text,
        _ => ChannelKind::Other,
    };

    ChannelInfo {
        id: channel.id.get(),
        guild_id: channel.guild_id.get(),
        name: channel.name.clone(),
        kind,
        category_id: channel.parent_id.map(|id| id.get()),
        position: channel.position,
    }
}

#[async_trait]
impl ChannelPlatform for SerenityPlatform {
    async fn create_voice_channel(
        &self,
        guild_id: u64,
        name: &str,
        category_id: Option<u64>,
    ) -> Result<ChannelInfo, PlatformError> {
        self.create_channel(guild_id, name, ChannelType::Voice, category_id)
            .await
    }

    async fn create_text_channel(
        &self,
        guild_id: u64,
        name: &str,
        category_id: Option<u64>,
    ) -> Result<ChannelInfo, PlatformError> {
        self.create_channel(guild_id, name, ChannelType::Text, category_id)
            .await
    }

    async fn delete_channel(&self, channel_id: u64) -> Result<(), PlatformError> {
        ChannelId::new(channel_id)
            .delete(&self.http)
            .await
            .map(|_| ())
            .map_err(map_serenity_error)
    }

    async fn edit_channel_position(
        &self,
        channel_id: u64,
        position: u16,
    ) -> Result<(), PlatformError> {
        ChannelId::new(channel_id)
            .edit(&self.http, EditChannel::new().position(position))
            .await
            .map(|_| ())
            .map_err(map_serenity_error)
    }

    async fn move_member(
        &self,
        guild_id: u64,
        user_id: u64,
        channel_id: u64,
    ) -> Result<(), PlatformError> {
        GuildId::new(guild_id)
            .move_member(&self.http, UserId::new(user_id), ChannelId::new(channel_id))
            .await
            .map(|_| ())
            .map_err(map_serenity_error)
    }

    async fn send_message(&self, channel_id: u64, content: &str) -> Result<(), PlatformError> {
        ChannelId::new(channel_id)
            .say(&self.http, content)
            .await
            .map(|_| ())
            .map_err(map_serenity_error)
    }

    fn channel(&self, guild_id: u64, channel_id: u64) -> Option<ChannelInfo> {
        let guild = self.cache.guild(GuildId::new(guild_id))?;
        guild
            .channels
            .get(&ChannelId::new(channel_id))
            .map(to_channel_info)
    }

    fn guild_channels(&self, guild_id: u64) -> Vec<ChannelInfo> {
        match self.cache.guild(GuildId::new(guild_id)) {
            Some(guild) => guild.channels.values().map(to_channel_info).collect(),
            None => Vec::new(),
        }
    }

    fn channel_members(&self, guild_id: u64, channel_id: u64) -> Vec<u64> {
        let Some(guild) = self.cache.guild(GuildId::new(guild_id)) else {
            return Vec::new();
        };
        let channel_id = ChannelId::new(channel_id);

        guild
            .voice_states
            .values()
            .filter(|vs| vs.channel_id == Some(channel_id))
            .map(|vs| vs.user_id.get())
            .collect()
    }
}
