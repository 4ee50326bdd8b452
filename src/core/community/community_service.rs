// Community (trigger) channel configuration.
//
// Which voice channels spawn personal rooms, per guild. In-memory only: the
// set is rebuilt by an admin after a restart.

use dashmap::{DashMap, DashSet};

/// Role names allowed to manage rooms and counters.
const ROOM_ADMIN_ROLES: [&str; 4] = ["founder", "co-founder", "cofounder", "admin"];

/// True when any of the given role names grants room administration.
pub fn is_room_admin<'a>(role_names: impl IntoIterator<Item = &'a str>) -> bool {
    role_names.into_iter().any(|name| {
        let name = name.trim().to_lowercase();
        ROOM_ADMIN_ROLES.contains(&name.as_str())
    })
}

pub struct CommunityChannelService {
    // Guild ID -> trigger voice channel IDs
    triggers: DashMap<u64, DashSet<u64>>,
}

impl CommunityChannelService {
    pub fn new() -> Self {
        Self {
            triggers: DashMap::new(),
        }
    }

    /// Replace the guild's trigger set.
    pub fn set_triggers(&self, guild_id: u64, channel_ids: impl IntoIterator<Item = u64>) {
        let set: DashSet<u64> = channel_ids.into_iter().collect();
        if set.is_empty() {
            self.triggers.remove(&guild_id);
        } else {
            self.triggers.insert(guild_id, set);
        }
    }

    /// Returns false if the channel was already a trigger.
    pub fn add_trigger(&self, guild_id: u64, channel_id: u64) -> bool {
        self.triggers.entry(guild_id).or_default().insert(channel_id)
    }

    /// Returns false if the channel was not a trigger.
    pub fn remove_trigger(&self, guild_id: u64, channel_id: u64) -> bool {
        let removed = self
            .triggers
            .get(&guild_id)
            .map(|set| set.remove(&channel_id).is_some())
            .unwrap_or(false);
        self.triggers.remove_if(&guild_id, |_, set| set.is_empty());
        removed
    }

    pub fn is_trigger(&self, guild_id: u64, channel_id: u64) -> bool {
        self.triggers
            .get(&guild_id)
            .map(|set| set.contains(&channel_id))
            .unwrap_or(false)
    }

    pub fn triggers(&self, guild_id: u64) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .triggers
            .get(&guild_id)
            .map(|set| set.iter().map(|id| *id).collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }
}
