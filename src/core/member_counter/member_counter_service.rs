use super::member_counter_models::{MemberCounterConfig, MemberCounts};
use super::member_counter_store::{CounterStore, StoreError};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Presence changes arrive constantly, renames are rate limited.
const PRESENCE_REFRESH_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum CounterError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Not configured")]
    NotConfigured,
    #[error("Total and online counters must be different channels")]
    SameChannel,
}

pub struct MemberCounterService<S: CounterStore> {
    store: S,
    presence_cooldown: Duration,
    // Guild ID -> last refresh triggered by a presence update
    last_presence_refresh: DashMap<u64, Instant>,
}

impl<S: CounterStore> MemberCounterService<S> {
    pub fn new(store: S) -> Self {
        Self::with_presence_cooldown(store, PRESENCE_REFRESH_COOLDOWN)
    }

    pub fn with_presence_cooldown(store: S, presence_cooldown: Duration) -> Self {
        Self {
            store,
            presence_cooldown,
            last_presence_refresh: DashMap::new(),
        }
    }

    /// Whether a presence update may refresh this guild's counters now.
    /// A successful claim starts the cooldown.
    pub fn claim_presence_refresh(&self, guild_id: u64, now: Instant) -> bool {
        match self.last_presence_refresh.entry(guild_id) {
            Entry::Occupied(mut last) => {
                if now.duration_since(*last.get()) < self.presence_cooldown {
                    return false;
                }
                last.insert(now);
                true
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
        }
    }

    /// Point the guild's counters at two channels. Reconfiguring overwrites.
    pub async fn configure(&self, config: MemberCounterConfig) -> Result<(), CounterError> {
        if config.total_channel_id == config.online_channel_id {
            return Err(CounterError::SameChannel);
        }

        self.store.save_config(config).await?;
        Ok(())
    }

    pub async fn get_config(
        &self,
        guild_id: u64,
    ) -> Result<Option<MemberCounterConfig>, CounterError> {
        Ok(self.store.get_config(guild_id).await?)
    }

    pub async fn require_config(&self, guild_id: u64) -> Result<MemberCounterConfig, CounterError> {
        self.store
            .get_config(guild_id)
            .await?
            .ok_or(CounterError::NotConfigured)
    }

    pub async fn remove(&self, guild_id: u64) -> Result<(), CounterError> {
        self.last_presence_refresh.remove(&guild_id);
        match self.store.delete_config(guild_id).await {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound) => Err(CounterError::NotConfigured),
        }
    }

    pub async fn all_configs(&self) -> Result<Vec<MemberCounterConfig>, CounterError> {
        Ok(self.store.get_all_configs().await?)
    }

    /// Channel names for the total and online counters.
    pub fn channel_names(&self, counts: MemberCounts) -> (String, String) {
        (
            format!("📊 Total: {} members", counts.total),
            format!("🟢 Online: {} members", counts.online),
        )
    }

    /// Renames are heavily rate limited, so skip them when nothing changed.
    pub fn needs_rename(&self, current: &str, wanted: &str) -> bool {
        current != wanted
    }
}
