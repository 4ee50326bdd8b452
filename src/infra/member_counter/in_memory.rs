// In-memory CounterStore. Counter setup is lost on restart and has to be
// redone with /setup_member_counter.

use crate::core::member_counter::{CounterStore, MemberCounterConfig, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;

pub struct InMemoryCounterStore {
    // Guild ID -> counter channels
    configs: DashMap<u64, MemberCounterConfig>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self {
            configs: DashMap::new(),
        }
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn get_config(&self, guild_id: u64) -> Result<Option<MemberCounterConfig>, StoreError> {
        Ok(self.configs.get(&guild_id).map(|c| c.clone()))
    }

    async fn save_config(&self, config: MemberCounterConfig) -> Result<(), StoreError> {
        self.configs.insert(config.guild_id, config);
        Ok(())
    }

    async fn delete_config(&self, guild_id: u64) -> Result<(), StoreError> {
        self.configs
            .remove(&guild_id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn get_all_configs(&self) -> Result<Vec<MemberCounterConfig>, StoreError> {
        Ok(self.configs.iter().map(|c| c.value().clone()).collect())
    }
}
