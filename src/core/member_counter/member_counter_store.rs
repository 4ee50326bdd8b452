use super::member_counter_models::MemberCounterConfig;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Config not found")]
    NotFound,
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn get_config(&self, guild_id: u64) -> Result<Option<MemberCounterConfig>, StoreError>;
    async fn save_config(&self, config: MemberCounterConfig) -> Result<(), StoreError>;
    async fn delete_config(&self, guild_id: u64) -> Result<(), StoreError>;
    async fn get_all_configs(&self) -> Result<Vec<MemberCounterConfig>, StoreError>;
}
