pub mod member_counter_models;
pub mod member_counter_service;
pub mod member_counter_store;

pub use member_counter_models::{MemberCounterConfig, MemberCounts};
pub use member_counter_service::{CounterError, MemberCounterService};
pub use member_counter_store::{CounterStore, StoreError};
