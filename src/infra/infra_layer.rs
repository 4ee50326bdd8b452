// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "platform/mod.rs"]
pub mod platform;

#[path = "member_counter/mod.rs"]
pub mod member_counter;
