/// Which channels show the member counts of a guild.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberCounterConfig {
    pub guild_id: u64,
    pub total_channel_id: u64,
    pub online_channel_id: u64,
}

/// Counts gathered by the Discord layer for one refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberCounts {
    pub total: u64,
    pub online: u64,
}
