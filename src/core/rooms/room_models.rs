// Voice-room domain models.
//
// Pure data: ids are raw u64 snowflakes so nothing here depends on Discord types.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Timing knobs for the room lifecycle.
#[derive(Debug, Clone)]
pub struct RoomSettings {
    /// Minimum time between processed join events for the same user.
    pub cooldown: Duration,
    /// How long a creation-in-flight marker blocks another creation.
    pub creation_guard: Duration,
    /// Upper bound for moving the user into a freshly created room.
    pub move_timeout: Duration,
    /// Delay before an emptied room is deleted.
    pub delete_grace: Duration,
    /// Registry entries older than this are dropped by the sweep.
    pub stale_after: Duration,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(2),
            creation_guard: Duration::from_secs(10),
            move_timeout: Duration::from_secs(5),
            delete_grace: Duration::from_secs(2),
            stale_after: Duration::from_secs(60),
        }
    }
}

/// A voice channel and its companion text channel, created together for one user.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomPair {
    pub guild_id: u64,
    pub owner_id: u64,
    pub voice_id: u64,
    pub text_id: u64,
    pub created_at: DateTime<Utc>,
}

impl RoomPair {
    /// The other half of the pair, if `channel_id` belongs to it.
    pub fn companion_of(&self, channel_id: u64) -> Option<u64> {
        if channel_id == self.voice_id {
            Some(self.text_id)
        } else if channel_id == self.text_id {
            Some(self.voice_id)
        } else {
            None
        }
    }
}

/// Everything the lifecycle manager needs to provision a room for a user.
#[derive(Debug, Clone)]
pub struct RoomRequest {
    pub guild_id: u64,
    pub user_id: u64,
    pub display_name: String,
    pub trigger_channel_id: u64,
}

/// Why a join event was dropped without touching the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another join for this user is being processed or was processed very recently.
    Cooldown,
    /// A creation for this user started less than `creation_guard` ago.
    InFlight,
}

/// Result of running the creation protocol once.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomOutcome {
    Created(RoomPair),
    MovedToExisting(u64),
    Skipped(SkipReason),
    /// Channels were created but the user could not be moved; both were deleted again.
    RolledBack,
    /// Provisioning failed before the user could be moved.
    Failed,
}

/// Result of the deletion step of the teardown protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum TeardownOutcome {
    Deleted { pair: RoomPair, failures: usize },
    /// Somebody is in the room again, nothing was removed.
    Occupied,
    /// The channel is not an auto-created room.
    NotManaged,
    /// Deleting the voice channel failed; the pair is kept so a later leave can retry.
    Failed,
}

/// Report of an administrative room removal.
#[derive(Debug, Clone, Default)]
pub struct RemovedRoom {
    pub deleted: Vec<(u64, String)>,
    pub failed: Vec<u64>,
}

impl RemovedRoom {
    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty() && self.failed.is_empty()
    }
}

/// A raw "member changed voice state" notification.
#[derive(Debug, Clone)]
pub struct VoiceUpdate {
    pub guild_id: u64,
    pub user_id: u64,
    pub display_name: String,
    pub before: Option<u64>,
    pub after: Option<u64>,
}

/// What the router decided a voice update means for the room lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    JoinedTrigger {
        guild_id: u64,
        user_id: u64,
        display_name: String,
        trigger_channel_id: u64,
    },
    LeftRoom {
        guild_id: u64,
        voice_id: u64,
    },
}

/// Discord lowercases text channel names and replaces spaces with dashes,
/// so a voice "Alice Smith" pairs with text "alice-smith".
pub fn room_slug(name: &str) -> String {
    name.trim()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
}
