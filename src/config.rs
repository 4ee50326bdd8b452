// Environment configuration, read once at startup.

use crate::core::rooms::RoomSettings;
use std::time::Duration;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("Missing {0} environment variable")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub token: String,
    pub rooms: RoomSettings,
    /// How often stale cooldown entries are swept.
    pub sweep_interval: Duration,
    /// How often every configured member counter is refreshed.
    pub counter_interval: Duration,
    pub dev_guild_id: Option<u64>,
    /// Channel that receives the log line of every issued card.
    pub card_log_channel_id: Option<u64>,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from any key lookup. `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let token = lookup("DISCORD_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;

        let secs = |name: &'static str, default: u64| -> Result<Duration, ConfigError> {
            parse_or(&lookup, name, default).map(Duration::from_secs)
        };

        let defaults = RoomSettings::default();
        let rooms = RoomSettings {
            cooldown: secs("ROOM_COOLDOWN_SECS", defaults.cooldown.as_secs())?,
            creation_guard: secs("ROOM_CREATION_GUARD_SECS", defaults.creation_guard.as_secs())?,
            move_timeout: secs("ROOM_MOVE_TIMEOUT_SECS", defaults.move_timeout.as_secs())?,
            delete_grace: secs("ROOM_DELETE_GRACE_SECS", defaults.delete_grace.as_secs())?,
            stale_after: secs("ROOM_STALE_AFTER_SECS", defaults.stale_after.as_secs())?,
        };

        let dev_guild_id = optional_id(&lookup, "DEV_GUILD_ID")?;
        let card_log_channel_id = optional_id(&lookup, "CARD_LOG_CHANNEL_ID")?;

        // Intervals drive tokio tickers, which reject a zero period.
        let interval = |name: &'static str, default: u64| -> Result<Duration, ConfigError> {
            match secs(name, default)? {
                d if d.is_zero() => Err(ConfigError::InvalidValue {
                    name,
                    value: "0".to_string(),
                }),
                d => Ok(d),
            }
        };

        Ok(Self {
            token,
            rooms,
            sweep_interval: interval("ROOM_SWEEP_INTERVAL_SECS", 30)?,
            counter_interval: interval("MEMBER_COUNTER_INTERVAL_SECS", 300)?,
            dev_guild_id,
            card_log_channel_id,
        })
    }
}

fn parse_or(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
        None => Ok(default),
    }
}

/// Blank counts as unset.
fn optional_id(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<u64>, ConfigError> {
    match lookup(name).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
        None => Ok(None),
    }
}
