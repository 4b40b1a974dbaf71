//! Fleet configuration module.
//!
//! Handles loading and validating configuration from environment variables.
//! Absent optional keys select documented defaults; absent required keys and
//! malformed values are distinct `FleetError` variants so callers can tell
//! "metrics disabled" apart from "metrics misconfigured".

use crate::error::FleetError;
use std::env;
use std::time::Duration;
use twilight_gateway::Intents;

/// Default spacing between successive shard connect calls.
///
/// Discord admits one identify per 5 seconds per bucket.
const DEFAULT_SHARD_CONNECT_DELAY_MS: u64 = 5_000;

/// Default guild-count aggregation period.
const DEFAULT_GUILD_POLL_INTERVAL_SECS: u64 = 15;

/// Validated fleet configuration.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Bind address for the health listener.
    pub host: String,

    /// Health listener port.
    pub port: u16,

    /// Discord bot token.
    pub discord_token: String,

    /// Number of shards this process brings up (ids 0..shard_count).
    pub shard_count: u32,

    /// Metrics listener port. None disables the metrics surface entirely:
    /// no listener is bound anywhere.
    pub metrics_port: Option<u16>,

    /// Shared secret for the metrics bearer check. Present whenever
    /// `metrics_port` is.
    pub metrics_auth: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Spacing between successive shard connects.
    pub shard_connect_delay: Duration,

    /// Period of the guild-count aggregation pass.
    pub guild_poll_interval: Duration,
}

impl FleetConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, FleetError> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Tests pass a closure over a map instead of mutating process
    /// environment.
    pub fn from_vars(get: impl Fn(&str) -> Option<String>) -> Result<Self, FleetError> {
        let host = get("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = parse_required(&get, "PORT")?;

        let discord_token = get("DISCORD_TOKEN")
            .filter(|t| !t.is_empty())
            .ok_or(FleetError::ConfigMissing {
                key: "DISCORD_TOKEN",
            })?;

        let shard_count: u32 = parse_with_default(&get, "SHARD_COUNT", 1)?;
        if shard_count == 0 {
            return Err(FleetError::ConfigInvalid {
                key: "SHARD_COUNT",
                reason: "must be greater than zero".to_string(),
            });
        }

        let metrics_port: Option<u16> = parse_optional(&get, "METRICS_PORT")?;

        // The metrics surface is fail-closed: a configured port without a
        // secret is a startup error, never an unauthenticated listener.
        let metrics_auth = get("METRICS_AUTH").filter(|s| !s.is_empty());
        if metrics_port.is_some() && metrics_auth.is_none() {
            return Err(FleetError::ConfigMissing {
                key: "METRICS_AUTH",
            });
        }

        let log_level = get("LOGGING_LEVEL").unwrap_or_else(|| "info".to_string());

        let shard_connect_delay = Duration::from_millis(parse_with_default(
            &get,
            "SHARD_CONNECT_DELAY_MS",
            DEFAULT_SHARD_CONNECT_DELAY_MS,
        )?);

        let guild_poll_interval = Duration::from_secs(parse_with_default(
            &get,
            "GUILD_POLL_INTERVAL_SECS",
            DEFAULT_GUILD_POLL_INTERVAL_SECS,
        )?);

        Ok(Self {
            host,
            port,
            discord_token,
            shard_count,
            metrics_port,
            metrics_auth,
            log_level,
            shard_connect_delay,
            guild_poll_interval,
        })
    }

    /// Get configured Discord intents.
    ///
    /// Minimal set: GUILDS covers the guild lifecycle events the guild
    /// counter needs.
    pub fn intents() -> Intents {
        Intents::GUILDS
    }
}

fn parse_required<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<T, FleetError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get(key).ok_or(FleetError::ConfigMissing { key })?;
    raw.parse().map_err(|e: T::Err| FleetError::ConfigInvalid {
        key,
        reason: e.to_string(),
    })
}

fn parse_optional<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, FleetError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e: T::Err| FleetError::ConfigInvalid {
                key,
                reason: e.to_string(),
            }),
    }
}

fn parse_with_default<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, FleetError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_optional(get, key)?.unwrap_or(default))
}
