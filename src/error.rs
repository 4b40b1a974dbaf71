//! Domain error types for the fleet supervisor.
//!
//! Structured thiserror variants for navigable diagnostics and
//! compile-time exhaustive handling.
//!
//! main.rs is the ONLY module allowed to use anyhow::Result (process boundary).
//! All application code returns Result<T, FleetError>.

use thiserror::Error;

/// Fleet domain errors.
///
/// Every variant carries structured context fields for diagnostics.
/// On-call engineers can pattern-match on the variant to understand
/// the failure mode without parsing error message strings.
///
/// Fatal kinds (`ConfigMissing`, `ConfigInvalid`, `ShardStartup`) unwind to
/// process exit. Recoverable kinds (`ShardPacket`, `ShardPoll`,
/// `ShardCircuitBroken`) are caught at the shard boundary and routed to the
/// error sink, never allowed to cross into sibling shards or an aggregation
/// pass result.
#[derive(Error, Debug)]
pub enum FleetError {
    /// A required configuration key is absent from the environment.
    #[error("required configuration key {key} is not set")]
    ConfigMissing { key: &'static str },

    /// A configuration key is present but syntactically invalid.
    ///
    /// Distinct from `ConfigMissing`: an absent METRICS_PORT disables the
    /// metrics listener, while a malformed one is this error.
    #[error("configuration key {key} is invalid: {reason}")]
    ConfigInvalid { key: &'static str, reason: String },

    /// A shard failed to connect during fleet startup (fatal — no partial
    /// fleet is accepted, shards above this id are never attempted).
    #[error("shard {shard_id} failed to connect during fleet startup")]
    ShardStartup {
        shard_id: u32,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A packet handler failed inside an already-connected shard
    /// (recoverable — isolated to that shard, reported not raised).
    #[error("packet handler error on shard {shard_id}")]
    ShardPacket {
        shard_id: u32,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A guild-count poll failed during an aggregation pass
    /// (recoverable — the shard contributes zero to that pass).
    #[error("guild count poll failed for shard {shard_id}")]
    ShardPoll {
        shard_id: u32,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Shard exceeded consecutive receive-error threshold (circuit breaker
    /// tripped, shard marked dead).
    #[error("shard {shard_id} exceeded consecutive error threshold ({count}/{max})")]
    ShardCircuitBroken { shard_id: u32, count: u32, max: u32 },
}

impl FleetError {
    /// Returns a static label string suitable for structured log fields.
    pub fn error_type_label(&self) -> &'static str {
        match self {
            Self::ConfigMissing { .. } => "config_missing",
            Self::ConfigInvalid { .. } => "config_invalid",
            Self::ShardStartup { .. } => "shard_startup",
            Self::ShardPacket { .. } => "shard_packet",
            Self::ShardPoll { .. } => "shard_poll",
            Self::ShardCircuitBroken { .. } => "circuit_broken",
        }
    }

    /// True for errors that must abort process startup.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigMissing { .. } | Self::ConfigInvalid { .. } | Self::ShardStartup { .. }
        )
    }
}
