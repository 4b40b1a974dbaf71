//! Shard fleet management.
//!
//! Startup sequencing, per-shard health, and the periodic guild-count
//! aggregation task.

mod aggregator;
mod client;
mod status;
mod supervisor;

pub use aggregator::GuildCountAggregator;
pub use client::{ClientError, PacketHooks, ShardClient, ShardClientBuilder, ShardDescriptor};
pub use status::{FleetStatus, ShardHealth};
pub use supervisor::{start_fleet, Fleet};
