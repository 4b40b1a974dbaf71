//! Production shard clients backed by the twilight gateway.

mod client;

pub use client::{DiscordShardBuilder, DiscordShardClient, ShardStopped};
