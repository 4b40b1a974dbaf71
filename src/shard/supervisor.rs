//! Fleet startup sequencing.
//!
//! Shards come up strictly sequentially in ascending id order, spaced by a
//! configurable delay to respect the upstream connection-admission rate. A
//! handle joins the fleet only after its connect resolves; the first failure
//! aborts startup with the offending shard id, so a silently short fleet can
//! never misreport aggregated guild counts.

use crate::error::FleetError;
use crate::shard::client::{PacketHooks, ShardClient, ShardClientBuilder, ShardDescriptor};
use std::time::Duration;
use tracing::info;

/// The fleet: every connected shard handle, ordered and keyed by shard id.
///
/// Invariant once `start_fleet` returns: `handles[i].descriptor().id == i`
/// and `handles.len()` equals the requested shard count.
#[derive(Debug)]
pub struct Fleet<C> {
    handles: Vec<C>,
}

impl<C: ShardClient> Fleet<C> {
    pub fn shard_count(&self) -> usize {
        self.handles.len()
    }

    pub fn handles(&self) -> &[C] {
        &self.handles
    }

    pub fn get(&self, shard_id: u32) -> Option<&C> {
        self.handles.get(shard_id as usize)
    }
}

/// Bring up exactly `shard_count` shards, one at a time.
///
/// Each client is built bound to the packet hooks, connected, and only then
/// registered. A connect failure for shard `k` yields
/// `FleetError::ShardStartup { shard_id: k }` and no shard above `k` is
/// attempted.
pub async fn start_fleet<B: ShardClientBuilder>(
    builder: &B,
    shard_count: u32,
    connect_delay: Duration,
    hooks: PacketHooks,
) -> Result<Fleet<B::Client>, FleetError> {
    let delay_ms = connect_delay.as_millis() as u64;
    info!(shard_count, delay_ms, "Starting fleet");

    let mut handles = Vec::with_capacity(shard_count as usize);

    for shard_id in 0..shard_count {
        if shard_id > 0 && !connect_delay.is_zero() {
            tokio::time::sleep(connect_delay).await;
        }

        let descriptor = ShardDescriptor::new(shard_id, shard_count);
        let client = builder.build(descriptor, hooks.clone());

        info!(shard_id, "Connecting shard");
        client
            .connect()
            .await
            .map_err(|source| FleetError::ShardStartup { shard_id, source })?;
        info!(shard_id, "Shard connected");

        handles.push(client);
    }

    info!(shard_count, "Fleet startup complete");
    Ok(Fleet { handles })
}
