//! Per-shard health tracking.
//!
//! Written by shard adapters as their connections move through their
//! lifecycle, read by the readiness endpoint.

use dashmap::DashMap;
use std::sync::Arc;

/// Health status for a shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardHealth {
    /// Shard is connecting.
    Connecting,
    /// Shard is ready and receiving events.
    Ready,
    /// Shard hit transient receive errors and is recovering.
    Degraded,
    /// Shard encountered a fatal error and is out of the fleet.
    Dead,
}

impl ShardHealth {
    /// Returns true if the shard is alive (ready or recovering).
    pub fn is_healthy(&self) -> bool {
        matches!(self, ShardHealth::Ready | ShardHealth::Degraded)
    }

    /// Returns true if the shard is ready to receive events.
    pub fn is_ready(&self) -> bool {
        matches!(self, ShardHealth::Ready)
    }
}

/// Shared health map across all shards in the fleet.
#[derive(Debug, Clone, Default)]
pub struct FleetStatus {
    shards: Arc<DashMap<u32, ShardHealth>>,
}

impl FleetStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shard, starting it in `Connecting`.
    pub fn register(&self, shard_id: u32) {
        self.shards.insert(shard_id, ShardHealth::Connecting);
    }

    /// Update a registered shard's health.
    pub fn set_health(&self, shard_id: u32, health: ShardHealth) {
        if let Some(mut entry) = self.shards.get_mut(&shard_id) {
            *entry = health;
        }
    }

    /// Get health for a specific shard.
    pub fn health(&self, shard_id: u32) -> Option<ShardHealth> {
        self.shards.get(&shard_id).map(|e| *e)
    }

    /// Count of registered shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Count of ready shards.
    pub fn ready_shards(&self) -> usize {
        self.shards.iter().filter(|e| e.is_ready()).count()
    }

    /// Count of healthy shards (ready or recovering).
    pub fn healthy_shards(&self) -> usize {
        self.shards.iter().filter(|e| e.is_healthy()).count()
    }

    /// Fleet is ready when at least one shard is ready.
    pub fn is_ready(&self) -> bool {
        self.ready_shards() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_starts_connecting() {
        let status = FleetStatus::new();
        status.register(0);
        status.register(1);
        assert_eq!(status.shard_count(), 2);
        assert_eq!(status.health(0), Some(ShardHealth::Connecting));
        assert!(!status.is_ready());
    }

    #[test]
    fn transitions_are_visible() {
        let status = FleetStatus::new();
        status.register(0);
        status.register(1);

        status.set_health(0, ShardHealth::Ready);
        assert_eq!(status.ready_shards(), 1);
        assert!(status.is_ready());

        status.set_health(1, ShardHealth::Degraded);
        assert_eq!(status.ready_shards(), 1);
        assert_eq!(status.healthy_shards(), 2);

        status.set_health(0, ShardHealth::Dead);
        assert_eq!(status.healthy_shards(), 1);
        assert!(!status.is_ready());
    }

    #[test]
    fn unknown_shard_updates_are_ignored() {
        let status = FleetStatus::new();
        status.set_health(7, ShardHealth::Ready);
        assert_eq!(status.health(7), None);
        assert_eq!(status.shard_count(), 0);
    }
}
