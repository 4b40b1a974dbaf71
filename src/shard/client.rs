//! Shard client seam.
//!
//! The supervisor does not speak the gateway wire protocol; it consumes a
//! small client interface. Production shards are backed by twilight (see
//! `crate::discord`), tests script their own implementations.

use crate::error::FleetError;
use crate::metrics::FleetMetrics;
use crate::sink::ErrorSink;
use std::future::Future;
use std::sync::Arc;

/// Boxed transport-level error produced by a client implementation.
pub type ClientError = Box<dyn std::error::Error + Send + Sync>;

/// A shard's position in the fleet. Immutable once assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShardDescriptor {
    /// Shard id, in `[0, total)`.
    pub id: u32,
    /// Total shards in the fleet.
    pub total: u32,
}

impl ShardDescriptor {
    pub fn new(id: u32, total: u32) -> Self {
        debug_assert!(total > 0 && id < total);
        Self { id, total }
    }
}

/// One long-lived connection to the event source.
///
/// `connect` resolves once the connection is established and receiving;
/// `guild_count` reports the shard's current guild tally and fails while the
/// connection is down. Both futures are `Send` so the aggregator can fan out
/// across the fleet from a spawned task.
pub trait ShardClient: Send + Sync + 'static {
    fn descriptor(&self) -> ShardDescriptor;

    fn connect(&self) -> impl Future<Output = Result<(), ClientError>> + Send;

    fn guild_count(&self) -> impl Future<Output = Result<u64, ClientError>> + Send;
}

/// Factory the supervisor uses to construct one client per descriptor.
pub trait ShardClientBuilder: Send + Sync {
    type Client: ShardClient;

    fn build(&self, descriptor: ShardDescriptor, hooks: PacketHooks) -> Self::Client;
}

/// Callback bundle handed to every shard client.
///
/// Event and command observations land in the metrics registry; packet
/// handler errors go to the error sink. Nothing here returns an error or
/// panics, so a misbehaving packet can never take down a sibling shard.
#[derive(Clone)]
pub struct PacketHooks {
    metrics: Arc<FleetMetrics>,
    sink: Arc<dyn ErrorSink>,
}

impl PacketHooks {
    pub fn new(metrics: Arc<FleetMetrics>, sink: Arc<dyn ErrorSink>) -> Self {
        Self { metrics, sink }
    }

    /// A gateway event arrived on some shard.
    pub fn on_gateway_event(&self, name: &str) {
        self.metrics.record_gateway_event(name);
    }

    /// The client's cache layer issued a command.
    pub fn on_redis_command(&self, command: &str) {
        self.metrics.record_redis_command(command);
    }

    /// A packet handler failed inside a connected shard. Reported, never
    /// rethrown.
    pub fn on_packet_error(&self, shard_id: u32, source: ClientError) {
        self.sink
            .capture(&FleetError::ShardPacket { shard_id, source });
    }

    /// Report any recoverable fleet error through the sink.
    pub fn report(&self, error: &FleetError) {
        self.sink.capture(error);
    }
}
