//! Guild count aggregation.
//!
//! A periodic task polls every shard's guild count, sums the results, and
//! republishes the total into the `guild_count` gauge. The aggregator is the
//! gauge's only writer.

use crate::error::FleetError;
use crate::metrics::FleetMetrics;
use crate::shard::client::ShardClient;
use crate::shard::supervisor::Fleet;
use crate::sink::ErrorSink;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Handle to the running aggregation task.
///
/// Owns the task for its whole lifetime; `shutdown` stops it cleanly. A pass
/// in flight at shutdown is dropped before its gauge write, so a cancelled
/// pass can never publish a partial sum.
pub struct GuildCountAggregator {
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl GuildCountAggregator {
    /// Spawn the periodic aggregation task over a connected fleet.
    pub fn spawn<C: ShardClient>(
        fleet: Arc<Fleet<C>>,
        metrics: Arc<FleetMetrics>,
        sink: Arc<dyn ErrorSink>,
        period: Duration,
    ) -> Self {
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = ticker.tick() => {}
                }

                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    sum = run_pass(fleet.as_ref(), sink.as_ref()) => {
                        // Single gauge write per pass, after every poll in the
                        // pass has resolved.
                        metrics.set_guild_count(sum);
                        debug!(guilds = sum, "Aggregation pass complete");
                    }
                }
            }

            info!("Guild count aggregator stopped");
        });

        Self { shutdown_tx, task }
    }

    /// Stop the task and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.task.await;
    }
}

/// One aggregation pass: poll every shard concurrently, sum what resolved.
///
/// A shard that fails its poll contributes zero to this pass and the failure
/// goes to the sink; the pass itself always completes.
async fn run_pass<C: ShardClient>(fleet: &Fleet<C>, sink: &dyn ErrorSink) -> u64 {
    let polls = fleet.handles().iter().map(|client| async move {
        let shard_id = client.descriptor().id;
        match client.guild_count().await {
            Ok(count) => count,
            Err(source) => {
                sink.capture(&FleetError::ShardPoll { shard_id, source });
                0
            }
        }
    });

    join_all(polls).await.into_iter().sum()
}
