//! Twilight-backed shard client.
//!
//! `connect()` spawns the shard's event loop and resolves once the gateway
//! reports READY. The loop keeps the per-shard guild tally current, feeds
//! packet hooks, and isolates its own failures: transient receive errors
//! degrade the shard (twilight resumes internally), a run of consecutive
//! errors trips the circuit breaker and takes only this shard out.

use crate::error::FleetError;
use crate::shard::{
    ClientError, FleetStatus, PacketHooks, ShardClient, ShardClientBuilder, ShardDescriptor,
    ShardHealth,
};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use twilight_gateway::{Config, EventTypeFlags, Intents, Shard, StreamExt as _};
use twilight_model::gateway::event::Event;
use twilight_model::gateway::ShardId;

/// Consecutive receive errors before a shard is marked dead.
const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// The shard's event loop is not (or no longer) running.
#[derive(Debug, Error)]
#[error("shard {shard_id} event loop is not running")]
pub struct ShardStopped {
    pub shard_id: u32,
}

/// Builds twilight-backed clients for the supervisor.
pub struct DiscordShardBuilder {
    token: String,
    intents: Intents,
    status: FleetStatus,
}

impl DiscordShardBuilder {
    pub fn new(token: String, intents: Intents, status: FleetStatus) -> Self {
        Self {
            token,
            intents,
            status,
        }
    }
}

impl ShardClientBuilder for DiscordShardBuilder {
    type Client = DiscordShardClient;

    fn build(&self, descriptor: ShardDescriptor, hooks: PacketHooks) -> DiscordShardClient {
        self.status.register(descriptor.id);
        DiscordShardClient {
            descriptor,
            token: self.token.clone(),
            intents: self.intents,
            hooks,
            status: self.status.clone(),
            guilds: Arc::new(AtomicU64::new(0)),
            alive: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// One twilight gateway connection.
pub struct DiscordShardClient {
    descriptor: ShardDescriptor,
    token: String,
    intents: Intents,
    hooks: PacketHooks,
    status: FleetStatus,
    guilds: Arc<AtomicU64>,
    alive: Arc<AtomicBool>,
}

impl ShardClient for DiscordShardClient {
    fn descriptor(&self) -> ShardDescriptor {
        self.descriptor
    }

    fn connect(&self) -> impl Future<Output = Result<(), ClientError>> + Send {
        async move {
            let shard_id = self.descriptor.id;
            let config = Config::new(self.token.clone(), self.intents);
            let shard = Shard::with_config(
                ShardId::new(self.descriptor.id, self.descriptor.total),
                config,
            );

            self.status.set_health(shard_id, ShardHealth::Connecting);

            let (ready_tx, ready_rx) = oneshot::channel();
            let runtime = ShardRuntime {
                shard_id,
                hooks: self.hooks.clone(),
                status: self.status.clone(),
                guilds: Arc::clone(&self.guilds),
                alive: Arc::clone(&self.alive),
            };
            tokio::spawn(run_event_loop(shard, runtime, ready_tx));

            match ready_rx.await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e),
                // Loop task aborted before signalling.
                Err(_) => Err(Box::new(ShardStopped { shard_id }) as ClientError),
            }
        }
    }

    fn guild_count(&self) -> impl Future<Output = Result<u64, ClientError>> + Send {
        async move {
            if !self.alive.load(Ordering::SeqCst) {
                return Err(Box::new(ShardStopped {
                    shard_id: self.descriptor.id,
                }) as ClientError);
            }
            Ok(self.guilds.load(Ordering::Relaxed))
        }
    }
}

/// State shared between a client handle and its spawned event loop.
struct ShardRuntime {
    shard_id: u32,
    hooks: PacketHooks,
    status: FleetStatus,
    guilds: Arc<AtomicU64>,
    alive: Arc<AtomicBool>,
}

/// Run a single shard's event loop.
async fn run_event_loop(
    mut shard: Shard,
    runtime: ShardRuntime,
    ready_tx: oneshot::Sender<Result<(), ClientError>>,
) {
    let shard_id = runtime.shard_id;
    let mut ready_tx = Some(ready_tx);
    let mut consecutive_errors: u32 = 0;

    info!(shard_id, "Shard event loop starting");

    while let Some(item) = shard.next_event(EventTypeFlags::all()).await {
        let event = match item {
            Ok(event) => {
                consecutive_errors = 0;
                event
            }
            Err(source) => {
                consecutive_errors += 1;
                warn!(
                    shard_id,
                    error = %source,
                    consecutive = consecutive_errors,
                    "Error receiving event"
                );
                runtime.hooks.on_packet_error(shard_id, Box::new(source));

                if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    let err = FleetError::ShardCircuitBroken {
                        shard_id,
                        count: consecutive_errors,
                        max: MAX_CONSECUTIVE_ERRORS,
                    };
                    error!(
                        shard_id,
                        consecutive = consecutive_errors,
                        "Shard dead: consecutive error threshold exceeded"
                    );
                    runtime.hooks.report(&err);
                    runtime.alive.store(false, Ordering::SeqCst);
                    runtime.status.set_health(shard_id, ShardHealth::Dead);
                    if let Some(tx) = ready_tx.take() {
                        let _ = tx.send(Err(Box::new(ShardStopped { shard_id })));
                    }
                    return;
                }

                runtime.status.set_health(shard_id, ShardHealth::Degraded);
                continue;
            }
        };

        if let Some(name) = event.kind().name() {
            runtime.hooks.on_gateway_event(name);
        }

        match &event {
            Event::Ready(ready) => {
                runtime
                    .guilds
                    .store(ready.guilds.len() as u64, Ordering::Relaxed);
                runtime.alive.store(true, Ordering::SeqCst);
                runtime.status.set_health(shard_id, ShardHealth::Ready);
                if let Some(tx) = ready_tx.take() {
                    let _ = tx.send(Ok(()));
                }
                info!(
                    shard_id,
                    guilds = ready.guilds.len(),
                    session_id = %ready.session_id,
                    "Shard ready"
                );
            }
            Event::Resumed => {
                runtime.status.set_health(shard_id, ShardHealth::Ready);
                info!(shard_id, "Shard resumed");
            }
            Event::GuildCreate(guild) => {
                // Approximate tally (READY resets race with deltas);
                // observability only.
                runtime.guilds.fetch_add(1, Ordering::Relaxed);
                debug!(shard_id, guild_id = %guild.id(), "Guild joined");
            }
            Event::GuildDelete(guild) => {
                // unavailable is Option<bool> in 0.17; an outage is not a
                // leave.
                if guild.unavailable != Some(true) {
                    let _ = runtime.guilds.fetch_update(
                        Ordering::Relaxed,
                        Ordering::Relaxed,
                        |n| Some(n.saturating_sub(1)),
                    );
                    debug!(shard_id, guild_id = %guild.id, "Guild left");
                }
            }
            _ => {}
        }
    }

    // Stream ended — fatal close or process shutdown.
    info!(shard_id, "Shard event stream ended");
    runtime.alive.store(false, Ordering::SeqCst);
    runtime.status.set_health(shard_id, ShardHealth::Dead);
    if let Some(tx) = ready_tx.take() {
        let _ = tx.send(Err(Box::new(ShardStopped { shard_id })));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::FleetMetrics;
    use crate::sink::LogSink;

    fn builder() -> (DiscordShardBuilder, FleetStatus) {
        let status = FleetStatus::new();
        (
            DiscordShardBuilder::new("token".to_string(), Intents::GUILDS, status.clone()),
            status,
        )
    }

    fn hooks() -> PacketHooks {
        PacketHooks::new(Arc::new(FleetMetrics::new()), Arc::new(LogSink))
    }

    #[test]
    fn build_registers_the_shard_as_connecting() {
        let (builder, status) = builder();
        let client = builder.build(ShardDescriptor::new(0, 2), hooks());

        assert_eq!(client.descriptor(), ShardDescriptor::new(0, 2));
        assert_eq!(status.health(0), Some(ShardHealth::Connecting));
        assert_eq!(status.health(1), None);
    }

    #[tokio::test]
    async fn guild_count_fails_before_connect() {
        let (builder, _status) = builder();
        let client = builder.build(ShardDescriptor::new(0, 1), hooks());

        let err = client.guild_count().await.unwrap_err();
        assert!(err.to_string().contains("shard 0"));
    }

    #[test]
    fn shard_stopped_names_the_shard() {
        let err = ShardStopped { shard_id: 4 };
        assert_eq!(err.to_string(), "shard 4 event loop is not running");
    }
}
