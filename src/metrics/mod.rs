//! Prometheus metrics registry.
//!
//! `FleetMetrics` owns its own `prometheus::Registry` rather than installing
//! a process-global recorder: every producer (shard packet hooks, the
//! aggregator) and consumer (the metrics endpoint) receives the same
//! `Arc<FleetMetrics>`, and tests construct isolated instances.

use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Process-wide fleet metrics.
pub struct FleetMetrics {
    registry: Registry,

    /// Absolute guild total across the fleet. Overwritten once per
    /// aggregation pass; the aggregator is the sole writer.
    guild_count: IntGauge,

    /// Gateway events received, labeled by event name.
    gateway_events: IntCounterVec,

    /// Cache-layer commands observed by shard adapters, labeled by command.
    redis_commands: IntCounterVec,
}

impl FleetMetrics {
    /// Build a registry with all fleet metrics registered.
    pub fn new() -> Self {
        let registry = Registry::new();

        let guild_count = IntGauge::new("guild_count", "Total guilds across all shards")
            .expect("valid gauge definition");

        let gateway_events = IntCounterVec::new(
            Opts::new("gateway_events_count", "Gateway events received"),
            &["name"],
        )
        .expect("valid counter definition");

        let redis_commands = IntCounterVec::new(
            Opts::new("redis_commands_count", "Redis commands issued"),
            &["command"],
        )
        .expect("valid counter definition");

        // A fresh Registry has no prior collectors, so registration cannot
        // collide.
        registry
            .register(Box::new(guild_count.clone()))
            .expect("register guild_count");
        registry
            .register(Box::new(gateway_events.clone()))
            .expect("register gateway_events_count");
        registry
            .register(Box::new(redis_commands.clone()))
            .expect("register redis_commands_count");

        Self {
            registry,
            guild_count,
            gateway_events,
            redis_commands,
        }
    }

    /// Count one received gateway event.
    pub fn record_gateway_event(&self, name: &str) {
        self.gateway_events.with_label_values(&[name]).inc();
    }

    /// Count one cache-layer command.
    pub fn record_redis_command(&self, command: &str) {
        self.redis_commands.with_label_values(&[command]).inc();
    }

    /// Overwrite the fleet guild total.
    pub fn set_guild_count(&self, count: u64) {
        // IntGauge is i64 underneath; guild totals fit comfortably.
        self.guild_count.set(count as i64);
    }

    /// Current guild total as last published by the aggregator.
    pub fn guild_count(&self) -> u64 {
        self.guild_count.get().max(0) as u64
    }

    /// Render a point-in-time snapshot in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::error!(error = %e, "Failed to encode metrics snapshot");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for FleetMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn gauge_overwrites_and_reads_back() {
        let metrics = FleetMetrics::new();
        assert_eq!(metrics.guild_count(), 0);

        metrics.set_guild_count(8);
        assert_eq!(metrics.guild_count(), 8);

        metrics.set_guild_count(3);
        assert_eq!(metrics.guild_count(), 3);
    }

    #[test]
    fn counters_start_at_zero_and_accumulate() {
        let metrics = FleetMetrics::new();
        metrics.record_gateway_event("MESSAGE_CREATE");
        metrics.record_gateway_event("MESSAGE_CREATE");
        metrics.record_gateway_event("GUILD_CREATE");
        metrics.record_redis_command("get");

        let rendered = metrics.render();
        assert!(rendered.contains(r#"gateway_events_count{name="MESSAGE_CREATE"} 2"#));
        assert!(rendered.contains(r#"gateway_events_count{name="GUILD_CREATE"} 1"#));
        assert!(rendered.contains(r#"redis_commands_count{command="get"} 1"#));
    }

    #[test]
    fn render_contains_gauge_value() {
        let metrics = FleetMetrics::new();
        metrics.set_guild_count(42);
        assert!(metrics.render().contains("guild_count 42"));
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 1_000;

        let metrics = Arc::new(FleetMetrics::new());
        let mut handles = Vec::with_capacity(THREADS);
        for _ in 0..THREADS {
            let metrics = Arc::clone(&metrics);
            handles.push(std::thread::spawn(move || {
                for _ in 0..PER_THREAD {
                    metrics.record_gateway_event("INTERACTION_CREATE");
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let expected = (THREADS * PER_THREAD).to_string();
        let needle = format!(r#"gateway_events_count{{name="INTERACTION_CREATE"}} {expected}"#);
        assert!(metrics.render().contains(&needle));
    }

    #[test]
    fn instances_are_isolated() {
        let a = FleetMetrics::new();
        let b = FleetMetrics::new();
        a.set_guild_count(100);
        assert_eq!(b.guild_count(), 0);
    }
}
