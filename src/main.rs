//! Fleetgate process entry point.
//!
//! Composition only: resolve config, wire the registry/sink/status into the
//! fleet, then run the servers until a shutdown signal.

use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use fleetgate::config::FleetConfig;
use fleetgate::discord::DiscordShardBuilder;
use fleetgate::http::{self, AppState, MetricsState};
use fleetgate::metrics::FleetMetrics;
use fleetgate::shard::{start_fleet, FleetStatus, GuildCountAggregator, PacketHooks};
use fleetgate::sink::{ErrorSink, LogSink};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first to get log level
    let config = FleetConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("fleetgate={}", config.log_level).parse()?)
                .add_directive("twilight_gateway=info".parse()?),
        )
        .json()
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        shard_count = config.shard_count,
        "Starting fleetgate"
    );

    let metrics = Arc::new(FleetMetrics::new());
    let sink: Arc<dyn ErrorSink> = Arc::new(LogSink);
    let status = FleetStatus::new();

    let hooks = PacketHooks::new(Arc::clone(&metrics), Arc::clone(&sink));
    let builder = DiscordShardBuilder::new(
        config.discord_token.clone(),
        FleetConfig::intents(),
        status.clone(),
    );

    let fleet = Arc::new(
        start_fleet(
            &builder,
            config.shard_count,
            config.shard_connect_delay,
            hooks,
        )
        .await?,
    );

    let aggregator = GuildCountAggregator::spawn(
        Arc::clone(&fleet),
        Arc::clone(&metrics),
        Arc::clone(&sink),
        config.guild_poll_interval,
    );

    let health_state = AppState {
        status: status.clone(),
        metrics: Arc::clone(&metrics),
    };
    let health_listener =
        tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!(host = %config.host, port = config.port, "Starting health server");
    let health_server = async { axum::serve(health_listener, http::health_router(health_state)).await };

    // The metrics listener exists only when both port and secret are
    // configured; config guarantees the secret whenever the port is set.
    let metrics_server = match (config.metrics_port, config.metrics_auth.clone()) {
        (Some(port), Some(auth_secret)) => {
            let listener = tokio::net::TcpListener::bind((config.host.as_str(), port)).await?;
            info!(port, "Starting metrics server");
            Some(axum::serve(
                listener,
                http::metrics_router(MetricsState {
                    metrics: Arc::clone(&metrics),
                    auth_secret,
                }),
            ))
        }
        _ => {
            info!("METRICS_PORT not set - metrics endpoint disabled");
            None
        }
    };

    let metrics_task = async {
        match metrics_server {
            Some(server) => server.await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        result = health_server => {
            if let Err(e) = result {
                error!(error = %e, "Health server error");
            }
        }
        result = metrics_task => {
            if let Err(e) = result {
                error!(error = %e, "Metrics server error");
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    // Graceful shutdown: stop the aggregator before exit so no pass is left
    // half-applied.
    info!("Shutting down fleet...");
    aggregator.shutdown().await;

    info!("Fleet shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
