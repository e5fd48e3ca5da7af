//! `fedqp-server` — the HTTP entry point (spec.md §6 "HTTP surface").
//!
//! Loads configuration, builds the backend connection pools and the
//! initial catalog (if a federation config already exists on disk), and
//! serves `/sparql`, `/configure`, `/inspect` over axum.

use std::path::PathBuf;
use std::sync::Arc;

use fedqp::backend::BackendPools;
use fedqp::config::FedqpConfig;
use fedqp::execution::engine::EngineConfig;
use fedqp::protocol::rest::{router, AppState};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = FedqpConfig::load()?;
    init_tracing(&config);

    tracing::info!(bind_addr = %config.server.bind_addr, "starting fedqp-server");

    let pools = Arc::new(BackendPools::new());
    let engine_config = Arc::new(EngineConfig {
        queue_depth: config.execution.max_queue_depth,
        bind_join_raised_limit: config.execution.bind_join_raised_limit,
    });
    let state = Arc::new(AppState::new(
        PathBuf::from(&config.federation.config_file),
        pools,
        engine_config,
        Some(config.query_timeout()),
    ));

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn init_tracing(config: &FedqpConfig) {
    let filter = EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.format == "json" {
        let subscriber = Registry::default().with(filter).with(tracing_subscriber::fmt::layer().json());
        subscriber.init();
    } else {
        let subscriber = Registry::default().with(filter).with(tracing_subscriber::fmt::layer());
        subscriber.init();
    }
}
