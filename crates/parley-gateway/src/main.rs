use clap::Parser;
use parley_core::config::ParleyConfig;
use parley_hub::{resolver::resolver_from_config, Hub};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

mod app;
mod http;
mod ws;

/// Parley real-time chat gateway
#[derive(Parser, Debug)]
#[command(name = "parley-gateway", version, about = "Parley real-time chat gateway")]
struct Args {
    /// Path to TOML config file (default: ~/.parley/parley.toml)
    #[arg(long, env = "PARLEY_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // tracing needs log.json, so a load failure is reported after init
    let (config, load_error) = match ParleyConfig::load(args.config.as_deref()) {
        Ok(config) => (config, None),
        Err(e) => (ParleyConfig::default(), Some(e)),
    };
    init_tracing(config.log.json);
    if let Some(e) = load_error {
        warn!("Config load failed ({}), using defaults", e);
    }

    let hub = Hub::from_config(&config)?;
    let resolver = resolver_from_config(&config.resolver);
    info!(
        resolver = resolver.name(),
        worker_id = config.sequence.worker_id,
        reject_unresolved = config.resolver.reject_unresolved,
        "hub ready"
    );

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let state = Arc::new(app::AppState::new(config, hub, resolver));
    let router = app::build_router(state);

    info!("Parley gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Parley gateway stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "parley_gateway=info,parley_hub=info,tower_http=debug".into());
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
