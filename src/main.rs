//! R2 Uploader - relay files from URLs or direct uploads into R2

use clap::Parser;
use r2_uploader::config::Config;
use r2_uploader::metrics::server::{MetricsServer, MetricsServerConfig};
use r2_uploader::server::{AppState, Server};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// R2 Uploader - ingest files from URLs or direct uploads into Cloudflare R2
#[derive(Parser, Debug)]
#[command(name = "r2-uploader")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a YAML configuration file (environment only when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let dotenv = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting R2 Uploader v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = dotenv {
        warn!(error = %e, "No .env file loaded, using process environment");
    }

    let config = match &args.config {
        Some(path) => {
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => Config::from_env()?,
    };

    let mut metrics_server = if config.metrics.enabled {
        let mut server = MetricsServer::new(MetricsServerConfig {
            address: config.metrics.address.clone(),
        });
        let addr = server.start().await?;
        info!("Metrics server listening on {}", addr);
        Some(server)
    } else {
        None
    };

    let state = AppState::new(config)?;

    state.bootstrap_token().await;

    let server = Server::new(state).await?;
    server.run_until(shutdown_signal()).await?;

    if let Some(metrics) = metrics_server.as_mut() {
        metrics.shutdown().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
