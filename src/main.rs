//! HTTP load balancer.
//!
//! Requests enter through the axum server in `http::server`, the dispatcher
//! picks a backend with the configured strategy, and `http::proxy` relays the
//! request and streams the response back.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;

use http_load_balancer::config::loader::read_config;
use http_load_balancer::config::validation::validate_config;
use http_load_balancer::config::{BalancerConfig, ConfigError};
use http_load_balancer::lifecycle::{signals::shutdown_signal, Shutdown};
use http_load_balancer::observability::{logging, metrics};
use http_load_balancer::{HttpServer, Strategy};

#[derive(Parser, Debug)]
#[command(name = "http-load-balancer")]
#[command(about = "Distribute HTTP requests over a fixed set of backends", long_about = None)]
struct Cli {
    /// Backend URL (repeat for each backend, in rotation order).
    #[arg(short, long = "backend", value_name = "URL")]
    backends: Vec<String>,

    /// Port to listen on.
    #[arg(short, long)]
    port: Option<u16>,

    /// Backend selection strategy.
    #[arg(short, long, value_enum)]
    strategy: Option<Strategy>,

    /// Optional TOML configuration file; command-line values take precedence.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Merge the optional file with command-line values and validate the result.
fn resolve_config(cli: Cli) -> Result<BalancerConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => BalancerConfig::default(),
    };

    if !cli.backends.is_empty() {
        config.backends = cli.backends;
    }
    if let Some(port) = cli.port {
        config.listener.port = port;
    }
    if let Some(strategy) = cli.strategy {
        config.strategy = strategy;
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match resolve_config(Cli::parse()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init(&config.observability.log_level);
    tracing::info!("http-load-balancer v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        port = config.listener.port,
        strategy = %config.strategy,
        backends = ?config.backends,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        // Address already validated.
        if let Ok(addr) = config.observability.metrics_address.parse() {
            if let Err(e) = metrics::init_metrics(addr) {
                tracing::error!(error = %e, "Failed to start metrics exporter");
            }
        }
    }

    let bind_address = config.listener.bind_address();
    let server = match HttpServer::new(config) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let listener = match TcpListener::bind(&bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("error: failed to bind {}: {}", bind_address, e);
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.trigger();
    });

    if let Err(e) = server.run(listener, server_shutdown).await {
        tracing::error!(error = %e, "Server terminated with error");
        return ExitCode::FAILURE;
    }

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}
