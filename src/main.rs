//! relaylb - an HTTP reverse-proxy load balancer
//!
//! Usage:
//!     relaylb --config <path>
//!
//! See --help for more options.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use relaylb::config::{load_config, Config};
use relaylb::frontend::FrontendListener;
use relaylb::health::HttpHealthCheck;
use relaylb::metrics::MetricsServer;
use relaylb::util::init_logging;
use relaylb::AppState;

/// An HTTP reverse-proxy load balancer written in Rust.
#[derive(Parser, Debug)]
#[command(name = "relaylb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE", default_value = "configs/config.yaml")]
    config: PathBuf,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.config).with_context(|| {
        format!(
            "failed to load configuration from '{}'",
            cli.config.display()
        )
    })?;

    // CLI overrides config
    let log_level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    init_logging(log_level, &config.log_format);

    if !config.algorithm_recognized() {
        warn!(
            algorithm = %config.algorithm,
            "unrecognized algorithm, falling back to round robin"
        );
    }

    if cli.validate {
        info!("Configuration is valid");
        println!("Configuration is valid.");
        println!("  Port: {}", config.port);
        println!("  Algorithm: {:?}", config.algorithm());
        println!("  Health interval: {:?}", config.health_interval);
        println!("  Backends: {}", config.backends.len());
        for backend in &config.backends {
            println!("    - {}", backend);
        }
        return Ok(());
    }

    info!(
        config_path = %cli.config.display(),
        port = %config.port,
        backends = config.backends.len(),
        algorithm = ?config.algorithm(),
        "relaylb starting"
    );

    for backend in &config.backends {
        info!(backend = %backend, "configured backend");
    }

    run(config)
}

/// Run the load balancer with the given configuration.
fn run(config: Config) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    runtime.block_on(async { run_async(config).await })
}

/// Async entry point for the load balancer.
async fn run_async(config: Config) -> Result<()> {
    let state = AppState::from_config(&config).context("invalid backend URL")?;

    let monitor = state.spawn_health_monitor(
        Arc::new(HttpHealthCheck::new(config.health_timeout)),
        config.health_interval,
    );

    let listen = config.listen_addr().context("invalid port")?;
    let listener = FrontendListener::bind(listen, state.dispatcher().clone(), state.metrics().clone())
        .await
        .with_context(|| format!("failed to bind frontend on {}", listen))?
        .with_body_limit(config.max_body_size);

    let frontend = tokio::spawn(listener.run(state.shutdown().subscribe(), config.shutdown_grace));

    let metrics_task = if config.metrics.enabled {
        let server = MetricsServer::bind(
            config.metrics.address,
            config.metrics.path.clone(),
            state.metrics().clone(),
        )
        .await
        .with_context(|| format!("failed to bind metrics server on {}", config.metrics.address))?;
        Some(tokio::spawn(server.run(state.shutdown().subscribe())))
    } else {
        None
    };

    info!(listen = %listen, "relaylb is running");
    info!("press Ctrl+C to stop");

    wait_for_signal().await;

    state.trigger_shutdown();

    monitor.join().await;
    if let Err(e) = frontend.await {
        error!(error = %e, "frontend task failed");
    }
    if let Some(task) = metrics_task {
        if let Err(e) = task.await {
            error!(error = %e, "metrics task failed");
        }
    }

    info!("relaylb shut down complete");
    Ok(())
}

/// Wait for Ctrl-C or, on unix, SIGTERM.
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl-C"),
        _ = terminate => info!("received SIGTERM"),
    }
}
