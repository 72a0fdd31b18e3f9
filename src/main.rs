//! replayd CLI
//!
//! Entry point for the replay service binary.

use eyre::{Context, Result};
use replayd::config::Settings;
use tracing::{error, info, warn};

use clap::{Parser, Subcommand};

/// Timed trade-replay service
#[derive(Parser, Debug)]
#[command(name = "replayd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Environment name, selects `config/{name}.toml` as an overlay.
    #[arg(short, long, env = "REPLAYD_ENV", default_value = "development")]
    environment: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the replay service.
    Run,

    /// Show version information.
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run => run(&cli.environment).await,
        Commands::Version => {
            println!("replayd {}", replayd::VERSION);
            Ok(())
        }
    }
}

async fn run(environment: &str) -> Result<()> {
    let settings = Settings::load(environment).wrap_err("failed to load configuration")?;
    init_logging(&settings.logging.level, settings.logging.format == "json")?;

    info!(version = replayd::VERSION, %environment, "starting replayd");

    settings
        .validate()
        .map_err(|errors| eyre::eyre!(errors.join("; ")))
        .wrap_err("invalid configuration")?;

    if settings.metrics.enabled {
        init_metrics(&settings.metrics.socket_addr())?;
    }

    let (router, cancel) = if settings.production {
        info!(redis_address = %settings.redis.address, "wiring Redis-backed cache and broker");
        replayd::app::build_redis(&settings)
            .await
            .wrap_err("failed to build Redis-backed service")?
    } else {
        info!("wiring in-memory cache and broker");
        replayd::app::build_in_memory(&settings)
            .await
            .wrap_err("failed to build in-memory service")?
    };

    let addr = format!("0.0.0.0:{}", settings.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    let shutdown = shutdown_signal(cancel.clone());
    let serve = axum::serve(listener, router).with_graceful_shutdown(shutdown);

    tokio::select! {
        result = serve => {
            if let Err(error) = result {
                error!(%error, "server error");
            }
        }
        () = cancel.cancelled() => {
            info!("shutdown requested before server exited");
        }
    }

    info!("replayd stopped");
    Ok(())
}

/// Initialize the tracing subscriber: JSON for production, human-readable
/// otherwise, matching `settings.logging.format`.
fn init_logging(level: &str, json: bool) -> Result<()> {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init()
    }
    .map_err(|error| eyre::eyre!("failed to init logging: {error}"))
}

/// Install the Prometheus metrics exporter, serving scrapes on
/// `settings.metrics`'s socket address.
fn init_metrics(socket_addr: &str) -> Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let addr: std::net::SocketAddr = socket_addr
        .parse()
        .wrap_err_with(|| format!("invalid metrics address {socket_addr}"))?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .wrap_err("failed to install Prometheus exporter")?;
    info!(%socket_addr, "metrics exporter listening");
    Ok(())
}

/// Wait for SIGINT/SIGTERM and cancel the shared token so in-flight replay
/// actors can wind down before the listener stops accepting connections.
async fn shutdown_signal(cancel: tokio_util::sync::CancellationToken) {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            error!(%error, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => error!(%error, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => warn!("received Ctrl+C, initiating graceful shutdown"),
        () = terminate => warn!("received SIGTERM, initiating graceful shutdown"),
    }

    cancel.cancel();
}
