use std::{net::SocketAddr, sync::Arc};

use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use plexus::{
    adapters::HttpBackendClient,
    config,
    logging,
    ports::BackendClient,
    reload::ReloadableGateway,
    server::Server,
    telemetry,
    utils::GracefulShutdown,
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    /// Configuration file (API_AGGREGATOR_CONFIG_PATH overrides)
    #[clap(short, long, default_value = "config.yaml")]
    config: String,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        #[clap(short, long, default_value = "config.yaml")]
        config: String,
    },
    /// Start the aggregation gateway (default)
    Serve {
        /// Configuration file to use
        #[clap(short, long, default_value = "config.yaml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    let (command, config_path) = match args.command {
        Some(Commands::Validate { config }) => ("validate", config),
        Some(Commands::Serve { config }) => ("serve", config),
        None => ("serve", args.config),
    };

    if command == "validate" {
        return validate_config_command(&config_path);
    }

    serve(&config_path).await
}

fn validate_config_command(config_path: &str) -> Result<()> {
    let path = config::resolve_config_path(config_path);
    match config::load_config(&path) {
        Ok(cfg) => {
            println!(
                "Configuration {} is valid ({} endpoint(s))",
                path,
                cfg.endpoints.len()
            );
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("Configuration {path} is invalid")),
    }
}

async fn serve(config_path: &str) -> Result<()> {
    let resolved_path = config::resolve_config_path(config_path);
    let cfg = config::load_config_from_env(config_path)
        .with_context(|| format!("Failed to load configuration from {resolved_path}"))?;

    let logging_handle = logging::init(&cfg.log_level, cfg.log_format)
        .map_err(|e| eyre!("Failed to initialize logging: {e}"))?;

    telemetry::init(&cfg);

    let client: Arc<dyn BackendClient> =
        Arc::new(HttpBackendClient::new().context("Failed to create backend HTTP client")?);

    let server = Server::new(Arc::new(cfg.clone()), client.clone())
        .context("Failed to build request-handling plane")?;

    let gateway = Arc::new(ReloadableGateway::new(
        server,
        client,
        Some(logging_handle),
        resolved_path,
    ));

    spawn_reload_watcher(gateway.clone());

    let shutdown = Arc::new(GracefulShutdown::new());
    let signal_handler_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = signal_handler_shutdown.run_signal_handler().await {
            tracing::error!("Signal handler error: {}", e);
        }
    });

    let addr = format!("0.0.0.0:{}", cfg.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    tracing::info!(port = %cfg.port, "Starting API aggregator server");

    let app = gateway
        .router()
        .into_make_service_with_connect_info::<SocketAddr>();

    let mut shutdown_rx = shutdown.subscribe();
    let mut server_task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await
    });

    tokio::select! {
        result = &mut server_task => {
            match result {
                Ok(Ok(())) => Err(eyre!("Server exited unexpectedly")),
                Ok(Err(e)) => Err(e).context("Server error"),
                Err(e) => Err(e).context("Server task failed"),
            }
        }
        reason = shutdown.wait_for_shutdown_signal() => {
            tracing::info!(?reason, "Shutting down server");
            match tokio::time::timeout(cfg.shutdown_timeout, &mut server_task).await {
                Ok(Ok(Ok(()))) => {
                    tracing::info!("Server stopped");
                    Ok(())
                }
                Ok(Ok(Err(e))) => Err(e).context("Server shutdown error"),
                Ok(Err(e)) => Err(e).context("Server task failed during shutdown"),
                Err(_) => {
                    tracing::warn!(
                        timeout = ?cfg.shutdown_timeout,
                        "Shutdown deadline exceeded, exiting with connections open"
                    );
                    Ok(())
                }
            }
        }
    }
}

/// SIGHUP triggers a configuration reload; a failed reload keeps the
/// previous plane active.
#[cfg(unix)]
fn spawn_reload_watcher(gateway: Arc<ReloadableGateway>) {
    use tokio::signal::unix::{SignalKind, signal};

    tokio::spawn(async move {
        let mut sighup = match signal(SignalKind::hangup()) {
            Ok(sighup) => sighup,
            Err(e) => {
                tracing::error!("Failed to register SIGHUP handler: {}", e);
                return;
            }
        };

        while sighup.recv().await.is_some() {
            tracing::info!("Reload signal received");
            if let Err(e) = gateway.reload().await {
                tracing::error!(error = %e, "Failed to reload configuration");
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_reload_watcher(_gateway: Arc<ReloadableGateway>) {
    tracing::info!("Configuration reload via signal is not available on this platform");
}
