//! token-gate - Static shared-secret token authentication for HTTP services
//!
//! This is the main entry point for the token-gate application.

use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::info;

use token_gate::auth::{TokenGate, TracingAuditSink};
use token_gate::cli::{render_info, run_generate, Cli, Command};
use token_gate::config::Config;
use token_gate::server::{build_router, Server};
use token_gate::store::MemoryCounterStore;
use token_gate::telemetry::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => serve(args.config.as_deref()).await,
        Command::Generate(args) => {
            run_generate(&args, &mut std::io::stdout().lock())?;
            Ok(())
        }
        Command::Info(args) => {
            let config = load_config(args.config.as_deref())?;
            print!("{}", render_info(&config));
            Ok(())
        }
    }
}

async fn serve(config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    init_tracing(&config.logging)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting token-gate");

    let gate = Arc::new(TokenGate::from_config(
        &config,
        Arc::new(MemoryCounterStore::new()),
        Arc::new(TracingAuditSink),
    ));
    {
        let snapshot = gate.snapshot();
        info!(
            services = ?snapshot.tokens().service_names().collect::<Vec<_>>(),
            fallback = snapshot.tokens().has_fallback(),
            rate_limiting = config.rate_limiting.enabled,
            "Token gate initialized"
        );
    }

    let router = build_router(Arc::clone(&gate), config.tokens.keys().cloned());
    let server = Server::new(config.server.clone(), router);

    info!(
        host = %config.server.host,
        port = %config.server.port,
        "Starting HTTP server"
    );

    let result = server.run(shutdown_signal()).await;

    info!("token-gate shutdown complete");

    result.map_err(Into::into)
}

/// Load configuration from file or environment
fn load_config(path: Option<&str>) -> anyhow::Result<Config> {
    // Use eprintln! since tracing is not yet initialized
    match path {
        Some(path) => eprintln!("Loading configuration from file: {}", path),
        None => eprintln!("Loading configuration from environment variables"),
    }
    Config::load(path).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
}

/// Create a future that resolves when a shutdown signal is received
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
