//! nntpchand binary entry point.

use std::process::ExitCode;

use nntpchand::{Config, Daemon};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "nntpchand.toml".to_string());

    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load config {config_path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.daemon.log);
    info!(instance = %config.daemon.instance_name, bind = %config.daemon.bind, "starting nntpchand");

    let daemon = match Daemon::init(config, None).await {
        Ok(daemon) => daemon,
        Err(e) => {
            error!(error = %e, "daemon initialization failed");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = daemon.shutdown_token();
    tokio::spawn(async move {
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("received SIGINT, shutting down"),
            _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        }
        shutdown.cancel();
    });

    if let Err(e) = daemon.run().await {
        error!(error = %e, "daemon exited with error");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
