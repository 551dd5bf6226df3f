use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use propertypulse::config::{default_config_path, load_config_or_default};
use propertypulse::{Adapters, Config, JobStore, Orchestrator, OrchestratorSettings};
use propertypulse_server::{build_router, logging, AppState, StartupError};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("propertypulse-server: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), StartupError> {
    let mut config = load_configuration()?;
    logging::init(&config.logging)?;
    apply_env_overrides(&mut config)?;

    tracing::info!(
        "Starting PropertyPulse server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let store = JobStore::open(&config)?;
    let adapters = Adapters::from_config(&config.adapters)?;
    let orchestrator = Orchestrator::new(
        Arc::new(store),
        adapters,
        OrchestratorSettings::from_config(&config),
    );

    let state = AppState::new(
        orchestrator.clone(),
        Duration::from_secs(config.events.keep_alive_secs.max(1)),
    );
    let app = build_router(state, &config.server.cors_origins);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| StartupError::Bind {
            addr: addr.clone(),
            source,
        })?;
    tracing::info!(addr = %addr, "Listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    orchestrator.shutdown();
    tracing::info!("Server stopped");
    served.map_err(StartupError::Serve)
}

/// Reads `PROPERTYPULSE_CONFIG`, else `~/.propertypulse/config.json`.
/// A missing file means defaults.
fn load_configuration() -> Result<Config, StartupError> {
    let path = std::env::var_os("PROPERTYPULSE_CONFIG")
        .map(PathBuf::from)
        .or_else(default_config_path);
    match path {
        Some(path) => Ok(load_config_or_default(path)?),
        None => Ok(Config::default()),
    }
}

fn apply_env_overrides(config: &mut Config) -> Result<(), StartupError> {
    if let Ok(host) = std::env::var("PROPERTYPULSE_HOST") {
        config.server.host = host;
    }
    if let Ok(port) = std::env::var("PROPERTYPULSE_PORT") {
        config.server.port = port.parse().map_err(|_| StartupError::Env {
            name: "PROPERTYPULSE_PORT",
            value: port.clone(),
        })?;
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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
    tracing::info!("Shutdown signal received");
}
