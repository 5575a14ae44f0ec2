use dacpac_deployer::config::Config;
use dacpac_deployer::deploy::{CancellationToken, PostgresEngine};
use dacpac_deployer::hook::{DeployDatabaseProjectsHook, HookRegistry, LifecycleContext};
use dacpac_deployer::topology::{ServerConnectionResolver, Topology};

use std::sync::Arc;
use tokio::signal;
use tracing::{debug, error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from .env file if present
    let dotenv_result = dotenvy::dotenv();

    let config = Config::from_env()?;

    // Create log directory if it doesn't exist
    std::fs::create_dir_all(&config.log_dir).unwrap_or_else(|e| {
        eprintln!(
            "Warning: Could not create log directory {:?}: {}",
            config.log_dir, e
        );
    });

    // Create file appender with daily rotation
    let file_appender =
        RollingFileAppender::new(Rotation::DAILY, &config.log_dir, "dacpac-deployer.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - both stdout and file
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,dacpac_deployer=debug")),
        )
        // Console output
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        // File output with JSON format for easy parsing
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .json()
                .with_writer(non_blocking),
        )
        .init();

    debug!("Logging initialized - log directory: {:?}", config.log_dir);

    if let Err(e) = dotenv_result {
        warn!("No .env file found or error loading it: {}", e);
    }

    let topology = Topology::from_file(&config.topology_file)?;

    info!(
        "Loaded topology {:?}: {} resources, {} databases",
        config.topology_file,
        topology.resources().len(),
        topology.databases().count()
    );
    info!(
        "Build output: bin/{}/{}",
        config.build_configuration, config.target_framework
    );

    let connections =
        ServerConnectionResolver::from_topology(&topology, Some(config.database_url.clone()));
    let engine = Arc::new(PostgresEngine::new(config.maintenance_database.clone()));

    let mut hooks = HookRegistry::new();
    hooks.try_add(Arc::new(
        DeployDatabaseProjectsHook::new(engine)
            .with_locator(config.locator())
            .with_options(config.deploy_options()),
    ));

    // Shutdown aborts an in-flight deployment
    let cancel = CancellationToken::new();
    let shutdown_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown_cancel.cancel();
    });

    let ctx = LifecycleContext {
        topology: &topology,
        connections: &connections,
        cancel: &cancel,
    };

    if let Err(e) = hooks.after_resources_created(&ctx).await {
        error!("Startup failed [{}]: {}", e.code(), e);
        return Err(e.into());
    }

    info!("All database projects deployed");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal");
}
