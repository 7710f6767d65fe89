use std::sync::Arc;

use color_eyre::eyre::Context;
use tokio::sync::watch;
use trawler::{
    alert::{self, AlertDispatcher},
    config::Config,
    crl::HttpFetcher,
    health::{self, HealthState},
    storage::{CrlStore, LocalStore, ObjectStoreBackend},
    sync::{ConfigFileReloader, CrlScheduler, CycleConfig, SyncOrchestrator},
    telemetry,
};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    let config_path = Config::path_from_env();
    let config = Config::load_from(&config_path, None)
        .wrap_err_with(|| format!("Failed to parse config at {config_path}"))?;
    telemetry::init_tracing(&config.global.log_level);
    tracing::info!(
        "Loaded configuration with {} CRL sources from {}",
        config.sources.len(),
        config_path
    );

    let mut backends: Vec<Arc<dyn CrlStore>> = Vec::new();
    if config.storage.local.enabled {
        backends.push(Arc::new(LocalStore::new(&config.storage.local.path)));
    }
    if config.storage.s3.enabled {
        let s3 = ObjectStoreBackend::s3(&config.storage.s3).wrap_err("Failed to create S3 client")?;
        backends.push(Arc::new(s3));
    }
    if backends.is_empty() {
        tracing::warn!("No storage backend enabled, CRLs will only be validated");
    }

    let fetcher = HttpFetcher::new(config.global.request_timeout_secs)
        .wrap_err("Failed to create HTTP client")?;

    let (error_tx, error_rx) = alert::error_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let dispatcher = AlertDispatcher::new(config.alerting.clone(), &config.global.service_id)
        .wrap_err("Failed to create alert client")?;
    let alert_worker = tokio::spawn(alert::run_alert_worker(error_rx, dispatcher));

    let health_state = HealthState::default();
    let orchestrator = SyncOrchestrator::new(
        Arc::new(fetcher),
        backends,
        error_tx,
        &config.global.ca_path,
    );
    let scheduler = CrlScheduler::new(orchestrator, CycleConfig::from(&config))
        .with_reloader(Arc::new(ConfigFileReloader::new(config_path.clone())))
        .with_readiness(health_state.ready.clone());
    let retrieval_worker = tokio::spawn(scheduler.run(shutdown_rx.clone()));

    let health_server = if config.server.enabled {
        let host = config.server.host.clone();
        let port = config.server.port;
        let shutdown = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = health::serve(&host, port, health_state, shutdown).await {
                tracing::error!("Health server failed: {}", e);
            }
        }))
    } else {
        None
    };

    wait_for_termination().await;
    tracing::info!("Termination signal received, shutting down...");
    let _ = shutdown_tx.send(true);

    // The scheduler owns the last error sender; once it returns the alert
    // worker drains what is left and exits.
    let cycles = retrieval_worker.await.wrap_err("Retrieval worker panicked")?;
    let alerts = alert_worker.await.wrap_err("Alert worker panicked")?;
    if let Some(server) = health_server {
        let _ = server.await;
    }

    tracing::info!(
        "Shutting down gracefully after {} cycles and {} error reports",
        cycles,
        alerts
    );
    Ok(())
}

async fn wait_for_termination() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
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
                tracing::error!("Failed to listen for SIGTERM: {}", e);
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
}
