use crate::clock::SystemClock;
use crate::config::{load_config, ConfigError};
use crate::index::{Connector, DryRunConnector, ElasticConnector};
use crate::worker::{Orchestrator, WorkerError};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error(
        "config not found; searched ~/.config/logship/config.yml and /etc/logship/config.yml \
         (use --config <path>, or run 'logship config init')"
    )]
    ConfigNotFound,

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("worker error: {0}")]
    Worker(#[from] WorkerError),
}

pub async fn run(config_path: Option<PathBuf>, dry_run: bool) -> Result<(), RunError> {
    let config_path = config_path.ok_or(RunError::ConfigNotFound)?;
    info!(config_path = %config_path.display(), "Loading configuration");

    let config = Arc::new(load_config(&config_path)?);
    info!(
        project = %config.project,
        es_host = %config.es_host,
        prefix = %config.es_index_prefix,
        files = config.logs.len(),
        "Configuration loaded"
    );

    let connector: Arc<dyn Connector> = if dry_run {
        warn!("Dry run: lines are counted and logged at debug, nothing is sent to the search engine");
        Arc::new(DryRunConnector::new())
    } else {
        Arc::new(ElasticConnector::new(
            config.es_host.clone(),
            config.tuning.request_timeout,
        ))
    };

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            signal_token.cancel();
        }
    });

    Orchestrator::new(config, connector, Arc::new(SystemClock))
        .run(shutdown)
        .await?;

    Ok(())
}
