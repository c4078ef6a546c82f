use crate::clock::Clock;
use crate::config::WorkerConfig;
use crate::index::{ClientError, Connector, IndexLifecycle, LifecycleError};
use crate::source::tailer::{FileTailer, TailError, TailOutcome};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("can not connect to search engine at {host}: {source}")]
    Connect {
        host: String,
        #[source]
        source: ClientError,
    },

    #[error("index setup failed: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("tailer failed: {0}")]
    Tailer(#[from] TailError),
}

/// What one cycle did before all its tailers returned
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub tailers: usize,
    pub stopped: usize,
    pub abandoned: usize,
    pub panicked: usize,
    pub lines_written: u64,
}

/// Runs tailing cycles until shutdown.
///
/// Each cycle connects, does index housekeeping, tails every configured
/// file on its own task with its own connection, waits for all of them,
/// then sleeps before starting over.
pub struct Orchestrator {
    config: Arc<WorkerConfig>,
    connector: Arc<dyn Connector>,
    clock: Arc<dyn Clock>,
}

impl Orchestrator {
    pub fn new(config: Arc<WorkerConfig>, connector: Arc<dyn Connector>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            connector,
            clock,
        }
    }

    fn lifecycle(&self) -> IndexLifecycle {
        IndexLifecycle::new(self.config.es_index_prefix.clone(), self.clock.clone())
    }

    async fn connect(&self) -> Result<Arc<dyn crate::index::SearchClient>, WorkerError> {
        self.connector
            .connect()
            .await
            .map_err(|source| WorkerError::Connect {
                host: self.config.es_host.clone(),
                source,
            })
    }

    /// Loops until `shutdown` fires. Only fatal errors end it early.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), WorkerError> {
        info!(
            project = %self.config.project,
            hostname = %self.config.hostname,
            files = self.config.logs.len(),
            "Worker started"
        );

        let interval = self.config.tuning.cycle_interval;
        loop {
            let report = self.run_cycle(&shutdown).await?;
            info!(
                stopped = report.stopped,
                abandoned = report.abandoned,
                lines_written = report.lines_written,
                "Cycle finished"
            );

            if shutdown.is_cancelled() {
                break;
            }

            info!(sleep_secs = interval.as_secs(), "Waiting before next cycle");
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!("Worker shutdown complete");
        Ok(())
    }

    /// One full cycle: housekeeping, then all tailers to completion.
    pub async fn run_cycle(&self, shutdown: &CancellationToken) -> Result<CycleReport, WorkerError> {
        let lifecycle = self.lifecycle();
        let retention = self.config.tuning.retention_months;

        let setup_client = self.connect().await?;
        lifecycle.delete_if_older_than(setup_client.as_ref(), retention).await;
        lifecycle.ensure_current_index(setup_client.as_ref()).await?;
        drop(setup_client);

        // Cancelled on fatal tailer errors as well as on shutdown
        let cycle_token = shutdown.child_token();
        let settings = self.config.tuning.tailer_settings();
        let filter = self.config.line_filter();
        let mut tailers = JoinSet::new();

        for path in &self.config.logs {
            let client = match self.connect().await {
                Ok(client) => client,
                Err(e) => {
                    cycle_token.cancel();
                    drain(&mut tailers).await;
                    return Err(e);
                }
            };

            let tailer = FileTailer::new(
                path.clone(),
                client,
                lifecycle.clone(),
                filter.clone(),
                self.clock.clone(),
                settings.clone(),
            );
            tailers.spawn(tailer.run(cycle_token.clone()));
        }

        let mut report = CycleReport {
            tailers: tailers.len(),
            ..CycleReport::default()
        };

        while let Some(joined) = tailers.join_next().await {
            match joined {
                Ok(Ok(TailOutcome::Stopped(tail_report))) => {
                    report.stopped += 1;
                    report.lines_written += tail_report.lines_written;
                }
                Ok(Ok(TailOutcome::Abandoned)) => report.abandoned += 1,
                Ok(Err(e)) => {
                    error!(error = %e, "Tailer hit a fatal error, stopping cycle");
                    cycle_token.cancel();
                    drain(&mut tailers).await;
                    return Err(e.into());
                }
                Err(e) => {
                    report.panicked += 1;
                    warn!(error = %e, "Tailer task join error");
                }
            }
        }

        Ok(report)
    }
}

async fn drain(tailers: &mut JoinSet<Result<TailOutcome, TailError>>) {
    while let Some(joined) = tailers.join_next().await {
        if let Ok(Err(e)) = joined {
            error!(error = %e, "Tailer failed during shutdown");
        }
    }
}
