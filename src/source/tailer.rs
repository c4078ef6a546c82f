use crate::clock::Clock;
use crate::index::lifecycle::{IndexLifecycle, LifecycleError, DEFAULT_RETENTION_MONTHS};
use crate::index::SearchClient;
use crate::source::filter::LineFilter;
use crate::source::follow::{FollowConfig, Follower, TailCursor};
use chrono::{Datelike, Timelike};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Restarts at or after this local hour skip the content already in the file.
pub const DEFAULT_RESUME_CUTOFF_HOUR: u32 = 5;

#[derive(Debug, Error)]
pub enum TailError {
    #[error("index housekeeping failed while tailing {}: {}", .path.display(), .source)]
    Housekeeping {
        path: PathBuf,
        #[source]
        source: LifecycleError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailState {
    Starting,
    Resuming,
    Streaming,
    Stopped,
    Failed,
}

/// Counters for one tailer run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TailReport {
    pub lines_read: u64,
    pub lines_written: u64,
    pub lines_excluded: u64,
    pub write_failures: u64,
    pub housekeeping_runs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailOutcome {
    /// The line stream closed, or shutdown was requested.
    Stopped(TailReport),
    /// The file could not be stat'ed or opened; retried next cycle.
    Abandoned,
}

/// Once-per-day latch for the month-rollover housekeeping.
///
/// Fires on the first line seen on day 1 of a month and re-arms on the
/// first line seen on any other day.
#[derive(Debug, Default)]
pub struct RotationGuard {
    checked: bool,
}

impl RotationGuard {
    /// Returns true when housekeeping should run for a line seen on `day_of_month`.
    pub fn observe(&mut self, day_of_month: u32) -> bool {
        if day_of_month != 1 {
            self.checked = false;
            return false;
        }
        if self.checked {
            return false;
        }
        self.checked = true;
        true
    }

    pub fn is_checked(&self) -> bool {
        self.checked
    }
}

/// Picks where to resume `path` given the local hour of the restart.
pub fn resume_cursor(path: &Path, hour: u32, cutoff_hour: u32) -> std::io::Result<TailCursor> {
    if hour < cutoff_hour {
        return Ok(TailCursor::Start);
    }
    let metadata = std::fs::metadata(path)?;
    Ok(TailCursor::Offset(metadata.len()))
}

#[derive(Debug, Clone)]
pub struct TailerSettings {
    pub resume_cutoff_hour: u32,
    pub retention_months: i64,
    pub follow: FollowConfig,
}

impl Default for TailerSettings {
    fn default() -> Self {
        Self {
            resume_cutoff_hour: DEFAULT_RESUME_CUTOFF_HOUR,
            retention_months: DEFAULT_RETENTION_MONTHS,
            follow: FollowConfig::default(),
        }
    }
}

/// Ships the lines appended to one file into the current monthly index.
pub struct FileTailer {
    path: PathBuf,
    client: Arc<dyn SearchClient>,
    lifecycle: IndexLifecycle,
    filter: LineFilter,
    clock: Arc<dyn Clock>,
    settings: TailerSettings,

    state: watch::Sender<TailState>,
    guard: RotationGuard,
    report: TailReport,
}

impl FileTailer {
    pub fn new(
        path: PathBuf,
        client: Arc<dyn SearchClient>,
        lifecycle: IndexLifecycle,
        filter: LineFilter,
        clock: Arc<dyn Clock>,
        settings: TailerSettings,
    ) -> Self {
        Self {
            path,
            client,
            lifecycle,
            filter,
            clock,
            settings,
            state: watch::channel(TailState::Starting).0,
            guard: RotationGuard::default(),
            report: TailReport::default(),
        }
    }

    pub fn state(&self) -> TailState {
        *self.state.borrow()
    }

    /// Follows state changes across `run`, which consumes the tailer.
    pub fn watch_state(&self) -> watch::Receiver<TailState> {
        self.state.subscribe()
    }

    pub async fn run(mut self, cancel: CancellationToken) -> Result<TailOutcome, TailError> {
        info!(path = %self.path.display(), "Tailing file");

        let hour = self.clock.now().hour();
        let cursor = match resume_cursor(&self.path, hour, self.settings.resume_cutoff_hour) {
            Ok(cursor) => cursor,
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Failed to stat file");
                self.transition(TailState::Failed);
                return Ok(TailOutcome::Abandoned);
            }
        };
        debug!(path = %self.path.display(), hour, cursor = ?cursor, "Resume cursor chosen");

        self.transition(TailState::Resuming);
        let follower = match Follower::open(&self.path, cursor, self.settings.follow.clone()) {
            Ok(follower) => follower,
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Failed to follow file");
                self.transition(TailState::Failed);
                return Ok(TailOutcome::Abandoned);
            }
        };

        self.transition(TailState::Streaming);
        let lines = follower.into_stream(cancel.clone());
        tokio::pin!(lines);

        while let Some(item) = lines.next().await {
            let line = match item {
                Ok(line) => line,
                Err(e) => {
                    error!(path = %self.path.display(), error = %e, "Error reading file");
                    break;
                }
            };
            self.report.lines_read += 1;

            if let Err(e) = self.rotate_if_due().await {
                self.transition(TailState::Failed);
                return Err(e);
            }

            if self.filter.excludes(&line) {
                self.report.lines_excluded += 1;
                continue;
            }

            let index = self.lifecycle.current_index();
            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.client.index_document(&index, &line) => result,
            };
            match result {
                Ok(()) => self.report.lines_written += 1,
                Err(e) => {
                    self.report.write_failures += 1;
                    error!(path = %self.path.display(), index = %index, error = %e, "Failed to index line");
                }
            }

            debug!(index = %index, line = %line, "Shipped line");
        }

        self.transition(TailState::Stopped);
        info!(
            path = %self.path.display(),
            lines_read = self.report.lines_read,
            lines_written = self.report.lines_written,
            "Tailer stopped"
        );
        Ok(TailOutcome::Stopped(self.report))
    }

    fn transition(&mut self, next: TailState) {
        let from = self.state.send_replace(next);
        debug!(path = %self.path.display(), from = ?from, to = ?next, "Tailer state");
    }

    /// Runs index housekeeping on the first line of day 1 of each month.
    async fn rotate_if_due(&mut self) -> Result<(), TailError> {
        let now = self.clock.now();
        if !self.guard.observe(now.day()) {
            return Ok(());
        }

        self.lifecycle
            .delete_if_older_than(self.client.as_ref(), self.settings.retention_months)
            .await;
        self.lifecycle
            .ensure_current_index(self.client.as_ref())
            .await
            .map_err(|source| TailError::Housekeeping {
                path: self.path.clone(),
                source,
            })?;
        self.report.housekeeping_runs += 1;

        info!(
            path = %self.path.display(),
            day = now.day(),
            index = %self.lifecycle.current_index(),
            "Rotated monthly index"
        );
        Ok(())
    }
}
