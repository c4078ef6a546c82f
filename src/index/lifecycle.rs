use super::bucket::{index_name, index_name_months_before, natural_day_offset_at};
use super::client::{ClientError, SearchClient};
use crate::clock::Clock;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

/// Default retention window, in 30-day months.
pub const DEFAULT_RETENTION_MONTHS: i64 = 3;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("can not set mappings for index {index}: {source}")]
    Create {
        index: String,
        #[source]
        source: ClientError,
    },
}

/// Mapping body for newly created monthly indices.
pub fn index_mappings() -> serde_json::Value {
    json!({
        "mappings": {
            "properties": {
                "@timestamp": { "type": "date" },
                "@version": { "type": "integer" }
            }
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Absent,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created,
    AlreadyExists,
}

/// Creates the current month's index and prunes the expired one.
///
/// Both operations are idempotent within a bucket period. Index names are
/// recomputed from the clock on every call.
#[derive(Clone)]
pub struct IndexLifecycle {
    prefix: String,
    clock: Arc<dyn Clock>,
}

impl IndexLifecycle {
    pub fn new(prefix: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            prefix: prefix.into(),
            clock,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Index the current instant belongs to.
    pub fn current_index(&self) -> String {
        index_name(&self.prefix, natural_day_offset_at(self.clock.now(), 0))
    }

    /// Index for the month `months_before` × 30 days ago.
    pub fn expired_index(&self, months_before: i64) -> String {
        index_name_months_before(&self.prefix, self.clock.now(), months_before)
    }

    pub async fn delete_if_older_than(
        &self,
        client: &dyn SearchClient,
        months_before: i64,
    ) -> DeleteOutcome {
        let index = self.expired_index(months_before);

        match client.index_exists(&index).await {
            Ok(true) => {}
            Ok(false) => {
                info!(index = %index, "No expired index found");
                return DeleteOutcome::Absent;
            }
            Err(e) => {
                info!(index = %index, error = %e, "No expired index found");
                return DeleteOutcome::Absent;
            }
        }

        match client.delete_index(&index).await {
            Ok(()) => {
                info!(index = %index, "Deleted expired index");
                DeleteOutcome::Deleted
            }
            Err(e) => {
                error!(index = %index, error = %e, "Failed to delete expired index");
                DeleteOutcome::Failed
            }
        }
    }

    pub async fn ensure_current_index(
        &self,
        client: &dyn SearchClient,
    ) -> Result<EnsureOutcome, LifecycleError> {
        let index = self.current_index();
        debug!(index = %index, "Checking current index");

        // A failed existence check falls through to creation; if the cluster
        // is really unreachable the create fails too.
        if let Ok(true) = client.index_exists(&index).await {
            info!(index = %index, "Current index already exists");
            return Ok(EnsureOutcome::AlreadyExists);
        }

        client
            .create_index(&index, &index_mappings())
            .await
            .map_err(|source| LifecycleError::Create {
                index: index.clone(),
                source,
            })?;

        info!(index = %index, "Created current index with mappings");
        Ok(EnsureOutcome::Created)
    }
}
