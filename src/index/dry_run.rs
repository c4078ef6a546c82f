//! Backend for `logship run --dry-run`.
//!
//! Tracks which indices would exist and counts documents, but keeps no
//! line content, so a long dry run stays flat in memory.

use super::client::{Connector, Result, SearchClient};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct Shared {
    indices: Mutex<BTreeSet<String>>,
    documents: AtomicU64,
}

#[derive(Debug, Clone, Default)]
pub struct DryRunClient {
    shared: Arc<Shared>,
}

impl DryRunClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn indices_mut(&self) -> MutexGuard<'_, BTreeSet<String>> {
        match self.shared.indices.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn indices(&self) -> Vec<String> {
        self.indices_mut().iter().cloned().collect()
    }

    /// Documents that would have been sent so far.
    pub fn documents_seen(&self) -> u64 {
        self.shared.documents.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SearchClient for DryRunClient {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        Ok(self.indices_mut().contains(index))
    }

    async fn create_index(&self, index: &str, _body: &serde_json::Value) -> Result<()> {
        self.indices_mut().insert(index.to_string());
        info!(index = %index, "Dry run: would create index");
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        self.indices_mut().remove(index);
        info!(index = %index, "Dry run: would delete index");
        Ok(())
    }

    async fn index_document(&self, index: &str, body: &str) -> Result<()> {
        self.indices_mut().insert(index.to_string());
        let seen = self.shared.documents.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(index = %index, bytes = body.len(), seen, "Dry run: would index line");
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DryRunConnector {
    client: DryRunClient,
}

impl DryRunConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client(&self) -> &DryRunClient {
        &self.client
    }
}

#[async_trait]
impl Connector for DryRunConnector {
    async fn connect(&self) -> Result<Arc<dyn SearchClient>> {
        Ok(Arc::new(self.client.clone()))
    }
}
