//! In-process search backend.
//!
//! Keeps indices and documents in memory and records every call made
//! against it, so tests can assert on exactly what was sent.

use super::client::{ClientError, Connector, Result, SearchClient};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Exists(String),
    Create(String),
    Delete(String),
    Index(String),
}

#[derive(Debug, Default)]
struct Inner {
    indices: BTreeSet<String>,
    mappings: BTreeMap<String, serde_json::Value>,
    documents: Vec<(String, String)>,
    calls: Vec<Call>,
    fail_create: bool,
    fail_delete: bool,
    fail_writes: bool,
    stall_writes: bool,
}

/// Cheap to clone; clones share the same store.
#[derive(Debug, Clone, Default)]
pub struct MemoryClient {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn with_index(self, index: &str) -> Self {
        self.lock().indices.insert(index.to_string());
        self
    }

    pub fn fail_create(&self, fail: bool) {
        self.lock().fail_create = fail;
    }

    pub fn fail_delete(&self, fail: bool) {
        self.lock().fail_delete = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Writes made while stalled are recorded and then never complete.
    pub fn stall_writes(&self, stall: bool) {
        self.lock().stall_writes = stall;
    }

    pub fn indices(&self) -> Vec<String> {
        self.lock().indices.iter().cloned().collect()
    }

    pub fn has_index(&self, index: &str) -> bool {
        self.lock().indices.contains(index)
    }

    pub fn mapping(&self, index: &str) -> Option<serde_json::Value> {
        self.lock().mappings.get(index).cloned()
    }

    /// Documents as `(index, body)` pairs in write order.
    pub fn documents(&self) -> Vec<(String, String)> {
        self.lock().documents.clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn count_calls(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| matches(*c)).count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }
}

#[async_trait]
impl SearchClient for MemoryClient {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        let mut inner = self.lock();
        inner.calls.push(Call::Exists(index.to_string()));
        Ok(inner.indices.contains(index))
    }

    async fn create_index(&self, index: &str, body: &serde_json::Value) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(Call::Create(index.to_string()));
        if inner.fail_create {
            return Err(ClientError::Rejected(format!("create {} refused", index)));
        }
        if !inner.indices.insert(index.to_string()) {
            return Err(ClientError::Status {
                status: 400,
                message: format!("resource_already_exists_exception: {}", index),
            });
        }
        inner.mappings.insert(index.to_string(), body.clone());
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(Call::Delete(index.to_string()));
        if inner.fail_delete {
            return Err(ClientError::Rejected(format!("delete {} refused", index)));
        }
        if !inner.indices.remove(index) {
            return Err(ClientError::Status {
                status: 404,
                message: format!("index_not_found_exception: {}", index),
            });
        }
        inner.mappings.remove(index);
        inner.documents.retain(|(name, _)| name != index);
        Ok(())
    }

    async fn index_document(&self, index: &str, body: &str) -> Result<()> {
        let stalled = {
            let mut inner = self.lock();
            inner.calls.push(Call::Index(index.to_string()));
            inner.stall_writes
        };
        if stalled {
            std::future::pending::<()>().await;
        }

        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(ClientError::Rejected(format!("write to {} refused", index)));
        }
        // Elasticsearch auto-creates the index on first write.
        inner.indices.insert(index.to_string());
        inner.documents.push((index.to_string(), body.to_string()));
        Ok(())
    }
}

/// Hands out clients that all share one store, counting connections.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    client: MemoryClient,
    connections: Arc<AtomicUsize>,
    refuse: Arc<std::sync::atomic::AtomicBool>,
}

impl MemoryConnector {
    pub fn new(client: MemoryClient) -> Self {
        Self {
            client,
            ..Self::default()
        }
    }

    pub fn client(&self) -> &MemoryClient {
        &self.client
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> Result<Arc<dyn SearchClient>> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(ClientError::Rejected("connection refused".to_string()));
        }
        self.connections.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(self.client.clone()))
    }
}
