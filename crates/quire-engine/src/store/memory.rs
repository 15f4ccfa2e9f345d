//! In-process store implementations

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use super::{MemoryStore, ThreadState, ThreadStore, ThreadUpdate};
use crate::error::Result;

/// Memory store backed by a map, for tests and ephemeral sessions
#[derive(Default)]
pub struct InMemoryMemoryStore {
    values: Mutex<HashMap<(Vec<String>, String), serde_json::Value>>,
}

impl InMemoryMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(namespace: &[&str], key: &str) -> (Vec<String>, String) {
        (
            namespace.iter().map(|s| s.to_string()).collect(),
            key.to_string(),
        )
    }
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn get(&self, namespace: &[&str], key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.values.lock().get(&Self::slot(namespace, key)).cloned())
    }

    async fn put(&self, namespace: &[&str], key: &str, value: serde_json::Value) -> Result<()> {
        self.values.lock().insert(Self::slot(namespace, key), value);
        Ok(())
    }

    async fn delete(&self, namespace: &[&str], key: &str) -> Result<()> {
        self.values.lock().remove(&Self::slot(namespace, key));
        Ok(())
    }
}

/// Thread store backed by a map
#[derive(Default)]
pub struct InMemoryThreadStore {
    threads: Mutex<HashMap<String, ThreadState>>,
    writes: Mutex<u32>,
}

impl InMemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `update_state` calls served so far
    pub fn write_count(&self) -> u32 {
        *self.writes.lock()
    }
}

#[async_trait]
impl ThreadStore for InMemoryThreadStore {
    async fn get_state(&self, thread_id: &str) -> Result<ThreadState> {
        Ok(self
            .threads
            .lock()
            .get(thread_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_state(&self, thread_id: &str, update: ThreadUpdate) -> Result<()> {
        *self.writes.lock() += 1;
        self.threads
            .lock()
            .entry(thread_id.to_string())
            .or_default()
            .apply(update);
        Ok(())
    }
}
