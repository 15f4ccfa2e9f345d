//! Durable stores the engine reads from and writes to.
//!
//! Both traits are collaborators at the engine's boundary: a memory store for
//! namespaced JSON values (reflections, custom quick actions) and a thread
//! store for per-thread artifact and message state.

mod file;
mod memory;

pub use file::{FileMemoryStore, FileThreadStore};
pub use memory::{InMemoryMemoryStore, InMemoryThreadStore};

use async_trait::async_trait;
use quire_ai::Message;
use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactDocument;
use crate::error::Result;

/// Namespaced key-value store for long-lived JSON values
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Fetch a value; `None` when nothing is stored under the key
    async fn get(&self, namespace: &[&str], key: &str) -> Result<Option<serde_json::Value>>;

    /// Replace the value stored under the key
    async fn put(&self, namespace: &[&str], key: &str, value: serde_json::Value) -> Result<()>;

    /// Remove the key. Deleting a missing key succeeds.
    async fn delete(&self, namespace: &[&str], key: &str) -> Result<()>;
}

/// Per-thread durable state
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Fetch a thread's state; unknown threads come back empty
    async fn get_state(&self, thread_id: &str) -> Result<ThreadState>;

    /// Apply a partial update to a thread's state
    async fn update_state(&self, thread_id: &str, update: ThreadUpdate) -> Result<()>;
}

/// Persisted state of a single thread
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadState {
    pub artifact: Option<ArtifactDocument>,
    pub messages: Vec<Message>,
}

/// Patch applied by [`ThreadStore::update_state`]; `None` fields are left alone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreadUpdate {
    pub artifact: Option<ArtifactDocument>,
    pub messages: Option<Vec<Message>>,
}

impl ThreadUpdate {
    pub fn artifact(artifact: ArtifactDocument) -> Self {
        Self {
            artifact: Some(artifact),
            messages: None,
        }
    }

    pub fn messages(messages: Vec<Message>) -> Self {
        Self {
            artifact: None,
            messages: Some(messages),
        }
    }
}

impl ThreadState {
    pub fn apply(&mut self, update: ThreadUpdate) {
        if let Some(artifact) = update.artifact {
            self.artifact = Some(artifact);
        }
        if let Some(messages) = update.messages {
            self.messages = messages;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactContent;

    #[test]
    fn test_apply_only_touches_present_fields() {
        let mut state = ThreadState {
            artifact: None,
            messages: vec![Message::user("hi")],
        };
        state.apply(ThreadUpdate::artifact(ArtifactDocument::new(
            ArtifactContent::text("T", "body"),
        )));
        assert!(state.artifact.is_some());
        assert_eq!(state.messages.len(), 1);

        state.apply(ThreadUpdate::messages(vec![]));
        assert!(state.artifact.is_some());
        assert!(state.messages.is_empty());
    }
}
