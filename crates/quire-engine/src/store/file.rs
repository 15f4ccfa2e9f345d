//! JSON-file store implementations
//!
//! Layout under the data directory:
//! - `memory/<namespace...>/<key>.json`
//! - `threads/<thread_id>.json`

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

use super::{MemoryStore, ThreadState, ThreadStore, ThreadUpdate};
use crate::error::{Error, Result};

/// Keep path segments to a safe character set so ids can't escape the data dir
fn sanitize(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

fn store_err(path: &Path, e: impl std::fmt::Display) -> Error {
    Error::Store(format!("{}: {}", path.display(), e))
}

async fn read_json(path: &Path) -> Result<Option<serde_json::Value>> {
    match fs::read_to_string(path).await {
        Ok(content) => serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| store_err(path, e)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(store_err(path, e)),
    }
}

/// Write via a temp file and rename so readers never see a torn file.
/// Each write gets its own temp name; concurrent writers race only on the rename.
async fn write_json(path: &Path, value: &serde_json::Value) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).await.map_err(|e| store_err(dir, e))?;
    }
    let content = serde_json::to_string_pretty(value).map_err(|e| store_err(path, e))?;
    let tmp = path.with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4().simple()));
    fs::write(&tmp, content).await.map_err(|e| store_err(&tmp, e))?;
    fs::rename(&tmp, path).await.map_err(|e| store_err(path, e))
}

/// Memory store persisted as one JSON file per key
pub struct FileMemoryStore {
    root: PathBuf,
}

impl FileMemoryStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: data_dir.into().join("memory"),
        }
    }

    fn path(&self, namespace: &[&str], key: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in namespace {
            path.push(sanitize(segment));
        }
        path.push(format!("{}.json", sanitize(key)));
        path
    }
}

#[async_trait]
impl MemoryStore for FileMemoryStore {
    async fn get(&self, namespace: &[&str], key: &str) -> Result<Option<serde_json::Value>> {
        read_json(&self.path(namespace, key)).await
    }

    async fn put(&self, namespace: &[&str], key: &str, value: serde_json::Value) -> Result<()> {
        write_json(&self.path(namespace, key), &value).await
    }

    async fn delete(&self, namespace: &[&str], key: &str) -> Result<()> {
        let path = self.path(namespace, key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(store_err(&path, e)),
        }
    }
}

/// Thread store persisted as one JSON file per thread
pub struct FileThreadStore {
    root: PathBuf,
    /// Held across read-modify-write so concurrent patches don't drop each other
    update_lock: Mutex<()>,
}

impl FileThreadStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: data_dir.into().join("threads"),
            update_lock: Mutex::new(()),
        }
    }

    fn path(&self, thread_id: &str) -> PathBuf {
        self.root.join(format!("{}.json", sanitize(thread_id)))
    }

    /// Thread ids with a stored state file, most recently written first
    pub async fn list_threads(&self) -> Result<Vec<String>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(store_err(&self.root, e)),
        };

        let mut threads = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| store_err(&self.root, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let modified = entry
                .metadata()
                .await
                .and_then(|m| m.modified())
                .ok();
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                threads.push((modified, stem.to_string()));
            }
        }
        threads.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(threads.into_iter().map(|(_, id)| id).collect())
    }
}

#[async_trait]
impl ThreadStore for FileThreadStore {
    async fn get_state(&self, thread_id: &str) -> Result<ThreadState> {
        let path = self.path(thread_id);
        let Some(value) = read_json(&path).await? else {
            return Ok(ThreadState::default());
        };
        let state: ThreadState = serde_json::from_value(value).map_err(|e| store_err(&path, e))?;
        if let Some(artifact) = &state.artifact {
            artifact.validate()?;
        }
        Ok(state)
    }

    async fn update_state(&self, thread_id: &str, update: ThreadUpdate) -> Result<()> {
        let _guard = self.update_lock.lock().await;
        let mut state = self.get_state(thread_id).await?;
        state.apply(update);
        let value = serde_json::to_value(&state)?;
        write_json(&self.path(thread_id), &value).await
    }
}
