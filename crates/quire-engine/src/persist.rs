//! Debounced durable writes of artifact history
//!
//! In-memory changes are visible immediately; the durable write waits until
//! the artifact has been quiet for the debounce window and then goes out
//! once. At most one write is pending at a time:
//!
//! - scheduling again replaces the pending value and restarts the timer
//! - switching threads drops the pending write and opens a guard window in
//!   which state-triggered writes are ignored
//! - starting a new turn on the same thread stops the timer but keeps the
//!   value; when the turn ends without a new version,
//!   [`ArtifactPersister::resume`] re-arms it
//! - a failed write is logged and its value kept for retry

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::artifact::ArtifactDocument;
use crate::config::PersistenceConfig;
use crate::error::Result;
use crate::store::{ThreadStore, ThreadUpdate};

/// Coalesces artifact writes per thread
#[derive(Clone)]
pub struct ArtifactPersister {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn ThreadStore>,
    config: PersistenceConfig,
    state: Mutex<PersisterState>,
}

#[derive(Default)]
struct PersisterState {
    active_thread: Option<String>,
    guard_until: Option<Instant>,
    pending: Option<Pending>,
    next_generation: u64,
}

struct Pending {
    thread_id: String,
    doc: ArtifactDocument,
    generation: u64,
    /// Armed debounce timer; `None` once stopped
    timer: Option<CancellationToken>,
}

impl ArtifactPersister {
    pub fn new(store: Arc<dyn ThreadStore>, config: PersistenceConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                config,
                state: Mutex::new(PersisterState::default()),
            }),
        }
    }

    /// Make `thread_id` the active thread. Called on every turn start.
    pub fn activate(&self, thread_id: &str) {
        let mut state = self.inner.state.lock();
        if let Some(timer) = state.pending.as_mut().and_then(|p| p.timer.take()) {
            timer.cancel();
        }
        if state
            .pending
            .as_ref()
            .is_some_and(|p| p.thread_id != thread_id)
        {
            if let Some(dropped) = state.pending.take() {
                tracing::debug!(
                    thread_id = %dropped.thread_id,
                    "dropping pending artifact write on thread switch"
                );
            }
        }
        if state.active_thread.as_deref() == Some(thread_id) {
            return;
        }

        if state.active_thread.is_some() {
            state.guard_until = Some(Instant::now() + self.inner.config.guard_window);
        }
        state.active_thread = Some(thread_id.to_string());
    }

    pub fn active_thread(&self) -> Option<String> {
        self.inner.state.lock().active_thread.clone()
    }

    /// Schedule a write triggered by a local state change (rewind, edits).
    /// Returns `false` when the write was suppressed.
    pub fn schedule(&self, thread_id: &str, doc: ArtifactDocument) -> bool {
        {
            let state = self.inner.state.lock();
            if state
                .active_thread
                .as_deref()
                .is_some_and(|active| active != thread_id)
            {
                tracing::warn!(thread_id, "ignoring artifact write for an inactive thread");
                return false;
            }
            if state.guard_until.is_some_and(|until| Instant::now() < until) {
                tracing::debug!(thread_id, "artifact write suppressed by thread-switch guard");
                return false;
            }
        }
        self.arm(thread_id, doc);
        true
    }

    /// Schedule the artifact a turn just produced; not subject to the guard
    pub fn commit(&self, thread_id: &str, doc: ArtifactDocument) {
        self.arm(thread_id, doc);
    }

    /// Re-arm a value left stopped by [`ArtifactPersister::activate`].
    /// Called when a turn on `thread_id` ends, whether or not it succeeded.
    pub fn resume(&self, thread_id: &str) {
        let stopped = {
            let mut state = self.inner.state.lock();
            let stopped = state
                .pending
                .as_ref()
                .is_some_and(|p| p.thread_id == thread_id && p.timer.is_none());
            if stopped { state.pending.take() } else { None }
        };
        if let Some(pending) = stopped {
            tracing::debug!(thread_id, "re-arming stopped artifact write");
            self.arm(thread_id, pending.doc);
        }
    }

    fn arm(&self, thread_id: &str, doc: ArtifactDocument) {
        let token = CancellationToken::new();
        let generation = {
            let mut state = self.inner.state.lock();
            if let Some(timer) = state.pending.take().and_then(|p| p.timer) {
                timer.cancel();
            }
            state.next_generation += 1;
            let generation = state.next_generation;
            state.pending = Some(Pending {
                thread_id: thread_id.to_string(),
                doc,
                generation,
                timer: Some(token.clone()),
            });
            generation
        };
        tracing::debug!(thread_id, generation, "artifact write scheduled");

        let inner = self.inner.clone();
        let debounce = inner.config.debounce;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(debounce) => {
                    // failures are logged and retained inside
                    let _ = inner.write_pending(Some(generation)).await;
                }
            }
        });
    }

    /// Write the pending value now. Returns whether anything was written.
    pub async fn flush(&self) -> Result<bool> {
        self.inner.write_pending(None).await
    }

    /// Drop the pending write without storing it
    pub fn cancel_pending(&self) {
        if let Some(timer) = self
            .inner
            .state
            .lock()
            .pending
            .take()
            .and_then(|p| p.timer)
        {
            timer.cancel();
        }
    }

    pub fn has_pending(&self) -> bool {
        self.inner.state.lock().pending.is_some()
    }
}

impl Inner {
    /// Write the pending value if it is still `generation` (any, when `None`)
    async fn write_pending(&self, generation: Option<u64>) -> Result<bool> {
        let pending = {
            let mut state = self.state.lock();
            let current = state
                .pending
                .as_ref()
                .is_some_and(|p| generation.is_none_or(|g| g == p.generation));
            if current { state.pending.take() } else { None }
        };
        let Some(mut pending) = pending else {
            return Ok(false);
        };
        if let Some(timer) = pending.timer.take() {
            timer.cancel();
        }

        match self
            .store
            .update_state(&pending.thread_id, ThreadUpdate::artifact(pending.doc.clone()))
            .await
        {
            Ok(()) => {
                tracing::debug!(
                    thread_id = %pending.thread_id,
                    index = pending.doc.current_index(),
                    "artifact persisted"
                );
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(
                    thread_id = %pending.thread_id,
                    "artifact write failed, keeping it for retry: {}",
                    e
                );
                let mut state = self.state.lock();
                // a newer value supersedes the failed one
                if state.pending.is_none() {
                    state.pending = Some(pending);
                }
                Err(e)
            }
        }
    }
}
