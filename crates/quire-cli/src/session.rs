//! The thread the terminal is working in

use std::sync::Arc;

use quire_ai::Message;
use quire_engine::{
    ArtifactDocument, Directive, Orchestrator, ThreadStore, ThreadUpdate, TurnOutcome,
    TurnRequest, ValidationError,
};
use tokio::task::JoinHandle;

/// Local view of one thread: its conversation and artifact history
pub struct Session {
    orchestrator: Arc<Orchestrator>,
    threads: Arc<dyn ThreadStore>,
    assistant_id: String,
    thread_id: String,
    messages: Vec<Message>,
    artifact: Option<ArtifactDocument>,
    reflection: Option<JoinHandle<()>>,
}

pub fn new_thread_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl Session {
    /// Open `thread_id`, or a fresh thread when `None`
    pub async fn open(
        orchestrator: Arc<Orchestrator>,
        threads: Arc<dyn ThreadStore>,
        assistant_id: String,
        thread_id: Option<String>,
    ) -> quire_engine::Result<Self> {
        let thread_id = thread_id.unwrap_or_else(new_thread_id);
        let state = orchestrator.open_thread(&thread_id).await?;
        Ok(Self {
            orchestrator,
            threads,
            assistant_id,
            thread_id,
            messages: state.messages,
            artifact: state.artifact,
            reflection: None,
        })
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn assistant_id(&self) -> &str {
        &self.assistant_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn artifact(&self) -> Option<&ArtifactDocument> {
        self.artifact.as_ref()
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Run one turn. `text` becomes a new user message; quick actions run without one.
    pub async fn submit(
        &mut self,
        text: Option<String>,
        directive: Option<Directive>,
    ) -> quire_engine::Result<TurnOutcome> {
        let mut messages = self.messages.clone();
        if let Some(text) = text {
            messages.push(Message::user(text));
        }

        let mut request = TurnRequest::new(&self.thread_id, &self.assistant_id, messages)
            .with_artifact(self.artifact.clone());
        if let Some(directive) = directive {
            request = request.with_directive(directive);
        }

        let mut outcome = self.orchestrator.run_turn(request).await?;
        self.messages = outcome.messages.clone();
        if outcome.artifact.is_some() {
            self.artifact = outcome.artifact.clone();
        }
        // the reflection from an earlier turn keeps running detached
        self.reflection = outcome.reflection.take();

        if let Err(e) = self
            .threads
            .update_state(&self.thread_id, ThreadUpdate::messages(self.messages.clone()))
            .await
        {
            tracing::warn!(thread_id = %self.thread_id, "failed to save messages: {}", e);
        }
        Ok(outcome)
    }

    pub fn rewind(&mut self, target: u32) -> quire_engine::Result<()> {
        let Some(doc) = self.artifact.as_mut() else {
            return Err(ValidationError::NoArtifact("rewind").into());
        };
        self.orchestrator.rewind(&self.thread_id, doc, target)
    }

    /// Write out pending state and move to another thread
    pub async fn switch_thread(&mut self, thread_id: Option<String>) -> quire_engine::Result<()> {
        self.flush().await;
        let thread_id = thread_id.unwrap_or_else(new_thread_id);
        let state = self.orchestrator.open_thread(&thread_id).await?;
        self.thread_id = thread_id;
        self.messages = state.messages;
        self.artifact = state.artifact;
        Ok(())
    }

    /// Flush the debounced artifact write and wait for the last reflection
    pub async fn close(&mut self) {
        self.flush().await;
        if let Some(handle) = self.reflection.take() {
            if let Err(e) = handle.await {
                tracing::warn!("reflection task failed: {}", e);
            }
        }
    }

    async fn flush(&self) {
        if let Err(e) = self.orchestrator.persister().flush().await {
            eprintln!("Warning: failed to save artifact: {}", e);
        }
    }
}
