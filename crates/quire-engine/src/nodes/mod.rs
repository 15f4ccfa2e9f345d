//! Generation nodes
//!
//! Each node reads the turn's [`ConversationState`] and reflections and
//! returns a [`NodeOutput`]: the reply to append and, for editing nodes, the
//! new artifact version. Nodes never touch the artifact history themselves;
//! the orchestrator owns the single append point.

pub mod create;
pub mod followup;
pub mod quick_action;
pub mod reflect;
pub mod respond;
pub mod rewrite;
pub mod update;

use std::sync::LazyLock;

use quire_ai::{Context, Message, StreamOptions, Usage};
use regex::Regex;

use crate::artifact::ArtifactContent;
use crate::config::EngineConfig;
use crate::conversation::ConversationState;
use crate::error::{Result, ValidationError};
use crate::events::{EventSink, NodeKind};
use crate::model::{Completion, ModelClient, complete};
use crate::reflection::Reflections;

/// Everything a node needs for one run
pub struct NodeInput<'a> {
    pub client: &'a dyn ModelClient,
    pub config: &'a EngineConfig,
    pub events: &'a EventSink,
    pub state: &'a ConversationState,
    pub reflections: &'a Reflections,
}

/// What a node produced
#[derive(Debug, Clone)]
pub struct NodeOutput {
    pub message: Message,
    /// New version to append, unindexed
    pub artifact: Option<ArtifactContent>,
    pub usage: Usage,
}

impl<'a> NodeInput<'a> {
    /// The version the turn operates on
    pub(crate) fn current_artifact(&self, directive: &'static str) -> Result<&'a ArtifactContent> {
        let state: &'a ConversationState = self.state;
        match &state.artifact {
            Some(doc) => doc.current_content(),
            None => Err(ValidationError::NoArtifact(directive).into()),
        }
    }

    fn generation_options(&self) -> StreamOptions {
        StreamOptions {
            max_tokens: Some(self.config.max_tokens),
            temperature: Some(self.config.temperature),
            ..Default::default()
        }
    }

    /// Stream a plain-text generation with the primary model, forwarding deltas
    pub(crate) async fn generate_text(
        &self,
        node: NodeKind,
        context: &Context,
    ) -> Result<Completion> {
        let events = self.events;
        complete(
            self.client,
            &self.config.model,
            context,
            &self.generation_options(),
            |delta| events.delta(node, delta),
        )
        .await
    }
}

/// A single-message context carrying `prompt`
pub(crate) fn prompt_context(prompt: String) -> Context {
    let mut context = Context::default();
    context.push(Message::user(prompt));
    context
}

/// Conversation messages with `system` as the system prompt
pub(crate) fn conversation_context(system: String, messages: &[Message]) -> Context {
    let mut context = Context::with_system(system);
    context.messages = messages
        .iter()
        .filter(|m| !matches!(m, Message::ToolResult { .. }))
        .cloned()
        .collect();
    context
}

static WRAPPING_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A\s*```[^\n]*\n(.*?)\n?```\s*\z").expect("fence pattern is valid")
});

/// Strip a markdown code fence that wraps the whole output
pub fn strip_code_fence(output: &str) -> String {
    match WRAPPING_FENCE.captures(output) {
        Some(caps) => caps
            .get(1)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default(),
        None => output.to_string(),
    }
}
