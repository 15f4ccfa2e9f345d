//! Turn requests, directives and the per-turn conversation state

use quire_ai::Message;
use serde::{Deserialize, Serialize};

use crate::artifact::{ArtifactDocument, ProgrammingLanguage};
use crate::error::ValidationError;
use crate::quick_action::{ArtifactLength, QuickActionRequest, ReadingLevel, TargetLanguage};
use crate::router::Route;

/// A highlighted range of the current artifact body, in character offsets.
/// `end` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharSpan {
    pub start: usize,
    pub end: usize,
}

/// A highlighted excerpt of the current artifact body, matched on its first
/// occurrence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSelection {
    pub selected_text: String,
}

/// Which part of the artifact a targeted edit replaces
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Highlight {
    Span(CharSpan),
    Excerpt(TextSelection),
}

/// The explicit instruction a caller attached to a turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Highlight(Highlight),
    QuickAction(QuickActionRequest),
}

/// A caller-submitted turn
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TurnRequest {
    pub thread_id: String,
    pub assistant_id: String,
    /// Full conversation so far, ending with the new user message
    pub messages: Vec<Message>,
    /// Artifact snapshot the caller is looking at
    pub artifact: Option<ArtifactDocument>,

    pub highlighted_code: Option<CharSpan>,
    pub highlighted_text: Option<TextSelection>,
    pub language: Option<TargetLanguage>,
    pub artifact_length: Option<ArtifactLength>,
    pub reading_level: Option<ReadingLevel>,
    pub regenerate_with_emojis: bool,
    pub add_comments: bool,
    pub add_logs: bool,
    pub fix_bugs: bool,
    pub port_language: Option<ProgrammingLanguage>,
    pub custom_quick_action_id: Option<String>,
}

impl TurnRequest {
    pub fn new(
        thread_id: impl Into<String>,
        assistant_id: impl Into<String>,
        messages: Vec<Message>,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            assistant_id: assistant_id.into(),
            messages,
            ..Default::default()
        }
    }

    pub fn with_artifact(mut self, artifact: Option<ArtifactDocument>) -> Self {
        self.artifact = artifact;
        self
    }

    /// Set the directive field that carries `directive`
    pub fn with_directive(mut self, directive: Directive) -> Self {
        match directive {
            Directive::Highlight(Highlight::Span(span)) => self.highlighted_code = Some(span),
            Directive::Highlight(Highlight::Excerpt(sel)) => self.highlighted_text = Some(sel),
            Directive::QuickAction(action) => match action {
                QuickActionRequest::ChangeLanguage(l) => self.language = Some(l),
                QuickActionRequest::ChangeLength(l) => self.artifact_length = Some(l),
                QuickActionRequest::ChangeReadingLevel(l) => self.reading_level = Some(l),
                QuickActionRequest::AddEmojis => self.regenerate_with_emojis = true,
                QuickActionRequest::AddComments => self.add_comments = true,
                QuickActionRequest::AddLogs => self.add_logs = true,
                QuickActionRequest::FixBugs => self.fix_bugs = true,
                QuickActionRequest::PortLanguage(l) => self.port_language = Some(l),
                QuickActionRequest::Custom(id) => self.custom_quick_action_id = Some(id),
            },
        }
        self
    }

    /// Collapse the directive fields into at most one [`Directive`]
    pub fn directive(&self) -> Result<Option<Directive>, ValidationError> {
        let mut found: Vec<(&'static str, Directive)> = Vec::new();

        if let Some(span) = self.highlighted_code {
            found.push((
                "highlighted_code",
                Directive::Highlight(Highlight::Span(span)),
            ));
        }
        if let Some(sel) = &self.highlighted_text {
            found.push((
                "highlighted_text",
                Directive::Highlight(Highlight::Excerpt(sel.clone())),
            ));
        }

        let mut actions = Vec::new();
        if let Some(l) = self.language {
            actions.push(QuickActionRequest::ChangeLanguage(l));
        }
        if let Some(l) = self.artifact_length {
            actions.push(QuickActionRequest::ChangeLength(l));
        }
        if let Some(l) = self.reading_level {
            actions.push(QuickActionRequest::ChangeReadingLevel(l));
        }
        if self.regenerate_with_emojis {
            actions.push(QuickActionRequest::AddEmojis);
        }
        if self.add_comments {
            actions.push(QuickActionRequest::AddComments);
        }
        if self.add_logs {
            actions.push(QuickActionRequest::AddLogs);
        }
        if self.fix_bugs {
            actions.push(QuickActionRequest::FixBugs);
        }
        if let Some(l) = self.port_language {
            actions.push(QuickActionRequest::PortLanguage(l));
        }
        if let Some(id) = &self.custom_quick_action_id {
            actions.push(QuickActionRequest::Custom(id.clone()));
        }
        for action in actions {
            found.push((action.field_name(), Directive::QuickAction(action)));
        }

        match found.len() {
            0 => Ok(None),
            1 => Ok(found.pop().map(|(_, d)| d)),
            _ => Err(ValidationError::MultipleDirectives(
                found.into_iter().map(|(name, _)| name).collect(),
            )),
        }
    }
}

/// State threaded through the steps of one turn
#[derive(Debug, Clone)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    pub artifact: Option<ArtifactDocument>,
    pub directive: Option<Directive>,
    /// Router decision, set before the generation node runs
    pub route: Option<Route>,
}

impl ConversationState {
    /// The most recent user message, if any
    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| matches!(m, Message::User { .. }))
    }

    /// Up to the last `n` messages
    pub fn tail(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }
}

/// Render messages as a plain transcript for embedding in prompts
pub fn transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .filter(|m| !matches!(m, Message::ToolResult { .. }))
        .map(|m| format!("{}: {}", m.role(), m.text()))
        .collect::<Vec<_>>()
        .join("\n\n")
}
