//! Turn event types

use std::pin::Pin;

use quire_ai::{Message, Usage};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::Stream;

use crate::artifact::ArtifactContent;

/// Which generation step produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    CreateArtifact,
    RewriteArtifact,
    UpdateArtifact,
    QuickAction,
    CustomAction,
    RespondToQuery,
    GenerateFollowup,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::CreateArtifact => "create_artifact",
            NodeKind::RewriteArtifact => "rewrite_artifact",
            NodeKind::UpdateArtifact => "update_artifact",
            NodeKind::QuickAction => "quick_action",
            NodeKind::CustomAction => "custom_action",
            NodeKind::RespondToQuery => "respond_to_query",
            NodeKind::GenerateFollowup => "generate_followup",
        }
    }

    /// Whether the node appends an artifact version
    pub fn mutates_artifact(&self) -> bool {
        !matches!(self, NodeKind::RespondToQuery | NodeKind::GenerateFollowup)
    }
}

/// Events emitted while a turn runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// Turn accepted
    TurnStart { thread_id: String },

    /// A generation node started
    NodeStart { node: NodeKind },

    /// Streamed reply text
    MessageDelta { node: NodeKind, delta: String },

    /// A node's reply message completed
    MessageEnd { node: NodeKind, message: Message },

    /// A new artifact version was appended
    ArtifactUpdated { content: ArtifactContent },

    /// Turn completed
    TurnEnd {
        artifact_index: Option<u32>,
        usage: Usage,
    },

    /// Turn failed
    Error { message: String },
}

impl TurnEvent {
    /// Check if this is a terminal event
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnEvent::TurnEnd { .. } | TurnEvent::Error { .. })
    }
}

/// A stream of turn events
pub type TurnEventStream = Pin<Box<dyn Stream<Item = TurnEvent> + Send>>;

/// Fan-out of turn events to every subscriber
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: broadcast::Sender<TurnEvent>,
}

impl EventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TurnEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: TurnEvent) {
        // no subscribers is fine
        let _ = self.tx.send(event);
    }

    pub fn delta(&self, node: NodeKind, delta: &str) {
        self.emit(TurnEvent::MessageDelta {
            node,
            delta: delta.to_string(),
        });
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tags() {
        let json = serde_json::to_value(TurnEvent::MessageDelta {
            node: NodeKind::RespondToQuery,
            delta: "hi".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "message_delta");
        assert_eq!(json["node"], "respond_to_query");
    }

    #[test]
    fn test_only_conversational_nodes_leave_artifact_alone() {
        assert!(NodeKind::UpdateArtifact.mutates_artifact());
        assert!(NodeKind::CustomAction.mutates_artifact());
        assert!(!NodeKind::RespondToQuery.mutates_artifact());
        assert!(!NodeKind::GenerateFollowup.mutates_artifact());
    }

    #[tokio::test]
    async fn test_sink_fans_out() {
        let sink = EventSink::new(8);
        let mut a = sink.subscribe();
        let mut b = sink.subscribe();
        sink.delta(NodeKind::CreateArtifact, "x");
        assert!(matches!(a.recv().await.unwrap(), TurnEvent::MessageDelta { .. }));
        assert!(matches!(b.recv().await.unwrap(), TurnEvent::MessageDelta { .. }));
    }
}
