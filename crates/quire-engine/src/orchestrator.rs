//! Turn orchestration
//!
//! One turn runs as a short pipeline:
//!
//! 1. validate the request (no model call, no mutation on failure)
//! 2. pick the generation node: a directive bypasses the router entirely
//! 3. run the node and append its artifact version
//! 4. after an edit, generate a followup (best effort)
//! 5. schedule the debounced durable write
//! 6. spawn the reflect step detached from the reply

use std::sync::Arc;

use async_stream::stream;
use quire_ai::{Message, Usage};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::artifact::{ArtifactContent, ArtifactDocument};
use crate::config::EngineConfig;
use crate::conversation::{ConversationState, Directive, Highlight, TurnRequest};
use crate::error::{Error, Result, ValidationError};
use crate::events::{EventSink, NodeKind, TurnEvent, TurnEventStream};
use crate::model::ModelClient;
use crate::nodes::reflect::ReflectJob;
use crate::nodes::{self, NodeInput, NodeOutput};
use crate::persist::ArtifactPersister;
use crate::quick_action::{CustomActionStore, CustomQuickAction, QuickActionRequest};
use crate::reflection::{ReflectionStore, Reflections};
use crate::router::{self, Route};
use crate::store::{MemoryStore, ThreadState, ThreadStore};

/// What a validated request will run
#[derive(Debug, Clone)]
enum Plan {
    Route,
    Update,
    QuickAction(QuickActionRequest),
    Custom(CustomQuickAction),
}

/// Result of a completed turn
#[derive(Debug)]
pub struct TurnOutcome {
    /// Conversation after the turn
    pub messages: Vec<Message>,
    /// Messages this turn appended
    pub replies: Vec<Message>,
    pub artifact: Option<ArtifactDocument>,
    /// Router decision; `None` when a directive bypassed routing
    pub route: Option<Route>,
    pub node: NodeKind,
    pub usage: Usage,
    /// Detached reflect task, if one was started
    pub reflection: Option<JoinHandle<()>>,
}

impl TurnOutcome {
    /// Index of the new version, if the turn appended one
    pub fn new_version(&self) -> Option<u32> {
        if self.node.mutates_artifact() {
            self.artifact.as_ref().map(|doc| doc.current_index())
        } else {
            None
        }
    }
}

/// Runs turns against a model client and the durable stores
pub struct Orchestrator {
    client: Arc<dyn ModelClient>,
    config: EngineConfig,
    threads: Arc<dyn ThreadStore>,
    reflections: ReflectionStore,
    custom_actions: CustomActionStore,
    persister: ArtifactPersister,
    events: EventSink,
}

impl Orchestrator {
    pub fn new(
        client: Arc<dyn ModelClient>,
        memory: Arc<dyn MemoryStore>,
        threads: Arc<dyn ThreadStore>,
        config: EngineConfig,
    ) -> Self {
        let persister = ArtifactPersister::new(threads.clone(), config.persistence);
        Self {
            client,
            threads,
            reflections: ReflectionStore::new(memory.clone()),
            custom_actions: CustomActionStore::new(memory),
            persister,
            events: EventSink::default(),
            config,
        }
    }

    /// Subscribe to events from every turn
    pub fn subscribe(&self) -> broadcast::Receiver<TurnEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn reflections(&self) -> &ReflectionStore {
        &self.reflections
    }

    pub fn custom_actions(&self) -> &CustomActionStore {
        &self.custom_actions
    }

    pub fn persister(&self) -> &ArtifactPersister {
        &self.persister
    }

    /// Make `thread_id` active and load its stored state
    pub async fn open_thread(&self, thread_id: &str) -> Result<ThreadState> {
        self.persister.activate(thread_id);
        let state = self.threads.get_state(thread_id).await?;
        if let Some(doc) = &state.artifact {
            doc.validate()?;
        }
        Ok(state)
    }

    /// Point `doc` at an older version and schedule the write
    pub fn rewind(&self, thread_id: &str, doc: &mut ArtifactDocument, target: u32) -> Result<()> {
        doc.rewind(target)?;
        self.persister.schedule(thread_id, doc.clone());
        Ok(())
    }

    /// Run a turn, streaming its events to subscribers
    pub async fn run_turn(&self, request: TurnRequest) -> Result<TurnOutcome> {
        let thread_id = request.thread_id.clone();
        let result = self.execute(request).await;
        // a turn that appended nothing leaves the earlier value stopped
        self.persister.resume(&thread_id);
        match result {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.events.emit(TurnEvent::Error {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Run a turn in the background and stream its events
    pub fn stream_turn(self: &Arc<Self>, request: TurnRequest) -> TurnEventStream {
        let mut rx = self.subscribe();
        let this = Arc::clone(self);
        tokio::spawn(async move {
            // the outcome travels through the event stream
            let _ = this.run_turn(request).await;
        });

        Box::pin(stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let terminal = event.is_terminal();
                        yield event;
                        if terminal {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "turn event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    async fn validate(&self, request: &TurnRequest) -> Result<Plan> {
        if request.thread_id.trim().is_empty() {
            return Err(ValidationError::MissingIdentity("thread_id").into());
        }
        if request.assistant_id.trim().is_empty() {
            return Err(ValidationError::MissingIdentity("assistant_id").into());
        }
        let directive = request.directive()?;

        let needs_user_message = !matches!(directive, Some(Directive::QuickAction(_)));
        let has_user_message = request
            .messages
            .iter()
            .any(|m| matches!(m, Message::User { .. }));
        if needs_user_message && !has_user_message {
            return Err(ValidationError::EmptyConversation.into());
        }

        let current = match &request.artifact {
            Some(doc) => {
                doc.validate()?;
                Some(doc.current_content()?)
            }
            None => None,
        };

        match directive {
            None => Ok(Plan::Route),
            Some(Directive::Highlight(highlight)) => {
                let field = match highlight {
                    Highlight::Span(_) => "highlighted_code",
                    Highlight::Excerpt(_) => "highlighted_text",
                };
                let current = current.ok_or(ValidationError::NoArtifact(field))?;
                nodes::update::resolve_highlight(current.body(), &highlight)?;
                Ok(Plan::Update)
            }
            Some(Directive::QuickAction(QuickActionRequest::Custom(id))) => {
                let action = QuickActionRequest::Custom(id.clone());
                nodes::quick_action::check_applicable(&action, current)?;
                match self.custom_actions.get(&request.assistant_id, &id).await? {
                    Some(custom) => Ok(Plan::Custom(custom)),
                    None => Err(ValidationError::UnknownCustomAction(id).into()),
                }
            }
            Some(Directive::QuickAction(action)) => {
                nodes::quick_action::check_applicable(&action, current)?;
                Ok(Plan::QuickAction(action))
            }
        }
    }

    async fn load_reflections(&self, assistant_id: &str) -> Reflections {
        match self.reflections.get(assistant_id).await {
            Ok(reflections) => reflections,
            Err(e) => {
                tracing::warn!(assistant_id, "failed to load reflections, using none: {}", e);
                Reflections::default()
            }
        }
    }

    async fn execute(&self, request: TurnRequest) -> Result<TurnOutcome> {
        let plan = self.validate(&request).await?;
        let directive = request.directive()?;
        let TurnRequest {
            thread_id,
            assistant_id,
            messages,
            artifact,
            ..
        } = request;

        self.persister.activate(&thread_id);
        self.events.emit(TurnEvent::TurnStart {
            thread_id: thread_id.clone(),
        });

        let reflections = self.load_reflections(&assistant_id).await;
        let mut usage = Usage::default();
        let mut state = ConversationState {
            messages,
            artifact,
            directive,
            route: None,
        };
        let prior_len = state.messages.len();

        let node = match &plan {
            Plan::Route => {
                let (route, route_usage) =
                    router::route(self.client.as_ref(), &self.config, &state).await?;
                usage.accumulate(&route_usage);
                state.route = Some(route);
                match (route, state.artifact.is_some()) {
                    (Route::GenerateArtifact, false) => NodeKind::CreateArtifact,
                    (Route::GenerateArtifact, true) => NodeKind::RewriteArtifact,
                    (Route::RespondToQuery, _) => NodeKind::RespondToQuery,
                }
            }
            Plan::Update => NodeKind::UpdateArtifact,
            Plan::QuickAction(_) => NodeKind::QuickAction,
            Plan::Custom(_) => NodeKind::CustomAction,
        };
        tracing::debug!(thread_id = %thread_id, node = node.as_str(), "running node");
        self.events.emit(TurnEvent::NodeStart { node });

        let output = {
            let input = NodeInput {
                client: self.client.as_ref(),
                config: &self.config,
                events: &self.events,
                state: &state,
                reflections: &reflections,
            };
            self.run_node(&input, node, &plan).await?
        };
        usage.accumulate(&output.usage);
        self.events.emit(TurnEvent::MessageEnd {
            node,
            message: output.message.clone(),
        });
        state.messages.push(output.message);

        let appended = match output.artifact {
            Some(content) => Some(self.append(&mut state, content)?),
            None => None,
        };

        if let Some(content) = &appended {
            if self.config.followup {
                self.events.emit(TurnEvent::NodeStart {
                    node: NodeKind::GenerateFollowup,
                });
                let input = NodeInput {
                    client: self.client.as_ref(),
                    config: &self.config,
                    events: &self.events,
                    state: &state,
                    reflections: &reflections,
                };
                match nodes::followup::run(&input, content).await {
                    Ok(followup) => {
                        usage.accumulate(&followup.usage);
                        self.events.emit(TurnEvent::MessageEnd {
                            node: NodeKind::GenerateFollowup,
                            message: followup.message.clone(),
                        });
                        state.messages.push(followup.message);
                    }
                    Err(e) => tracing::warn!(thread_id = %thread_id, "followup failed: {}", e),
                }
            }
            if let Some(doc) = &state.artifact {
                self.persister.commit(&thread_id, doc.clone());
            }
        }

        let reflection = self.config.reflect.then(|| {
            let current = state
                .artifact
                .as_ref()
                .and_then(|doc| doc.current_content().ok())
                .cloned();
            nodes::reflect::spawn(
                self.client.clone(),
                self.config.clone(),
                self.reflections.clone(),
                ReflectJob {
                    assistant_id: assistant_id.clone(),
                    messages: state.messages.clone(),
                    artifact: current,
                    current: reflections.clone(),
                },
            )
        });

        let artifact_index = state.artifact.as_ref().map(|doc| doc.current_index());
        self.events.emit(TurnEvent::TurnEnd {
            artifact_index,
            usage: usage.clone(),
        });

        Ok(TurnOutcome {
            replies: state.messages[prior_len..].to_vec(),
            messages: state.messages,
            artifact: state.artifact,
            route: state.route,
            node,
            usage,
            reflection,
        })
    }

    async fn run_node(
        &self,
        input: &NodeInput<'_>,
        node: NodeKind,
        plan: &Plan,
    ) -> Result<NodeOutput> {
        match (node, plan) {
            (NodeKind::CreateArtifact, _) => nodes::create::run(input).await,
            (NodeKind::RewriteArtifact, _) => nodes::rewrite::run(input).await,
            (NodeKind::RespondToQuery, _) => nodes::respond::run(input).await,
            (NodeKind::UpdateArtifact, _) => nodes::update::run(input).await,
            (NodeKind::QuickAction, Plan::QuickAction(action)) => {
                nodes::quick_action::run(input, action).await
            }
            (NodeKind::CustomAction, Plan::Custom(action)) => {
                nodes::quick_action::run_custom(input, action).await
            }
            (node, _) => Err(Error::Other(format!("no handler for node {}", node.as_str()))),
        }
    }

    /// The single append point for artifact versions
    fn append(
        &self,
        state: &mut ConversationState,
        content: ArtifactContent,
    ) -> Result<ArtifactContent> {
        let doc = match state.artifact.take() {
            Some(mut doc) => {
                doc.append_version(content);
                doc
            }
            None => ArtifactDocument::new(content),
        };
        let current = doc.current_content()?.clone();
        state.artifact = Some(doc);
        self.events.emit(TurnEvent::ArtifactUpdated {
            content: current.clone(),
        });
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactKind;
    use crate::quick_action::{CustomQuickActionDraft, ReadingLevel};
    use crate::store::{InMemoryMemoryStore, InMemoryThreadStore};
    use crate::testing::{Scripted, ScriptedModel};
    use futures::StreamExt;
    use serde_json::json;
    use std::time::Duration;

    struct Harness {
        orchestrator: Arc<Orchestrator>,
        client: Arc<ScriptedModel>,
        threads: Arc<InMemoryThreadStore>,
    }

    fn harness(replies: Vec<Scripted>, config: EngineConfig) -> Harness {
        let client = Arc::new(ScriptedModel::new(replies));
        let threads = Arc::new(InMemoryThreadStore::new());
        let orchestrator = Arc::new(Orchestrator::new(
            client.clone(),
            Arc::new(InMemoryMemoryStore::new()),
            threads.clone(),
            config,
        ));
        Harness {
            orchestrator,
            client,
            threads,
        }
    }

    fn quiet_config() -> EngineConfig {
        EngineConfig {
            followup: false,
            reflect: false,
            ..Default::default()
        }
    }

    fn three_versions() -> ArtifactDocument {
        let mut doc = ArtifactDocument::new(ArtifactContent::text("Rain", "v1"));
        doc.append_version(ArtifactContent::text("Rain", "v2"));
        doc.append_version(ArtifactContent::text("Rain", "v3"));
        doc
    }

    #[tokio::test]
    async fn test_haiku_scenario() {
        let h = harness(
            vec![
                ScriptedModel::tool("route_query", json!({"route": "generateArtifact"})),
                ScriptedModel::tool(
                    "generate_artifact",
                    json!({
                        "type": "text",
                        "title": "Rain Haiku",
                        "artifact": "Soft rain on the roof\nwhispers to the sleeping town\npuddles hold the sky"
                    }),
                ),
                ScriptedModel::text("Here is a haiku about rain. Want another season?"),
                ScriptedModel::tool(
                    "generate_reflections",
                    json!({"styleRules": [], "content": ["Enjoys haiku about rain"]}),
                ),
            ],
            EngineConfig::default(),
        );

        let outcome = h
            .orchestrator
            .run_turn(TurnRequest::new(
                "t1",
                "a1",
                vec![Message::user("write a haiku about rain")],
            ))
            .await
            .unwrap();

        assert_eq!(outcome.route, Some(Route::GenerateArtifact));
        assert_eq!(outcome.node, NodeKind::CreateArtifact);
        let doc = outcome.artifact.as_ref().unwrap();
        assert_eq!(doc.current_index(), 1);
        assert_eq!(doc.current_content().unwrap().kind(), ArtifactKind::Text);
        assert_eq!(outcome.new_version(), Some(1));

        assert_eq!(outcome.replies.len(), 2);
        assert!(outcome.replies[1].text().contains("haiku about rain"));
        assert_eq!(outcome.messages.len(), 3);

        outcome.reflection.unwrap().await.unwrap();
        let stored = h.orchestrator.reflections().get("a1").await.unwrap();
        assert!(!stored.content.is_empty());

        let calls = h.client.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[2].model_id, h.orchestrator.config().followup_model.id);
    }

    #[tokio::test]
    async fn test_multiple_directives_rejected_before_any_call() {
        let h = harness(vec![], EngineConfig::default());
        let mut events = h.orchestrator.subscribe();
        let mut request = TurnRequest::new("t1", "a1", vec![Message::user("do both")])
            .with_artifact(Some(ArtifactDocument::new(ArtifactContent::code(
                "x", "rust", "fn main() {}",
            ))));
        request.add_comments = true;
        request.fix_bugs = true;

        let err = h.orchestrator.run_turn(request).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::MultipleDirectives(_))
        ));
        assert_eq!(h.client.call_count(), 0);
        assert!(!h.orchestrator.persister().has_pending());
        assert_eq!(h.threads.write_count(), 0);
        assert!(matches!(events.recv().await.unwrap(), TurnEvent::Error { .. }));
    }

    #[tokio::test]
    async fn test_rewind_then_quick_action_appends_index_four() {
        let h = harness(
            vec![ScriptedModel::text("Rain, for kids")],
            quiet_config(),
        );
        let mut doc = three_versions();
        h.orchestrator.rewind("t1", &mut doc, 1).unwrap();
        assert_eq!(doc.current_index(), 1);

        let request = TurnRequest::new("t1", "a1", vec![Message::user("simplify")])
            .with_artifact(Some(doc))
            .with_directive(Directive::QuickAction(QuickActionRequest::ChangeReadingLevel(
                ReadingLevel::Child,
            )));
        let outcome = h.orchestrator.run_turn(request).await.unwrap();

        // directive bypasses the router
        assert_eq!(h.client.call_count(), 1);
        assert_eq!(outcome.route, None);
        assert!(h.client.calls()[0].prompt_text().contains("v1"));

        let doc = outcome.artifact.unwrap();
        assert_eq!(doc.current_index(), 4);
        assert_eq!(doc.contents().len(), 4);
        assert_eq!(doc.version(1).unwrap().body(), "v1");
        assert_eq!(doc.version(4).unwrap().body(), "Rain, for kids");
    }

    #[tokio::test]
    async fn test_respond_leaves_artifact_alone() {
        let h = harness(
            vec![
                ScriptedModel::tool("route_query", json!({"route": "respondToQuery"})),
                ScriptedModel::text("Pain, main and lane."),
            ],
            EngineConfig {
                reflect: false,
                ..Default::default()
            },
        );
        let request = TurnRequest::new("t1", "a1", vec![Message::user("what rhymes with rain?")])
            .with_artifact(Some(three_versions()));
        let outcome = h.orchestrator.run_turn(request).await.unwrap();

        assert_eq!(outcome.node, NodeKind::RespondToQuery);
        assert_eq!(outcome.new_version(), None);
        assert_eq!(outcome.artifact, Some(three_versions()));
        // no followup after a plain reply
        assert_eq!(outcome.replies.len(), 1);
        assert_eq!(h.client.call_count(), 2);
        assert!(!h.orchestrator.persister().has_pending());
    }

    #[tokio::test]
    async fn test_existing_artifact_routes_to_rewrite() {
        let h = harness(
            vec![
                ScriptedModel::tool("route_query", json!({"route": "generateArtifact"})),
                ScriptedModel::tool("update_artifact_meta", json!({"type": "text"})),
                ScriptedModel::text("v4 body"),
            ],
            quiet_config(),
        );
        let request = TurnRequest::new("t1", "a1", vec![Message::user("make it sadder")])
            .with_artifact(Some(three_versions()));
        let outcome = h.orchestrator.run_turn(request).await.unwrap();
        assert_eq!(outcome.node, NodeKind::RewriteArtifact);
        assert_eq!(outcome.new_version(), Some(4));
    }

    #[tokio::test]
    async fn test_primary_failure_fails_the_turn() {
        let h = harness(
            vec![
                ScriptedModel::tool("route_query", json!({"route": "generateArtifact"})),
                ScriptedModel::failure("overloaded"),
            ],
            EngineConfig::default(),
        );
        let err = h
            .orchestrator
            .run_turn(TurnRequest::new("t1", "a1", vec![Message::user("write")]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Ai(_)));
        assert!(!h.orchestrator.persister().has_pending());
    }

    #[tokio::test]
    async fn test_followup_failure_is_swallowed() {
        let h = harness(
            vec![
                ScriptedModel::text("Arr"),
                ScriptedModel::failure("overloaded"),
            ],
            EngineConfig {
                reflect: false,
                ..Default::default()
            },
        );
        let request = TurnRequest::new("t1", "a1", vec![])
            .with_artifact(Some(three_versions()))
            .with_directive(Directive::QuickAction(QuickActionRequest::ChangeReadingLevel(
                ReadingLevel::Pirate,
            )));
        let outcome = h.orchestrator.run_turn(request).await.unwrap();
        assert_eq!(outcome.replies.len(), 1);
        assert_eq!(outcome.new_version(), Some(4));
    }

    #[tokio::test]
    async fn test_wrong_kind_and_missing_artifact_are_validation_errors() {
        let h = harness(vec![], EngineConfig::default());

        let request = TurnRequest::new("t1", "a1", vec![])
            .with_artifact(Some(three_versions()))
            .with_directive(Directive::QuickAction(QuickActionRequest::AddLogs));
        assert!(h.orchestrator.run_turn(request).await.unwrap_err().is_validation());

        let request = TurnRequest::new("t1", "a1", vec![])
            .with_directive(Directive::QuickAction(QuickActionRequest::FixBugs));
        assert!(h.orchestrator.run_turn(request).await.unwrap_err().is_validation());

        let request = TurnRequest::new("", "a1", vec![Message::user("hi")]);
        assert!(matches!(
            h.orchestrator.run_turn(request).await.unwrap_err(),
            Error::Validation(ValidationError::MissingIdentity("thread_id"))
        ));

        assert_eq!(h.client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_custom_action_lookup() {
        let h = harness(vec![ScriptedModel::text("custom result")], quiet_config());
        let action = h
            .orchestrator
            .custom_actions()
            .create(
                "a1",
                CustomQuickActionDraft {
                    title: "Shout".into(),
                    prompt: "Make it uppercase".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let unknown = TurnRequest::new("t1", "a1", vec![])
            .with_artifact(Some(three_versions()))
            .with_directive(Directive::QuickAction(QuickActionRequest::Custom("nope".into())));
        assert!(matches!(
            h.orchestrator.run_turn(unknown).await.unwrap_err(),
            Error::Validation(ValidationError::UnknownCustomAction(_))
        ));

        // actions are scoped to their assistant
        let other_assistant = TurnRequest::new("t1", "a2", vec![])
            .with_artifact(Some(three_versions()))
            .with_directive(Directive::QuickAction(QuickActionRequest::Custom(action.id.clone())));
        assert!(h.orchestrator.run_turn(other_assistant).await.is_err());

        let request = TurnRequest::new("t1", "a1", vec![])
            .with_artifact(Some(three_versions()))
            .with_directive(Directive::QuickAction(QuickActionRequest::Custom(action.id)));
        let outcome = h.orchestrator.run_turn(request).await.unwrap();
        assert_eq!(outcome.node, NodeKind::CustomAction);
        assert_eq!(
            outcome.artifact.unwrap().current_content().unwrap().body(),
            "custom result"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_turn_result_is_persisted_after_debounce() {
        let h = harness(
            vec![ScriptedModel::text("edited")],
            quiet_config(),
        );
        let request = TurnRequest::new("t1", "a1", vec![])
            .with_artifact(Some(three_versions()))
            .with_directive(Directive::QuickAction(QuickActionRequest::AddEmojis));
        let outcome = h.orchestrator.run_turn(request).await.unwrap();
        assert_eq!(h.threads.write_count(), 0);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(h.threads.write_count(), 1);
        let stored = h.threads.get_state("t1").await.unwrap();
        assert_eq!(stored.artifact, outcome.artifact);
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_survives_a_reply_turn_within_the_debounce() {
        let h = harness(
            vec![
                ScriptedModel::text("Arr, v4"),
                ScriptedModel::tool("route_query", json!({"route": "respondToQuery"})),
                ScriptedModel::text("It rhymes with pain."),
            ],
            quiet_config(),
        );
        let edit = TurnRequest::new("t1", "a1", vec![])
            .with_artifact(Some(three_versions()))
            .with_directive(Directive::QuickAction(QuickActionRequest::ChangeReadingLevel(
                ReadingLevel::Pirate,
            )));
        let edited = h.orchestrator.run_turn(edit).await.unwrap().artifact;
        assert_eq!(edited.as_ref().map(|d| d.current_index()), Some(4));

        tokio::time::sleep(Duration::from_secs(1)).await;
        let reply = TurnRequest::new("t1", "a1", vec![Message::user("what rhymes?")])
            .with_artifact(edited.clone());
        let outcome = h.orchestrator.run_turn(reply).await.unwrap();
        assert_eq!(outcome.node, NodeKind::RespondToQuery);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(h.threads.write_count(), 1);
        assert!(!h.orchestrator.persister().has_pending());

        h.orchestrator.open_thread("t2").await.unwrap();
        assert_eq!(h.threads.get_state("t1").await.unwrap().artifact, edited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_survives_a_failed_turn_within_the_debounce() {
        let h = harness(
            vec![
                ScriptedModel::text("with emojis"),
                ScriptedModel::failure("overloaded"),
            ],
            quiet_config(),
        );
        let edit = TurnRequest::new("t1", "a1", vec![])
            .with_artifact(Some(three_versions()))
            .with_directive(Directive::QuickAction(QuickActionRequest::AddEmojis));
        let edited = h.orchestrator.run_turn(edit).await.unwrap().artifact;

        tokio::time::sleep(Duration::from_secs(2)).await;
        let retry = TurnRequest::new("t1", "a1", vec![])
            .with_artifact(edited.clone())
            .with_directive(Directive::QuickAction(QuickActionRequest::AddEmojis));
        assert!(h.orchestrator.run_turn(retry).await.is_err());

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(h.threads.write_count(), 1);
        assert_eq!(h.threads.get_state("t1").await.unwrap().artifact, edited);
    }

    #[tokio::test]
    async fn test_stream_turn_ends_with_turn_end() {
        let h = harness(
            vec![
                ScriptedModel::tool("route_query", json!({"route": "respondToQuery"})),
                ScriptedModel::text("Hello!"),
            ],
            EngineConfig {
                reflect: false,
                ..Default::default()
            },
        );
        let events: Vec<TurnEvent> = h
            .orchestrator
            .stream_turn(TurnRequest::new("t1", "a1", vec![Message::user("hi")]))
            .collect()
            .await;

        assert!(matches!(events.first(), Some(TurnEvent::TurnStart { .. })));
        assert!(events.iter().any(|e| matches!(
            e,
            TurnEvent::MessageDelta {
                node: NodeKind::RespondToQuery,
                ..
            }
        )));
        assert!(matches!(
            events.last(),
            Some(TurnEvent::TurnEnd {
                artifact_index: None,
                ..
            })
        ));
    }
}
