//! Query router: generate an artifact or just reply

use quire_ai::{Context, Message, StreamOptions, Tool, Usage};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::EngineConfig;
use crate::conversation::{ConversationState, transcript};
use crate::error::Result;
use crate::model::{ModelClient, complete_as};
use crate::prompts;

/// Messages from the end of the conversation the router looks at
pub const ROUTER_HISTORY: usize = 8;

/// The router's decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Route {
    GenerateArtifact,
    RespondToQuery,
}

#[derive(Deserialize)]
struct RouteArgs {
    route: Route,
}

fn route_tool() -> Tool {
    Tool::new(
        "route_query",
        "Choose how to handle the user's latest message.",
        json!({
            "type": "object",
            "properties": {
                "route": {
                    "type": "string",
                    "enum": ["generateArtifact", "respondToQuery"],
                    "description": "The action to take"
                }
            },
            "required": ["route"]
        }),
    )
}

/// Classify the latest user turn
pub async fn route(
    client: &dyn ModelClient,
    config: &EngineConfig,
    state: &ConversationState,
) -> Result<(Route, Usage)> {
    let current = state
        .artifact
        .as_ref()
        .map(|doc| doc.current_content())
        .transpose()?;

    let prompt = prompts::router_prompt(&transcript(state.tail(ROUTER_HISTORY)), current);
    let mut context = Context::default();
    context.push(Message::user(prompt));

    let options = StreamOptions {
        temperature: Some(config.classifier_temperature),
        ..Default::default()
    };
    let (args, usage): (RouteArgs, Usage) =
        complete_as(client, &config.model, context, options, &route_tool()).await?;

    tracing::debug!(route = ?args.route, has_artifact = current.is_some(), "routed query");
    Ok((args.route, usage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ArtifactContent, ArtifactDocument};
    use crate::error::Error;
    use crate::testing::ScriptedModel;

    fn state(messages: Vec<Message>, artifact: Option<ArtifactDocument>) -> ConversationState {
        ConversationState {
            messages,
            artifact,
            directive: None,
            route: None,
        }
    }

    #[tokio::test]
    async fn test_routes_without_artifact_snapshot() {
        let client = ScriptedModel::new(vec![ScriptedModel::tool(
            "route_query",
            json!({"route": "generateArtifact"}),
        )]);
        let (route, _) = route(
            &client,
            &EngineConfig::default(),
            &state(vec![Message::user("write a haiku about rain")], None),
        )
        .await
        .unwrap();

        assert_eq!(route, Route::GenerateArtifact);
        let prompt = client.calls()[0].prompt_text();
        assert!(prompt.contains("write a haiku about rain"));
        assert!(!prompt.contains("<artifact"));
    }

    #[tokio::test]
    async fn test_embeds_current_version_when_artifact_exists() {
        let mut doc = ArtifactDocument::new(ArtifactContent::text("Rain", "old words"));
        doc.append_version(ArtifactContent::text("Rain", "new words"));
        let client = ScriptedModel::new(vec![ScriptedModel::tool(
            "route_query",
            json!({"route": "respondToQuery"}),
        )]);
        let (route, _) = route(
            &client,
            &EngineConfig::default(),
            &state(vec![Message::user("what rhymes with rain?")], Some(doc)),
        )
        .await
        .unwrap();

        assert_eq!(route, Route::RespondToQuery);
        let prompt = client.calls()[0].prompt_text();
        assert!(prompt.contains("new words"));
        assert!(!prompt.contains("old words"));
    }

    #[tokio::test]
    async fn test_only_looks_at_recent_messages() {
        let mut messages = vec![Message::user("ancient request")];
        for i in 0..ROUTER_HISTORY {
            messages.push(Message::assistant(format!("reply {}", i)));
        }
        let client = ScriptedModel::new(vec![ScriptedModel::tool(
            "route_query",
            json!({"route": "respondToQuery"}),
        )]);
        route(&client, &EngineConfig::default(), &state(messages, None))
            .await
            .unwrap();
        assert!(!client.calls()[0].prompt_text().contains("ancient request"));
    }

    #[tokio::test]
    async fn test_rejects_routes_outside_the_enum() {
        let client = ScriptedModel::new(vec![ScriptedModel::tool(
            "route_query",
            json!({"route": "rewriteArtifact"}),
        )]);
        let err = route(
            &client,
            &EngineConfig::default(),
            &state(vec![Message::user("hi")], None),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::StructuredOutput(_)));
    }
}
