//! create-artifact: first artifact of a thread

use quire_ai::{Message, StreamOptions, Tool};
use serde::Deserialize;
use serde_json::json;

use super::{NodeInput, NodeOutput, conversation_context, strip_code_fence};
use crate::artifact::{ArtifactContent, ArtifactKind, ProgrammingLanguage};
use crate::error::Result;
use crate::events::NodeKind;
use crate::model::complete_as_streaming;
use crate::prompts;

#[derive(Debug, Deserialize)]
struct GeneratedArtifact {
    #[serde(rename = "type")]
    kind: ArtifactKind,
    title: String,
    language: Option<String>,
    artifact: String,
}

fn generate_artifact_tool() -> Tool {
    let languages: Vec<&str> = ProgrammingLanguage::ALL.iter().map(|l| l.as_str()).collect();
    Tool::new(
        "generate_artifact",
        "Generate the artifact the user asked for.",
        json!({
            "type": "object",
            "properties": {
                "type": {
                    "type": "string",
                    "enum": ["text", "code"],
                    "description": "Whether the artifact is a markdown document or code"
                },
                "title": {
                    "type": "string",
                    "description": "Short descriptive title"
                },
                "language": {
                    "type": "string",
                    "enum": languages,
                    "description": "Programming language, for code artifacts only"
                },
                "artifact": {
                    "type": "string",
                    "description": "The complete artifact body"
                }
            },
            "required": ["type", "title", "artifact"]
        }),
    )
}

pub async fn run(input: &NodeInput<'_>) -> Result<NodeOutput> {
    let context = conversation_context(
        prompts::create_prompt(&input.reflections.format()),
        &input.state.messages,
    );
    let options = StreamOptions {
        max_tokens: Some(input.config.max_tokens),
        temperature: Some(input.config.temperature),
        ..Default::default()
    };
    // subscribers see the tool arguments as partial JSON
    let (generated, usage): (GeneratedArtifact, _) = complete_as_streaming(
        input.client,
        &input.config.model,
        context,
        options,
        &generate_artifact_tool(),
        |delta| input.events.delta(NodeKind::CreateArtifact, delta),
    )
    .await?;

    let body = strip_code_fence(&generated.artifact);
    let content = match generated.kind {
        ArtifactKind::Text => ArtifactContent::text(generated.title, body.clone()),
        ArtifactKind::Code => ArtifactContent::code(
            generated.title,
            generated
                .language
                .unwrap_or_else(|| ProgrammingLanguage::Other.to_string()),
            body.clone(),
        ),
    };
    tracing::debug!(kind = %content.kind(), title = content.title(), "created artifact");

    Ok(NodeOutput {
        message: Message::assistant(body),
        artifact: Some(content),
        usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::conversation::ConversationState;
    use crate::error::Error;
    use crate::events::{EventSink, TurnEvent};
    use crate::reflection::Reflections;
    use crate::testing::ScriptedModel;

    async fn run_with(client: &ScriptedModel, reflections: &Reflections) -> Result<NodeOutput> {
        run_with_events(client, reflections, &EventSink::default()).await
    }

    async fn run_with_events(
        client: &ScriptedModel,
        reflections: &Reflections,
        events: &EventSink,
    ) -> Result<NodeOutput> {
        let config = EngineConfig::default();
        let state = ConversationState {
            messages: vec![Message::user("write a quicksort in python")],
            artifact: None,
            directive: None,
            route: None,
        };
        run(&NodeInput {
            client,
            config: &config,
            events,
            state: &state,
            reflections,
        })
        .await
    }

    #[tokio::test]
    async fn test_creates_code_artifact() {
        let client = ScriptedModel::new(vec![ScriptedModel::tool(
            "generate_artifact",
            json!({
                "type": "code",
                "title": "Quicksort",
                "language": "python",
                "artifact": "```python\ndef qs(xs): ...\n```"
            }),
        )]);
        let reflections = Reflections {
            style_rules: vec!["Use type hints".into()],
            content: vec![],
        };
        let output = run_with(&client, &reflections).await.unwrap();

        let content = output.artifact.unwrap();
        assert_eq!(content.kind(), ArtifactKind::Code);
        assert_eq!(content.language(), Some("python"));
        assert_eq!(content.body(), "def qs(xs): ...");
        assert!(client.calls()[0].prompt_text().contains("- Use type hints"));
    }

    #[tokio::test]
    async fn test_streams_arguments_while_generating() {
        let client = ScriptedModel::new(vec![ScriptedModel::tool(
            "generate_artifact",
            json!({ "type": "text", "title": "Rain", "artifact": "soft rain" }),
        )]);
        let events = EventSink::default();
        let mut rx = events.subscribe();
        run_with_events(&client, &Reflections::default(), &events)
            .await
            .unwrap();

        let mut streamed = String::new();
        while let Ok(event) = rx.try_recv() {
            if let TurnEvent::MessageDelta { node, delta } = event {
                assert_eq!(node, NodeKind::CreateArtifact);
                streamed.push_str(&delta);
            }
        }
        assert!(streamed.contains("soft rain"));
    }

    #[tokio::test]
    async fn test_unknown_type_fails_closed() {
        let client = ScriptedModel::new(vec![ScriptedModel::tool(
            "generate_artifact",
            json!({ "type": "image", "title": "x", "artifact": "y" }),
        )]);
        let err = run_with(&client, &Reflections::default()).await.unwrap_err();
        assert!(matches!(err, Error::StructuredOutput(_)));
    }
}
