//! respond-to-query: conversational reply, artifact untouched

use super::{NodeInput, NodeOutput, conversation_context};
use crate::error::Result;
use crate::events::NodeKind;
use crate::prompts;

pub async fn run(input: &NodeInput<'_>) -> Result<NodeOutput> {
    let current = input
        .state
        .artifact
        .as_ref()
        .map(|doc| doc.current_content())
        .transpose()?;
    let context = conversation_context(
        prompts::respond_prompt(&input.reflections.format(), current),
        &input.state.messages,
    );
    let completion = input
        .generate_text(NodeKind::RespondToQuery, &context)
        .await?;

    Ok(NodeOutput {
        message: completion.message,
        artifact: None,
        usage: completion.usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ArtifactContent, ArtifactDocument};
    use crate::config::EngineConfig;
    use crate::conversation::ConversationState;
    use crate::events::{EventSink, TurnEvent};
    use crate::reflection::Reflections;
    use crate::testing::ScriptedModel;
    use quire_ai::Message;

    #[tokio::test]
    async fn test_replies_and_streams_without_touching_artifact() {
        let client =
            ScriptedModel::new(vec![ScriptedModel::text("Pain and main rhyme with rain.")]);
        let config = EngineConfig::default();
        let events = EventSink::default();
        let mut rx = events.subscribe();
        let state = ConversationState {
            messages: vec![Message::user("what rhymes with rain?")],
            artifact: Some(ArtifactDocument::new(ArtifactContent::text("Rain", "haiku body"))),
            directive: None,
            route: None,
        };

        let output = run(&NodeInput {
            client: &client,
            config: &config,
            events: &events,
            state: &state,
            reflections: &Reflections::default(),
        })
        .await
        .unwrap();

        assert!(output.artifact.is_none());
        assert_eq!(output.message.text(), "Pain and main rhyme with rain.");
        assert!(client.calls()[0].prompt_text().contains("haiku body"));
        assert!(matches!(
            rx.recv().await.unwrap(),
            TurnEvent::MessageDelta { node: NodeKind::RespondToQuery, .. }
        ));
    }
}
