//! generate-followup: short note after an artifact edit

use quire_ai::StreamOptions;

use super::{NodeInput, NodeOutput, prompt_context};
use crate::artifact::ArtifactContent;
use crate::conversation::transcript;
use crate::error::Result;
use crate::events::NodeKind;
use crate::model::complete;
use crate::prompts;
use crate::router::ROUTER_HISTORY;

/// Summarize the edit that produced `updated`, using the followup model
pub async fn run(input: &NodeInput<'_>, updated: &ArtifactContent) -> Result<NodeOutput> {
    let context = prompt_context(prompts::followup_prompt(
        &input.reflections.format(),
        updated,
        &transcript(input.state.tail(ROUTER_HISTORY)),
    ));
    let options = StreamOptions {
        max_tokens: Some(input.config.followup_max_tokens),
        temperature: Some(input.config.temperature),
        ..Default::default()
    };
    let events = input.events;
    let completion = complete(
        input.client,
        &input.config.followup_model,
        &context,
        &options,
        |delta| events.delta(NodeKind::GenerateFollowup, delta),
    )
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
    use crate::config::EngineConfig;
    use crate::conversation::ConversationState;
    use crate::events::EventSink;
    use crate::reflection::Reflections;
    use crate::testing::ScriptedModel;
    use quire_ai::Message;

    #[tokio::test]
    async fn test_uses_followup_model_and_small_budget() {
        let client = ScriptedModel::new(vec![ScriptedModel::text(
            "I wrote a haiku about rain. Want a different mood?",
        )]);
        let config = EngineConfig::default();
        let events = EventSink::default();
        let state = ConversationState {
            messages: vec![Message::user("write a haiku about rain")],
            artifact: None,
            directive: None,
            route: None,
        };
        let updated = ArtifactContent::text("Rain", "soft rain on the roof");

        let output = run(
            &NodeInput {
                client: &client,
                config: &config,
                events: &events,
                state: &state,
                reflections: &Reflections::default(),
            },
            &updated,
        )
        .await
        .unwrap();

        assert!(output.message.text().starts_with("I wrote a haiku"));
        let call = &client.calls()[0];
        assert_eq!(call.model_id, config.followup_model.id);
        assert_eq!(call.options.max_tokens, Some(config.followup_max_tokens));
        assert!(call.prompt_text().contains("soft rain on the roof"));
    }
}
