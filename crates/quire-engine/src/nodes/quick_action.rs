//! apply-quick-action: one full-content rewrite per catalog entry

use quire_ai::Message;

use super::{NodeInput, NodeOutput, prompt_context, strip_code_fence};
use crate::artifact::ArtifactContent;
use crate::conversation::transcript;
use crate::error::{Error, Result, ValidationError};
use crate::events::NodeKind;
use crate::prompts;
use crate::quick_action::{CustomQuickAction, QuickActionRequest};

/// Messages a custom action embeds when it asks for recent history
pub const CUSTOM_HISTORY: usize = 5;

/// Reject an action that has no artifact to work on or targets the other variant
pub fn check_applicable(
    action: &QuickActionRequest,
    current: Option<&ArtifactContent>,
) -> std::result::Result<(), ValidationError> {
    let Some(current) = current else {
        return Err(ValidationError::NoArtifact(action.field_name()));
    };
    match action.required_kind() {
        Some(kind) if kind != current.kind() => Err(ValidationError::WrongArtifactKind {
            directive: action.field_name(),
            expected: kind.as_str(),
        }),
        _ => Ok(()),
    }
}

/// Apply a built-in catalog action
pub async fn run(input: &NodeInput<'_>, action: &QuickActionRequest) -> Result<NodeOutput> {
    let current = input.current_artifact(action.field_name())?;
    check_applicable(action, Some(current))?;
    let Some(instruction) = action.instruction() else {
        return Err(Error::Other(format!(
            "'{}' is not a built-in quick action",
            action.field_name()
        )));
    };

    let context = prompt_context(prompts::quick_action_prompt(
        &input.reflections.format(),
        &instruction,
        current,
    ));
    let completion = input.generate_text(NodeKind::QuickAction, &context).await?;
    let body = strip_code_fence(&completion.text());

    let content = match action {
        QuickActionRequest::PortLanguage(target) => {
            ArtifactContent::code(current.title(), target.as_str(), body.clone())
        }
        _ => current.with_body(body.clone()),
    };
    tracing::debug!(action = action.field_name(), "applied quick action");

    Ok(NodeOutput {
        message: Message::assistant(body),
        artifact: Some(content),
        usage: completion.usage,
    })
}

/// Apply a user-defined action
pub async fn run_custom(input: &NodeInput<'_>, action: &CustomQuickAction) -> Result<NodeOutput> {
    let current = input.current_artifact("custom_quick_action_id")?;

    let reflections = action
        .include_reflections
        .then(|| input.reflections.format());
    let history = action
        .include_recent_history
        .then(|| transcript(input.state.tail(CUSTOM_HISTORY)));
    let context = prompt_context(prompts::custom_action_prompt(
        action.include_prefix,
        &action.prompt,
        reflections.as_deref(),
        history.as_deref(),
        current,
    ));
    let completion = input.generate_text(NodeKind::CustomAction, &context).await?;
    let body = strip_code_fence(&completion.text());
    tracing::debug!(id = %action.id, title = %action.title, "applied custom quick action");

    Ok(NodeOutput {
        message: Message::assistant(body.clone()),
        artifact: Some(current.with_body(body)),
        usage: completion.usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ArtifactDocument, ProgrammingLanguage};
    use crate::config::EngineConfig;
    use crate::conversation::ConversationState;
    use crate::events::EventSink;
    use crate::quick_action::{ReadingLevel, TargetLanguage};
    use crate::reflection::Reflections;
    use crate::testing::ScriptedModel;

    fn state(content: ArtifactContent) -> ConversationState {
        ConversationState {
            messages: vec![
                Message::user("first"),
                Message::assistant("second"),
                Message::user("third"),
            ],
            artifact: Some(ArtifactDocument::new(content)),
            directive: None,
            route: None,
        }
    }

    fn reflections() -> Reflections {
        Reflections {
            style_rules: vec!["No exclamation marks".into()],
            content: vec![],
        }
    }

    #[test]
    fn test_applicability() {
        let code = ArtifactContent::code("x", "rust", "fn main() {}");
        let text = ArtifactContent::text("x", "hello");

        assert!(check_applicable(&QuickActionRequest::AddLogs, Some(&code)).is_ok());
        assert_eq!(
            check_applicable(&QuickActionRequest::AddLogs, Some(&text)),
            Err(ValidationError::WrongArtifactKind {
                directive: "add_logs",
                expected: "code"
            })
        );
        assert_eq!(
            check_applicable(
                &QuickActionRequest::ChangeLanguage(TargetLanguage::Hindi),
                Some(&code)
            ),
            Err(ValidationError::WrongArtifactKind {
                directive: "language",
                expected: "text"
            })
        );
        assert_eq!(
            check_applicable(&QuickActionRequest::FixBugs, None),
            Err(ValidationError::NoArtifact("fix_bugs"))
        );
        assert!(check_applicable(&QuickActionRequest::Custom("c".into()), Some(&text)).is_ok());
    }

    #[tokio::test]
    async fn test_reading_level_rewrites_text() {
        let client = ScriptedModel::new(vec![ScriptedModel::text("Arr, the rain be fallin'.")]);
        let config = EngineConfig::default();
        let events = EventSink::default();
        let state = state(ArtifactContent::text("Rain", "The rain is falling."));
        let output = run(
            &NodeInput {
                client: &client,
                config: &config,
                events: &events,
                state: &state,
                reflections: &reflections(),
            },
            &QuickActionRequest::ChangeReadingLevel(ReadingLevel::Pirate),
        )
        .await
        .unwrap();

        let content = output.artifact.unwrap();
        assert_eq!(content.body(), "Arr, the rain be fallin'.");
        assert_eq!(content.title(), "Rain");
        let prompt = client.calls()[0].prompt_text();
        assert!(prompt.contains("pirate"));
        assert!(prompt.contains("- No exclamation marks"));
    }

    #[tokio::test]
    async fn test_port_language_relabels_code() {
        let client = ScriptedModel::new(vec![ScriptedModel::text("```rust\nfn main() {}\n```")]);
        let config = EngineConfig::default();
        let events = EventSink::default();
        let state = state(ArtifactContent::code("Main", "python", "def main(): pass"));
        let output = run(
            &NodeInput {
                client: &client,
                config: &config,
                events: &events,
                state: &state,
                reflections: &Reflections::default(),
            },
            &QuickActionRequest::PortLanguage(ProgrammingLanguage::Rust),
        )
        .await
        .unwrap();

        let content = output.artifact.unwrap();
        assert_eq!(content.language(), Some("rust"));
        assert_eq!(content.body(), "fn main() {}");
    }

    #[tokio::test]
    async fn test_custom_action_includes_requested_sections() {
        let client = ScriptedModel::new(vec![ScriptedModel::text("- rain\n- falls")]);
        let config = EngineConfig::default();
        let events = EventSink::default();
        let state = state(ArtifactContent::text("Rain", "The rain falls."));
        let action = CustomQuickAction {
            id: "c1".into(),
            title: "Bullets".into(),
            prompt: "Rewrite as bullet points".into(),
            include_reflections: true,
            include_prefix: false,
            include_recent_history: true,
        };
        let output = run_custom(
            &NodeInput {
                client: &client,
                config: &config,
                events: &events,
                state: &state,
                reflections: &reflections(),
            },
            &action,
        )
        .await
        .unwrap();

        assert_eq!(output.artifact.unwrap().body(), "- rain\n- falls");
        let prompt = client.calls()[0].prompt_text();
        assert!(prompt.contains("Rewrite as bullet points"));
        assert!(prompt.contains("- No exclamation marks"));
        assert!(prompt.contains("user: third"));
        assert!(!prompt.contains(prompts::EDIT_PREAMBLE));
    }
}
