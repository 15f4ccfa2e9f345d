//! update-artifact: rewrite only the highlighted part of the current version

use std::ops::Range;

use quire_ai::Message;

use super::{NodeInput, NodeOutput, conversation_context, strip_code_fence};
use crate::conversation::{Directive, Highlight};
use crate::error::{Error, Result, ValidationError};
use crate::events::NodeKind;
use crate::prompts;

fn byte_offset(body: &str, char_index: usize) -> Option<usize> {
    body.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(body.len()))
        .nth(char_index)
}

/// Byte range of `highlight` within `body`
pub fn resolve_highlight(
    body: &str,
    highlight: &Highlight,
) -> std::result::Result<Range<usize>, ValidationError> {
    match highlight {
        Highlight::Span(span) => {
            if span.start >= span.end {
                return Err(ValidationError::InvalidHighlight(format!(
                    "empty or inverted range {}..{}",
                    span.start, span.end
                )));
            }
            match (byte_offset(body, span.start), byte_offset(body, span.end)) {
                (Some(start), Some(end)) => Ok(start..end),
                _ => Err(ValidationError::InvalidHighlight(format!(
                    "range {}..{} is outside the artifact ({} characters)",
                    span.start,
                    span.end,
                    body.chars().count()
                ))),
            }
        }
        Highlight::Excerpt(selection) => {
            if selection.selected_text.is_empty() {
                return Err(ValidationError::InvalidHighlight("empty selection".into()));
            }
            body.find(&selection.selected_text)
                .map(|start| start..start + selection.selected_text.len())
                .ok_or_else(|| {
                    ValidationError::InvalidHighlight(
                        "selected text does not appear in the artifact".into(),
                    )
                })
        }
    }
}

/// Replace `range` of `body`, leaving everything else byte-identical
pub fn splice(body: &str, range: Range<usize>, replacement: &str) -> String {
    let mut out = String::with_capacity(body.len() - range.len() + replacement.len());
    out.push_str(&body[..range.start]);
    out.push_str(replacement);
    out.push_str(&body[range.end..]);
    out
}

pub async fn run(input: &NodeInput<'_>) -> Result<NodeOutput> {
    let Some(Directive::Highlight(highlight)) = &input.state.directive else {
        return Err(Error::Other("update-artifact needs a highlight".into()));
    };
    let field = match highlight {
        Highlight::Span(_) => "highlighted_code",
        Highlight::Excerpt(_) => "highlighted_text",
    };
    let current = input.current_artifact(field)?;
    let body = current.body();
    let range = resolve_highlight(body, highlight)?;

    let request: Vec<Message> = input.state.last_user_message().cloned().into_iter().collect();
    if request.is_empty() {
        return Err(ValidationError::EmptyConversation.into());
    }
    let context = conversation_context(
        prompts::update_prompt(
            &input.reflections.format(),
            &body[..range.start],
            &body[range.clone()],
            &body[range.end..],
        ),
        &request,
    );
    let completion = input
        .generate_text(NodeKind::UpdateArtifact, &context)
        .await?;

    let replacement = strip_code_fence(&completion.text());
    let updated = splice(body, range, &replacement);
    tracing::debug!(field, replaced = replacement.len(), "updated highlighted section");

    Ok(NodeOutput {
        message: Message::assistant(replacement),
        artifact: Some(current.with_body(updated)),
        usage: completion.usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ArtifactContent, ArtifactDocument};
    use crate::config::EngineConfig;
    use crate::conversation::{CharSpan, ConversationState, TextSelection};
    use crate::events::EventSink;
    use crate::reflection::Reflections;
    use crate::testing::ScriptedModel;

    async fn run_highlight(body: &str, highlight: Highlight, reply: &str) -> Result<NodeOutput> {
        let client = ScriptedModel::new(vec![ScriptedModel::text(reply)]);
        let config = EngineConfig::default();
        let events = EventSink::default();
        let state = ConversationState {
            messages: vec![Message::user("change it")],
            artifact: Some(ArtifactDocument::new(ArtifactContent::code("Letters", "other", body))),
            directive: Some(Directive::Highlight(highlight)),
            route: None,
        };
        run(&NodeInput {
            client: &client,
            config: &config,
            events: &events,
            state: &state,
            reflections: &Reflections::default(),
        })
        .await
    }

    #[tokio::test]
    async fn test_span_edit_is_local() {
        let output = run_highlight(
            "ABCDEF",
            Highlight::Span(CharSpan { start: 2, end: 4 }),
            "XY",
        )
        .await
        .unwrap();
        let content = output.artifact.unwrap();
        assert_eq!(content.body(), "ABXYEF");
        assert_eq!(content.title(), "Letters");
        assert_eq!(content.language(), Some("other"));
    }

    #[tokio::test]
    async fn test_excerpt_edit_is_local() {
        let output = run_highlight(
            "ABCDEF",
            Highlight::Excerpt(TextSelection {
                selected_text: "CD".into(),
            }),
            "XY",
        )
        .await
        .unwrap();
        assert_eq!(output.artifact.unwrap().body(), "ABXYEF");
    }

    #[test]
    fn test_span_uses_character_offsets() {
        let body = "héllo wörld";
        let range =
            resolve_highlight(body, &Highlight::Span(CharSpan { start: 6, end: 11 })).unwrap();
        assert_eq!(&body[range.clone()], "wörld");
        assert_eq!(splice(body, range, "there"), "héllo there");
    }

    #[test]
    fn test_out_of_range_span_is_rejected() {
        let err = resolve_highlight("abc", &Highlight::Span(CharSpan { start: 1, end: 9 }));
        assert!(matches!(err, Err(ValidationError::InvalidHighlight(_))));
        let err = resolve_highlight("abc", &Highlight::Span(CharSpan { start: 2, end: 2 }));
        assert!(matches!(err, Err(ValidationError::InvalidHighlight(_))));
    }

    #[test]
    fn test_missing_excerpt_is_rejected() {
        let err = resolve_highlight(
            "abc",
            &Highlight::Excerpt(TextSelection {
                selected_text: "zz".into(),
            }),
        );
        assert!(matches!(err, Err(ValidationError::InvalidHighlight(_))));
    }
}
