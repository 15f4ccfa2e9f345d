//! rewrite-artifact: regenerate the whole current version
//!
//! A cheap classification over the start of the artifact decides the target
//! variant, title and language first; the full rewrite then streams.

use quire_ai::{Message, StreamOptions, Tool, Usage};
use serde::Deserialize;
use serde_json::json;

use super::{NodeInput, NodeOutput, conversation_context, prompt_context, strip_code_fence};
use crate::artifact::{ArtifactContent, ArtifactKind, ProgrammingLanguage};
use crate::conversation::transcript;
use crate::error::Result;
use crate::events::NodeKind;
use crate::model::complete_as;
use crate::prompts;
use crate::router::ROUTER_HISTORY;

/// Characters of the current body the classification step sees
pub const META_PREVIEW_CHARS: usize = 500;

#[derive(Debug, Deserialize)]
struct ArtifactMeta {
    #[serde(rename = "type")]
    kind: ArtifactKind,
    title: Option<String>,
    language: Option<String>,
}

fn update_artifact_meta_tool() -> Tool {
    let languages: Vec<&str> = ProgrammingLanguage::ALL.iter().map(|l| l.as_str()).collect();
    Tool::new(
        "update_artifact_meta",
        "Decide the type, title and language of the rewritten artifact.",
        json!({
            "type": "object",
            "properties": {
                "type": { "type": "string", "enum": ["text", "code"] },
                "title": {
                    "type": "string",
                    "description": "New title, only if the topic changes"
                },
                "language": {
                    "type": "string",
                    "enum": languages,
                    "description": "Programming language, for code only"
                }
            },
            "required": ["type"]
        }),
    )
}

fn preview(body: &str) -> String {
    body.chars().take(META_PREVIEW_CHARS).collect()
}

pub async fn run(input: &NodeInput<'_>) -> Result<NodeOutput> {
    let current = input.current_artifact("rewrite")?;
    let mut usage = Usage::default();

    let meta_context = prompt_context(prompts::rewrite_meta_prompt(
        &preview(current.body()),
        current,
        &transcript(input.state.tail(ROUTER_HISTORY)),
    ));
    let meta_options = StreamOptions {
        temperature: Some(input.config.classifier_temperature),
        ..Default::default()
    };
    let (meta, meta_usage): (ArtifactMeta, _) = complete_as(
        input.client,
        &input.config.model,
        meta_context,
        meta_options,
        &update_artifact_meta_tool(),
    )
    .await?;
    usage.accumulate(&meta_usage);

    let title = meta
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| current.title().to_string());
    let language = meta
        .language
        .or_else(|| current.language().map(str::to_string))
        .unwrap_or_else(|| ProgrammingLanguage::Other.to_string());
    let target_note = match meta.kind {
        ArtifactKind::Text => "The result must be a markdown document.".to_string(),
        ArtifactKind::Code => format!("The result must be {} code.", language),
    };

    let context = conversation_context(
        prompts::rewrite_prompt(&input.reflections.format(), current, &target_note),
        &input.state.messages,
    );
    let completion = input
        .generate_text(NodeKind::RewriteArtifact, &context)
        .await?;
    usage.accumulate(&completion.usage);

    let body = strip_code_fence(&completion.text());
    let content = match meta.kind {
        ArtifactKind::Text => ArtifactContent::text(title, body.clone()),
        ArtifactKind::Code => ArtifactContent::code(title, language, body.clone()),
    };
    tracing::debug!(
        from = %current.kind(),
        to = %content.kind(),
        "rewrote artifact"
    );

    Ok(NodeOutput {
        message: Message::assistant(body),
        artifact: Some(content),
        usage,
    })
}
