//! reflect: re-derive the assistant's memory after a turn
//!
//! Runs detached from the reply path. Every failure is logged and contained;
//! a bad reflect cycle leaves the stored reflections as they were.

use std::sync::Arc;

use quire_ai::{Message, StreamOptions, Tool, Usage};
use serde_json::json;
use tokio::task::JoinHandle;

use super::prompt_context;
use crate::artifact::ArtifactContent;
use crate::config::EngineConfig;
use crate::conversation::transcript;
use crate::error::Result;
use crate::model::{ModelClient, complete_as};
use crate::prompts;
use crate::reflection::{ReflectionStore, Reflections};

/// Inputs captured at the end of a turn
#[derive(Debug, Clone)]
pub struct ReflectJob {
    pub assistant_id: String,
    pub messages: Vec<Message>,
    pub artifact: Option<ArtifactContent>,
    pub current: Reflections,
}

fn generate_reflections_tool() -> Tool {
    Tool::new(
        "generate_reflections",
        "Store the complete, updated memory about the user.",
        json!({
            "type": "object",
            "properties": {
                "styleRules": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Rules about how the user wants artifacts written"
                },
                "content": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Facts about the user and their work"
                }
            },
            "required": ["styleRules", "content"]
        }),
    )
}

/// Ask the model for the complete replacement reflections
pub async fn reflect(
    client: &dyn ModelClient,
    config: &EngineConfig,
    job: &ReflectJob,
) -> Result<(Reflections, Usage)> {
    let context = prompt_context(prompts::reflect_prompt(
        &job.current.format(),
        job.artifact.as_ref(),
        &transcript(&job.messages),
    ));
    let options = StreamOptions {
        temperature: Some(config.classifier_temperature),
        ..Default::default()
    };
    complete_as(
        client,
        &config.model,
        context,
        options,
        &generate_reflections_tool(),
    )
    .await
}

/// Run a reflect cycle in the background and store the result
pub fn spawn(
    client: Arc<dyn ModelClient>,
    config: EngineConfig,
    store: ReflectionStore,
    job: ReflectJob,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match reflect(client.as_ref(), &config, &job).await {
            Ok((reflections, _)) => {
                if let Err(e) = store.put(&job.assistant_id, &reflections).await {
                    tracing::warn!(
                        assistant_id = %job.assistant_id,
                        "failed to store reflections: {}",
                        e
                    );
                } else {
                    tracing::debug!(
                        assistant_id = %job.assistant_id,
                        style_rules = reflections.style_rules.len(),
                        facts = reflections.content.len(),
                        "reflections updated"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(assistant_id = %job.assistant_id, "reflect step failed: {}", e);
            }
        }
    })
}
