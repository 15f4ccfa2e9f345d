//! Model registry with a small built-in table and public lookup API.

use crate::{Api, Model, Provider};

struct ModelEntry {
    id: &'static str,
    name: &'static str,
    context_window: u32,
    max_tokens: u32,
}

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

const ANTHROPIC_MODELS: &[ModelEntry] = &[
    ModelEntry {
        id: "claude-sonnet-4-5-20250929",
        name: "Claude Sonnet 4.5",
        context_window: 200_000,
        max_tokens: 64_000,
    },
    ModelEntry {
        id: "claude-opus-4-1-20250805",
        name: "Claude Opus 4.1",
        context_window: 200_000,
        max_tokens: 32_000,
    },
    ModelEntry {
        id: "claude-haiku-4-5-20251001",
        name: "Claude Haiku 4.5",
        context_window: 200_000,
        max_tokens: 64_000,
    },
    ModelEntry {
        id: "claude-3-5-haiku-20241022",
        name: "Claude Haiku 3.5",
        context_window: 200_000,
        max_tokens: 8_192,
    },
];

/// Default model for artifact generation
pub const DEFAULT_MODEL_ID: &str = "claude-sonnet-4-5-20250929";

/// Default (smaller) model for followup messages
pub const DEFAULT_FOLLOWUP_MODEL_ID: &str = "claude-haiku-4-5-20251001";

impl ModelEntry {
    fn to_model(&self) -> Model {
        Model {
            id: self.id.to_string(),
            name: self.name.to_string(),
            api: Api::AnthropicMessages,
            provider: Provider::Anthropic,
            base_url: ANTHROPIC_BASE_URL.to_string(),
            context_window: self.context_window,
            max_tokens: self.max_tokens,
            headers: Default::default(),
        }
    }
}

/// Look up a model by ID.
pub fn get_model(id: &str) -> Option<Model> {
    ANTHROPIC_MODELS
        .iter()
        .find(|e| e.id == id)
        .map(|e| e.to_model())
}

/// Look up a model by ID, falling back to a generic Anthropic definition for unknown IDs.
pub fn get_model_or_default(id: &str) -> Model {
    get_model(id).unwrap_or_else(|| Model {
        id: id.to_string(),
        name: id.to_string(),
        api: Api::AnthropicMessages,
        provider: Provider::Anthropic,
        base_url: ANTHROPIC_BASE_URL.to_string(),
        context_window: 200_000,
        max_tokens: 8_192,
        headers: Default::default(),
    })
}

/// Get all registered models.
pub fn get_all_models() -> Vec<Model> {
    ANTHROPIC_MODELS.iter().map(|e| e.to_model()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_models_are_registered() {
        assert!(get_model(DEFAULT_MODEL_ID).is_some());
        assert!(get_model(DEFAULT_FOLLOWUP_MODEL_ID).is_some());
    }

    #[test]
    fn test_unknown_model_falls_back() {
        let model = get_model_or_default("my-proxy-model");
        assert_eq!(model.id, "my-proxy-model");
        assert_eq!(model.provider, Provider::Anthropic);
    }
}
