//! Long-term memory: style rules and user facts per assistant
//!
//! Reflections live in the memory store under `["memories", <assistant_id>]`.
//! The stored shape is not schema-enforced, so every read goes through
//! [`Reflections::from_stored`], which coerces whatever it finds into two
//! string lists.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;
use crate::store::MemoryStore;

const NAMESPACE_PREFIX: &str = "memories";
const REFLECTION_KEY: &str = "reflection";

/// Accumulated style rules and user facts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reflections {
    /// Rules about how the user wants artifacts written
    pub style_rules: Vec<String>,
    /// Facts about the user and their work
    pub content: Vec<String>,
}

impl Reflections {
    pub fn is_empty(&self) -> bool {
        self.style_rules.is_empty() && self.content.is_empty()
    }

    /// Normalize a stored value of unknown shape
    pub fn from_stored(value: &serde_json::Value) -> Self {
        Self {
            style_rules: coerce_list(value.get("styleRules")),
            content: coerce_list(value.get("content")),
        }
    }

    /// Render the fixed block that generation prompts embed
    pub fn format(&self) -> String {
        format!(
            "<style-rules>\n{}\n</style-rules>\n\n<user-facts>\n{}\n</user-facts>",
            bullets(&self.style_rules, "No style rules found."),
            bullets(&self.content, "No user facts found."),
        )
    }
}

fn coerce_list(field: Option<&serde_json::Value>) -> Vec<String> {
    match field {
        None | Some(serde_json::Value::Null) => vec![],
        Some(serde_json::Value::Array(items)) => items.iter().map(string_form).collect(),
        Some(other) => vec![string_form(other)],
    }
}

fn string_form(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn bullets(items: &[String], placeholder: &str) -> String {
    if items.is_empty() {
        return placeholder.to_string();
    }
    items
        .iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reflections keyed by assistant identity
#[derive(Clone)]
pub struct ReflectionStore {
    store: Arc<dyn MemoryStore>,
}

impl ReflectionStore {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self { store }
    }

    /// Stored reflections, or the empty default when none exist
    pub async fn get(&self, assistant_id: &str) -> Result<Reflections> {
        let value = self
            .store
            .get(&[NAMESPACE_PREFIX, assistant_id], REFLECTION_KEY)
            .await?;
        Ok(value
            .as_ref()
            .map(Reflections::from_stored)
            .unwrap_or_default())
    }

    /// Replace the stored reflections wholesale
    pub async fn put(&self, assistant_id: &str, reflections: &Reflections) -> Result<()> {
        let value = serde_json::to_value(reflections)?;
        self.store
            .put(&[NAMESPACE_PREFIX, assistant_id], REFLECTION_KEY, value)
            .await
    }

    /// Forget everything stored for the assistant
    pub async fn clear(&self, assistant_id: &str) -> Result<()> {
        self.store
            .delete(&[NAMESPACE_PREFIX, assistant_id], REFLECTION_KEY)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryMemoryStore;
    use serde_json::json;

    #[test]
    fn test_format_empty_uses_placeholders() {
        let text = Reflections::default().format();
        assert!(text.contains("No style rules found."));
        assert!(text.contains("No user facts found."));
        assert!(!text.contains("- "));
    }

    #[test]
    fn test_format_renders_bullets() {
        let reflections = Reflections {
            style_rules: vec!["Prefer short sentences".into()],
            content: vec!["Writes haiku".into(), "Lives in Seattle".into()],
        };
        let text = reflections.format();
        assert!(text.contains("- Prefer short sentences"));
        assert!(text.contains("- Writes haiku\n- Lives in Seattle"));
        assert!(!text.contains("No style rules found."));
    }

    #[test]
    fn test_from_stored_coerces_scalars() {
        let value = json!({ "styleRules": "be terse", "content": 42 });
        let reflections = Reflections::from_stored(&value);
        assert_eq!(reflections.style_rules, vec!["be terse"]);
        assert_eq!(reflections.content, vec!["42"]);
    }

    #[test]
    fn test_from_stored_handles_missing_and_mixed() {
        let value = json!({ "content": ["likes rain", 7, null] });
        let reflections = Reflections::from_stored(&value);
        assert!(reflections.style_rules.is_empty());
        assert_eq!(reflections.content, vec!["likes rain", "7", "null"]);

        let reflections = Reflections::from_stored(&json!("garbage"));
        assert!(reflections.is_empty());
    }

    #[tokio::test]
    async fn test_store_get_defaults_then_replaces() {
        let store = ReflectionStore::new(Arc::new(InMemoryMemoryStore::new()));
        assert!(store.get("a1").await.unwrap().is_empty());

        let first = Reflections {
            style_rules: vec!["rule one".into()],
            content: vec!["fact one".into()],
        };
        store.put("a1", &first).await.unwrap();
        let second = Reflections {
            style_rules: vec![],
            content: vec!["fact two".into()],
        };
        store.put("a1", &second).await.unwrap();

        // wholesale replace, not merge
        assert_eq!(store.get("a1").await.unwrap(), second);
        assert!(store.get("a2").await.unwrap().is_empty());

        store.clear("a1").await.unwrap();
        assert!(store.get("a1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_normalizes_legacy_shape() {
        let memory = Arc::new(InMemoryMemoryStore::new());
        memory
            .put(&["memories", "a1"], "reflection", json!({ "styleRules": "legacy rule" }))
            .await
            .unwrap();
        let store = ReflectionStore::new(memory);
        let reflections = store.get("a1").await.unwrap();
        assert_eq!(reflections.style_rules, vec!["legacy rule"]);
        assert!(reflections.content.is_empty());
    }
}
