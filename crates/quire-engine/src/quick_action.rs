//! Quick-action catalog and user-defined custom actions

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::artifact::{ArtifactKind, ProgrammingLanguage};
use crate::error::{Error, Result};
use crate::store::MemoryStore;

macro_rules! option_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            pub fn parse(label: &str) -> Option<Self> {
                let label = label.trim().to_lowercase();
                Self::ALL.iter().copied().find(|v| v.as_str() == label)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

option_enum!(
    /// Languages a text artifact can be translated into
    TargetLanguage {
        English => "english",
        Mandarin => "mandarin",
        Spanish => "spanish",
        French => "french",
        Hindi => "hindi",
    }
);

option_enum!(
    /// Reading levels a text artifact can be rewritten for
    ReadingLevel {
        Pirate => "pirate",
        Child => "child",
        Teenager => "teenager",
        College => "college",
        Phd => "phd",
    }
);

option_enum!(
    /// Relative lengths a text artifact can be resized to
    ArtifactLength {
        Shortest => "shortest",
        Short => "short",
        Long => "long",
        Longest => "longest",
    }
);

/// A predefined transform applied to the current artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum QuickActionRequest {
    ChangeLanguage(TargetLanguage),
    ChangeLength(ArtifactLength),
    ChangeReadingLevel(ReadingLevel),
    AddEmojis,
    AddComments,
    AddLogs,
    FixBugs,
    PortLanguage(ProgrammingLanguage),
    /// A user-defined action, by id
    Custom(String),
}

impl QuickActionRequest {
    /// Name of the request field that carries this action
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::ChangeLanguage(_) => "language",
            Self::ChangeLength(_) => "artifact_length",
            Self::ChangeReadingLevel(_) => "reading_level",
            Self::AddEmojis => "regenerate_with_emojis",
            Self::AddComments => "add_comments",
            Self::AddLogs => "add_logs",
            Self::FixBugs => "fix_bugs",
            Self::PortLanguage(_) => "port_language",
            Self::Custom(_) => "custom_quick_action_id",
        }
    }

    /// Artifact variant the action operates on; custom actions accept either
    pub fn required_kind(&self) -> Option<ArtifactKind> {
        match self {
            Self::ChangeLanguage(_)
            | Self::ChangeLength(_)
            | Self::ChangeReadingLevel(_)
            | Self::AddEmojis => Some(ArtifactKind::Text),
            Self::AddComments | Self::AddLogs | Self::FixBugs | Self::PortLanguage(_) => {
                Some(ArtifactKind::Code)
            }
            Self::Custom(_) => None,
        }
    }

    /// The kind-specific instruction for built-in actions
    pub fn instruction(&self) -> Option<String> {
        let text = match self {
            Self::ChangeLanguage(language) => format!(
                "Translate the artifact into {}. Keep the structure, formatting and meaning intact.",
                language
            ),
            Self::ChangeLength(length) => {
                let target = match length {
                    ArtifactLength::Shortest => "as short as possible while keeping the core message",
                    ArtifactLength::Short => "noticeably shorter than it is now",
                    ArtifactLength::Long => "noticeably longer, adding relevant detail",
                    ArtifactLength::Longest => "as long as reasonably possible, expanding every section",
                };
                format!("Rewrite the artifact so it is {}.", target)
            }
            Self::ChangeReadingLevel(level) => {
                let audience = match level {
                    ReadingLevel::Pirate => "in the voice of a pirate, keeping the content intact",
                    ReadingLevel::Child => "for an elementary school student",
                    ReadingLevel::Teenager => "for a high school student",
                    ReadingLevel::College => "for a college student",
                    ReadingLevel::Phd => "for a PhD-level expert in the field",
                };
                format!("Rewrite the artifact {}.", audience)
            }
            Self::AddEmojis => {
                "Add emojis throughout the artifact where they fit naturally. Do not change the wording otherwise.".to_string()
            }
            Self::AddComments => {
                "Add clear, concise comments to the code. Do not change the code itself.".to_string()
            }
            Self::AddLogs => {
                "Add log statements at the important points of the code so its execution can be followed. Use the idiomatic logging approach for the language. Do not change the logic.".to_string()
            }
            Self::FixBugs => {
                "Find and fix any bugs in the code. Keep behavior that is clearly intended and do not restructure working code.".to_string()
            }
            Self::PortLanguage(language) => format!(
                "Port the code to {}. Preserve its behavior and use idiomatic constructs of the target language.",
                language
            ),
            Self::Custom(_) => return None,
        };
        Some(text)
    }
}

/// A user-defined quick action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomQuickAction {
    pub id: String,
    pub title: String,
    pub prompt: String,
    /// Embed the assistant's reflections in the prompt
    #[serde(default)]
    pub include_reflections: bool,
    /// Open the prompt with the standard artifact-editing preamble
    #[serde(default)]
    pub include_prefix: bool,
    /// Embed the last few conversation messages in the prompt
    #[serde(default)]
    pub include_recent_history: bool,
}

/// Fields for creating or replacing a custom action
#[derive(Debug, Clone, Default)]
pub struct CustomQuickActionDraft {
    pub title: String,
    pub prompt: String,
    pub include_reflections: bool,
    pub include_prefix: bool,
    pub include_recent_history: bool,
}

const CUSTOM_ACTIONS_PREFIX: &str = "custom_actions";
const CUSTOM_ACTIONS_KEY: &str = "actions";

/// Custom quick actions, keyed by assistant identity
#[derive(Clone)]
pub struct CustomActionStore {
    store: Arc<dyn MemoryStore>,
}

impl CustomActionStore {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self { store }
    }

    async fn load(&self, assistant_id: &str) -> Result<BTreeMap<String, CustomQuickAction>> {
        let value = self
            .store
            .get(&[CUSTOM_ACTIONS_PREFIX, assistant_id], CUSTOM_ACTIONS_KEY)
            .await?;
        match value {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(BTreeMap::new()),
        }
    }

    async fn save(
        &self,
        assistant_id: &str,
        actions: &BTreeMap<String, CustomQuickAction>,
    ) -> Result<()> {
        self.store
            .put(
                &[CUSTOM_ACTIONS_PREFIX, assistant_id],
                CUSTOM_ACTIONS_KEY,
                serde_json::to_value(actions)?,
            )
            .await
    }

    pub async fn list(&self, assistant_id: &str) -> Result<Vec<CustomQuickAction>> {
        Ok(self.load(assistant_id).await?.into_values().collect())
    }

    pub async fn get(&self, assistant_id: &str, id: &str) -> Result<Option<CustomQuickAction>> {
        Ok(self.load(assistant_id).await?.remove(id))
    }

    pub async fn create(
        &self,
        assistant_id: &str,
        draft: CustomQuickActionDraft,
    ) -> Result<CustomQuickAction> {
        let mut actions = self.load(assistant_id).await?;
        let action = CustomQuickAction {
            id: uuid::Uuid::new_v4().to_string(),
            title: draft.title,
            prompt: draft.prompt,
            include_reflections: draft.include_reflections,
            include_prefix: draft.include_prefix,
            include_recent_history: draft.include_recent_history,
        };
        actions.insert(action.id.clone(), action.clone());
        self.save(assistant_id, &actions).await?;
        tracing::debug!(assistant_id, id = %action.id, "custom quick action created");
        Ok(action)
    }

    pub async fn update(
        &self,
        assistant_id: &str,
        id: &str,
        draft: CustomQuickActionDraft,
    ) -> Result<CustomQuickAction> {
        let mut actions = self.load(assistant_id).await?;
        let Some(action) = actions.get_mut(id) else {
            return Err(Error::Other(format!("Custom quick action not found: {}", id)));
        };
        action.title = draft.title;
        action.prompt = draft.prompt;
        action.include_reflections = draft.include_reflections;
        action.include_prefix = draft.include_prefix;
        action.include_recent_history = draft.include_recent_history;
        let updated = action.clone();
        self.save(assistant_id, &actions).await?;
        Ok(updated)
    }

    /// Remove an action. Returns whether it existed.
    pub async fn delete(&self, assistant_id: &str, id: &str) -> Result<bool> {
        let mut actions = self.load(assistant_id).await?;
        let existed = actions.remove(id).is_some();
        if existed {
            self.save(assistant_id, &actions).await?;
        }
        Ok(existed)
    }
}
