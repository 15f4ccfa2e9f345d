//! quire-engine: artifact orchestration
//!
//! Routes each conversation turn to one generation node, keeps the thread's
//! artifact as an append-only version history, and maintains per-assistant
//! reflections (style rules and user facts) that every prompt embeds.

pub mod artifact;
pub mod config;
pub mod conversation;
pub mod error;
pub mod events;
pub mod model;
pub mod nodes;
pub mod orchestrator;
pub mod persist;
pub mod prompts;
pub mod quick_action;
pub mod reflection;
pub mod router;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use artifact::{ArtifactContent, ArtifactDocument, ArtifactKind, ProgrammingLanguage};
pub use config::{EngineConfig, PersistenceConfig};
pub use conversation::{CharSpan, Directive, Highlight, TextSelection, TurnRequest};
pub use error::{Error, Result, ValidationError};
pub use events::{NodeKind, TurnEvent, TurnEventStream};
pub use model::{ModelClient, ProviderClient, RetryConfig};
pub use orchestrator::{Orchestrator, TurnOutcome};
pub use persist::ArtifactPersister;
pub use quick_action::{
    ArtifactLength, CustomActionStore, CustomQuickAction, CustomQuickActionDraft,
    QuickActionRequest, ReadingLevel, TargetLanguage,
};
pub use reflection::{ReflectionStore, Reflections};
pub use router::Route;
pub use store::{
    FileMemoryStore, FileThreadStore, InMemoryMemoryStore, InMemoryThreadStore, MemoryStore,
    ThreadState, ThreadStore, ThreadUpdate,
};
