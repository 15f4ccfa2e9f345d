//! Error types for quire-engine

use thiserror::Error;

/// Result type alias using quire-engine Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a turn
#[derive(Error, Debug)]
pub enum Error {
    /// The turn was rejected before any model call
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// An error from the model-invocation layer
    #[error(transparent)]
    Ai(#[from] quire_ai::Error),

    /// The model did not produce the required structured result
    #[error("Structured output error: {0}")]
    StructuredOutput(String),

    /// A durable store failed
    #[error("Store error: {0}")]
    Store(String),

    /// Artifact history is inconsistent
    #[error("Artifact invariant violated: {0}")]
    Invariant(String),

    /// A generic engine error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error was raised before any model call
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Store(e.to_string())
    }
}

/// Reasons a turn request is rejected up front
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Can not use multiple directives in one turn: {}", .0.join(", "))]
    MultipleDirectives(Vec<&'static str>),

    #[error("Missing required identity: {0}")]
    MissingIdentity(&'static str),

    #[error("No user message to respond to")]
    EmptyConversation,

    #[error("'{0}' requires an existing artifact")]
    NoArtifact(&'static str),

    #[error("'{directive}' can only be applied to a {expected} artifact")]
    WrongArtifactKind {
        directive: &'static str,
        expected: &'static str,
    },

    #[error("Unknown custom quick action: {0}")]
    UnknownCustomAction(String),

    #[error("Invalid highlight: {0}")]
    InvalidHighlight(String),

    #[error("Invalid version index {0}")]
    InvalidVersion(u32),
}
