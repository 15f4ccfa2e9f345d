//! Versioned artifact history
//!
//! An [`ArtifactDocument`] holds every version of a thread's artifact. Versions
//! are only ever appended; navigating back with [`ArtifactDocument::rewind`]
//! moves the current pointer without dropping anything, and the next append
//! still allocates the highest index overall.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result, ValidationError};

/// Which variant an artifact version is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Text,
    Code,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Text => "text",
            ArtifactKind::Code => "code",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single version of the artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ArtifactContent {
    Text {
        index: u32,
        title: String,
        full_markdown: String,
    },
    Code {
        index: u32,
        title: String,
        language: String,
        code: String,
    },
}

impl ArtifactContent {
    /// A text version; the index is assigned when it is appended
    pub fn text(title: impl Into<String>, full_markdown: impl Into<String>) -> Self {
        Self::Text {
            index: 0,
            title: title.into(),
            full_markdown: full_markdown.into(),
        }
    }

    /// A code version; the index is assigned when it is appended
    pub fn code(
        title: impl Into<String>,
        language: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self::Code {
            index: 0,
            title: title.into(),
            language: language.into(),
            code: code.into(),
        }
    }

    pub fn index(&self) -> u32 {
        match self {
            Self::Text { index, .. } | Self::Code { index, .. } => *index,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Text { title, .. } | Self::Code { title, .. } => title,
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Text { .. } => ArtifactKind::Text,
            Self::Code { .. } => ArtifactKind::Code,
        }
    }

    /// Markdown for text versions, source for code versions
    pub fn body(&self) -> &str {
        match self {
            Self::Text { full_markdown, .. } => full_markdown,
            Self::Code { code, .. } => code,
        }
    }

    /// Declared language of a code version
    pub fn language(&self) -> Option<&str> {
        match self {
            Self::Text { .. } => None,
            Self::Code { language, .. } => Some(language),
        }
    }

    /// A new, unindexed version of the same variant and title with a different body
    pub fn with_body(&self, body: impl Into<String>) -> Self {
        match self {
            Self::Text { title, .. } => Self::text(title.clone(), body),
            Self::Code {
                title, language, ..
            } => Self::code(title.clone(), language.clone(), body),
        }
    }

    fn set_index(&mut self, new_index: u32) {
        match self {
            Self::Text { index, .. } | Self::Code { index, .. } => *index = new_index,
        }
    }
}

/// Full version history of one thread's artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDocument {
    current_index: u32,
    contents: Vec<ArtifactContent>,
}

impl ArtifactDocument {
    /// Start a history with its first version (index 1)
    pub fn new(mut first: ArtifactContent) -> Self {
        first.set_index(1);
        Self {
            current_index: 1,
            contents: vec![first],
        }
    }

    /// Append a version at `max(index) + 1` and make it current. Returns the new index.
    pub fn append_version(&mut self, mut content: ArtifactContent) -> u32 {
        let next = self.latest_index() + 1;
        content.set_index(next);
        self.contents.push(content);
        self.current_index = next;
        next
    }

    /// The version the current pointer names
    pub fn current_content(&self) -> Result<&ArtifactContent> {
        self.version(self.current_index).ok_or_else(|| {
            Error::Invariant(format!(
                "current index {} not present in artifact history",
                self.current_index
            ))
        })
    }

    /// Point the current view at an existing version. History is untouched.
    pub fn rewind(&mut self, target: u32) -> Result<()> {
        if self.version(target).is_none() {
            return Err(ValidationError::InvalidVersion(target).into());
        }
        self.current_index = target;
        Ok(())
    }

    pub fn version(&self, index: u32) -> Option<&ArtifactContent> {
        self.contents.iter().find(|c| c.index() == index)
    }

    pub fn contents(&self) -> &[ArtifactContent] {
        &self.contents
    }

    /// Versions oldest first
    pub fn versions(&self) -> impl Iterator<Item = &ArtifactContent> {
        self.contents.iter()
    }

    pub fn current_index(&self) -> u32 {
        self.current_index
    }

    pub fn latest_index(&self) -> u32 {
        self.contents.last().map(|c| c.index()).unwrap_or(0)
    }

    /// Check the history invariants: non-empty, strictly ascending unique
    /// indices, and a current pointer that names a present version.
    ///
    /// Documents arriving from a caller or a durable store go through this
    /// before the engine touches them.
    pub fn validate(&self) -> Result<()> {
        if self.contents.is_empty() {
            return Err(Error::Invariant("artifact history is empty".into()));
        }
        for pair in self.contents.windows(2) {
            if pair[0].index() >= pair[1].index() {
                return Err(Error::Invariant(format!(
                    "artifact indices not strictly ascending ({} then {})",
                    pair[0].index(),
                    pair[1].index()
                )));
            }
        }
        self.current_content().map(|_| ())
    }
}

/// Programming languages the engine knows how to label and port between.
/// Code versions keep a free-text language; this catalog is what
/// port-language targets and generated code labels are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgrammingLanguage {
    Typescript,
    Javascript,
    Cpp,
    Java,
    Php,
    Python,
    Html,
    Sql,
    Json,
    Rust,
    Xml,
    Clojure,
    Csharp,
    Other,
}

impl ProgrammingLanguage {
    pub const ALL: [ProgrammingLanguage; 14] = [
        Self::Typescript,
        Self::Javascript,
        Self::Cpp,
        Self::Java,
        Self::Php,
        Self::Python,
        Self::Html,
        Self::Sql,
        Self::Json,
        Self::Rust,
        Self::Xml,
        Self::Clojure,
        Self::Csharp,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Typescript => "typescript",
            Self::Javascript => "javascript",
            Self::Cpp => "cpp",
            Self::Java => "java",
            Self::Php => "php",
            Self::Python => "python",
            Self::Html => "html",
            Self::Sql => "sql",
            Self::Json => "json",
            Self::Rust => "rust",
            Self::Xml => "xml",
            Self::Clojure => "clojure",
            Self::Csharp => "csharp",
            Self::Other => "other",
        }
    }

    /// Parse a free-text language label, case-insensitively
    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        Self::ALL.into_iter().find(|l| l.as_str() == label)
    }
}

impl fmt::Display for ProgrammingLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
