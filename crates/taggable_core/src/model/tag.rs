//! Tag domain model.
//!
//! # Responsibility
//! - Define the canonical tag record returned by the resolver.
//! - Validate tag names before they reach the store.
//! - Provide the case policy used everywhere names are compared.
//!
//! # Invariants
//! - `name` is non-blank and at most [`MAX_TAG_NAME_CHARS`] characters.
//! - Two tags are equal iff their names are equal.
//! - `score` is transient and never persisted on the tag row.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

/// Store-assigned tag identity.
pub type TagId = i64;

/// Maximum tag name length in characters.
pub const MAX_TAG_NAME_CHARS: usize = 255;

/// Tag-name matching policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseMatch {
    /// Exact string equality.
    Strict,
    /// Case-folded equality.
    #[default]
    Loose,
}

impl CaseMatch {
    /// Returns the comparison key for `name` under this policy.
    pub fn comparable(self, name: &str) -> String {
        match self {
            Self::Strict => name.to_string(),
            Self::Loose => fold_name(name),
        }
    }

    /// Returns whether two names refer to the same tag under this policy.
    pub fn matches(self, left: &str, right: &str) -> bool {
        match self {
            Self::Strict => left == right,
            Self::Loose => left == right || fold_name(left) == fold_name(right),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Loose => "loose",
        }
    }
}

/// Locale-independent case fold used for loose matching.
pub fn fold_name(name: &str) -> String {
    name.to_lowercase()
}

/// Tag-name validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValidationError {
    /// Name is empty or whitespace only.
    EmptyName,
    /// Name exceeds [`MAX_TAG_NAME_CHARS`].
    NameTooLong { chars: usize, max: usize },
}

impl Display for TagValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "tag name must not be empty"),
            Self::NameTooLong { chars, max } => {
                write!(f, "tag name has {chars} characters, maximum is {max}")
            }
        }
    }
}

impl Error for TagValidationError {}

/// Validates one tag name.
pub fn validate_tag_name(name: &str) -> Result<(), TagValidationError> {
    if name.trim().is_empty() {
        return Err(TagValidationError::EmptyName);
    }
    let chars = name.chars().count();
    if chars > MAX_TAG_NAME_CHARS {
        return Err(TagValidationError::NameTooLong {
            chars,
            max: MAX_TAG_NAME_CHARS,
        });
    }
    Ok(())
}

/// Canonical tag record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    /// Usage counter maintained by the store. Zero when unknown.
    #[serde(default)]
    pub count: i64,
    /// Score parsed during one scored resolution call, or read back from a
    /// scored tagging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
}

impl Tag {
    pub fn new(id: TagId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            count: 0,
            score: None,
        }
    }

    /// Returns this tag with `score` attached.
    pub fn with_score(mut self, score: Option<i64>) -> Self {
        self.score = score;
        self
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Tag {}

impl Hash for Tag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
