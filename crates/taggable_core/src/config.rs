//! Tagging configuration.
//!
//! # Invariants
//! - Missing fields fall back to [`TaggingConfig::default`].
//! - `default_context` is never blank after parsing.

use crate::model::tag::CaseMatch;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Context used by `declare_taggable` and by callers that do not name one.
pub const DEFAULT_CONTEXT: &str = "tags";

/// Process-wide tagging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaggingConfig {
    /// Match tag names by exact string equality instead of case-folded equality.
    pub strict_case_match: bool,
    pub default_context: String,
}

impl Default for TaggingConfig {
    fn default() -> Self {
        Self {
            strict_case_match: false,
            default_context: DEFAULT_CONTEXT.to_string(),
        }
    }
}

impl TaggingConfig {
    /// Parses configuration from a JSON document.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_str(input).map_err(ConfigError::Parse)?;
        config.default_context = config.default_context.trim().to_string();
        if config.default_context.is_empty() {
            return Err(ConfigError::BlankDefaultContext);
        }
        Ok(config)
    }

    pub fn case_match(&self) -> CaseMatch {
        if self.strict_case_match {
            CaseMatch::Strict
        } else {
            CaseMatch::Loose
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    BlankDefaultContext,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid tagging config: {err}"),
            Self::BlankDefaultContext => write!(f, "default_context must not be blank"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::BlankDefaultContext => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, TaggingConfig, DEFAULT_CONTEXT};
    use crate::model::tag::CaseMatch;

    #[test]
    fn defaults_to_loose_matching() {
        let config = TaggingConfig::default();
        assert_eq!(config.case_match(), CaseMatch::Loose);
        assert_eq!(config.default_context, DEFAULT_CONTEXT);
    }

    #[test]
    fn parses_partial_json() {
        let config = TaggingConfig::from_json_str(r#"{ "strict_case_match": true }"#)
            .expect("partial config should parse");
        assert_eq!(config.case_match(), CaseMatch::Strict);
        assert_eq!(config.default_context, DEFAULT_CONTEXT);
    }

    #[test]
    fn rejects_blank_default_context_and_bad_json() {
        let err = TaggingConfig::from_json_str(r#"{ "default_context": "  " }"#)
            .expect_err("blank context must fail");
        assert!(matches!(err, ConfigError::BlankDefaultContext));

        let err = TaggingConfig::from_json_str("{ strict").expect_err("bad json must fail");
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
