//! Per-context tagging capabilities.
//!
//! Contexts opt into ordering and scoring independently; a context's
//! [`ContextOptions`] is the set of capabilities it was declared with.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Optional behavior a context can be declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaggingCapability {
    /// Links carry a position; reads return input order.
    Ordered,
    /// Raw names may carry a `:<digits>` score suffix.
    Scored,
}

/// Declaration string for the ordered capability.
pub const TAGGING_CAPABILITY_ORDERED: &str = "ordered";
/// Declaration string for the scored capability.
pub const TAGGING_CAPABILITY_SCORED: &str = "scored";

impl TaggingCapability {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ordered => TAGGING_CAPABILITY_ORDERED,
            Self::Scored => TAGGING_CAPABILITY_SCORED,
        }
    }
}

/// Parses one capability from its declaration string.
pub fn parse_tagging_capability(value: &str) -> Result<TaggingCapability, CapabilityError> {
    let normalized = value.trim();
    if normalized.is_empty() {
        return Err(CapabilityError::EmptyCapability);
    }

    match normalized {
        TAGGING_CAPABILITY_ORDERED => Ok(TaggingCapability::Ordered),
        TAGGING_CAPABILITY_SCORED => Ok(TaggingCapability::Scored),
        other => Err(CapabilityError::UnsupportedCapability(other.to_string())),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    EmptyCapability,
    UnsupportedCapability(String),
}

impl Display for CapabilityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyCapability => write!(f, "tagging capability must not be empty"),
            Self::UnsupportedCapability(value) => {
                write!(f, "tagging capability is unsupported: {value}")
            }
        }
    }
}

impl Error for CapabilityError {}

/// Flags of one declared context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContextOptions {
    pub ordered: bool,
    pub scored: bool,
}

impl ContextOptions {
    pub const PLAIN: Self = Self {
        ordered: false,
        scored: false,
    };
    pub const ORDERED: Self = Self {
        ordered: true,
        scored: false,
    };
    pub const SCORED: Self = Self {
        ordered: false,
        scored: true,
    };

    pub fn new(ordered: bool, scored: bool) -> Self {
        Self { ordered, scored }
    }

    pub fn from_capabilities(capabilities: &[TaggingCapability]) -> Self {
        Self {
            ordered: capabilities.contains(&TaggingCapability::Ordered),
            scored: capabilities.contains(&TaggingCapability::Scored),
        }
    }

    /// Parses declaration strings such as `["ordered", "scored"]`.
    pub fn parse<S: AsRef<str>>(values: &[S]) -> Result<Self, CapabilityError> {
        let capabilities = values
            .iter()
            .map(|value| parse_tagging_capability(value.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_capabilities(&capabilities))
    }

    pub fn capabilities(self) -> Vec<TaggingCapability> {
        let mut capabilities = Vec::new();
        if self.ordered {
            capabilities.push(TaggingCapability::Ordered);
        }
        if self.scored {
            capabilities.push(TaggingCapability::Scored);
        }
        capabilities
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_tagging_capability, CapabilityError, ContextOptions, TaggingCapability};

    #[test]
    fn parses_supported_capabilities() {
        assert_eq!(
            parse_tagging_capability(" ordered ").expect("ordered parse"),
            TaggingCapability::Ordered
        );
        assert_eq!(
            parse_tagging_capability("scored").expect("scored parse"),
            TaggingCapability::Scored
        );
    }

    #[test]
    fn rejects_empty_and_unknown_capabilities() {
        assert_eq!(
            parse_tagging_capability("  "),
            Err(CapabilityError::EmptyCapability)
        );
        assert_eq!(
            parse_tagging_capability("Ordered"),
            Err(CapabilityError::UnsupportedCapability("Ordered".to_string()))
        );
    }

    #[test]
    fn options_round_trip_through_capabilities() {
        let options = ContextOptions::parse(&["scored", "ordered"]).expect("options parse");
        assert_eq!(options, ContextOptions::new(true, true));
        assert_eq!(
            options.capabilities(),
            vec![TaggingCapability::Ordered, TaggingCapability::Scored]
        );
        assert!(ContextOptions::PLAIN.capabilities().is_empty());
    }
}
