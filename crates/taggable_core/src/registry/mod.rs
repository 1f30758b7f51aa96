//! Per-owner-type tagging context registry.
//!
//! # Responsibility
//! - Record which contexts each owner type declared, and their options.
//! - Answer ordered/scored lookups for the facade.
//!
//! # Invariants
//! - Re-declaring an owner type merges: context names are unioned in
//!   first-declared order, the newest options win per context.
//! - Undeclared owner types and contexts read as plain (unordered, unscored).
//! - Declarations happen at startup; the registry is shared read-only after
//!   that (wrap it in `Arc`).

pub mod capability;

use crate::config::DEFAULT_CONTEXT;
use capability::ContextOptions;
use log::debug;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextRegistryError {
    InvalidOwnerType(String),
    InvalidContext(String),
}

impl Display for ContextRegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidOwnerType(value) => write!(f, "owner type is invalid: `{value}`"),
            Self::InvalidContext(value) => write!(f, "tagging context is invalid: `{value}`"),
        }
    }
}

impl Error for ContextRegistryError {}

#[derive(Debug, Clone, Default)]
struct OwnerContexts {
    contexts: Vec<String>,
    latest: Vec<String>,
    options: BTreeMap<String, ContextOptions>,
}

/// Registry of tagging contexts keyed by owner type.
#[derive(Debug, Clone, Default)]
pub struct ContextRegistry {
    owners: BTreeMap<String, OwnerContexts>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `contexts` on `owner_type` with `options`, merging into any
    /// earlier declaration.
    ///
    /// Context names are trimmed. Duplicates inside one call collapse.
    pub fn declare<I, S>(
        &mut self,
        owner_type: &str,
        contexts: I,
        options: ContextOptions,
    ) -> Result<(), ContextRegistryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let owner_type = owner_type.trim();
        if owner_type.is_empty() {
            return Err(ContextRegistryError::InvalidOwnerType(owner_type.to_string()));
        }

        let mut declared: Vec<String> = Vec::new();
        for context in contexts {
            let context = context.as_ref().trim();
            if context.is_empty() {
                return Err(ContextRegistryError::InvalidContext(context.to_string()));
            }
            if !declared.iter().any(|existing| existing == context) {
                declared.push(context.to_string());
            }
        }

        let entry = self.owners.entry(owner_type.to_string()).or_default();
        for context in &declared {
            if !entry.contexts.contains(context) {
                entry.contexts.push(context.clone());
            }
            entry.options.insert(context.clone(), options);
        }
        debug!(
            "event=context_declare module=registry status=ok owner_type={} contexts={} ordered={} scored={}",
            owner_type,
            declared.join(","),
            options.ordered,
            options.scored
        );
        entry.latest = declared;
        Ok(())
    }

    /// Declares the default `tags` context as plain.
    pub fn declare_taggable(&mut self, owner_type: &str) -> Result<(), ContextRegistryError> {
        self.declare(owner_type, [DEFAULT_CONTEXT], ContextOptions::PLAIN)
    }

    /// Declares `contexts` as ordered.
    pub fn declare_ordered<I, S>(
        &mut self,
        owner_type: &str,
        contexts: I,
    ) -> Result<(), ContextRegistryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.declare(owner_type, contexts, ContextOptions::ORDERED)
    }

    /// Declares `contexts` as scored.
    pub fn declare_scored<I, S>(
        &mut self,
        owner_type: &str,
        contexts: I,
    ) -> Result<(), ContextRegistryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.declare(owner_type, contexts, ContextOptions::SCORED)
    }

    /// Returns whether `owner_type` declared at least once.
    pub fn is_taggable(&self, owner_type: &str) -> bool {
        self.owners.contains_key(owner_type.trim())
    }

    /// All contexts declared on `owner_type`, in first-declared order.
    pub fn contexts_of(&self, owner_type: &str) -> Vec<String> {
        self.owners
            .get(owner_type.trim())
            .map(|entry| entry.contexts.clone())
            .unwrap_or_default()
    }

    /// Contexts named by the most recent declaration on `owner_type`.
    pub fn latest_contexts(&self, owner_type: &str) -> Vec<String> {
        self.owners
            .get(owner_type.trim())
            .map(|entry| entry.latest.clone())
            .unwrap_or_default()
    }

    /// Returns declared options, or `None` when the context is undeclared.
    pub fn declared_options(&self, owner_type: &str, context: &str) -> Option<ContextOptions> {
        self.owners
            .get(owner_type.trim())?
            .options
            .get(context.trim())
            .copied()
    }

    /// Returns options with plain defaults for undeclared contexts.
    pub fn options(&self, owner_type: &str, context: &str) -> ContextOptions {
        self.declared_options(owner_type, context)
            .unwrap_or_default()
    }

    pub fn is_ordered(&self, owner_type: &str, context: &str) -> bool {
        self.options(owner_type, context).ordered
    }

    pub fn is_scored(&self, owner_type: &str, context: &str) -> bool {
        self.options(owner_type, context).scored
    }

    /// Returns sorted owner types.
    pub fn owner_types(&self) -> Vec<String> {
        self.owners.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{ContextRegistry, ContextRegistryError};
    use crate::registry::capability::ContextOptions;

    #[test]
    fn merges_repeated_declarations() {
        let mut registry = ContextRegistry::new();
        registry
            .declare("Book", ["genres"], ContextOptions::new(true, false))
            .expect("genres should declare");
        registry
            .declare("Book", ["moods"], ContextOptions::new(false, true))
            .expect("moods should declare");

        assert_eq!(registry.contexts_of("Book"), vec!["genres", "moods"]);
        assert!(registry.is_ordered("Book", "genres"));
        assert!(!registry.is_scored("Book", "genres"));
        assert!(registry.is_scored("Book", "moods"));
        assert!(!registry.is_ordered("Book", "moods"));
        assert_eq!(registry.latest_contexts("Book"), vec!["moods"]);
    }

    #[test]
    fn redeclaring_a_context_overwrites_flags_and_keeps_position() {
        let mut registry = ContextRegistry::new();
        registry
            .declare("User", ["skills", "languages"], ContextOptions::ORDERED)
            .expect("first declaration");
        registry
            .declare("User", ["interests", "skills"], ContextOptions::SCORED)
            .expect("second declaration");

        assert_eq!(
            registry.contexts_of("User"),
            vec!["skills", "languages", "interests"]
        );
        assert!(!registry.is_ordered("User", "skills"));
        assert!(registry.is_scored("User", "skills"));
        assert!(registry.is_ordered("User", "languages"));
    }

    #[test]
    fn undeclared_lookups_default_to_plain() {
        let registry = ContextRegistry::new();
        assert!(!registry.is_taggable("Ghost"));
        assert!(registry.contexts_of("Ghost").is_empty());
        assert!(!registry.is_ordered("Ghost", "tags"));
        assert!(!registry.is_scored("Ghost", "tags"));
        assert_eq!(registry.declared_options("Ghost", "tags"), None);
    }

    #[test]
    fn collapses_duplicates_and_rejects_blank_names() {
        let mut registry = ContextRegistry::new();
        registry
            .declare("Post", ["tags", " tags "], ContextOptions::PLAIN)
            .expect("duplicate names collapse");
        assert_eq!(registry.contexts_of("Post"), vec!["tags"]);

        assert!(matches!(
            registry.declare("  ", ["tags"], ContextOptions::PLAIN),
            Err(ContextRegistryError::InvalidOwnerType(_))
        ));
        assert!(matches!(
            registry.declare("Post", [""], ContextOptions::PLAIN),
            Err(ContextRegistryError::InvalidContext(_))
        ));
    }

    #[test]
    fn convenience_declarations_set_expected_flags() {
        let mut registry = ContextRegistry::new();
        registry.declare_taggable("Photo").expect("taggable");
        registry
            .declare_ordered("Photo", ["albums"])
            .expect("ordered");
        registry.declare_scored("Photo", ["ratings"]).expect("scored");

        assert!(registry.is_taggable("Photo"));
        assert_eq!(
            registry.contexts_of("Photo"),
            vec!["tags", "albums", "ratings"]
        );
        assert_eq!(
            registry.options("Photo", "albums"),
            ContextOptions::ORDERED
        );
        assert_eq!(registry.options("Photo", "ratings"), ContextOptions::SCORED);
        assert_eq!(registry.owner_types(), vec!["Photo"]);
    }
}
