//! Per-owner tagging use-case service.
//!
//! # Responsibility
//! - Assign, extend, shrink and read the tags of one owner in one context.
//! - Apply the owner type's context options (ordering, scores).
//!
//! # Invariants
//! - Writes are confined to linkage rows; tag rows are only ever created by
//!   the resolver and never mutated here.
//! - Ordered contexts store positions in caller input order.
//! - Reconciliation leaves links whose tag, position and score are unchanged
//!   untouched.

use crate::config::TaggingConfig;
use crate::model::tag::{Tag, TagId, TagValidationError};
use crate::model::tagging::{OwnerRef, Taggable, TaggingWrite};
use crate::registry::capability::ContextOptions;
use crate::registry::ContextRegistry;
use crate::repo::tag_repo::{RepoError, TagRepository};
use crate::repo::tagging_repo::TaggingRepository;
use crate::resolver::{ResolveError, TagResolver};
use log::info;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Service error for tagging use-cases.
#[derive(Debug)]
pub enum TaggableServiceError {
    /// Context name is blank after trim.
    InvalidContext(String),
    /// A raw tag name failed validation.
    InvalidTag {
        name: String,
        source: TagValidationError,
    },
    /// Tag creation conflicted and could not be recovered.
    Conflict(String),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for TaggableServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidContext(value) => write!(f, "invalid tagging context: `{value}`"),
            Self::InvalidTag { name, source } => write!(f, "invalid tag `{name}`: {source}"),
            Self::Conflict(name) => write!(f, "tag `{name}` could not be resolved after a conflict"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TaggableServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidTag { source, .. } => Some(source),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for TaggableServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Conflict(name) => Self::Conflict(name),
            other => Self::Repo(other),
        }
    }
}

impl From<ResolveError> for TaggableServiceError {
    fn from(value: ResolveError) -> Self {
        match value {
            ResolveError::InvalidName { name, source } => Self::InvalidTag { name, source },
            ResolveError::Conflict(name) => Self::Conflict(name),
            ResolveError::Repo(err) => err.into(),
        }
    }
}

pub type TaggableResult<T> = Result<T, TaggableServiceError>;

/// Tagging facade over a repository, a context registry and a resolver.
pub struct TaggableService<R: TagRepository + TaggingRepository> {
    repo: R,
    registry: Arc<ContextRegistry>,
    resolver: TagResolver,
}

impl<R: TagRepository + TaggingRepository> TaggableService<R> {
    pub fn new(repo: R, registry: Arc<ContextRegistry>, config: &TaggingConfig) -> Self {
        Self::with_resolver(repo, registry, TagResolver::from_config(config))
    }

    pub fn with_resolver(repo: R, registry: Arc<ContextRegistry>, resolver: TagResolver) -> Self {
        Self {
            repo,
            registry,
            resolver,
        }
    }

    pub fn registry(&self) -> &ContextRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> TagResolver {
        self.resolver
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Replaces the tags of `owner` in `context` with `raw_names`.
    ///
    /// Returns the tags now linked, read back in `tags_on` order.
    pub fn set_tags<T, S>(
        &mut self,
        owner: &T,
        context: &str,
        raw_names: &[S],
    ) -> TaggableResult<Vec<Tag>>
    where
        T: Taggable + ?Sized,
        S: AsRef<str>,
    {
        self.assign(None, owner, context, raw_names)
    }

    /// Like [`Self::set_tags`], recording `tagger` on newly created links.
    pub fn set_owned_tags<G, T, S>(
        &mut self,
        tagger: &G,
        owner: &T,
        context: &str,
        raw_names: &[S],
    ) -> TaggableResult<Vec<Tag>>
    where
        G: Taggable + ?Sized,
        T: Taggable + ?Sized,
        S: AsRef<str>,
    {
        let tagger = tagger.owner_ref();
        self.assign(Some(&tagger), owner, context, raw_names)
    }

    /// Adds `raw_names` to the current tags, keeping existing positions first.
    ///
    /// Scores given in `raw_names` replace stored scores of the same tag.
    pub fn add_tags<T, S>(
        &mut self,
        owner: &T,
        context: &str,
        raw_names: &[S],
    ) -> TaggableResult<Vec<Tag>>
    where
        T: Taggable + ?Sized,
        S: AsRef<str>,
    {
        let context = normalize_context(context)?;
        let owner_ref = owner.owner_ref();
        let options = self.registry.options(&owner_ref.owner_type, context);

        let mut tags = self
            .repo
            .list_tags_for(&owner_ref, context, options.ordered)?;
        for tag in self.resolve_in_input_order(raw_names, options)? {
            match tags.iter_mut().find(|current| current.id == tag.id) {
                Some(current) => {
                    if options.scored && tag.score.is_some() {
                        current.score = tag.score;
                    }
                }
                None => tags.push(tag),
            }
        }

        self.write(None, &owner_ref, context, options, &tags)?;
        self.tags_on(&owner_ref, context)
    }

    /// Removes tags matching `raw_names` under the case policy.
    ///
    /// Unknown names are ignored; tag rows are never deleted.
    pub fn remove_tags<T, S>(
        &mut self,
        owner: &T,
        context: &str,
        raw_names: &[S],
    ) -> TaggableResult<Vec<Tag>>
    where
        T: Taggable + ?Sized,
        S: AsRef<str>,
    {
        let context = normalize_context(context)?;
        let owner_ref = owner.owner_ref();
        let options = self.registry.options(&owner_ref.owner_type, context);

        let removed = self.resolver.prepare_names(raw_names, options.scored);
        let case_match = self.resolver.case_match();
        let remaining: Vec<Tag> = self
            .repo
            .list_tags_for(&owner_ref, context, options.ordered)?
            .into_iter()
            .filter(|tag| !removed.iter().any(|item| case_match.matches(&tag.name, &item.name)))
            .collect();

        self.write(None, &owner_ref, context, options, &remaining)?;
        self.tags_on(&owner_ref, context)
    }

    /// Returns the tags of `owner` in `context`.
    ///
    /// Ordered contexts return position order, others tag id order.
    pub fn tags_on<T: Taggable + ?Sized>(
        &self,
        owner: &T,
        context: &str,
    ) -> TaggableResult<Vec<Tag>> {
        let context = normalize_context(context)?;
        let owner_ref = owner.owner_ref();
        let ordered = self.registry.is_ordered(&owner_ref.owner_type, context);
        Ok(self.repo.list_tags_for(&owner_ref, context, ordered)?)
    }

    /// Tag names of `owner` in `context`, in `tags_on` order.
    pub fn tag_list_on<T: Taggable + ?Sized>(
        &self,
        owner: &T,
        context: &str,
    ) -> TaggableResult<Vec<String>> {
        Ok(self
            .tags_on(owner, context)?
            .into_iter()
            .map(|tag| tag.name)
            .collect())
    }

    /// Contexts declared for the owner's type.
    pub fn contexts_of<T: Taggable + ?Sized>(&self, owner: &T) -> Vec<String> {
        self.registry.contexts_of(owner.owner_type())
    }

    /// Declared contexts followed by undeclared contexts that hold links.
    pub fn tagging_contexts<T: Taggable + ?Sized>(&self, owner: &T) -> TaggableResult<Vec<String>> {
        let mut contexts = self.contexts_of(owner);
        for context in self.repo.list_contexts_for(&owner.owner_ref())? {
            if !contexts.contains(&context) {
                contexts.push(context);
            }
        }
        Ok(contexts)
    }

    /// Removes every link of `owner`. Call when the owner is destroyed.
    pub fn forget_owner<T: Taggable + ?Sized>(&mut self, owner: &T) -> TaggableResult<usize> {
        let owner_ref = owner.owner_ref();
        let removed = self.repo.delete_owner_taggings(&owner_ref)?;
        info!(
            "event=owner_forget module=service status=ok owner_type={} removed={}",
            owner_ref.owner_type, removed
        );
        Ok(removed)
    }

    /// Deletes one tag row together with all of its links.
    pub fn delete_tag(&mut self, tag_id: TagId) -> TaggableResult<()> {
        self.repo.delete_tag(tag_id)?;
        Ok(())
    }

    fn assign<T, S>(
        &mut self,
        tagger: Option<&OwnerRef>,
        owner: &T,
        context: &str,
        raw_names: &[S],
    ) -> TaggableResult<Vec<Tag>>
    where
        T: Taggable + ?Sized,
        S: AsRef<str>,
    {
        let context = normalize_context(context)?;
        let owner_ref = owner.owner_ref();
        let options = self.registry.options(&owner_ref.owner_type, context);

        let tags = self.resolve_in_input_order(raw_names, options)?;
        self.write(tagger, &owner_ref, context, options, &tags)?;
        self.tags_on(&owner_ref, context)
    }

    /// Resolves `raw_names` and, for ordered contexts, re-indexes the result
    /// against the input order. Duplicate tags keep their first occurrence.
    fn resolve_in_input_order<S: AsRef<str>>(
        &self,
        raw_names: &[S],
        options: ContextOptions,
    ) -> TaggableResult<Vec<Tag>> {
        let resolved = self
            .resolver
            .find_or_create_all(&self.repo, raw_names, options.scored)?;
        if !options.ordered {
            return Ok(resolved);
        }

        let mut seen = HashSet::new();
        let mut ordered = Vec::with_capacity(resolved.len());
        for item in self.resolver.prepare_names(raw_names, options.scored) {
            if let Some(tag) = self.resolver.find_match(&resolved, &item.name) {
                if seen.insert(tag.id) {
                    ordered.push(tag.clone());
                }
            }
        }
        Ok(ordered)
    }

    fn write(
        &mut self,
        tagger: Option<&OwnerRef>,
        owner: &OwnerRef,
        context: &str,
        options: ContextOptions,
        tags: &[Tag],
    ) -> TaggableResult<()> {
        let mut seen = HashSet::new();
        let writes: Vec<TaggingWrite> = tags
            .iter()
            .filter(|tag| seen.insert(tag.id))
            .enumerate()
            .map(|(index, tag)| TaggingWrite {
                tag_id: tag.id,
                position: options.ordered.then_some(index as i64),
                score: if options.scored { tag.score } else { None },
            })
            .collect();

        self.repo.reconcile_taggings(owner, context, tagger, &writes)?;
        info!(
            "event=tags_set module=service status=ok owner_type={} context={} tag_count={} ordered={} scored={}",
            owner.owner_type,
            context,
            writes.len(),
            options.ordered,
            options.scored
        );
        Ok(())
    }
}

fn normalize_context(context: &str) -> TaggableResult<&str> {
    let trimmed = context.trim();
    if trimmed.is_empty() {
        return Err(TaggableServiceError::InvalidContext(context.to_string()));
    }
    Ok(trimmed)
}
