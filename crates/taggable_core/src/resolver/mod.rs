//! Tag resolution engine.
//!
//! # Responsibility
//! - Turn raw user strings into persisted tags under the configured case
//!   policy, creating the missing ones.
//! - Parse `name:<digits>` scores for scored contexts.
//!
//! # Invariants
//! - Every name is validated before the store is touched.
//! - One batched existence check runs before any creation in a batch.
//! - New names equal under the case policy are created once per batch.
//! - A creation conflict is recovered by re-fetching the winning row.
//! - Scores are attached to returned values only, never to tag rows.

pub mod scored;

use crate::config::TaggingConfig;
use crate::model::tag::{validate_tag_name, CaseMatch, Tag, TagValidationError};
use crate::repo::tag_repo::{RepoError, TagRepository};
use log::{info, warn};
use scored::{split_if_scored, ScoredName};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ResolveResult<T> = Result<T, ResolveError>;

#[derive(Debug)]
pub enum ResolveError {
    /// A requested name failed validation; nothing was created.
    InvalidName {
        name: String,
        source: TagValidationError,
    },
    /// Creation conflicted and the winning row could not be re-fetched.
    Conflict(String),
    Repo(RepoError),
}

impl Display for ResolveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName { name, source } => write!(f, "invalid tag `{name}`: {source}"),
            Self::Conflict(name) => write!(f, "tag `{name}` conflicted and vanished on re-fetch"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ResolveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidName { source, .. } => Some(source),
            Self::Conflict(_) => None,
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for ResolveError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Find-or-create resolver bound to one case policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagResolver {
    case_match: CaseMatch,
}

impl TagResolver {
    pub fn new(case_match: CaseMatch) -> Self {
        Self { case_match }
    }

    pub fn from_config(config: &TaggingConfig) -> Self {
        Self::new(config.case_match())
    }

    pub fn case_match(&self) -> CaseMatch {
        self.case_match
    }

    /// Trims each raw input and splits scores when `scored` is set.
    pub fn prepare_names<S: AsRef<str>>(&self, raws: &[S], scored: bool) -> Vec<ScoredName> {
        raws.iter()
            .map(|raw| {
                let mut parsed = split_if_scored(raw.as_ref().trim(), scored);
                parsed.name = parsed.name.trim().to_string();
                parsed
            })
            .collect()
    }

    /// Resolves one raw name.
    ///
    /// Strict mode goes through the batch path. Loose mode tries a case-folded
    /// exact lookup, then a substring lookup, then creates.
    pub fn find_or_create_one<R: TagRepository + ?Sized>(
        &self,
        repo: &R,
        raw: &str,
        scored: bool,
    ) -> ResolveResult<Tag> {
        if self.case_match == CaseMatch::Strict {
            return self
                .find_or_create_all(repo, &[raw], scored)?
                .into_iter()
                .next()
                .ok_or_else(|| ResolveError::Conflict(raw.trim().to_string()));
        }

        let ScoredName { name, score } = self
            .prepare_names(&[raw], scored)
            .pop()
            .unwrap_or_else(|| ScoredName::plain(raw));
        validate(&name)?;

        let exact = repo.find_tags_by_names_case_insensitive(std::slice::from_ref(&name))?;
        let tag = match exact.into_iter().next() {
            Some(tag) => tag,
            None => match repo.find_tags_by_name_substring(&name)?.into_iter().next() {
                Some(tag) => tag,
                None => self.create_or_refetch(repo, &name)?,
            },
        };
        Ok(tag.with_score(score))
    }

    /// Resolves a batch of raw names.
    ///
    /// Returns existing matches followed by newly created tags, one entry per
    /// distinct name under the case policy. Callers needing input order must
    /// re-index by name.
    pub fn find_or_create_all<R: TagRepository + ?Sized, S: AsRef<str>>(
        &self,
        repo: &R,
        raws: &[S],
        scored: bool,
    ) -> ResolveResult<Vec<Tag>> {
        if raws.is_empty() {
            return Ok(Vec::new());
        }

        let requested = self.prepare_names(raws, scored);
        for item in &requested {
            validate(&item.name)?;
        }

        let scores: HashMap<String, Option<i64>> = if scored {
            requested
                .iter()
                .map(|item| (self.case_match.comparable(&item.name), item.score))
                .collect()
        } else {
            HashMap::new()
        };
        let names: Vec<String> = requested.into_iter().map(|item| item.name).collect();

        let existing = self.dedupe_existing(repo.find_tags_by_names(&names, self.case_match)?);
        let mut seen: HashSet<String> = existing
            .iter()
            .map(|tag| self.case_match.comparable(&tag.name))
            .collect();

        let mut resolved = existing;
        for name in &names {
            if seen.insert(self.case_match.comparable(name)) {
                resolved.push(self.create_or_refetch(repo, name)?);
            }
        }

        if scored {
            for tag in &mut resolved {
                tag.score = scores
                    .get(&self.case_match.comparable(&tag.name))
                    .copied()
                    .flatten();
            }
        }

        Ok(resolved)
    }

    /// Returns the tag in `tags` matching `name` under the case policy.
    pub fn find_match<'a>(&self, tags: &'a [Tag], name: &str) -> Option<&'a Tag> {
        tags.iter()
            .find(|tag| tag.name == name)
            .or_else(|| tags.iter().find(|tag| self.case_match.matches(&tag.name, name)))
    }

    fn create_or_refetch<R: TagRepository + ?Sized>(
        &self,
        repo: &R,
        name: &str,
    ) -> ResolveResult<Tag> {
        match repo.create_tag(name, self.case_match) {
            Ok(tag) => Ok(tag),
            Err(RepoError::Conflict(_)) => {
                let winner = repo
                    .find_tags_by_names(&[name.to_string()], self.case_match)?
                    .into_iter()
                    .next();
                match winner {
                    Some(tag) => {
                        info!(
                            "event=tag_conflict_recovered module=resolver status=ok tag_id={} case_match={}",
                            tag.id,
                            self.case_match.as_str()
                        );
                        Ok(tag)
                    }
                    None => {
                        warn!(
                            "event=tag_conflict_recovered module=resolver status=error case_match={}",
                            self.case_match.as_str()
                        );
                        Err(ResolveError::Conflict(name.to_string()))
                    }
                }
            }
            Err(RepoError::Validation(source)) => Err(ResolveError::InvalidName {
                name: name.to_string(),
                source,
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Keeps the first row per comparable name; extra rows are a
    /// data-integrity problem in the store and are only logged.
    fn dedupe_existing(&self, tags: Vec<Tag>) -> Vec<Tag> {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(tags.len());
        for tag in tags {
            if seen.insert(self.case_match.comparable(&tag.name)) {
                unique.push(tag);
            } else {
                warn!(
                    "event=tag_lookup_ambiguous module=resolver status=warn tag_id={} case_match={}",
                    tag.id,
                    self.case_match.as_str()
                );
            }
        }
        unique
    }
}

fn validate(name: &str) -> ResolveResult<()> {
    validate_tag_name(name).map_err(|source| ResolveError::InvalidName {
        name: name.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::{ResolveError, TagResolver};
    use crate::model::tag::{fold_name, CaseMatch, Tag, TagId};
    use crate::repo::tag_repo::{RepoError, RepoResult, TagRepository};
    use std::cell::{Cell, RefCell};

    /// In-memory store. `race_on_create` simulates another writer winning the
    /// insert: the row appears, but the caller gets a conflict.
    #[derive(Default)]
    struct MemoryTagStore {
        tags: RefCell<Vec<Tag>>,
        lookups: Cell<usize>,
        creates: Cell<usize>,
        race_on_create: Cell<bool>,
        lose_row_on_race: Cell<bool>,
    }

    impl MemoryTagStore {
        fn with_tags(names: &[&str]) -> Self {
            let store = Self::default();
            for name in names {
                store.insert(name);
            }
            store
        }

        fn insert(&self, name: &str) -> Tag {
            let mut tags = self.tags.borrow_mut();
            let tag = Tag::new(tags.len() as TagId + 1, name);
            tags.push(tag.clone());
            tag
        }

        fn names(&self) -> Vec<String> {
            self.tags.borrow().iter().map(|tag| tag.name.clone()).collect()
        }
    }

    impl TagRepository for MemoryTagStore {
        fn find_tags_by_names_exact(&self, names: &[String]) -> RepoResult<Vec<Tag>> {
            self.lookups.set(self.lookups.get() + 1);
            Ok(self
                .tags
                .borrow()
                .iter()
                .filter(|tag| names.contains(&tag.name))
                .cloned()
                .collect())
        }

        fn find_tags_by_names_case_insensitive(&self, names: &[String]) -> RepoResult<Vec<Tag>> {
            self.lookups.set(self.lookups.get() + 1);
            let folded: Vec<String> = names.iter().map(|name| fold_name(name)).collect();
            Ok(self
                .tags
                .borrow()
                .iter()
                .filter(|tag| folded.contains(&fold_name(&tag.name)))
                .cloned()
                .collect())
        }

        fn find_tags_by_name_substring(&self, pattern: &str) -> RepoResult<Vec<Tag>> {
            let pattern = fold_name(pattern);
            Ok(self
                .tags
                .borrow()
                .iter()
                .filter(|tag| fold_name(&tag.name).contains(&pattern))
                .cloned()
                .collect())
        }

        fn create_tag(&self, name: &str, unique_by: CaseMatch) -> RepoResult<Tag> {
            self.creates.set(self.creates.get() + 1);
            if self.race_on_create.get() {
                if !self.lose_row_on_race.get() {
                    self.insert(name);
                }
                return Err(RepoError::Conflict(name.to_string()));
            }
            let taken = self
                .tags
                .borrow()
                .iter()
                .any(|tag| unique_by.matches(&tag.name, name));
            if taken {
                return Err(RepoError::Conflict(name.to_string()));
            }
            Ok(self.insert(name))
        }

        fn get_tag(&self, id: TagId) -> RepoResult<Option<Tag>> {
            Ok(self.tags.borrow().iter().find(|tag| tag.id == id).cloned())
        }

        fn delete_tag(&self, id: TagId) -> RepoResult<()> {
            self.tags.borrow_mut().retain(|tag| tag.id != id);
            Ok(())
        }

        fn list_tags(&self) -> RepoResult<Vec<Tag>> {
            Ok(self.tags.borrow().clone())
        }
    }

    fn names_of(tags: &[Tag]) -> Vec<&str> {
        tags.iter().map(|tag| tag.name.as_str()).collect()
    }

    #[test]
    fn empty_batch_never_touches_the_store() {
        let store = MemoryTagStore::default();
        let resolved = TagResolver::new(CaseMatch::Loose)
            .find_or_create_all::<_, &str>(&store, &[], false)
            .expect("empty batch should resolve");
        assert!(resolved.is_empty());
        assert_eq!(store.lookups.get(), 0);
        assert_eq!(store.creates.get(), 0);
    }

    #[test]
    fn batch_uses_one_lookup_and_creates_duplicates_once() {
        let store = MemoryTagStore::default();
        let resolved = TagResolver::new(CaseMatch::Strict)
            .find_or_create_all(&store, &["a", "b", "a"], false)
            .expect("batch should resolve");
        assert_eq!(names_of(&resolved), vec!["a", "b"]);
        assert_eq!(store.names(), vec!["a", "b"]);
        assert_eq!(store.lookups.get(), 1);
        assert_eq!(store.creates.get(), 2);
    }

    #[test]
    fn existing_tags_come_before_created_ones() {
        let store = MemoryTagStore::with_tags(&["drama"]);
        let resolved = TagResolver::new(CaseMatch::Loose)
            .find_or_create_all(&store, &["scifi", "DRAMA"], false)
            .expect("batch should resolve");
        assert_eq!(names_of(&resolved), vec!["drama", "scifi"]);
    }

    #[test]
    fn loose_batch_collapses_case_variants_of_new_names() {
        let store = MemoryTagStore::default();
        let resolved = TagResolver::new(CaseMatch::Loose)
            .find_or_create_all(&store, &["Rust", "rust", "RUST"], false)
            .expect("batch should resolve");
        assert_eq!(names_of(&resolved), vec!["Rust"]);
        assert_eq!(store.creates.get(), 1);
    }

    #[test]
    fn scores_attach_by_policy_aware_name_with_last_write_winning() {
        let store = MemoryTagStore::with_tags(&["Focus"]);
        let resolved = TagResolver::new(CaseMatch::Loose)
            .find_or_create_all(&store, &["focus:1", "calm:3", "FOCUS:9"], true)
            .expect("scored batch should resolve");
        assert_eq!(names_of(&resolved), vec!["Focus", "calm"]);
        assert_eq!(resolved[0].score, Some(9));
        assert_eq!(resolved[1].score, Some(3));
        assert!(store.tags.borrow().iter().all(|tag| tag.score.is_none()));
    }

    #[test]
    fn invalid_names_fail_before_any_store_access() {
        let store = MemoryTagStore::default();
        let err = TagResolver::new(CaseMatch::Loose)
            .find_or_create_all(&store, &["ok", "   "], false)
            .expect_err("blank name must fail");
        assert!(matches!(err, ResolveError::InvalidName { .. }));
        assert_eq!(store.lookups.get(), 0);
        assert_eq!(store.creates.get(), 0);

        let long = "n".repeat(256);
        let err = TagResolver::new(CaseMatch::Strict)
            .find_or_create_one(&store, &long, false)
            .expect_err("overlong name must fail");
        assert!(matches!(err, ResolveError::InvalidName { .. }));
    }

    #[test]
    fn conflict_on_create_is_recovered_by_refetch() {
        let store = MemoryTagStore::default();
        store.race_on_create.set(true);
        let resolver = TagResolver::new(CaseMatch::Strict);

        let resolved = resolver
            .find_or_create_all(&store, &["contested"], false)
            .expect("conflict should be recovered");
        assert_eq!(names_of(&resolved), vec!["contested"]);
        assert_eq!(store.names(), vec!["contested"]);
    }

    #[test]
    fn conflict_without_winner_propagates() {
        let store = MemoryTagStore::default();
        store.race_on_create.set(true);
        store.lose_row_on_race.set(true);

        let err = TagResolver::new(CaseMatch::Loose)
            .find_or_create_one(&store, "ghost", false)
            .expect_err("conflict without a row must propagate");
        assert!(matches!(err, ResolveError::Conflict(name) if name == "ghost"));
    }

    #[test]
    fn strict_mode_keeps_case_variants_apart() {
        let store = MemoryTagStore::default();
        let resolver = TagResolver::new(CaseMatch::Strict);
        let upper = resolver.find_or_create_one(&store, "Ruby", false).expect("Ruby");
        let lower = resolver.find_or_create_one(&store, "ruby", false).expect("ruby");
        assert_ne!(upper.id, lower.id);
        assert_eq!(store.names(), vec!["Ruby", "ruby"]);
    }

    #[test]
    fn loose_single_lookup_prefers_exact_then_substring() {
        let store = MemoryTagStore::with_tags(&["rubygems", "Ruby"]);
        let resolver = TagResolver::new(CaseMatch::Loose);

        let exact = resolver.find_or_create_one(&store, "ruby", false).expect("ruby");
        assert_eq!(exact.name, "Ruby");

        let partial = resolver.find_or_create_one(&store, "gems:4", true).expect("gems");
        assert_eq!(partial.name, "rubygems");
        assert_eq!(partial.score, Some(4));
        assert_eq!(store.creates.get(), 0);
    }

    #[test]
    fn find_match_prefers_exact_name() {
        let resolver = TagResolver::new(CaseMatch::Loose);
        let tags = vec![Tag::new(1, "Go"), Tag::new(2, "go")];
        assert_eq!(resolver.find_match(&tags, "go").map(|tag| tag.id), Some(2));
        assert_eq!(resolver.find_match(&tags, "GO").map(|tag| tag.id), Some(1));
        assert!(resolver.find_match(&tags, "rust").is_none());
    }
}
