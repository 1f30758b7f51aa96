//! Tagging (linkage) model and owner references.

use crate::model::tag::TagId;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Polymorphic reference to a tagged owner or to a tagger.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OwnerRef {
    pub owner_type: String,
    pub owner_id: String,
}

impl OwnerRef {
    pub fn new(owner_type: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            owner_type: owner_type.into(),
            owner_id: owner_id.into(),
        }
    }
}

impl Display for OwnerRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.owner_type, self.owner_id)
    }
}

/// Entity that can carry tags.
///
/// `owner_type` keys the context registry; `owner_id` is stored verbatim on
/// tagging rows.
pub trait Taggable {
    fn owner_type(&self) -> &str;
    fn owner_id(&self) -> String;

    fn owner_ref(&self) -> OwnerRef {
        OwnerRef::new(self.owner_type(), self.owner_id())
    }
}

impl Taggable for OwnerRef {
    fn owner_type(&self) -> &str {
        &self.owner_type
    }

    fn owner_id(&self) -> String {
        self.owner_id.clone()
    }

    fn owner_ref(&self) -> OwnerRef {
        self.clone()
    }
}

/// Persisted link between one tag and one owner in one context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tagging {
    pub id: i64,
    pub tag_id: TagId,
    pub owner: OwnerRef,
    pub context: String,
    pub tagger: Option<OwnerRef>,
    /// Meaningful only for ordered contexts.
    pub position: Option<i64>,
    /// Meaningful only for scored contexts.
    pub score: Option<i64>,
    /// Epoch milliseconds.
    pub created_at: i64,
}

/// Desired state of one link, written by `TaggingRepository::upsert_taggings`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaggingWrite {
    pub tag_id: TagId,
    pub position: Option<i64>,
    pub score: Option<i64>,
}
