//! Persistence contracts for tags and taggings, plus the SQLite store.
//!
//! # Responsibility
//! - Define the store interface the resolver and facade depend on.
//! - Isolate SQL details from resolution and reconciliation logic.
//!
//! # Invariants
//! - Tag creation reports name-uniqueness violations as `RepoError::Conflict`,
//!   never as a raw SQLite error.
//! - Batched lookups issue one query regardless of list length.
//! - Usage counters are maintained by the store, never by callers.

pub mod tag_repo;
pub mod tagging_repo;
