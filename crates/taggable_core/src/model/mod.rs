//! Domain model for tags, taggings and owner references.
//!
//! # Responsibility
//! - Define canonical data structures used by the resolver and the facade.
//! - Own tag-name validation and case-folding rules.
//!
//! # Invariants
//! - Tag values compare by name, never by store identity.
//! - Tagging rows reference exactly one tag and one polymorphic owner.

pub mod tag;
pub mod tagging;
