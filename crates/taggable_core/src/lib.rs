//! Multi-context tagging core.
//!
//! Owners of any type are tagged per named context. The crate resolves raw
//! strings to persisted tags, records per-owner-type context options, and
//! reconciles linkage rows through repository traits backed by SQLite.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod registry;
pub mod repo;
pub mod resolver;
pub mod service;

pub use config::{ConfigError, TaggingConfig, DEFAULT_CONTEXT};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::tag::{
    fold_name, validate_tag_name, CaseMatch, Tag, TagId, TagValidationError, MAX_TAG_NAME_CHARS,
};
pub use model::tagging::{OwnerRef, Taggable, Tagging, TaggingWrite};
pub use registry::capability::{
    parse_tagging_capability, CapabilityError, ContextOptions, TaggingCapability,
};
pub use registry::{ContextRegistry, ContextRegistryError};
pub use repo::tag_repo::{RepoError, RepoResult, SqliteTagRepository, TagRepository};
pub use repo::tagging_repo::TaggingRepository;
pub use resolver::scored::{parse_scored, split_if_scored, ScoredName};
pub use resolver::{ResolveError, ResolveResult, TagResolver};
pub use service::taggable_service::{TaggableResult, TaggableService, TaggableServiceError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
