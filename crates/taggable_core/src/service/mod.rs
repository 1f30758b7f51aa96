//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate the resolver, the context registry and repository calls
//!   into per-owner tagging APIs.
//! - Keep callers decoupled from storage details.

pub mod taggable_service;
