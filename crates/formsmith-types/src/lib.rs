//! Shared domain types for Formsmith.
//!
//! This crate contains the types that cross crate boundaries in the
//! generation pipeline: requests and attempt logs, generated documents,
//! provider-neutral LLM types, configuration, and the error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod document;
pub mod error;
pub mod generation;
pub mod llm;
