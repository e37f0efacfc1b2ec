//! Infrastructure layer for Formsmith.
//!
//! Contains implementations of the collaborator traits defined in
//! `formsmith-core`: LLM providers (Anthropic, OpenAI-compatible, NDJSON),
//! the TOML config loader, the file-backed prompt template, and the JSON
//! file document store.

pub mod config;
pub mod fallback;
pub mod llm;
pub mod store;
pub mod template;
