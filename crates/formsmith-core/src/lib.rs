//! Generation pipeline and collaborator traits for Formsmith.
//!
//! This crate defines the "ports" (provider, template, and document store
//! traits) that the infrastructure layer implements. It depends only on
//! `formsmith-types` -- never on `formsmith-infra` or any network/IO crate.

pub mod fallback;
pub mod llm;
pub mod persistence;
pub mod pipeline;
pub mod service;
pub mod template;
