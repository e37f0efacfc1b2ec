//! LLM provider abstractions for Formsmith.
//!
//! - `LlmProvider`: RPITIT trait for concrete provider implementations
//! - `BoxLlmProvider`: Object-safe wrapper for dynamic dispatch
//! - `ProviderRegistry`: name-indexed lookup used by the cascade

pub mod box_provider;
pub mod provider;
pub mod registry;

#[cfg(test)]
pub(crate) mod mock;
