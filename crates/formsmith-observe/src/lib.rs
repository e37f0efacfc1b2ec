//! Observability for Formsmith: tracing subscriber setup and shared
//! span/attribute names.

pub mod attrs;
pub mod tracing_setup;
