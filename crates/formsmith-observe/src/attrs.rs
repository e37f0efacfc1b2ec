//! Span names and attribute values shared by the Formsmith binaries.
//!
//! Field names follow the OpenTelemetry GenAI semantic conventions
//! (`gen_ai.operation.name`, `gen_ai.provider.name`, ...) and are written
//! inline in `tracing` macros; the constants here are the values.

/// Service name reported to OpenTelemetry.
pub const SERVICE_NAME: &str = "formsmith";

// --- Span names ---

/// One CLI command invocation.
pub const SPAN_COMMAND: &str = "fsmith.command";

// --- Operation name values ---

/// Full cascade run for one request.
pub const OP_GENERATE: &str = "generate_document";

/// Offline repair of a saved raw response.
pub const OP_REPAIR: &str = "repair_response";

/// Provider listing and connectivity checks.
pub const OP_PROVIDERS: &str = "list_providers";
