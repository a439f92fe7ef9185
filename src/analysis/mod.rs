// =============================================================================
// Analysis pipeline: indicator snapshots -> fingerprint cache -> prompts ->
// concurrent generation.
// =============================================================================

pub mod cache;
pub mod orchestrator;
pub mod prompts;
pub mod snapshot;
