// =============================================================================
// HTTP read surface
// =============================================================================

pub mod rest;

pub use rest::build_router;
