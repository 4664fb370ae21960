// =============================================================================
// Signal fusion
// =============================================================================

pub mod engine;

pub use engine::{CompositeSignal, DimensionScore, FusionEngine};
