//! Tier 3 Validation Layer
//!
//! # Validators
//! 1. **confidence_gate** - Per-field thresholds and document status

pub mod confidence_gate;

// Re-exports for convenience
pub use confidence_gate::{ConfidenceGate, GateOutcome};
