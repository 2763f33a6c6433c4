//! Tier 2 Fusion Layer
//!
//! Turns harvested candidates into one reconciled value per field.
//!
//! # Components
//! 1. **normalizer** - Canonicalize raw strings and numbers
//! 2. **reference** - Dealer/model reference lists and matching
//! 3. **field_reconciler** - Per-field trust policies (`PolicyTable`)
//! 4. **geometry** - Signature/stamp box merging

pub mod field_reconciler;
pub mod geometry;
pub mod normalizer;
pub mod reference;

// Re-exports for convenience
pub use field_reconciler::{FieldPolicy, PolicyTable, ReconcileContext};
pub use normalizer::normalize;
pub use reference::{ReferenceEntry, ReferenceKind, ReferenceList, ReferenceStore};
