//! docai-extract library interface
//!
//! Multi-source invoice field reconciliation. Candidates from OCR, VLM and
//! detector collaborators are normalized, matched against reference lists,
//! reconciled per field, gated, and assembled into one `DocumentResult` per
//! document.
//!
//! Exposes public APIs for the binary and integration tests.

pub mod config;
pub mod error;
pub mod extractors; // Tier 1: collaborator traits + candidate harvesting
pub mod fusion; // Tier 2: normalization, reference matching, reconciliation
pub mod output;
pub mod types;
pub mod validators; // Tier 3: confidence gate
pub mod workflow; // Per-document pipeline and batch runner

pub use crate::config::ReconcileConfig;
pub use crate::error::{ExtractError, ExtractResult};
pub use crate::workflow::{DocumentCandidates, Reconciler};

/// Engine version recorded in processing metadata
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
