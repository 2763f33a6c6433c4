//! Result assembly
//!
//! Packages gated fields and processing metadata into the terminal
//! `DocumentResult`. Pure aggregation: every decision was already made by
//! the policies and the gate.

use crate::types::{DocumentResult, ProcessingMetadata};
use crate::validators::GateOutcome;

/// Build the per-document result. `metadata.flagged_fields` is overwritten
/// with the gate's flagged list.
pub fn assemble(
    document_id: &str,
    outcome: GateOutcome,
    mut metadata: ProcessingMetadata,
) -> DocumentResult {
    metadata.flagged_fields = outcome.flagged_fields;
    if metadata.engine_version.is_empty() {
        metadata.engine_version = crate::ENGINE_VERSION.to_string();
    }

    DocumentResult {
        document_id: document_id.to_string(),
        fields: outcome.fields,
        overall_status: outcome.overall_status,
        processing_metadata: metadata,
    }
}
