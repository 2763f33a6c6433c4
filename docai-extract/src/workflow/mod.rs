//! Per-document workflow
//!
//! Implements the processing chain for one document:
//! 1. Collect collaborator output and harvest raw candidates (`pipeline`)
//! 2. Normalize candidates, dropping unparsable ones
//! 3. Reconcile each schema field with its policy
//! 4. Gate the fields and assemble the `DocumentResult` (`assembler`)
//!
//! Steps 2-4 are pure: `Reconciler::reconcile_document` reads only its input,
//! the configuration and the shared reference lists, so re-running it on the
//! same candidates yields the same result.
//!
//! Batches run documents concurrently with bounded parallelism (`batch`) and
//! are summarised, optionally against ground truth (`summary`, `evaluation`).

pub mod assembler;
pub mod batch;
pub mod evaluation;
pub mod pipeline;
pub mod summary;

use crate::config::ReconcileConfig;
use crate::error::{ExtractError, ExtractResult};
use crate::fusion::{normalize, PolicyTable, ReconcileContext, ReferenceStore};
use crate::types::{
    DocumentResult, DocumentStatus, FieldName, FieldStatus, ProcessingMetadata, RawCandidate,
    ReconciledField, SourceCandidates, SourceId,
};
use crate::validators::ConfidenceGate;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

// Re-exports for convenience
pub use batch::run_batch;
pub use evaluation::{Evaluation, GroundTruth};
pub use pipeline::{Collaborators, Pipeline};
pub use summary::{BatchSummary, ErrorCategory};

/// Harvested candidates for one document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentCandidates {
    pub document_id: String,
    pub candidates: Vec<RawCandidate>,
    /// Which extraction sources produced output for this document
    pub source_availability: BTreeMap<SourceId, bool>,
}

impl DocumentCandidates {
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            ..Self::default()
        }
    }

    pub fn with_candidates(mut self, candidates: impl IntoIterator<Item = RawCandidate>) -> Self {
        self.candidates.extend(candidates);
        self
    }
}

/// Progress events emitted by the pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    DocumentStarted {
        document_id: String,
    },
    DocumentCompleted {
        document_id: String,
        status: DocumentStatus,
        latency_ms: u64,
    },
}

/// Pure reconciliation core shared by all documents of a run
pub struct Reconciler {
    config: Arc<ReconcileConfig>,
    references: Arc<ReferenceStore>,
    policies: PolicyTable,
    gate: ConfidenceGate,
}

impl Reconciler {
    /// Reconciler with the standard policy table
    pub fn new(config: Arc<ReconcileConfig>, references: Arc<ReferenceStore>) -> ExtractResult<Self> {
        Self::with_policies(config, references, PolicyTable::standard())
    }

    /// Fails with `InvalidConfiguration` when the configuration is invalid or
    /// a schema field has no policy
    pub fn with_policies(
        config: Arc<ReconcileConfig>,
        references: Arc<ReferenceStore>,
        policies: PolicyTable,
    ) -> ExtractResult<Self> {
        config.validate()?;

        if let Some(field) = config.fields.iter().find(|f| !policies.contains(**f)) {
            return Err(ExtractError::InvalidConfiguration(format!(
                "no reconciliation policy for field {}",
                field
            )));
        }

        let gate = ConfidenceGate::new(&config);
        Ok(Self {
            config,
            references,
            policies,
            gate,
        })
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Reconcile one document. Never fails: data-quality problems end up as
    /// field status. `latency_ms` is left unset.
    pub fn reconcile_document(&self, input: &DocumentCandidates) -> DocumentResult {
        let document_id = input.document_id.as_str();
        let mut grouped: BTreeMap<FieldName, SourceCandidates> = BTreeMap::new();
        let mut dropped = 0;

        for raw in &input.candidates {
            if !self.config.fields.contains(&raw.field_name) {
                debug!(document_id, field = %raw.field_name, "Ignoring candidate outside schema");
                continue;
            }
            match normalize(raw, &self.config) {
                Ok(candidate) => grouped
                    .entry(candidate.field_name)
                    .or_default()
                    .entry(candidate.source_id)
                    .or_default()
                    .push(candidate),
                Err(e) => {
                    warn!(document_id, error = %e, "Dropping unparsable candidate");
                    dropped += 1;
                }
            }
        }

        let ctx = ReconcileContext {
            config: &self.config,
            references: &self.references,
        };
        let no_candidates = SourceCandidates::new();

        let fields: BTreeMap<FieldName, ReconciledField> = self
            .config
            .fields
            .iter()
            .map(|&field| {
                let inputs = grouped.get(&field).unwrap_or(&no_candidates);
                let reconciled = match self.policies.get(field) {
                    Some(policy) => {
                        let reconciled = policy.reconcile(field, inputs, &ctx);
                        debug!(
                            document_id,
                            field = %field,
                            policy = policy.name(),
                            status = %reconciled.status,
                            confidence = reconciled.confidence,
                            "{}",
                            reconciled.explanation
                        );
                        reconciled
                    }
                    None => ReconciledField::missing(field, "No reconciliation policy"),
                };
                (field, reconciled)
            })
            .collect();

        let outcome = self.gate.evaluate(fields);
        for field in outcome.fields.values() {
            if field.status != FieldStatus::Accepted {
                warn!(
                    document_id,
                    field = %field.field_name,
                    status = %field.status,
                    confidence = field.confidence,
                    "Field flagged for review"
                );
            }
        }

        let mut source_availability = input.source_availability.clone();
        source_availability.insert(SourceId::Reference, true);

        let metadata = ProcessingMetadata {
            latency_ms: None,
            source_availability,
            candidate_count: input.candidates.len(),
            dropped_candidates: dropped,
            flagged_fields: Vec::new(),
            engine_version: crate::ENGINE_VERSION.to_string(),
        };

        assembler::assemble(document_id, outcome, metadata)
    }
}
