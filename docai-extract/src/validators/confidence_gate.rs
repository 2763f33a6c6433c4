//! Confidence Gate (Tier 3 Validator)
//!
//! Applies per-field acceptance thresholds and decides the document status.
//!
//! # Gate Rules
//! 1. An ACCEPTED field below its threshold is replaced by a LOW_CONFIDENCE copy
//! 2. FAIL if any required field is MISSING
//! 3. REVIEW if any field is LOW_CONFIDENCE
//! 4. PASS otherwise
//!
//! Thresholds and the required set come from `ReconcileConfig`, so they can
//! be retuned without code changes.

use crate::config::ReconcileConfig;
use crate::types::{DocumentStatus, FieldName, FieldStatus, ReconciledField};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Gate decision for one document
#[derive(Debug, Clone, PartialEq)]
pub struct GateOutcome {
    /// Fields after threshold demotion
    pub fields: BTreeMap<FieldName, ReconciledField>,
    pub overall_status: DocumentStatus,
    /// Fields that ended LOW_CONFIDENCE or MISSING
    pub flagged_fields: Vec<FieldName>,
}

/// Confidence Gate
pub struct ConfidenceGate {
    thresholds: BTreeMap<FieldName, f32>,
    required: BTreeSet<FieldName>,
}

impl ConfidenceGate {
    pub fn new(config: &ReconcileConfig) -> Self {
        Self {
            thresholds: config
                .fields
                .iter()
                .map(|f| (*f, config.threshold(*f)))
                .collect(),
            required: config.required.clone(),
        }
    }

    fn threshold(&self, field: FieldName) -> f32 {
        self.thresholds.get(&field).copied().unwrap_or(0.0)
    }

    /// Demote below-threshold fields, then compute the document status
    pub fn evaluate(&self, fields: BTreeMap<FieldName, ReconciledField>) -> GateOutcome {
        let fields: BTreeMap<FieldName, ReconciledField> = fields
            .into_iter()
            .map(|(name, field)| {
                let threshold = self.threshold(name);
                if field.status == FieldStatus::Accepted && field.confidence < threshold {
                    debug!(
                        field = %name,
                        confidence = field.confidence,
                        threshold,
                        "Demoting field below acceptance threshold"
                    );
                    let note = format!(
                        "confidence {:.2} below threshold {:.2}",
                        field.confidence, threshold
                    );
                    (name, field.demoted(FieldStatus::LowConfidence, &note))
                } else {
                    (name, field)
                }
            })
            .collect();

        let missing_required = self.required.iter().any(|name| {
            fields
                .get(name)
                .map_or(true, |f| f.status == FieldStatus::Missing)
        });
        let any_low = fields
            .values()
            .any(|f| f.status == FieldStatus::LowConfidence);

        let overall_status = if missing_required {
            DocumentStatus::Fail
        } else if any_low {
            DocumentStatus::Review
        } else {
            DocumentStatus::Pass
        };

        let flagged_fields = fields
            .values()
            .filter(|f| f.status != FieldStatus::Accepted)
            .map(|f| f.field_name)
            .collect();

        GateOutcome {
            fields,
            overall_status,
            flagged_fields,
        }
    }
}
