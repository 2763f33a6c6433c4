//! Batch summary
//!
//! Aggregates the per-document results of one run: documents per overall
//! status, per-field status counts, the flagged fields that need review,
//! and latency.
//!
//! Flagged fields are grouped into error categories: a signature or stamp
//! that needs review is a detection error, any other flagged field is an
//! extraction error. With ground truth attached, every mismatching field is
//! also counted as a matching error.

use super::evaluation::{Evaluation, GroundTruth};
use crate::types::{
    Confidence, DocumentResult, DocumentStatus, FieldName, FieldStatus, SourceId,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Error category of a flagged or mismatching field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Extraction,
    Matching,
    Detection,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 3] = [
        ErrorCategory::Extraction,
        ErrorCategory::Matching,
        ErrorCategory::Detection,
    ];

    /// Category of a field flagged by the gate
    pub fn of_flagged(field: FieldName) -> Self {
        if field.is_mark() {
            ErrorCategory::Detection
        } else {
            ErrorCategory::Extraction
        }
    }
}

/// A field that ended LOW_CONFIDENCE or MISSING
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlaggedField {
    pub document_id: String,
    pub field: FieldName,
    pub category: ErrorCategory,
    pub status: FieldStatus,
    pub confidence: Confidence,
    pub explanation: String,
}

/// Run-level report
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub engine_version: String,
    pub total_documents: usize,
    pub status_counts: BTreeMap<DocumentStatus, usize>,
    pub field_status_counts: BTreeMap<FieldName, BTreeMap<FieldStatus, usize>>,
    /// Mean confidence per field over documents where it was not MISSING
    pub mean_field_confidence: BTreeMap<FieldName, f64>,
    /// Documents per source for which that source produced nothing
    pub source_unavailable: BTreeMap<SourceId, usize>,
    pub dropped_candidates: usize,
    pub mean_latency_ms: Option<f64>,
    pub flagged: Vec<FlaggedField>,
    pub error_counts: BTreeMap<ErrorCategory, usize>,
    /// Present when the run was scored against ground truth
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<Evaluation>,
}

impl BatchSummary {
    pub fn from_results(results: &[DocumentResult]) -> Self {
        let mut status_counts: BTreeMap<DocumentStatus, usize> = BTreeMap::new();
        let mut field_status_counts: BTreeMap<FieldName, BTreeMap<FieldStatus, usize>> =
            BTreeMap::new();
        let mut confidence_sums: BTreeMap<FieldName, (f64, usize)> = BTreeMap::new();
        let mut source_unavailable: BTreeMap<SourceId, usize> = BTreeMap::new();
        let mut dropped_candidates = 0;
        let mut latencies = Vec::new();
        let mut flagged = Vec::new();

        for result in results {
            *status_counts.entry(result.overall_status).or_default() += 1;

            for field in result.fields.values() {
                *field_status_counts
                    .entry(field.field_name)
                    .or_default()
                    .entry(field.status)
                    .or_default() += 1;

                if field.status != FieldStatus::Missing {
                    let sum = confidence_sums.entry(field.field_name).or_default();
                    sum.0 += f64::from(field.confidence);
                    sum.1 += 1;
                }

                if field.status != FieldStatus::Accepted {
                    flagged.push(FlaggedField {
                        document_id: result.document_id.clone(),
                        field: field.field_name,
                        category: ErrorCategory::of_flagged(field.field_name),
                        status: field.status,
                        confidence: field.confidence,
                        explanation: field.explanation.clone(),
                    });
                }
            }

            let metadata = &result.processing_metadata;
            for (source, available) in &metadata.source_availability {
                if !available {
                    *source_unavailable.entry(*source).or_default() += 1;
                }
            }
            dropped_candidates += metadata.dropped_candidates;
            latencies.extend(metadata.latency_ms);
        }

        let mut error_counts: BTreeMap<ErrorCategory, usize> =
            ErrorCategory::ALL.iter().map(|c| (*c, 0)).collect();
        for flagged_field in &flagged {
            *error_counts.entry(flagged_field.category).or_default() += 1;
        }

        let mean_latency_ms = (!latencies.is_empty())
            .then(|| latencies.iter().map(|&ms| ms as f64).sum::<f64>() / latencies.len() as f64);

        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            engine_version: crate::ENGINE_VERSION.to_string(),
            total_documents: results.len(),
            status_counts,
            field_status_counts,
            mean_field_confidence: confidence_sums
                .into_iter()
                .map(|(field, (sum, n))| (field, sum / n as f64))
                .collect(),
            source_unavailable,
            dropped_candidates,
            mean_latency_ms,
            flagged,
            error_counts,
            evaluation: None,
        }
    }

    /// Score `results` against ground truth; mismatches count as matching errors
    pub fn with_ground_truth(mut self, results: &[DocumentResult], truth: &GroundTruth) -> Self {
        let evaluation = Evaluation::compute(results, truth);
        *self.error_counts.entry(ErrorCategory::Matching).or_default() +=
            evaluation.mismatches.len();
        self.evaluation = Some(evaluation);
        self
    }

    pub fn error_count(&self, category: ErrorCategory) -> usize {
        self.error_counts.get(&category).copied().unwrap_or(0)
    }

    /// Fraction of labelled documents whose every labelled field matched
    pub fn document_accuracy(&self) -> Option<f64> {
        self.evaluation.as_ref().map(|e| e.document_accuracy)
    }

    pub fn count(&self, status: DocumentStatus) -> usize {
        self.status_counts.get(&status).copied().unwrap_or(0)
    }

    /// Fraction of documents that passed the gate
    pub fn pass_rate(&self) -> f64 {
        if self.total_documents == 0 {
            return 0.0;
        }
        self.count(DocumentStatus::Pass) as f64 / self.total_documents as f64
    }
}
