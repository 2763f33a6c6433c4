//! Ground-truth evaluation
//!
//! Compares reconciled documents against hand-labelled values and reports
//! per-field mismatches, per-field accuracy and document-level accuracy.
//!
//! Ground truth is a JSON array, one entry per labelled document:
//!
//! ```json
//! [
//!   {"doc_id": "inv-0001",
//!    "fields": {"dealer_name": "ABC Tractors Pvt Ltd", "horse_power": 45,
//!               "asset_cost": "6.5 lakh", "dealer_stamp": {"present": true},
//!               "dealer_signature": true, "model_name": null}}
//! ]
//! ```
//!
//! Only the fields listed for a document are scored; `null` expects the
//! field to have no value.

use crate::error::{ExtractError, ExtractResult};
use crate::fusion::field_reconciler::relative_difference;
use crate::fusion::normalizer::{fold_text, parse_amount};
use crate::types::{Confidence, DocumentResult, FieldName, FieldValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Largest relative difference at which two numbers count as equal
const NUMBER_MATCH_EPSILON: f64 = 1e-9;

/// A labelled field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExpectedValue {
    Presence(bool),
    Number(f64),
    Text(String),
    Mark { present: bool },
}

#[derive(Debug, Clone, Deserialize)]
struct LabelledDocument {
    doc_id: String,
    #[serde(default)]
    fields: BTreeMap<FieldName, Option<ExpectedValue>>,
}

/// Labelled values keyed by document id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroundTruth {
    documents: BTreeMap<String, BTreeMap<FieldName, Option<ExpectedValue>>>,
}

impl GroundTruth {
    /// Parse a ground-truth JSON array; duplicate document ids are rejected
    pub fn from_json(input: &str) -> ExtractResult<Self> {
        let labelled: Vec<LabelledDocument> = serde_json::from_str(input)?;

        let mut documents = BTreeMap::new();
        for doc in labelled {
            if documents.contains_key(&doc.doc_id) {
                return Err(ExtractError::GroundTruth(format!(
                    "duplicate document {}",
                    doc.doc_id
                )));
            }
            documents.insert(doc.doc_id, doc.fields);
        }
        Ok(Self { documents })
    }

    pub fn load(path: &Path) -> ExtractResult<Self> {
        let truth = Self::from_json(&std::fs::read_to_string(path)?)?;
        info!(path = %path.display(), documents = truth.len(), "Loaded ground truth");
        Ok(truth)
    }

    pub fn get(&self, document_id: &str) -> Option<&BTreeMap<FieldName, Option<ExpectedValue>>> {
        self.documents.get(document_id)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Whether a reconciled value equals the labelled one.
///
/// Text compares folded; numbers compare numerically, a labelled string is
/// parsed as an amount first. Mark fields compare presence only, with no
/// value counting as absent.
pub fn value_matches(
    field: FieldName,
    expected: Option<&ExpectedValue>,
    actual: Option<&FieldValue>,
) -> bool {
    if field.is_mark() {
        let actual_present = matches!(actual, Some(FieldValue::Mark { present: true, .. }));
        return match expected {
            None => actual.is_none(),
            Some(ExpectedValue::Presence(present)) | Some(ExpectedValue::Mark { present }) => {
                *present == actual_present
            }
            Some(_) => false,
        };
    }

    let same_number = |a: f64, b: f64| relative_difference(a, b) <= NUMBER_MATCH_EPSILON;

    match (expected, actual) {
        (None, None) => true,
        (Some(ExpectedValue::Text(e)), Some(FieldValue::Text(a))) => fold_text(e) == fold_text(a),
        (Some(ExpectedValue::Number(e)), Some(FieldValue::Number(a))) => same_number(*e, *a),
        (Some(ExpectedValue::Text(e)), Some(FieldValue::Number(a))) => {
            parse_amount(e).is_some_and(|e| same_number(e, *a))
        }
        (Some(ExpectedValue::Number(e)), Some(FieldValue::Text(a))) => fold_text(a) == e.to_string(),
        _ => false,
    }
}

/// A reconciled value that differs from its label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldMismatch {
    pub document_id: String,
    pub field: FieldName,
    pub expected: Option<ExpectedValue>,
    pub actual: Option<FieldValue>,
    pub confidence: Confidence,
}

/// Accuracy of one run against ground truth
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub documents_evaluated: usize,
    /// Documents whose every labelled field matched
    pub documents_correct: usize,
    pub document_accuracy: f64,
    /// Matched / labelled, per field
    pub field_accuracy: BTreeMap<FieldName, f64>,
    pub mismatches: Vec<FieldMismatch>,
    /// Results with no ground-truth entry
    pub unlabelled_documents: Vec<String>,
}

impl Evaluation {
    pub fn compute(results: &[DocumentResult], truth: &GroundTruth) -> Self {
        let mut documents_evaluated = 0;
        let mut documents_correct = 0;
        let mut tallies: BTreeMap<FieldName, (usize, usize)> = BTreeMap::new();
        let mut mismatches = Vec::new();
        let mut unlabelled_documents = Vec::new();

        for result in results {
            let Some(expected) = truth.get(&result.document_id) else {
                unlabelled_documents.push(result.document_id.clone());
                continue;
            };
            documents_evaluated += 1;

            let mut all_match = true;
            for (field, expected_value) in expected {
                let reconciled = result.fields.get(field);
                let actual = reconciled.and_then(|f| f.final_value.as_ref());
                let tally = tallies.entry(*field).or_default();
                tally.1 += 1;

                if value_matches(*field, expected_value.as_ref(), actual) {
                    tally.0 += 1;
                } else {
                    all_match = false;
                    debug!(document_id = %result.document_id, %field, "Ground truth mismatch");
                    mismatches.push(FieldMismatch {
                        document_id: result.document_id.clone(),
                        field: *field,
                        expected: expected_value.clone(),
                        actual: actual.cloned(),
                        confidence: reconciled.map_or(0.0, |f| f.confidence),
                    });
                }
            }
            if all_match {
                documents_correct += 1;
            }
        }

        let ratio = |hits: usize, total: usize| {
            if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            }
        };

        Self {
            documents_evaluated,
            documents_correct,
            document_accuracy: ratio(documents_correct, documents_evaluated),
            field_accuracy: tallies
                .into_iter()
                .map(|(field, (hits, total))| (field, ratio(hits, total)))
                .collect(),
            mismatches,
            unlabelled_documents,
        }
    }
}
