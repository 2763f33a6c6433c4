//! Core Types for DocAI field reconciliation
//!
//! Data model shared by the three tiers:
//! - **Tier 1:** `RawCandidate` values produced from collaborator output
//! - **Tier 2:** `NormalizedCandidate` → `ReconciledField`
//! - **Tier 3:** gated fields → `DocumentResult`
//!
//! Candidates are immutable once built. A `ReconciledField` is never mutated
//! after creation; later stages build a replacement instead.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Confidence score (0.0-1.0)
pub type Confidence = f32;

/// Clamp a confidence into 0.0-1.0, mapping NaN to 0.0
pub fn clamp_confidence(value: f32) -> Confidence {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

// ============================================================================
// Sources and Fields
// ============================================================================

/// Independent extraction source that proposed a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceId {
    /// Text-layout extraction (OCR lines)
    Ocr,
    /// Semantic reading by a vision-language model
    Vlm,
    /// Visual object detector (signature / stamp)
    Detector,
    /// Reference-list matching
    Reference,
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceId::Ocr => write!(f, "OCR"),
            SourceId::Vlm => write!(f, "VLM"),
            SourceId::Detector => write!(f, "DETECTOR"),
            SourceId::Reference => write!(f, "REFERENCE"),
        }
    }
}

/// Output schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    DealerName,
    ModelName,
    HorsePower,
    AssetCost,
    DealerSignature,
    DealerStamp,
}

impl FieldName {
    /// All fields in output order
    pub const ALL: [FieldName; 6] = [
        FieldName::DealerName,
        FieldName::ModelName,
        FieldName::HorsePower,
        FieldName::AssetCost,
        FieldName::DealerSignature,
        FieldName::DealerStamp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::DealerName => "dealer_name",
            FieldName::ModelName => "model_name",
            FieldName::HorsePower => "horse_power",
            FieldName::AssetCost => "asset_cost",
            FieldName::DealerSignature => "dealer_signature",
            FieldName::DealerStamp => "dealer_stamp",
        }
    }

    /// Numeric fields (parsed as numbers, range-checked)
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldName::HorsePower | FieldName::AssetCost)
    }

    /// Visual marks located by the detector
    pub fn is_mark(&self) -> bool {
        matches!(self, FieldName::DealerSignature | FieldName::DealerStamp)
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        FieldName::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == key)
            .ok_or_else(|| format!("unknown field '{}'", s))
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// Axis-aligned bounding box in image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
    /// Detection confidence (0.0-1.0)
    pub confidence: Confidence,
}

impl BoundingBox {
    /// Create new box with clamped confidence (0.0-1.0)
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64, confidence: f32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
            confidence: clamp_confidence(confidence),
        }
    }

    /// Build from (x, y, width, height)
    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64, confidence: f32) -> Self {
        Self::new(x, y, x + width, y + height, confidence)
    }

    pub fn width(&self) -> f64 {
        (self.x_max - self.x_min).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.y_max - self.y_min).max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Finite, non-negative, with positive extent on both axes
    pub fn is_valid(&self) -> bool {
        let coords = [self.x_min, self.y_min, self.x_max, self.y_max];
        coords.iter().all(|c| c.is_finite() && *c >= 0.0)
            && self.x_min < self.x_max
            && self.y_min < self.y_max
    }

    pub fn intersection_area(&self, other: &BoundingBox) -> f64 {
        let w = (self.x_max.min(other.x_max) - self.x_min.max(other.x_min)).max(0.0);
        let h = (self.y_max.min(other.y_max) - self.y_min.max(other.y_min)).max(0.0);
        w * h
    }

    /// Intersection over union (0.0 when either box is empty)
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let intersection = self.intersection_area(other);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }

    /// Same box with a different confidence
    pub fn with_confidence(&self, confidence: f32) -> Self {
        Self::new(self.x_min, self.y_min, self.x_max, self.y_max, confidence)
    }
}

// ============================================================================
// Candidates
// ============================================================================

/// Value as reported by a source, before normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawValue {
    Text(String),
    Number(f64),
    Region(BoundingBox),
    Presence(bool),
}

/// One source's proposed value for one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCandidate {
    pub field_name: FieldName,
    pub source_id: SourceId,
    pub raw_value: RawValue,
    pub source_confidence: Confidence,
}

impl RawCandidate {
    pub fn new(field_name: FieldName, source_id: SourceId, raw_value: RawValue, confidence: f32) -> Self {
        Self {
            field_name,
            source_id,
            raw_value,
            source_confidence: clamp_confidence(confidence),
        }
    }

    pub fn text(field_name: FieldName, source_id: SourceId, text: impl Into<String>, confidence: f32) -> Self {
        Self::new(field_name, source_id, RawValue::Text(text.into()), confidence)
    }
}

/// Canonicalized candidate value
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedValue {
    /// `original` is trimmed with whitespace collapsed; `folded` is the
    /// case-folded, punctuation-stripped comparison form
    Text { original: String, folded: String },
    Number(f64),
    Region(BoundingBox),
    Presence(bool),
}

/// Candidate after normalization (one-to-one with its RawCandidate)
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedCandidate {
    pub field_name: FieldName,
    pub source_id: SourceId,
    pub normalized_value: NormalizedValue,
    pub source_confidence: Confidence,
    /// Numeric value outside the configured plausible interval
    pub out_of_range: bool,
}

impl NormalizedCandidate {
    pub fn as_text(&self) -> Option<(&str, &str)> {
        match &self.normalized_value {
            NormalizedValue::Text { original, folded } => Some((original.as_str(), folded.as_str())),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self.normalized_value {
            NormalizedValue::Number(n) => Some(n),
            _ => None,
        }
    }
}

/// Candidates for a single field, grouped by source
pub type SourceCandidates = BTreeMap<SourceId, Vec<NormalizedCandidate>>;

// ============================================================================
// Reference Matching
// ============================================================================

/// Outcome of matching one candidate string against a reference list.
///
/// An unmatched result is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub canonical_name: Option<String>,
    pub similarity_score: f64,
    pub matched: bool,
}

impl MatchResult {
    pub fn no_match(similarity_score: f64) -> Self {
        Self {
            canonical_name: None,
            similarity_score,
            matched: false,
        }
    }
}

// ============================================================================
// Reconciled Output
// ============================================================================

/// Final value of a reconciled field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Mark {
        present: bool,
        bbox: Option<BoundingBox>,
    },
}

/// Per-field reconciliation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldStatus {
    Accepted,
    LowConfidence,
    Missing,
}

impl fmt::Display for FieldStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldStatus::Accepted => write!(f, "ACCEPTED"),
            FieldStatus::LowConfidence => write!(f, "LOW_CONFIDENCE"),
            FieldStatus::Missing => write!(f, "MISSING"),
        }
    }
}

/// One field's consolidated value for one document
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledField {
    pub field_name: FieldName,
    pub final_value: Option<FieldValue>,
    pub confidence: Confidence,
    pub contributing_sources: BTreeSet<SourceId>,
    pub status: FieldStatus,
    /// Human-readable account of the decision
    pub explanation: String,
}

impl ReconciledField {
    pub fn new(
        field_name: FieldName,
        final_value: FieldValue,
        confidence: f32,
        contributing_sources: impl IntoIterator<Item = SourceId>,
        status: FieldStatus,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            field_name,
            final_value: Some(final_value),
            confidence: clamp_confidence(confidence),
            contributing_sources: contributing_sources.into_iter().collect(),
            status,
            explanation: explanation.into(),
        }
    }

    /// No source produced a usable value
    pub fn missing(field_name: FieldName, explanation: impl Into<String>) -> Self {
        Self {
            field_name,
            final_value: None,
            confidence: 0.0,
            contributing_sources: BTreeSet::new(),
            status: FieldStatus::Missing,
            explanation: explanation.into(),
        }
    }

    /// Copy of this field with a different status and a note appended
    pub fn demoted(&self, status: FieldStatus, note: &str) -> Self {
        Self {
            status,
            explanation: format!("{}; {}", self.explanation, note),
            ..self.clone()
        }
    }
}

/// Document-level gate decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Pass,
    Review,
    Fail,
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentStatus::Pass => write!(f, "PASS"),
            DocumentStatus::Review => write!(f, "REVIEW"),
            DocumentStatus::Fail => write!(f, "FAIL"),
        }
    }
}

/// Bookkeeping carried alongside the reconciled fields
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ProcessingMetadata {
    /// Wall-clock time spent on the document, filled in by the pipeline
    pub latency_ms: Option<u64>,
    /// Whether each extraction source produced output for this document
    pub source_availability: BTreeMap<SourceId, bool>,
    pub candidate_count: usize,
    /// Candidates dropped as unparsable
    pub dropped_candidates: usize,
    /// Fields that ended LOW_CONFIDENCE or MISSING
    pub flagged_fields: Vec<FieldName>,
    pub engine_version: String,
}

/// Terminal per-document record
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentResult {
    pub document_id: String,
    pub fields: BTreeMap<FieldName, ReconciledField>,
    pub overall_status: DocumentStatus,
    pub processing_metadata: ProcessingMetadata,
}

// ============================================================================
// Errors
// ============================================================================

/// Candidate normalization failure (non-fatal: the candidate is dropped)
#[derive(Debug, Clone, Error, PartialEq)]
pub enum NormalizeError {
    #[error("Unparsable {field} value from {source_id}: '{raw}'")]
    UnparsableValue {
        field: FieldName,
        source_id: SourceId,
        raw: String,
    },
}

/// Extraction collaborator error
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// I/O error (file read/write)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse collaborator output
    #[error("Parse error: {0}")]
    Parse(String),

    /// Collaborator has no output for this document (treated as an absent source)
    #[error("Extractor not available: {0}")]
    NotAvailable(String),

    /// Collaborator gave up on this document (treated as an absent source)
    #[error("Extractor timed out: {0}")]
    Timeout(String),

    /// Internal processing error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExtractionError {
    /// Absence of output rather than a collaborator crash
    pub fn is_absence(&self) -> bool {
        matches!(self, ExtractionError::NotAvailable(_) | ExtractionError::Timeout(_))
    }
}

// ============================================================================
// Tests
// ============================================================================
