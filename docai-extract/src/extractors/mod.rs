//! Tier 1 Source Extractors
//!
//! Collaborator contracts and candidate harvesting. The three collaborators
//! (OCR, VLM, object detector) wrap external models; this crate only defines
//! the traits they implement and turns their output into `RawCandidate`s.
//!
//! # Architecture
//! - **Tier 1:** Collaborator output → raw candidates (THIS MODULE)
//! - **Tier 2:** Normalize and reconcile candidates per field
//! - **Tier 3:** Gate the reconciled fields
//!
//! # Harvesters
//! 1. **ocr_candidates** - Keyword/label/regex harvesting over OCR lines
//! 2. **vlm_candidates** - VLM field map and `KEY: value` response parsing
//! 3. **detector_candidates** - Detection label mapping and confidence cut
//!
//! # Collaborators
//! - **capture** - Replays captured collaborator output from JSON files
//!
//! # Absence
//! A collaborator reports "no output for this document" with
//! `ExtractionError::NotAvailable` or `ExtractionError::Timeout`. Any other
//! error is a crash.

pub mod capture;
pub mod detector_candidates;
pub mod ocr_candidates;
pub mod vlm_candidates;

use crate::types::{BoundingBox, ExtractionError, FieldName};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub use capture::CaptureStore;

/// Document handed to each collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentImage {
    pub document_id: String,
    /// Image location, when the collaborator needs pixels
    pub path: Option<PathBuf>,
}

impl DocumentImage {
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            path: None,
        }
    }
}

/// One OCR text line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrLine {
    pub text: String,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
    pub confidence: f32,
}

impl OcrLine {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            bbox: None,
            confidence,
        }
    }
}

/// Value reported by the VLM for one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VlmValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

/// VLM best guess for one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VlmField {
    pub value: Option<VlmValue>,
    pub confidence: f32,
}

impl VlmField {
    pub fn text(value: impl Into<String>, confidence: f32) -> Self {
        Self {
            value: Some(VlmValue::Text(value.into())),
            confidence,
        }
    }
}

/// One detector output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Class label ("signature", "stamp", or a numeric class id)
    pub label: String,
    pub bbox: BoundingBox,
}

/// Optical text extraction
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Collaborator name for provenance logging
    fn name(&self) -> &'static str;

    /// All text lines of the document, in reading order
    async fn extract_text(&self, image: &DocumentImage) -> Result<Vec<OcrLine>, ExtractionError>;
}

/// Semantic document reader
#[async_trait]
pub trait FieldReader: Send + Sync {
    fn name(&self) -> &'static str;

    /// Best guess per requested field. Fields it cannot read are omitted.
    async fn extract_fields(
        &self,
        image: &DocumentImage,
        schema: &[FieldName],
    ) -> Result<BTreeMap<FieldName, VlmField>, ExtractionError>;
}

/// Visual object detector
#[async_trait]
pub trait ObjectDetector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Detections for the requested mark classes
    async fn detect(
        &self,
        image: &DocumentImage,
        classes: &[FieldName],
    ) -> Result<Vec<Detection>, ExtractionError>;
}
