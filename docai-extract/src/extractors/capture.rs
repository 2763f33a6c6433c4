//! Capture replay collaborator
//!
//! Replays collaborator output recorded as JSON, one object per document:
//!
//! ```json
//! {
//!   "document_id": "inv-0001",
//!   "image": "scans/inv-0001.png",
//!   "ocr_lines": [{"text": "ABC Tractors Pvt Ltd", "confidence": 0.93}],
//!   "vlm_response": "DEALER_NAME: ABC Tractors Pvt Ltd\nHORSE_POWER: 45",
//!   "vlm_confidence": 0.8,
//!   "box_format": "xywh",
//!   "detections": [{"label": "stamp", "bbox": [410, 620, 120, 110], "confidence": 0.88}]
//! }
//! ```
//!
//! A source key that is absent means that source produced nothing for the
//! document (reported as `NotAvailable`). An empty list means the source ran
//! and found nothing.

use crate::error::{ExtractError, ExtractResult};
use crate::extractors::detector_candidates::{label_to_field, BoxFormat};
use crate::extractors::vlm_candidates::parse_response;
use crate::extractors::{
    Detection, DocumentImage, FieldReader, ObjectDetector, OcrLine, TextExtractor, VlmField,
};
use crate::types::{ExtractionError, FieldName};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

fn default_vlm_confidence() -> f32 {
    0.9
}

/// Detection as captured (raw coordinates)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CapturedDetection {
    pub label: String,
    pub bbox: [f64; 4],
    pub confidence: f32,
}

/// Recorded collaborator output for one document
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CapturedDocument {
    pub document_id: String,
    #[serde(default)]
    pub image: Option<PathBuf>,
    #[serde(default)]
    pub ocr_lines: Option<Vec<OcrLine>>,
    /// Structured VLM output keyed by field name
    #[serde(default)]
    pub vlm_fields: Option<BTreeMap<String, VlmField>>,
    /// Plain-text VLM response, used when `vlm_fields` is absent
    #[serde(default)]
    pub vlm_response: Option<String>,
    /// Confidence assigned to every field parsed from `vlm_response`
    #[serde(default = "default_vlm_confidence")]
    pub vlm_confidence: f32,
    #[serde(default)]
    pub box_format: BoxFormat,
    #[serde(default)]
    pub detections: Option<Vec<CapturedDetection>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<CapturedDocument>),
    One(Box<CapturedDocument>),
}

/// In-memory capture set implementing all three collaborator traits
#[derive(Debug, Clone, Default)]
pub struct CaptureStore {
    documents: HashMap<String, CapturedDocument>,
    /// Input order
    order: Vec<String>,
}

impl CaptureStore {
    pub fn from_documents(documents: Vec<CapturedDocument>) -> ExtractResult<Self> {
        let mut store = Self::default();
        for doc in documents {
            if store.documents.contains_key(&doc.document_id) {
                return Err(ExtractError::Capture(format!(
                    "duplicate document_id '{}'",
                    doc.document_id
                )));
            }
            store.order.push(doc.document_id.clone());
            store.documents.insert(doc.document_id.clone(), doc);
        }
        Ok(store)
    }

    /// Parse a JSON capture: one document object or an array of them
    pub fn parse(json: &str) -> ExtractResult<Vec<CapturedDocument>> {
        Ok(match serde_json::from_str::<OneOrMany>(json)? {
            OneOrMany::Many(docs) => docs,
            OneOrMany::One(doc) => vec![*doc],
        })
    }

    /// Load a capture file, or every `*.json` file of a directory in file
    /// name order
    pub fn load(path: &Path) -> ExtractResult<Self> {
        let mut documents = Vec::new();

        if path.is_dir() {
            let mut files: Vec<PathBuf> = std::fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.extension().map_or(false, |ext| ext == "json"))
                .collect();
            files.sort();

            for file in files {
                let content = std::fs::read_to_string(&file)?;
                let docs = Self::parse(&content).map_err(|e| {
                    ExtractError::Capture(format!("{}: {}", file.display(), e))
                })?;
                documents.extend(docs);
            }
        } else {
            let content = std::fs::read_to_string(path)?;
            documents = Self::parse(&content)
                .map_err(|e| ExtractError::Capture(format!("{}: {}", path.display(), e)))?;
        }

        info!(path = %path.display(), documents = documents.len(), "Loaded captures");
        Self::from_documents(documents)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// One image per captured document, in input order
    pub fn images(&self) -> Vec<DocumentImage> {
        self.order
            .iter()
            .filter_map(|id| self.documents.get(id))
            .map(|doc| DocumentImage {
                document_id: doc.document_id.clone(),
                path: doc.image.clone(),
            })
            .collect()
    }

    fn document(&self, image: &DocumentImage) -> Result<&CapturedDocument, ExtractionError> {
        self.documents.get(&image.document_id).ok_or_else(|| {
            ExtractionError::Internal(format!("no capture for document '{}'", image.document_id))
        })
    }
}

#[async_trait]
impl TextExtractor for CaptureStore {
    fn name(&self) -> &'static str {
        "capture-ocr"
    }

    async fn extract_text(&self, image: &DocumentImage) -> Result<Vec<OcrLine>, ExtractionError> {
        self.document(image)?
            .ocr_lines
            .clone()
            .ok_or_else(|| ExtractionError::NotAvailable("no OCR capture".to_string()))
    }
}

#[async_trait]
impl FieldReader for CaptureStore {
    fn name(&self) -> &'static str {
        "capture-vlm"
    }

    async fn extract_fields(
        &self,
        image: &DocumentImage,
        schema: &[FieldName],
    ) -> Result<BTreeMap<FieldName, VlmField>, ExtractionError> {
        let doc = self.document(image)?;

        let fields = match (&doc.vlm_fields, &doc.vlm_response) {
            (Some(fields), _) => fields
                .iter()
                .filter_map(|(key, value)| match key.parse::<FieldName>() {
                    Ok(field) => Some((field, value.clone())),
                    Err(e) => {
                        debug!(document_id = %doc.document_id, error = %e, "Skipping VLM field");
                        None
                    }
                })
                .collect(),
            (None, Some(response)) => parse_response(response, doc.vlm_confidence),
            (None, None) => {
                return Err(ExtractionError::NotAvailable("no VLM capture".to_string()))
            }
        };

        Ok(fields
            .into_iter()
            .filter(|(field, _)| schema.contains(field))
            .collect())
    }
}

#[async_trait]
impl ObjectDetector for CaptureStore {
    fn name(&self) -> &'static str {
        "capture-detector"
    }

    async fn detect(
        &self,
        image: &DocumentImage,
        classes: &[FieldName],
    ) -> Result<Vec<Detection>, ExtractionError> {
        let doc = self.document(image)?;
        let detections = doc
            .detections
            .as_ref()
            .ok_or_else(|| ExtractionError::NotAvailable("no detector capture".to_string()))?;

        Ok(detections
            .iter()
            .filter(|d| label_to_field(&d.label).map_or(false, |f| classes.contains(&f)))
            .map(|d| Detection {
                label: d.label.clone(),
                bbox: doc.box_format.to_bbox(d.bbox, d.confidence),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CAPTURE: &str = r#"[
        {
            "document_id": "inv-1",
            "ocr_lines": [{"text": "ABC Tractors Pvt Ltd", "confidence": 0.93}],
            "vlm_response": "DEALER_NAME: ABC Tractors\nSTAMP: yes",
            "vlm_confidence": 0.8,
            "box_format": "xywh",
            "detections": [
                {"label": "stamp", "bbox": [410, 620, 120, 110], "confidence": 0.88},
                {"label": "signature", "bbox": [100, 700, 80, 40], "confidence": 0.7}
            ]
        },
        {
            "document_id": "inv-2",
            "vlm_fields": {
                "horse_power": {"value": 45, "confidence": 0.9},
                "chassis_no": {"value": "X1", "confidence": 0.9}
            }
        }
    ]"#;

    fn store() -> CaptureStore {
        CaptureStore::from_documents(CaptureStore::parse(CAPTURE).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_replays_ocr_and_reports_absence() {
        let store = store();
        let lines = store.extract_text(&DocumentImage::new("inv-1")).await.unwrap();
        assert_eq!(lines.len(), 1);

        let err = store.extract_text(&DocumentImage::new("inv-2")).await.unwrap_err();
        assert!(err.is_absence());
    }

    #[tokio::test]
    async fn test_vlm_response_parsed_and_schema_filtered() {
        let store = store();
        let fields = store
            .extract_fields(&DocumentImage::new("inv-1"), &[FieldName::DealerName])
            .await
            .unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[&FieldName::DealerName], VlmField::text("ABC Tractors", 0.8));
    }

    #[tokio::test]
    async fn test_structured_vlm_fields_skip_unknown_keys() {
        let store = store();
        let fields = store
            .extract_fields(&DocumentImage::new("inv-2"), &FieldName::ALL)
            .await
            .unwrap();
        assert_eq!(fields.len(), 1);
        assert!(fields.contains_key(&FieldName::HorsePower));
    }

    #[tokio::test]
    async fn test_detections_converted_and_filtered() {
        let store = store();
        let detections = store
            .detect(&DocumentImage::new("inv-1"), &[FieldName::DealerStamp])
            .await
            .unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].bbox.x_max, 530.0);
        assert_eq!(detections[0].bbox.y_max, 730.0);
    }

    #[tokio::test]
    async fn test_unknown_document_is_a_crash() {
        let err = store()
            .extract_text(&DocumentImage::new("nope"))
            .await
            .unwrap_err();
        assert!(!err.is_absence());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let docs = CaptureStore::parse(r#"[{"document_id": "a"}, {"document_id": "a"}]"#).unwrap();
        assert!(matches!(
            CaptureStore::from_documents(docs),
            Err(ExtractError::Capture(_))
        ));
    }

    #[test]
    fn test_load_directory_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        for (name, id) in [("b.json", "second"), ("a.json", "first")] {
            let mut f = std::fs::File::create(dir.path().join(name)).unwrap();
            write!(f, r#"{{"document_id": "{}"}}"#, id).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let store = CaptureStore::load(dir.path()).unwrap();
        let ids: Vec<String> = store.images().into_iter().map(|i| i.document_id).collect();
        assert_eq!(ids, vec!["first", "second"]);
    }
}
