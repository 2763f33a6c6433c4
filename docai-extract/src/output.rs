//! JSON output
//!
//! Serialized form of a `DocumentResult`:
//!
//! ```json
//! {
//!   "doc_id": "inv-0001",
//!   "fields": {
//!     "dealer_name": {"value": "ABC Tractors Pvt Ltd", "confidence": 0.95,
//!                     "status": "ACCEPTED", "sources": ["OCR", "VLM", "REFERENCE"],
//!                     "explanation": "..."},
//!     "dealer_stamp": {"value": {"present": true, "bbox": {...}}, ...}
//!   },
//!   "overall_status": "PASS",
//!   "processing_metadata": {"latency_ms": 412, "source_availability": {...}, ...}
//! }
//! ```

use crate::error::{ExtractError, ExtractResult};
use crate::types::{
    Confidence, DocumentResult, DocumentStatus, FieldName, FieldStatus, FieldValue,
    ProcessingMetadata, SourceId,
};
use crate::workflow::BatchSummary;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::info;

/// One field as written
#[derive(Debug, Serialize)]
pub struct FieldRecord<'a> {
    pub value: Option<&'a FieldValue>,
    pub confidence: Confidence,
    pub status: FieldStatus,
    pub sources: &'a BTreeSet<SourceId>,
    pub explanation: &'a str,
}

/// One document as written
#[derive(Debug, Serialize)]
pub struct DocumentRecord<'a> {
    pub doc_id: &'a str,
    pub fields: BTreeMap<FieldName, FieldRecord<'a>>,
    pub overall_status: DocumentStatus,
    pub processing_metadata: &'a ProcessingMetadata,
}

impl<'a> From<&'a DocumentResult> for DocumentRecord<'a> {
    fn from(result: &'a DocumentResult) -> Self {
        Self {
            doc_id: &result.document_id,
            fields: result
                .fields
                .iter()
                .map(|(name, field)| {
                    (
                        *name,
                        FieldRecord {
                            value: field.final_value.as_ref(),
                            confidence: field.confidence,
                            status: field.status,
                            sources: &field.contributing_sources,
                            explanation: &field.explanation,
                        },
                    )
                })
                .collect(),
            overall_status: result.overall_status,
            processing_metadata: &result.processing_metadata,
        }
    }
}

/// Pretty-printed JSON for one document
pub fn format_document(result: &DocumentResult) -> ExtractResult<String> {
    Ok(serde_json::to_string_pretty(&DocumentRecord::from(result))?)
}

pub fn write_document(path: &Path, result: &DocumentResult) -> ExtractResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, format_document(result)?)?;
    Ok(())
}

/// One `<doc_id>.json` per document under `dir`.
///
/// Fails before writing anything when two document ids map to the same
/// file name.
pub fn write_documents(dir: &Path, results: &[DocumentResult]) -> ExtractResult<Vec<PathBuf>> {
    let mut stems: BTreeMap<String, &str> = BTreeMap::new();
    for result in results {
        let stem = file_stem(&result.document_id);
        if let Some(previous) = stems.insert(stem.clone(), &result.document_id) {
            return Err(ExtractError::Output(format!(
                "documents {} and {} both map to {}.json",
                previous, result.document_id, stem
            )));
        }
    }

    std::fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(results.len());
    for result in results {
        let path = dir.join(format!("{}.json", file_stem(&result.document_id)));
        write_document(&path, result)?;
        written.push(path);
    }

    info!(dir = %dir.display(), documents = written.len(), "Wrote document results");
    Ok(written)
}

/// All documents as one JSON array
pub fn write_combined(path: &Path, results: &[DocumentResult]) -> ExtractResult<()> {
    let records: Vec<DocumentRecord<'_>> = results.iter().map(DocumentRecord::from).collect();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&records)?)?;
    info!(path = %path.display(), documents = records.len(), "Wrote document results");
    Ok(())
}

pub fn write_summary(path: &Path, summary: &BatchSummary) -> ExtractResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(summary)?)?;
    Ok(())
}

/// Document ids may contain path separators
fn file_stem(document_id: &str) -> String {
    document_id
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, ReconciledField};

    fn result() -> DocumentResult {
        let dealer = ReconciledField::new(
            FieldName::DealerName,
            FieldValue::Text("ABC Tractors Pvt Ltd".to_string()),
            0.95,
            [SourceId::Ocr, SourceId::Vlm, SourceId::Reference],
            FieldStatus::Accepted,
            "both sources matched",
        );
        let stamp = ReconciledField::new(
            FieldName::DealerStamp,
            FieldValue::Mark {
                present: true,
                bbox: Some(BoundingBox::new(1.0, 2.0, 3.0, 4.0, 0.85)),
            },
            0.85,
            [SourceId::Detector],
            FieldStatus::LowConfidence,
            "no VLM corroboration",
        );
        DocumentResult {
            document_id: "scans/inv-1".to_string(),
            fields: BTreeMap::from([
                (FieldName::DealerName, dealer),
                (FieldName::DealerStamp, stamp),
                (
                    FieldName::HorsePower,
                    ReconciledField::missing(FieldName::HorsePower, "no candidates"),
                ),
            ]),
            overall_status: DocumentStatus::Review,
            processing_metadata: ProcessingMetadata {
                latency_ms: Some(12),
                source_availability: BTreeMap::from([(SourceId::Ocr, true)]),
                ..ProcessingMetadata::default()
            },
        }
    }

    #[test]
    fn test_document_json_shape() {
        let json: serde_json::Value = serde_json::from_str(&format_document(&result()).unwrap()).unwrap();

        assert_eq!(json["doc_id"], "scans/inv-1");
        assert_eq!(json["overall_status"], "REVIEW");

        let dealer = &json["fields"]["dealer_name"];
        assert_eq!(dealer["value"], "ABC Tractors Pvt Ltd");
        assert_eq!(dealer["status"], "ACCEPTED");
        assert_eq!(dealer["sources"], serde_json::json!(["OCR", "VLM", "REFERENCE"]));

        let stamp = &json["fields"]["dealer_stamp"]["value"];
        assert_eq!(stamp["present"], true);
        assert_eq!(stamp["bbox"]["x_max"], 3.0);

        let hp = &json["fields"]["horse_power"];
        assert!(hp["value"].is_null());
        assert_eq!(hp["status"], "MISSING");
        assert!(hp["sources"].as_array().unwrap().is_empty());

        assert_eq!(json["processing_metadata"]["latency_ms"], 12);
        assert_eq!(json["processing_metadata"]["source_availability"]["OCR"], true);
    }

    #[test]
    fn test_write_documents_sanitizes_names() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_documents(dir.path(), &[result()]).unwrap();
        assert_eq!(written, vec![dir.path().join("scans_inv-1.json")]);
        assert!(written[0].exists());
    }

    #[test]
    fn test_write_documents_rejects_colliding_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut other = result();
        other.document_id = "scans_inv-1".to_string();

        let err = write_documents(dir.path(), &[result(), other]).unwrap_err();
        assert!(matches!(err, ExtractError::Output(_)));
        assert!(err.to_string().contains("scans_inv-1.json"));
        assert!(!dir.path().join("scans_inv-1.json").exists());
    }

    #[test]
    fn test_write_combined_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("all.json");
        write_combined(&path, &[result(), result()]).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 2);
    }
}
