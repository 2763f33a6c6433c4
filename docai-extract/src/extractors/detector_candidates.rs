//! Detector candidate harvesting
//!
//! Maps detector class labels onto mark fields and drops detections below
//! the configured minimum confidence.

use crate::extractors::Detection;
use crate::types::{BoundingBox, FieldName, RawCandidate, RawValue, SourceId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Coordinate layout of a raw detector box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxFormat {
    /// `[x_min, y_min, x_max, y_max]`
    #[default]
    Corners,
    /// `[x, y, width, height]`
    Xywh,
}

impl BoxFormat {
    pub fn to_bbox(self, coords: [f64; 4], confidence: f32) -> BoundingBox {
        let [a, b, c, d] = coords;
        match self {
            BoxFormat::Corners => BoundingBox::new(a, b, c, d, confidence),
            BoxFormat::Xywh => BoundingBox::from_xywh(a, b, c, d, confidence),
        }
    }
}

/// Class label (case-insensitive) or numeric class id → field
pub fn label_to_field(label: &str) -> Option<FieldName> {
    match label.trim().to_ascii_lowercase().as_str() {
        "signature" | "dealer_signature" | "0" => Some(FieldName::DealerSignature),
        "stamp" | "dealer_stamp" | "seal" | "1" => Some(FieldName::DealerStamp),
        _ => None,
    }
}

/// Candidates for the requested classes at or above `min_confidence`
pub fn from_detections(
    detections: &[Detection],
    classes: &[FieldName],
    min_confidence: f32,
) -> Vec<RawCandidate> {
    detections
        .iter()
        .filter_map(|d| {
            let Some(field) = label_to_field(&d.label) else {
                debug!(label = %d.label, "Ignoring detection with unknown label");
                return None;
            };
            if !classes.contains(&field) || d.bbox.confidence < min_confidence {
                return None;
            }
            Some(RawCandidate::new(
                field,
                SourceId::Detector,
                RawValue::Region(d.bbox),
                d.bbox.confidence,
            ))
        })
        .collect()
}
