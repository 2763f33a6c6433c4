//! Geometry Reconciler
//!
//! Merges detector boxes for signature and stamp with any VLM presence
//! assertion. Overlapping boxes of the same class are collapsed by greedy
//! duplicate suppression, keeping the highest-confidence box.
//!
//! # Decision table
//! | Detector box | VLM | Result |
//! |--------------|-----|--------|
//! | yes | present | ACCEPTED, box |
//! | yes | absent | ACCEPTED, box (VLM ignored) |
//! | yes | none | LOW_CONFIDENCE, box |
//! | no | present | LOW_CONFIDENCE, present without box |
//! | no | absent | ACCEPTED, not present |
//! | no | none | MISSING |

use crate::fusion::field_reconciler::{candidates_from, top_candidate, FieldPolicy, ReconcileContext};
use crate::types::{
    BoundingBox, FieldName, FieldStatus, FieldValue, NormalizedValue, ReconciledField,
    SourceCandidates, SourceId,
};
use std::cmp::Ordering;

/// Highest confidence first; position breaks ties so the order never depends
/// on input order
fn box_order(a: &BoundingBox, b: &BoundingBox) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then(a.x_min.total_cmp(&b.x_min))
        .then(a.y_min.total_cmp(&b.y_min))
        .then(a.x_max.total_cmp(&b.x_max))
        .then(a.y_max.total_cmp(&b.y_max))
}

/// Greedy duplicate suppression.
///
/// Boxes are visited by descending confidence; a box is dropped when its IoU
/// with an already kept box exceeds `iou_threshold`. The result is sorted
/// best first.
pub fn suppress_duplicates(boxes: &[BoundingBox], iou_threshold: f64) -> Vec<BoundingBox> {
    let mut ordered = boxes.to_vec();
    ordered.sort_by(box_order);

    let mut kept: Vec<BoundingBox> = Vec::with_capacity(ordered.len());
    for candidate in ordered {
        if kept.iter().all(|k| k.iou(&candidate) <= iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}

/// Presence/location policy for visual marks
pub struct MarkPolicy;

impl FieldPolicy for MarkPolicy {
    fn name(&self) -> &'static str {
        "mark"
    }

    fn reconcile(
        &self,
        field: FieldName,
        inputs: &SourceCandidates,
        ctx: &ReconcileContext<'_>,
    ) -> ReconciledField {
        let boxes: Vec<BoundingBox> = candidates_from(inputs, SourceId::Detector)
            .iter()
            .filter_map(|c| match c.normalized_value {
                NormalizedValue::Region(bbox) => Some(bbox.with_confidence(c.source_confidence)),
                _ => None,
            })
            .collect();
        let kept = suppress_duplicates(&boxes, ctx.config.iou_threshold);

        let assertion = top_candidate(
            candidates_from(inputs, SourceId::Vlm)
                .iter()
                .filter(|c| matches!(c.normalized_value, NormalizedValue::Presence(_))),
        );
        let vlm_present = assertion.and_then(|c| match c.normalized_value {
            NormalizedValue::Presence(p) => Some((p, c.source_confidence)),
            _ => None,
        });

        let suppressed = boxes.len() - kept.len();
        let mark = |present: bool, bbox: Option<BoundingBox>| FieldValue::Mark { present, bbox };

        match (kept.first(), vlm_present) {
            (Some(best), Some((true, _))) => ReconciledField::new(
                field,
                mark(true, Some(*best)),
                best.confidence,
                [SourceId::Detector, SourceId::Vlm],
                FieldStatus::Accepted,
                format!(
                    "Detector box ({:.0}%) confirmed by VLM; {} duplicate(s) suppressed",
                    best.confidence * 100.0,
                    suppressed
                ),
            ),
            (Some(best), Some((false, _))) => ReconciledField::new(
                field,
                mark(true, Some(*best)),
                best.confidence,
                [SourceId::Detector],
                FieldStatus::Accepted,
                format!(
                    "Detector box ({:.0}%) kept over VLM absence; {} duplicate(s) suppressed",
                    best.confidence * 100.0,
                    suppressed
                ),
            ),
            (Some(best), None) => ReconciledField::new(
                field,
                mark(true, Some(*best)),
                best.confidence,
                [SourceId::Detector],
                FieldStatus::LowConfidence,
                format!(
                    "Detector box ({:.0}%) without VLM corroboration; {} duplicate(s) suppressed",
                    best.confidence * 100.0,
                    suppressed
                ),
            ),
            (None, Some((true, confidence))) => ReconciledField::new(
                field,
                mark(true, None),
                confidence,
                [SourceId::Vlm],
                FieldStatus::LowConfidence,
                "VLM asserts presence but no box was detected",
            ),
            (None, Some((false, confidence))) => ReconciledField::new(
                field,
                mark(false, None),
                confidence,
                [SourceId::Vlm],
                FieldStatus::Accepted,
                "VLM asserts absence and no box was detected",
            ),
            (None, None) => ReconciledField::missing(field, "No detector box or VLM assertion"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconcileConfig;
    use crate::fusion::reference::{ReferenceList, ReferenceStore};
    use crate::types::NormalizedCandidate;

    fn region(x_min: f64, y_min: f64, x_max: f64, y_max: f64, conf: f32) -> NormalizedCandidate {
        NormalizedCandidate {
            field_name: FieldName::DealerStamp,
            source_id: SourceId::Detector,
            normalized_value: NormalizedValue::Region(BoundingBox::new(x_min, y_min, x_max, y_max, conf)),
            source_confidence: conf,
            out_of_range: false,
        }
    }

    fn presence(present: bool, conf: f32) -> NormalizedCandidate {
        NormalizedCandidate {
            field_name: FieldName::DealerStamp,
            source_id: SourceId::Vlm,
            normalized_value: NormalizedValue::Presence(present),
            source_confidence: conf,
            out_of_range: false,
        }
    }

    fn run(candidates: Vec<NormalizedCandidate>) -> ReconciledField {
        let config = ReconcileConfig::default();
        let references = ReferenceStore::new(
            ReferenceList::new("dealer", vec![]),
            ReferenceList::new("model", vec![]),
        );
        let ctx = ReconcileContext {
            config: &config,
            references: &references,
        };
        let mut inputs = SourceCandidates::new();
        for c in candidates {
            inputs.entry(c.source_id).or_default().push(c);
        }
        MarkPolicy.reconcile(FieldName::DealerStamp, &inputs, &ctx)
    }

    fn bbox_of(field: &ReconciledField) -> Option<BoundingBox> {
        match &field.final_value {
            Some(FieldValue::Mark { bbox, .. }) => *bbox,
            _ => None,
        }
    }

    #[test]
    fn test_duplicate_suppression_keeps_highest_confidence() {
        // 100x100 boxes offset by 5px horizontally: IoU = 95/105 ≈ 0.905
        let a = BoundingBox::new(0.0, 0.0, 100.0, 100.0, 0.7);
        let b = BoundingBox::new(5.0, 0.0, 105.0, 100.0, 0.85);
        assert!(a.iou(&b) > 0.9);

        let kept = suppress_duplicates(&[a, b], 0.5);
        assert_eq!(kept, vec![b]);
    }

    #[test]
    fn test_distinct_boxes_survive() {
        let a = BoundingBox::new(0.0, 0.0, 50.0, 50.0, 0.6);
        let b = BoundingBox::new(200.0, 200.0, 260.0, 240.0, 0.9);
        let kept = suppress_duplicates(&[a, b], 0.5);
        assert_eq!(kept, vec![b, a]);
    }

    #[test]
    fn test_suppression_independent_of_input_order() {
        let a = BoundingBox::new(0.0, 0.0, 100.0, 100.0, 0.8);
        let b = BoundingBox::new(2.0, 0.0, 102.0, 100.0, 0.8);
        assert_eq!(suppress_duplicates(&[a, b], 0.5), suppress_duplicates(&[b, a], 0.5));
    }

    #[test]
    fn test_box_with_vlm_presence_accepted() {
        let f = run(vec![
            region(0.0, 0.0, 100.0, 100.0, 0.7),
            region(5.0, 0.0, 105.0, 100.0, 0.85),
            presence(true, 0.6),
        ]);
        assert_eq!(f.status, FieldStatus::Accepted);
        assert_eq!(bbox_of(&f).map(|b| b.confidence), Some(0.85));
        assert!((f.confidence - 0.85).abs() < 1e-6);
    }

    #[test]
    fn test_detector_overrides_vlm_absence() {
        let f = run(vec![region(10.0, 10.0, 60.0, 40.0, 0.9), presence(false, 0.95)]);
        assert_eq!(f.status, FieldStatus::Accepted);
        assert!(matches!(f.final_value, Some(FieldValue::Mark { present: true, .. })));
        assert!(!f.contributing_sources.contains(&SourceId::Vlm));
    }

    #[test]
    fn test_detector_only_is_low_confidence() {
        let f = run(vec![region(10.0, 10.0, 60.0, 40.0, 0.9)]);
        assert_eq!(f.status, FieldStatus::LowConfidence);
        assert!(bbox_of(&f).is_some());
    }

    #[test]
    fn test_vlm_presence_without_box_needs_review() {
        let f = run(vec![presence(true, 0.8)]);
        assert_eq!(f.status, FieldStatus::LowConfidence);
        assert_eq!(
            f.final_value,
            Some(FieldValue::Mark {
                present: true,
                bbox: None
            })
        );
    }

    #[test]
    fn test_vlm_absence_without_box_accepted() {
        let f = run(vec![presence(false, 0.8)]);
        assert_eq!(f.status, FieldStatus::Accepted);
        assert_eq!(
            f.final_value,
            Some(FieldValue::Mark {
                present: false,
                bbox: None
            })
        );
    }

    #[test]
    fn test_no_evidence_is_missing() {
        let f = run(vec![]);
        assert_eq!(f.status, FieldStatus::Missing);
        assert!(f.contributing_sources.is_empty());
    }
}
