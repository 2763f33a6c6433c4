//! Field Reconciler (Tier 2 Fuser)
//!
//! Combines the normalized candidates for one field into one `ReconciledField`.
//! Each field has its own trust policy, registered in a `PolicyTable`:
//!
//! | Field | Policy | Trust rule |
//! |-------|--------|------------|
//! | dealer_name | `FuzzyReferencePolicy` | agreement on a canonical dealer boosts confidence |
//! | model_name | `ExactReferencePolicy` | exact match only, VLM preferred on disagreement |
//! | horse_power, asset_cost | `NumericPolicy` | OCR preferred for agreeing digits, VLM on divergence |
//! | dealer_signature, dealer_stamp | `MarkPolicy` | detector geometry outweighs VLM assertion |
//!
//! Every policy handles the 0, 1 and 2 source cases explicitly. Source
//! availability varies per document.

use crate::config::ReconcileConfig;
use crate::fusion::geometry::MarkPolicy;
use crate::fusion::reference::{ReferenceKind, ReferenceStore};
use crate::types::{
    FieldName, FieldStatus, FieldValue, MatchResult, NormalizedCandidate, ReconciledField,
    SourceCandidates, SourceId,
};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Shared read-only state handed to every policy
pub struct ReconcileContext<'a> {
    pub config: &'a ReconcileConfig,
    pub references: &'a ReferenceStore,
}

/// Per-field reconciliation strategy
pub trait FieldPolicy: Send + Sync {
    /// Policy name for logging
    fn name(&self) -> &'static str;

    /// Reconcile all candidates for `field`. Must not fail: data-quality
    /// problems are expressed through the returned status.
    fn reconcile(
        &self,
        field: FieldName,
        inputs: &SourceCandidates,
        ctx: &ReconcileContext<'_>,
    ) -> ReconciledField;
}

/// Field → policy lookup
pub struct PolicyTable {
    policies: BTreeMap<FieldName, Box<dyn FieldPolicy>>,
}

impl PolicyTable {
    pub fn empty() -> Self {
        Self {
            policies: BTreeMap::new(),
        }
    }

    /// Policies for the six invoice fields
    pub fn standard() -> Self {
        Self::empty()
            .with_policy(
                FieldName::DealerName,
                FuzzyReferencePolicy::new(ReferenceKind::Dealers),
            )
            .with_policy(
                FieldName::ModelName,
                ExactReferencePolicy::new(ReferenceKind::Models),
            )
            .with_policy(FieldName::HorsePower, NumericPolicy)
            .with_policy(FieldName::AssetCost, NumericPolicy)
            .with_policy(FieldName::DealerSignature, MarkPolicy)
            .with_policy(FieldName::DealerStamp, MarkPolicy)
    }

    pub fn with_policy(mut self, field: FieldName, policy: impl FieldPolicy + 'static) -> Self {
        self.policies.insert(field, Box::new(policy));
        self
    }

    pub fn get(&self, field: FieldName) -> Option<&dyn FieldPolicy> {
        self.policies.get(&field).map(|p| p.as_ref())
    }

    pub fn contains(&self, field: FieldName) -> bool {
        self.policies.contains_key(&field)
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::standard()
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub(crate) fn candidates_from(inputs: &SourceCandidates, source: SourceId) -> &[NormalizedCandidate] {
    inputs.get(&source).map(Vec::as_slice).unwrap_or(&[])
}

/// Highest-confidence candidate; the earliest wins on ties
pub(crate) fn top_candidate<'c>(
    candidates: impl IntoIterator<Item = &'c NormalizedCandidate>,
) -> Option<&'c NormalizedCandidate> {
    candidates.into_iter().fold(None, |best, c| match best {
        Some(b) if c.source_confidence <= b.source_confidence => Some(b),
        _ => Some(c),
    })
}

/// Candidates ordered by confidence, descending (stable)
fn by_confidence(candidates: &[NormalizedCandidate]) -> Vec<&NormalizedCandidate> {
    let mut ordered: Vec<&NormalizedCandidate> = candidates.iter().collect();
    ordered.sort_by(|a, b| b.source_confidence.total_cmp(&a.source_confidence));
    ordered
}

fn penalized(confidence: f32, penalty: f32) -> f32 {
    confidence * (1.0 - penalty)
}

/// One source's candidate together with its reference match
struct Pick<'c> {
    candidate: &'c NormalizedCandidate,
    original: &'c str,
    result: MatchResult,
}

impl Pick<'_> {
    fn canonical(&self) -> Option<&str> {
        self.result.canonical_name.as_deref().filter(|_| self.result.matched)
    }

    fn source(&self) -> SourceId {
        self.candidate.source_id
    }

    fn confidence(&self) -> f32 {
        self.candidate.source_confidence
    }
}

// ============================================================================
// Fuzzy reference policy (dealer name)
// ============================================================================

/// Fuzzy-match OCR and VLM strings independently against a reference list
pub struct FuzzyReferencePolicy {
    list: ReferenceKind,
}

impl FuzzyReferencePolicy {
    pub fn new(list: ReferenceKind) -> Self {
        Self { list }
    }

    /// Best candidate of one source: matched first, then similarity, then confidence
    fn pick<'c>(
        &self,
        candidates: &'c [NormalizedCandidate],
        ctx: &ReconcileContext<'_>,
    ) -> Option<Pick<'c>> {
        let list = ctx.references.list(self.list);
        let threshold = ctx.config.dealer_similarity_threshold;

        candidates
            .iter()
            .filter_map(|candidate| {
                let (original, folded) = candidate.as_text()?;
                Some(Pick {
                    candidate,
                    original,
                    result: list.match_fuzzy(folded, threshold),
                })
            })
            .fold(None, |best: Option<Pick<'c>>, pick| match best {
                Some(b) if Self::compare(&pick, &b) != Ordering::Greater => Some(b),
                _ => Some(pick),
            })
    }

    fn compare(a: &Pick<'_>, b: &Pick<'_>) -> Ordering {
        a.result
            .matched
            .cmp(&b.result.matched)
            .then(a.result.similarity_score.total_cmp(&b.result.similarity_score))
            .then(a.confidence().total_cmp(&b.confidence()))
    }
}

impl FieldPolicy for FuzzyReferencePolicy {
    fn name(&self) -> &'static str {
        "fuzzy_reference"
    }

    fn reconcile(
        &self,
        field: FieldName,
        inputs: &SourceCandidates,
        ctx: &ReconcileContext<'_>,
    ) -> ReconciledField {
        let config = ctx.config;
        let ocr = self.pick(candidates_from(inputs, SourceId::Ocr), ctx);
        let vlm = self.pick(candidates_from(inputs, SourceId::Vlm), ctx);

        let ocr_match = ocr.as_ref().filter(|p| p.result.matched);
        let vlm_match = vlm.as_ref().filter(|p| p.result.matched);

        match (ocr_match, vlm_match) {
            (Some(o), Some(v)) if o.canonical() == v.canonical() => {
                let canonical = o.canonical().unwrap_or(o.original).to_string();
                let confidence =
                    ((o.confidence() + v.confidence()) / 2.0 + config.agreement_bonus).min(1.0);
                ReconciledField::new(
                    field,
                    FieldValue::Text(canonical.clone()),
                    confidence,
                    [SourceId::Ocr, SourceId::Vlm, SourceId::Reference],
                    FieldStatus::Accepted,
                    format!(
                        "OCR '{}' ({:.0}%) and VLM '{}' ({:.0}%) both matched '{}'",
                        o.original,
                        o.result.similarity_score * 100.0,
                        v.original,
                        v.result.similarity_score * 100.0,
                        canonical
                    ),
                )
            }
            (Some(o), Some(v)) => {
                // VLM wins exact ties on similarity and confidence
                let ocr_wins = o
                    .result
                    .similarity_score
                    .total_cmp(&v.result.similarity_score)
                    .then(o.confidence().total_cmp(&v.confidence()))
                    == Ordering::Greater;
                let (winner, loser) = if ocr_wins { (o, v) } else { (v, o) };
                let canonical = winner.canonical().unwrap_or(winner.original).to_string();
                ReconciledField::new(
                    field,
                    FieldValue::Text(canonical.clone()),
                    penalized(winner.result.similarity_score as f32, config.disagreement_penalty),
                    [winner.source(), SourceId::Reference],
                    FieldStatus::LowConfidence,
                    format!(
                        "{} matched '{}' ({:.0}%) but {} matched '{}' ({:.0}%)",
                        winner.source(),
                        canonical,
                        winner.result.similarity_score * 100.0,
                        loser.source(),
                        loser.canonical().unwrap_or(loser.original),
                        loser.result.similarity_score * 100.0
                    ),
                )
            }
            (Some(p), None) | (None, Some(p)) => {
                let other = if p.source() == SourceId::Ocr { &vlm } else { &ocr };
                let canonical = p.canonical().unwrap_or(p.original).to_string();
                let (confidence, note) = match other {
                    Some(o) => (
                        penalized(p.confidence(), config.disagreement_penalty),
                        format!("; {} read '{}' with no match", o.source(), o.original),
                    ),
                    None => (p.confidence(), String::new()),
                };
                ReconciledField::new(
                    field,
                    FieldValue::Text(canonical.clone()),
                    confidence,
                    [p.source(), SourceId::Reference],
                    FieldStatus::Accepted,
                    format!(
                        "{} '{}' matched '{}' ({:.0}%){}",
                        p.source(),
                        p.original,
                        canonical,
                        p.result.similarity_score * 100.0,
                        note
                    ),
                )
            }
            (None, None) => {
                // Keep the higher-confidence raw string for human review
                let best = match (&ocr, &vlm) {
                    (Some(o), Some(v)) if o.confidence() > v.confidence() => Some(o),
                    (_, Some(v)) => Some(v),
                    (Some(o), None) => Some(o),
                    (None, None) => None,
                };
                match best {
                    Some(p) => ReconciledField::new(
                        field,
                        FieldValue::Text(p.original.to_string()),
                        p.confidence().min(p.result.similarity_score as f32),
                        [p.source()],
                        FieldStatus::LowConfidence,
                        format!(
                            "No reference match for '{}' from {} (best similarity {:.0}%)",
                            p.original,
                            p.source(),
                            p.result.similarity_score * 100.0
                        ),
                    ),
                    None => ReconciledField::missing(field, "No OCR or VLM candidate"),
                }
            }
        }
    }
}

// ============================================================================
// Exact reference policy (model name)
// ============================================================================

/// Exact-match OCR and VLM strings against a reference list
pub struct ExactReferencePolicy {
    list: ReferenceKind,
}

impl ExactReferencePolicy {
    pub fn new(list: ReferenceKind) -> Self {
        Self { list }
    }

    /// First exact match in confidence order, else the top candidate unmatched
    fn pick<'c>(
        &self,
        candidates: &'c [NormalizedCandidate],
        ctx: &ReconcileContext<'_>,
    ) -> Option<Pick<'c>> {
        let list = ctx.references.list(self.list);
        let mut fallback = None;

        for candidate in by_confidence(candidates) {
            let Some((original, _)) = candidate.as_text() else {
                continue;
            };
            let result = list.match_exact(original);
            let pick = Pick {
                candidate,
                original,
                result,
            };
            if pick.result.matched {
                return Some(pick);
            }
            fallback.get_or_insert(pick);
        }
        fallback
    }
}

impl FieldPolicy for ExactReferencePolicy {
    fn name(&self) -> &'static str {
        "exact_reference"
    }

    fn reconcile(
        &self,
        field: FieldName,
        inputs: &SourceCandidates,
        ctx: &ReconcileContext<'_>,
    ) -> ReconciledField {
        let ocr = self.pick(candidates_from(inputs, SourceId::Ocr), ctx);
        let vlm = self.pick(candidates_from(inputs, SourceId::Vlm), ctx);

        let ocr_canonical = ocr.as_ref().and_then(|p| p.canonical());
        let vlm_canonical = vlm.as_ref().and_then(|p| p.canonical());

        match (&ocr, &vlm) {
            (Some(o), Some(v)) => match (ocr_canonical, vlm_canonical) {
                (Some(oc), Some(vc)) if oc == vc => ReconciledField::new(
                    field,
                    FieldValue::Text(oc.to_string()),
                    o.confidence().max(v.confidence()),
                    [SourceId::Ocr, SourceId::Vlm, SourceId::Reference],
                    FieldStatus::Accepted,
                    format!("OCR and VLM both matched '{}'", oc),
                ),
                (_, Some(vc)) => ReconciledField::new(
                    field,
                    FieldValue::Text(vc.to_string()),
                    v.confidence(),
                    [SourceId::Vlm, SourceId::Reference],
                    FieldStatus::LowConfidence,
                    format!("VLM matched '{}' but OCR read '{}'", vc, o.original),
                ),
                (Some(oc), None) => ReconciledField::new(
                    field,
                    FieldValue::Text(oc.to_string()),
                    o.confidence(),
                    [SourceId::Ocr, SourceId::Reference],
                    FieldStatus::LowConfidence,
                    format!("OCR matched '{}' but VLM read '{}'", oc, v.original),
                ),
                (None, None) => ReconciledField::missing(
                    field,
                    format!(
                        "No exact match for OCR '{}' or VLM '{}'",
                        o.original, v.original
                    ),
                ),
            },
            (Some(p), None) | (None, Some(p)) => match p.canonical() {
                Some(canonical) => ReconciledField::new(
                    field,
                    FieldValue::Text(canonical.to_string()),
                    p.confidence(),
                    [p.source(), SourceId::Reference],
                    FieldStatus::Accepted,
                    format!("{} matched '{}'", p.source(), canonical),
                ),
                None => ReconciledField::missing(
                    field,
                    format!("No exact match for {} '{}'", p.source(), p.original),
                ),
            },
            (None, None) => ReconciledField::missing(field, "No OCR or VLM candidate"),
        }
    }
}

// ============================================================================
// Numeric policy (horsepower, asset cost)
// ============================================================================

/// OCR for agreeing digits, VLM when the sources diverge
pub struct NumericPolicy;

/// |a - b| / max(|a|, |b|), 0 when both are zero
pub fn relative_difference(a: f64, b: f64) -> f64 {
    let scale = a.abs().max(b.abs());
    if scale == 0.0 {
        0.0
    } else {
        (a - b).abs() / scale
    }
}

impl FieldPolicy for NumericPolicy {
    fn name(&self) -> &'static str {
        "numeric"
    }

    fn reconcile(
        &self,
        field: FieldName,
        inputs: &SourceCandidates,
        ctx: &ReconcileContext<'_>,
    ) -> ReconciledField {
        let config = ctx.config;
        let numeric = |source: SourceId| {
            top_candidate(
                candidates_from(inputs, source)
                    .iter()
                    .filter(|c| c.as_number().is_some()),
            )
        };
        let ocr = numeric(SourceId::Ocr);
        let vlm = numeric(SourceId::Vlm);

        let (chosen, confidence, status, sources, explanation) = match (ocr, vlm) {
            (Some(o), Some(v)) => {
                let (a, b) = (o.as_number().unwrap_or(0.0), v.as_number().unwrap_or(0.0));
                let diff_pct = relative_difference(a, b) * 100.0;
                if diff_pct <= config.numeric_tolerance_pct {
                    (
                        o,
                        o.source_confidence.min(v.source_confidence),
                        FieldStatus::Accepted,
                        vec![SourceId::Ocr, SourceId::Vlm],
                        format!("OCR {} and VLM {} agree within {:.1}%", a, b, diff_pct),
                    )
                } else {
                    (
                        v,
                        penalized(v.source_confidence, config.disagreement_penalty),
                        FieldStatus::LowConfidence,
                        vec![SourceId::Vlm],
                        format!("OCR {} and VLM {} differ by {:.1}%, using VLM", a, b, diff_pct),
                    )
                }
            }
            (Some(c), None) | (None, Some(c)) => (
                c,
                c.source_confidence,
                FieldStatus::Accepted,
                vec![c.source_id],
                format!(
                    "Single source {} value {}",
                    c.source_id,
                    c.as_number().unwrap_or(0.0)
                ),
            ),
            (None, None) => return ReconciledField::missing(field, "No numeric candidate"),
        };

        let value = chosen.as_number().unwrap_or(0.0);
        let field_value = FieldValue::Number(value);

        if chosen.out_of_range {
            let bounds = config
                .range(field)
                .map(|r| format!(" ({}-{})", r.min, r.max))
                .unwrap_or_default();
            return ReconciledField::new(
                field,
                field_value,
                penalized(confidence, config.out_of_range_penalty),
                sources,
                FieldStatus::LowConfidence,
                format!("{}; {} outside plausible range{}", explanation, value, bounds),
            );
        }

        ReconciledField::new(field, field_value, confidence, sources, status, explanation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::normalizer::normalize;
    use crate::fusion::reference::{ReferenceEntry, ReferenceList};
    use crate::types::{RawCandidate, RawValue};

    fn store() -> ReferenceStore {
        ReferenceStore::new(
            ReferenceList::new(
                "dealer",
                vec![
                    ReferenceEntry::new("ABC Tractors Pvt Ltd"),
                    ReferenceEntry::new("Sharma Motors"),
                ],
            ),
            ReferenceList::new(
                "model",
                vec![ReferenceEntry::new("MF2410"), ReferenceEntry::new("575 DI")],
            ),
        )
    }

    fn inputs(config: &ReconcileConfig, raws: Vec<RawCandidate>) -> SourceCandidates {
        let mut grouped = SourceCandidates::new();
        for raw in raws {
            let n = normalize(&raw, config).unwrap();
            grouped.entry(n.source_id).or_default().push(n);
        }
        grouped
    }

    fn text(field: FieldName, source: SourceId, s: &str, conf: f32) -> RawCandidate {
        RawCandidate::text(field, source, s, conf)
    }

    fn run(field: FieldName, raws: Vec<RawCandidate>) -> ReconciledField {
        let config = ReconcileConfig::default();
        let references = store();
        let ctx = ReconcileContext {
            config: &config,
            references: &references,
        };
        let grouped = inputs(&config, raws);
        PolicyTable::standard()
            .get(field)
            .unwrap()
            .reconcile(field, &grouped, &ctx)
    }

    #[test]
    fn test_dealer_agreement_gets_bonus() {
        let f = run(
            FieldName::DealerName,
            vec![
                text(FieldName::DealerName, SourceId::Ocr, "ABC Tractors Pvt Ltd", 0.9),
                text(FieldName::DealerName, SourceId::Vlm, "ABC Tractor Pvt. Ltd", 0.8),
            ],
        );
        assert_eq!(f.status, FieldStatus::Accepted);
        assert_eq!(f.final_value, Some(FieldValue::Text("ABC Tractors Pvt Ltd".into())));
        assert!(f.confidence > 0.9);
        assert!((f.confidence - 0.95).abs() < 1e-6);
        assert!(f.contributing_sources.contains(&SourceId::Reference));
    }

    #[test]
    fn test_dealer_agreement_capped_at_one() {
        let f = run(
            FieldName::DealerName,
            vec![
                text(FieldName::DealerName, SourceId::Ocr, "Sharma Motors", 0.98),
                text(FieldName::DealerName, SourceId::Vlm, "Sharma Motors", 0.97),
            ],
        );
        assert_eq!(f.confidence, 1.0);
    }

    #[test]
    fn test_dealer_disagreement_prefers_similarity() {
        let f = run(
            FieldName::DealerName,
            vec![
                text(FieldName::DealerName, SourceId::Ocr, "Sharma Motors", 0.6),
                text(FieldName::DealerName, SourceId::Vlm, "ABC Tractor Pvt. Ltd", 0.9),
            ],
        );
        assert_eq!(f.status, FieldStatus::LowConfidence);
        assert_eq!(f.final_value, Some(FieldValue::Text("Sharma Motors".into())));
        // similarity 1.0 scaled by (1 - 0.3)
        assert!((f.confidence - 0.7).abs() < 1e-6);
        assert!(f.contributing_sources.contains(&SourceId::Ocr));
        assert!(!f.contributing_sources.contains(&SourceId::Vlm));
    }

    #[test]
    fn test_dealer_single_source_match() {
        let f = run(
            FieldName::DealerName,
            vec![text(FieldName::DealerName, SourceId::Vlm, "Sharma Motors", 0.8)],
        );
        assert_eq!(f.status, FieldStatus::Accepted);
        assert!((f.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_dealer_match_with_unmatched_other_source_is_penalized() {
        let f = run(
            FieldName::DealerName,
            vec![
                text(FieldName::DealerName, SourceId::Ocr, "Kisan Seva Kendra", 0.9),
                text(FieldName::DealerName, SourceId::Vlm, "Sharma Motors", 0.8),
            ],
        );
        assert_eq!(f.status, FieldStatus::Accepted);
        assert!((f.confidence - 0.56).abs() < 1e-6);
    }

    #[test]
    fn test_dealer_no_match_keeps_raw_value() {
        let f = run(
            FieldName::DealerName,
            vec![
                text(FieldName::DealerName, SourceId::Ocr, "Kisan Seva Kendra", 0.9),
                text(FieldName::DealerName, SourceId::Vlm, "Krishi Kendra", 0.7),
            ],
        );
        assert_eq!(f.status, FieldStatus::LowConfidence);
        assert_eq!(f.final_value, Some(FieldValue::Text("Kisan Seva Kendra".into())));
        assert!(f.confidence < 0.85);
        assert_eq!(f.contributing_sources.len(), 1);
    }

    #[test]
    fn test_dealer_no_candidates_is_missing() {
        let f = run(FieldName::DealerName, vec![]);
        assert_eq!(f.status, FieldStatus::Missing);
        assert!(f.final_value.is_none());
        assert!(f.contributing_sources.is_empty());
    }

    #[test]
    fn test_model_prefers_vlm_on_mismatch() {
        let f = run(
            FieldName::ModelName,
            vec![
                text(FieldName::ModelName, SourceId::Ocr, "MF241O", 0.9),
                text(FieldName::ModelName, SourceId::Vlm, "MF2410", 0.8),
            ],
        );
        assert_eq!(f.final_value, Some(FieldValue::Text("MF2410".into())));
        assert_eq!(f.status, FieldStatus::LowConfidence);
    }

    #[test]
    fn test_model_agreement_takes_max_confidence() {
        let f = run(
            FieldName::ModelName,
            vec![
                text(FieldName::ModelName, SourceId::Ocr, "575 DI", 0.6),
                text(FieldName::ModelName, SourceId::Vlm, "575DI", 0.85),
            ],
        );
        assert_eq!(f.status, FieldStatus::Accepted);
        assert_eq!(f.final_value, Some(FieldValue::Text("575 DI".into())));
        assert!((f.confidence - 0.85).abs() < 1e-6);
    }

    #[test]
    fn test_model_falls_back_to_ocr_match() {
        let f = run(
            FieldName::ModelName,
            vec![
                text(FieldName::ModelName, SourceId::Ocr, "MF2410", 0.7),
                text(FieldName::ModelName, SourceId::Vlm, "MF 24I0", 0.9),
            ],
        );
        assert_eq!(f.final_value, Some(FieldValue::Text("MF2410".into())));
        assert_eq!(f.status, FieldStatus::LowConfidence);
    }

    #[test]
    fn test_model_no_exact_match_is_missing() {
        let f = run(
            FieldName::ModelName,
            vec![text(FieldName::ModelName, SourceId::Ocr, "MF241O", 0.9)],
        );
        assert_eq!(f.status, FieldStatus::Missing);
    }

    #[test]
    fn test_model_searches_all_candidates_of_a_source() {
        let f = run(
            FieldName::ModelName,
            vec![
                text(FieldName::ModelName, SourceId::Ocr, "Massey Ferguson Tractor", 0.95),
                text(FieldName::ModelName, SourceId::Ocr, "MF 2410", 0.7),
            ],
        );
        assert_eq!(f.status, FieldStatus::Accepted);
        assert_eq!(f.final_value, Some(FieldValue::Text("MF2410".into())));
        assert!((f.confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_numeric_agreement_uses_ocr() {
        let f = run(
            FieldName::HorsePower,
            vec![
                text(FieldName::HorsePower, SourceId::Ocr, "45", 0.9),
                text(FieldName::HorsePower, SourceId::Vlm, "45.0", 0.8),
            ],
        );
        assert_eq!(f.status, FieldStatus::Accepted);
        assert_eq!(f.final_value, Some(FieldValue::Number(45.0)));
        assert!((f.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_numeric_disagreement_uses_penalized_vlm() {
        let f = run(
            FieldName::AssetCost,
            vec![
                text(FieldName::AssetCost, SourceId::Ocr, "450000", 0.9),
                RawCandidate::new(FieldName::AssetCost, SourceId::Vlm, RawValue::Number(45000.0), 0.8),
            ],
        );
        assert_eq!(f.status, FieldStatus::LowConfidence);
        assert_eq!(f.final_value, Some(FieldValue::Number(45000.0)));
        assert!(f.confidence < 0.8);
    }

    #[test]
    fn test_numeric_single_source_unmodified() {
        let f = run(
            FieldName::AssetCost,
            vec![text(FieldName::AssetCost, SourceId::Vlm, "Rs. 6,50,000", 0.75)],
        );
        assert_eq!(f.status, FieldStatus::Accepted);
        assert_eq!(f.final_value, Some(FieldValue::Number(650_000.0)));
        assert!((f.confidence - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_numeric_out_of_range_penalized() {
        let f = run(
            FieldName::HorsePower,
            vec![text(FieldName::HorsePower, SourceId::Ocr, "450 HP", 0.8)],
        );
        assert_eq!(f.status, FieldStatus::LowConfidence);
        assert_eq!(f.final_value, Some(FieldValue::Number(450.0)));
        assert!((f.confidence - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_relative_difference() {
        assert_eq!(relative_difference(0.0, 0.0), 0.0);
        assert!((relative_difference(100.0, 98.0) - 0.02).abs() < 1e-12);
        assert!((relative_difference(450000.0, 45000.0) - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_policy_table_covers_all_fields() {
        let table = PolicyTable::standard();
        for field in FieldName::ALL {
            assert!(table.contains(field), "no policy for {}", field);
        }
        assert_eq!(table.get(FieldName::AssetCost).map(|p| p.name()), Some("numeric"));
    }
}
