//! Reconciliation engine configuration
//!
//! Built from the `[reconcile]` table of the bootstrap TOML. Every key is
//! enumerated here; unknown keys are rejected so a typo in a threshold name
//! cannot silently fall back to a default.
//!
//! ```toml
//! [reconcile]
//! dealer_similarity_threshold = 0.85
//! numeric_tolerance_pct = 2.0
//! required = ["dealer_name", "model_name", "horse_power", "asset_cost"]
//!
//! [reconcile.ranges.horse_power]
//! min = 15
//! max = 200
//!
//! [reconcile.thresholds]
//! model_name = 0.7
//! ```

use crate::error::{ExtractError, ExtractResult};
use crate::types::FieldName;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

/// Acceptance threshold for fields without an explicit entry
pub const DEFAULT_FIELD_THRESHOLD: f32 = 0.5;

/// Plausible interval for a numeric field (inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Validated engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileConfig {
    /// Minimum fuzzy similarity for a dealer match (0.0-1.0)
    pub dealer_similarity_threshold: f64,
    /// Relative numeric agreement tolerance in percent
    pub numeric_tolerance_pct: f64,
    /// Overlap above which detector boxes are duplicates
    pub iou_threshold: f64,
    pub agreement_bonus: f32,
    pub disagreement_penalty: f32,
    pub out_of_range_penalty: f32,
    /// Detections below this confidence are discarded before reconciliation
    pub detector_min_confidence: f32,
    pub ranges: BTreeMap<FieldName, ValueRange>,
    /// Output schema, in output order
    pub fields: Vec<FieldName>,
    pub required: BTreeSet<FieldName>,
    pub thresholds: BTreeMap<FieldName, f32>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            dealer_similarity_threshold: 0.85,
            numeric_tolerance_pct: 2.0,
            iou_threshold: 0.5,
            agreement_bonus: 0.10,
            disagreement_penalty: 0.30,
            out_of_range_penalty: 0.50,
            detector_min_confidence: 0.30,
            ranges: default_ranges(),
            fields: FieldName::ALL.to_vec(),
            required: default_required(),
            thresholds: FieldName::ALL
                .iter()
                .map(|f| (*f, DEFAULT_FIELD_THRESHOLD))
                .collect(),
        }
    }
}

fn default_ranges() -> BTreeMap<FieldName, ValueRange> {
    BTreeMap::from([
        (FieldName::HorsePower, ValueRange::new(15.0, 200.0)),
        (FieldName::AssetCost, ValueRange::new(200_000.0, 2_000_000.0)),
    ])
}

fn default_required() -> BTreeSet<FieldName> {
    BTreeSet::from([
        FieldName::DealerName,
        FieldName::ModelName,
        FieldName::HorsePower,
        FieldName::AssetCost,
    ])
}

/// TOML shape of the `[reconcile]` table (field names as strings)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ReconcileSection {
    dealer_similarity_threshold: Option<f64>,
    numeric_tolerance_pct: Option<f64>,
    iou_threshold: Option<f64>,
    agreement_bonus: Option<f32>,
    disagreement_penalty: Option<f32>,
    out_of_range_penalty: Option<f32>,
    detector_min_confidence: Option<f32>,
    ranges: BTreeMap<String, ValueRange>,
    fields: Option<Vec<String>>,
    required: Option<Vec<String>>,
    thresholds: BTreeMap<String, f32>,
}

fn parse_field(name: &str, key: &str) -> ExtractResult<FieldName> {
    name.parse::<FieldName>()
        .map_err(|e| ExtractError::InvalidConfiguration(format!("{}: {}", key, e)))
}

fn parse_fields(names: &[String], key: &str) -> ExtractResult<Vec<FieldName>> {
    names.iter().map(|n| parse_field(n, key)).collect()
}

impl TryFrom<ReconcileSection> for ReconcileConfig {
    type Error = ExtractError;

    fn try_from(section: ReconcileSection) -> ExtractResult<Self> {
        let defaults = ReconcileConfig::default();

        let fields = match &section.fields {
            Some(names) => parse_fields(names, "fields")?,
            None => defaults.fields.clone(),
        };

        let required = match &section.required {
            Some(names) => parse_fields(names, "required")?.into_iter().collect(),
            None => defaults.required.clone(),
        };

        let mut ranges = defaults.ranges.clone();
        for (name, range) in &section.ranges {
            let field = parse_field(name, "ranges")?;
            if !field.is_numeric() {
                return Err(ExtractError::InvalidConfiguration(format!(
                    "ranges: {} is not a numeric field",
                    field
                )));
            }
            ranges.insert(field, *range);
        }

        let mut thresholds = defaults.thresholds.clone();
        for (name, value) in &section.thresholds {
            thresholds.insert(parse_field(name, "thresholds")?, *value);
        }

        let config = ReconcileConfig {
            dealer_similarity_threshold: section
                .dealer_similarity_threshold
                .unwrap_or(defaults.dealer_similarity_threshold),
            numeric_tolerance_pct: section
                .numeric_tolerance_pct
                .unwrap_or(defaults.numeric_tolerance_pct),
            iou_threshold: section.iou_threshold.unwrap_or(defaults.iou_threshold),
            agreement_bonus: section.agreement_bonus.unwrap_or(defaults.agreement_bonus),
            disagreement_penalty: section
                .disagreement_penalty
                .unwrap_or(defaults.disagreement_penalty),
            out_of_range_penalty: section
                .out_of_range_penalty
                .unwrap_or(defaults.out_of_range_penalty),
            detector_min_confidence: section
                .detector_min_confidence
                .unwrap_or(defaults.detector_min_confidence),
            ranges,
            fields,
            required,
            thresholds,
        };

        config.validate()?;
        Ok(config)
    }
}

impl ReconcileConfig {
    /// Build from the bootstrap `[reconcile]` table
    pub fn from_table(table: &toml::Table) -> ExtractResult<Self> {
        let section = toml::Value::Table(table.clone())
            .try_into::<ReconcileSection>()
            .map_err(|e| ExtractError::InvalidConfiguration(format!("[reconcile]: {}", e)))?;
        Self::try_from(section)
    }

    /// Parse a standalone `[reconcile]` body
    pub fn from_toml(input: &str) -> ExtractResult<Self> {
        let section: ReconcileSection = toml::from_str(input)
            .map_err(|e| ExtractError::InvalidConfiguration(format!("[reconcile]: {}", e)))?;
        Self::try_from(section)
    }

    /// Acceptance threshold for a field
    pub fn threshold(&self, field: FieldName) -> f32 {
        self.thresholds
            .get(&field)
            .copied()
            .unwrap_or(DEFAULT_FIELD_THRESHOLD)
    }

    pub fn range(&self, field: FieldName) -> Option<&ValueRange> {
        self.ranges.get(&field)
    }

    pub fn is_required(&self, field: FieldName) -> bool {
        self.required.contains(&field)
    }

    /// Detector classes requested for this schema
    pub fn mark_fields(&self) -> Vec<FieldName> {
        self.fields.iter().copied().filter(|f| f.is_mark()).collect()
    }

    /// Check every value is usable. Fails with `InvalidConfiguration`.
    pub fn validate(&self) -> ExtractResult<()> {
        let unit = |name: &str, value: f64| -> ExtractResult<()> {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ExtractError::InvalidConfiguration(format!(
                    "{} must be within 0.0-1.0 (got {})",
                    name, value
                )))
            }
        };

        unit("dealer_similarity_threshold", self.dealer_similarity_threshold)?;
        unit("iou_threshold", self.iou_threshold)?;
        unit("agreement_bonus", self.agreement_bonus as f64)?;
        unit("disagreement_penalty", self.disagreement_penalty as f64)?;
        unit("out_of_range_penalty", self.out_of_range_penalty as f64)?;
        unit("detector_min_confidence", self.detector_min_confidence as f64)?;

        if !self.numeric_tolerance_pct.is_finite() || self.numeric_tolerance_pct < 0.0 {
            return Err(ExtractError::InvalidConfiguration(format!(
                "numeric_tolerance_pct must be finite and >= 0 (got {})",
                self.numeric_tolerance_pct
            )));
        }

        for (field, range) in &self.ranges {
            if !(range.min.is_finite() && range.max.is_finite() && range.min < range.max) {
                return Err(ExtractError::InvalidConfiguration(format!(
                    "ranges.{}: min must be below max (got {}..{})",
                    field, range.min, range.max
                )));
            }
        }

        for (field, threshold) in &self.thresholds {
            unit(format!("thresholds.{}", field).as_str(), *threshold as f64)?;
        }

        if self.fields.is_empty() {
            return Err(ExtractError::InvalidConfiguration(
                "fields must name at least one field".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for field in &self.fields {
            if !seen.insert(*field) {
                return Err(ExtractError::InvalidConfiguration(format!(
                    "fields lists {} more than once",
                    field
                )));
            }
        }

        if let Some(field) = self.required.iter().find(|f| !seen.contains(f)) {
            return Err(ExtractError::InvalidConfiguration(format!(
                "required field {} is not in fields",
                field
            )));
        }

        Ok(())
    }
}
