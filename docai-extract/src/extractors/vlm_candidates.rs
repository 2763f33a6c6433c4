//! VLM candidate harvesting
//!
//! Accepts either a structured field map or the plain-text response format:
//!
//! ```text
//! DEALER_NAME: ABC Tractors Pvt Ltd
//! MODEL_NAME: 575 DI
//! HORSE_POWER: 45
//! ASSET_COST: NOT_FOUND
//! SIGNATURE: yes
//! STAMP: no
//! ```
//!
//! `NOT_FOUND` and empty values mean the VLM offers no candidate.

use crate::extractors::{VlmField, VlmValue};
use crate::types::{FieldName, RawCandidate, RawValue, SourceId};
use std::collections::BTreeMap;

const NOT_FOUND: &str = "NOT_FOUND";

fn field_for_key(key: &str) -> Option<FieldName> {
    match key.trim().to_ascii_uppercase().as_str() {
        "DEALER_NAME" => Some(FieldName::DealerName),
        "MODEL_NAME" => Some(FieldName::ModelName),
        "HORSE_POWER" | "HP" => Some(FieldName::HorsePower),
        "ASSET_COST" => Some(FieldName::AssetCost),
        "SIGNATURE" | "DEALER_SIGNATURE" => Some(FieldName::DealerSignature),
        "STAMP" | "DEALER_STAMP" => Some(FieldName::DealerStamp),
        _ => None,
    }
}

fn is_absent(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.eq_ignore_ascii_case(NOT_FOUND)
}

/// yes/no style presence answer
fn parse_presence(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" | "present" => Some(true),
        "no" | "n" | "false" | "absent" => Some(false),
        _ => None,
    }
}

/// Parse the `KEY: value` response. Unknown keys and later duplicates are
/// ignored; every field gets `confidence`.
pub fn parse_response(response: &str, confidence: f32) -> BTreeMap<FieldName, VlmField> {
    let mut fields = BTreeMap::new();

    for line in response.lines() {
        let Some((key, value)) = line.trim().split_once(':') else {
            continue;
        };
        let Some(field) = field_for_key(key) else {
            continue;
        };
        let value = value.trim();
        let value = if is_absent(value) {
            None
        } else {
            Some(VlmValue::Text(value.to_string()))
        };
        fields.entry(field).or_insert(VlmField { value, confidence });
    }

    fields
}

/// Turn a VLM field map into raw candidates
pub fn from_fields(fields: &BTreeMap<FieldName, VlmField>) -> Vec<RawCandidate> {
    fields
        .iter()
        .filter_map(|(field, vlm)| {
            let raw = to_raw_value(*field, vlm.value.as_ref()?)?;
            Some(RawCandidate::new(*field, SourceId::Vlm, raw, vlm.confidence))
        })
        .collect()
}

fn to_raw_value(field: FieldName, value: &VlmValue) -> Option<RawValue> {
    if field.is_mark() {
        return match value {
            VlmValue::Bool(b) => Some(RawValue::Presence(*b)),
            VlmValue::Text(s) => parse_presence(s).map(RawValue::Presence),
            VlmValue::Number(_) => None,
        };
    }

    match value {
        VlmValue::Text(s) if is_absent(s) => None,
        VlmValue::Text(s) => Some(RawValue::Text(s.clone())),
        VlmValue::Number(n) if field.is_numeric() => Some(RawValue::Number(*n)),
        VlmValue::Number(n) => Some(RawValue::Text(n.to_string())),
        VlmValue::Bool(_) => None,
    }
}
