//! Candidate Normalizer
//!
//! Converts each `RawCandidate` into a comparable `NormalizedCandidate`.
//! Text is case-folded with punctuation stripped; numbers are parsed with
//! tolerance for thousands separators, decimal variants and unit tokens, and
//! scaled by Indian magnitude words ("6.5 lakh" is 650000).
//! Unparsable input is reported per candidate and never aborts a document.

use crate::config::ReconcileConfig;
use crate::types::{
    clamp_confidence, NormalizeError, NormalizedCandidate, NormalizedValue, RawCandidate, RawValue,
};
use regex::Regex;
use std::sync::LazyLock;

/// First run of ASCII digits, allowing inner separators
static DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9](?:[0-9,.]*[0-9])?").unwrap());

/// Magnitude word directly after the digit run
static MAGNITUDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(lakhs?|lacs?|crores?|cr)\b").unwrap());

const LAKH: f64 = 100_000.0;
const CRORE: f64 = 10_000_000.0;

/// Fold text for comparison: lowercase, apostrophes removed, other
/// punctuation and symbols replaced by spaces, whitespace collapsed.
///
/// `&` is kept since it distinguishes names like "A & B Motors".
pub fn fold_text(input: &str) -> String {
    let mapped: String = input
        .chars()
        .filter(|c| !matches!(c, '\'' | '\u{2019}'))
        .map(|c| {
            if c.is_alphanumeric() || c == '&' {
                c
            } else {
                ' '
            }
        })
        .collect::<String>()
        .to_lowercase();

    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Compact identifier key: folded text with spaces removed ("MF-241 DI" → "mf241di")
pub fn compact_key(input: &str) -> String {
    fold_text(input).chars().filter(|c| !c.is_whitespace()).collect()
}

/// Trim and collapse internal whitespace, preserving case
pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse the first digit sequence in `input` as a number.
///
/// Separator rules:
/// - both `,` and `.` present: the last one is the decimal mark
/// - only `,`: a single comma followed by exactly three digits is a thousands
///   separator, otherwise a decimal mark; several commas are thousands
///   separators (covers lakh grouping "4,50,000")
/// - only `.`: several dots are thousands separators, one dot is decimal
///
/// Unit tokens ("HP", "Rs.", "₹", "/-") are skipped since only the digit run
/// is read. Returns `None` when no digit is present.
pub fn parse_number(input: &str) -> Option<f64> {
    let run = DIGIT_RUN.find(input)?.as_str();

    let commas = run.matches(',').count();
    let dots = run.matches('.').count();

    let cleaned: String = match (commas, dots) {
        (0, 0) => run.to_string(),
        (_, 0) => {
            let tail = run.rsplit(',').next().unwrap_or("");
            if commas == 1 && tail.len() != 3 {
                run.replace(',', ".")
            } else {
                run.replace(',', "")
            }
        }
        (0, _) => {
            if dots == 1 {
                run.to_string()
            } else {
                run.replace('.', "")
            }
        }
        _ => {
            let last_comma = run.rfind(',').unwrap_or(0);
            let last_dot = run.rfind('.').unwrap_or(0);
            if last_dot > last_comma {
                run.replace(',', "")
            } else {
                run.replace('.', "").replace(',', ".")
            }
        }
    };

    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Multiplier for a magnitude word; 1.0 for anything else ("rupees")
pub fn magnitude_multiplier(word: &str) -> f64 {
    let word = word.to_lowercase();
    if word.starts_with("lakh") || word.starts_with("lac") {
        LAKH
    } else if word.starts_with("cr") {
        CRORE
    } else {
        1.0
    }
}

/// Parse an amount in rupees: the first number in `input`, scaled when it is
/// followed by lakh/lac or crore/cr ("Rs. 6.5 Lakh" is 650000).
pub fn parse_amount(input: &str) -> Option<f64> {
    let run = DIGIT_RUN.find(input)?;
    let value = parse_number(run.as_str())?;
    let scale = MAGNITUDE
        .captures(&input[run.end()..])
        .map_or(1.0, |caps| magnitude_multiplier(&caps[1]));
    Some(value * scale).filter(|v| v.is_finite())
}

fn describe(raw: &RawValue) -> String {
    match raw {
        RawValue::Text(s) => s.clone(),
        RawValue::Number(n) => n.to_string(),
        RawValue::Region(b) => format!(
            "[{}, {}, {}, {}]",
            b.x_min, b.y_min, b.x_max, b.y_max
        ),
        RawValue::Presence(p) => p.to_string(),
    }
}

/// Normalize one candidate.
///
/// Numeric values outside the configured plausible range are kept and
/// flagged via `out_of_range` so the reconciler can penalize them.
pub fn normalize(
    raw: &RawCandidate,
    config: &ReconcileConfig,
) -> Result<NormalizedCandidate, NormalizeError> {
    let field = raw.field_name;
    let unparsable = || NormalizeError::UnparsableValue {
        field,
        source_id: raw.source_id,
        raw: describe(&raw.raw_value),
    };

    let normalized_value = if field.is_numeric() {
        let value = match &raw.raw_value {
            RawValue::Number(n) if n.is_finite() => *n,
            RawValue::Text(s) => parse_amount(s).ok_or_else(unparsable)?,
            _ => return Err(unparsable()),
        };
        NormalizedValue::Number(value)
    } else if field.is_mark() {
        match &raw.raw_value {
            RawValue::Region(bbox) if bbox.is_valid() => NormalizedValue::Region(*bbox),
            RawValue::Presence(present) => NormalizedValue::Presence(*present),
            _ => return Err(unparsable()),
        }
    } else {
        let original = match &raw.raw_value {
            RawValue::Text(s) => collapse_whitespace(s),
            RawValue::Number(n) if n.is_finite() => n.to_string(),
            _ => return Err(unparsable()),
        };
        let folded = fold_text(&original);
        if folded.is_empty() {
            return Err(unparsable());
        }
        NormalizedValue::Text { original, folded }
    };

    let out_of_range = match (&normalized_value, config.range(field)) {
        (NormalizedValue::Number(v), Some(range)) => !range.contains(*v),
        _ => false,
    };

    Ok(NormalizedCandidate {
        field_name: field,
        source_id: raw.source_id,
        normalized_value,
        source_confidence: clamp_confidence(raw.source_confidence),
        out_of_range,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, FieldName, SourceId};

    #[test]
    fn test_fold_text() {
        assert_eq!(fold_text("  ABC Tractor Pvt.  Ltd "), "abc tractor pvt ltd");
        assert_eq!(fold_text("Ram's Motors"), "rams motors");
        assert_eq!(fold_text("A&B  Motors, Pune"), "a&b motors pune");
        assert_eq!(fold_text("₹ --- "), "");
    }

    #[test]
    fn test_compact_key() {
        assert_eq!(compact_key("MF-241 DI"), "mf241di");
        assert_eq!(compact_key("mf 241 di"), "mf241di");
    }

    #[test]
    fn test_parse_number_plain_and_units() {
        assert_eq!(parse_number("45"), Some(45.0));
        assert_eq!(parse_number("45.0"), Some(45.0));
        assert_eq!(parse_number("45 HP"), Some(45.0));
        assert_eq!(parse_number("HP: 50"), Some(50.0));
        assert_eq!(parse_number("Rs. 4,50,000/-"), Some(450_000.0));
        assert_eq!(parse_number("₹450000"), Some(450_000.0));
    }

    #[test]
    fn test_parse_amount_magnitude_words() {
        assert_eq!(parse_amount("Rs. 6.5 Lakh"), Some(650_000.0));
        assert_eq!(parse_amount("6.5 lakhs"), Some(650_000.0));
        assert_eq!(parse_amount("₹ 7 Lac"), Some(700_000.0));
        assert_eq!(parse_amount("1.25 Crore"), Some(12_500_000.0));
        assert_eq!(parse_amount("2 Cr."), Some(20_000_000.0));
        assert_eq!(parse_amount("Rs. 4,50,000/-"), Some(450_000.0));
        assert_eq!(parse_amount("45 HP"), Some(45.0));
        // Only a word directly after the number scales it
        assert_eq!(parse_amount("5 units, lakh scheme"), Some(5.0));
        assert_eq!(parse_amount("lakh"), None);
    }

    #[test]
    fn test_normalize_scales_lakh_text() {
        let raw = RawCandidate::text(FieldName::AssetCost, SourceId::Vlm, "Rs. 6.5 Lakh", 0.9);
        let n = normalize(&raw, &ReconcileConfig::default()).unwrap();
        assert_eq!(n.as_number(), Some(650_000.0));
        assert!(!n.out_of_range);
    }

    #[test]
    fn test_parse_number_separators() {
        assert_eq!(parse_number("1,234,567.50"), Some(1_234_567.5));
        assert_eq!(parse_number("1.234.567,50"), Some(1_234_567.5));
        assert_eq!(parse_number("450,000"), Some(450_000.0));
        assert_eq!(parse_number("42,5"), Some(42.5));
        assert_eq!(parse_number("4.500.000"), Some(4_500_000.0));
    }

    #[test]
    fn test_parse_number_no_digits() {
        assert_eq!(parse_number("forty five"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn test_normalize_text() {
        let raw = RawCandidate::text(FieldName::DealerName, SourceId::Ocr, " ABC   Tractors ", 0.9);
        let n = normalize(&raw, &ReconcileConfig::default()).unwrap();
        assert_eq!(n.as_text(), Some(("ABC Tractors", "abc tractors")));
        assert!(!n.out_of_range);
    }

    #[test]
    fn test_normalize_numeric_range_flag() {
        let config = ReconcileConfig::default();
        let raw = RawCandidate::text(FieldName::HorsePower, SourceId::Vlm, "450 HP", 0.8);
        let n = normalize(&raw, &config).unwrap();
        assert_eq!(n.as_number(), Some(450.0));
        assert!(n.out_of_range);

        let raw = RawCandidate::new(FieldName::HorsePower, SourceId::Vlm, RawValue::Number(45.0), 0.8);
        assert!(!normalize(&raw, &config).unwrap().out_of_range);
    }

    #[test]
    fn test_normalize_unparsable() {
        let config = ReconcileConfig::default();
        let raw = RawCandidate::text(FieldName::AssetCost, SourceId::Ocr, "N/A", 0.9);
        let err = normalize(&raw, &config).unwrap_err();
        assert_eq!(
            err,
            NormalizeError::UnparsableValue {
                field: FieldName::AssetCost,
                source_id: SourceId::Ocr,
                raw: "N/A".to_string()
            }
        );

        let raw = RawCandidate::new(
            FieldName::HorsePower,
            SourceId::Vlm,
            RawValue::Number(f64::NAN),
            0.9,
        );
        assert!(normalize(&raw, &config).is_err());
    }

    #[test]
    fn test_normalize_rejects_degenerate_box() {
        let config = ReconcileConfig::default();
        let raw = RawCandidate::new(
            FieldName::DealerStamp,
            SourceId::Detector,
            RawValue::Region(BoundingBox::new(10.0, 10.0, 10.0, 30.0, 0.9)),
            0.9,
        );
        assert!(normalize(&raw, &config).is_err());
    }

    #[test]
    fn test_normalize_presence_on_text_field_rejected() {
        let raw = RawCandidate::new(
            FieldName::ModelName,
            SourceId::Vlm,
            RawValue::Presence(true),
            0.9,
        );
        assert!(normalize(&raw, &ReconcileConfig::default()).is_err());
    }
}
