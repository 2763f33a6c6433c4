//! OCR candidate harvesting
//!
//! Scans OCR lines for field candidates. Each candidate carries the
//! confidence of the line it came from.
//!
//! - dealer: lines with dealer keywords (motors, tractors, pvt, ...)
//! - model: text after a `Model:` label, else lines naming a tractor brand
//! - horsepower: `<n> HP`, `HP: <n>`, `Power: <n>`
//! - asset cost: labelled or currency-prefixed amounts; the largest plausible
//!   amount is taken as the total

use crate::config::{ReconcileConfig, ValueRange};
use crate::extractors::OcrLine;
use crate::fusion::normalizer::{collapse_whitespace, parse_amount, parse_number};
use crate::types::{FieldName, RawCandidate, RawValue, SourceId};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

const DEALER_KEYWORDS: &[&str] = &[
    "motors", "auto", "tractors", "pvt", "ltd", "limited", "company", "dealer",
];

const TRACTOR_BRANDS: &[&str] = &[
    "mahindra",
    "john deere",
    "sonalika",
    "tafe",
    "new holland",
    "kubota",
    "massey ferguson",
    "farmtrac",
    "powertrac",
];

const MAX_DEALER_CANDIDATES: usize = 5;
const MAX_MODEL_CANDIDATES: usize = 10;

static MODEL_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bmodel\s*(?:name|no\.?|number)?\s*[:\-]\s*(.+)$").unwrap()
});

/// Tried in order; the first hit wins
static HP_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(\d{1,3}(?:\.\d+)?)\s*(?:hp|horse\s*power)\b").unwrap(),
        Regex::new(r"(?i)\b(?:hp|horse\s*power)\s*[:\-]?\s*(\d{1,3}(?:\.\d+)?)").unwrap(),
        Regex::new(r"(?i)\bpower\s*[:\-]?\s*(\d{1,3}(?:\.\d+)?)").unwrap(),
    ]
});

static COST_LABELLED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:total|cost|price|amount|value)\s*[:\-]?\s*(?:rs\.?|₹|inr)?\s*([0-9][0-9,]*(?:\.[0-9]{1,2})?)",
    )
    .unwrap()
});

static COST_CURRENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:rs\.?|₹|inr)\s*([0-9][0-9,]*(?:\.[0-9]{1,2})?)").unwrap()
});

static COST_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[0-9][0-9,]*(?:\.[0-9]{1,2})?\s*(?:rupees|lakhs?|lacs?|crores?)").unwrap()
});

/// Harvest candidates for every configured scalar field
pub fn harvest(lines: &[OcrLine], config: &ReconcileConfig) -> Vec<RawCandidate> {
    let mut candidates = Vec::new();

    for field in &config.fields {
        match field {
            FieldName::DealerName => candidates.extend(dealer_candidates(lines)),
            FieldName::ModelName => candidates.extend(model_candidates(lines)),
            FieldName::HorsePower => candidates.extend(horse_power_candidate(lines)),
            FieldName::AssetCost => {
                candidates.extend(asset_cost_candidate(lines, config.range(FieldName::AssetCost)))
            }
            FieldName::DealerSignature | FieldName::DealerStamp => {}
        }
    }

    debug!(lines = lines.len(), candidates = candidates.len(), "Harvested OCR candidates");
    candidates
}

/// Lines that look like a dealer name, punctuation removed
pub fn dealer_candidates(lines: &[OcrLine]) -> Vec<RawCandidate> {
    lines
        .iter()
        .filter(|line| {
            let lower = line.text.to_lowercase();
            DEALER_KEYWORDS.iter().any(|kw| lower.contains(kw))
        })
        .filter_map(|line| {
            let cleaned: String = line
                .text
                .chars()
                .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
                .collect();
            let cleaned = collapse_whitespace(&cleaned);
            (cleaned.chars().count() > 5).then(|| {
                RawCandidate::text(FieldName::DealerName, SourceId::Ocr, cleaned, line.confidence)
            })
        })
        .take(MAX_DEALER_CANDIDATES)
        .collect()
}

/// Labelled model values first, then brand lines (whole line and the text
/// after the brand name)
pub fn model_candidates(lines: &[OcrLine]) -> Vec<RawCandidate> {
    let mut found: Vec<(String, f32)> = Vec::new();

    for line in lines {
        if let Some(caps) = MODEL_LABEL.captures(&line.text) {
            let value = collapse_whitespace(&caps[1]);
            if !value.is_empty() {
                found.push((value, line.confidence));
            }
        }
    }

    for line in lines {
        let lower = line.text.to_lowercase();
        let Some(brand) = TRACTOR_BRANDS.iter().find(|b| lower.contains(*b)) else {
            continue;
        };
        found.push((collapse_whitespace(&line.text), line.confidence));

        if let Some(pos) = lower.find(brand) {
            let rest = line.text.get(pos + brand.len()..).unwrap_or("");
            let rest = collapse_whitespace(rest);
            if !rest.is_empty() {
                found.push((rest, line.confidence));
            }
        }
    }

    let mut seen = std::collections::HashSet::new();
    found
        .into_iter()
        .filter(|(value, _)| seen.insert(value.clone()))
        .take(MAX_MODEL_CANDIDATES)
        .map(|(value, conf)| RawCandidate::text(FieldName::ModelName, SourceId::Ocr, value, conf))
        .collect()
}

/// First horsepower mention, by pattern priority then line order
pub fn horse_power_candidate(lines: &[OcrLine]) -> Option<RawCandidate> {
    HP_PATTERNS.iter().find_map(|pattern| {
        lines.iter().find_map(|line| {
            pattern.captures(&line.text).map(|caps| {
                RawCandidate::text(FieldName::HorsePower, SourceId::Ocr, &caps[1], line.confidence)
            })
        })
    })
}

/// Largest plausible amount on the page. Falls back to the largest amount
/// when none is inside `range`.
pub fn asset_cost_candidate(lines: &[OcrLine], range: Option<&ValueRange>) -> Option<RawCandidate> {
    let mut amounts: Vec<(f64, f32)> = Vec::new();

    for line in lines {
        for pattern in [&*COST_LABELLED, &*COST_CURRENCY] {
            for caps in pattern.captures_iter(&line.text) {
                if let Some(value) = parse_number(&caps[1]) {
                    amounts.push((value, line.confidence));
                }
            }
        }
        for found in COST_WORDS.find_iter(&line.text) {
            if let Some(value) = parse_amount(found.as_str()) {
                amounts.push((value, line.confidence));
            }
        }
    }

    let plausible = |v: f64| range.map_or(true, |r| r.contains(v));
    let largest = |only_plausible: bool| {
        amounts
            .iter()
            .filter(|(v, _)| !only_plausible || plausible(*v))
            .fold(None, |best: Option<(f64, f32)>, &(v, c)| match best {
                Some((bv, _)) if bv >= v => best,
                _ => Some((v, c)),
            })
    };

    largest(true).or_else(|| largest(false)).map(|(value, conf)| {
        RawCandidate::new(FieldName::AssetCost, SourceId::Ocr, RawValue::Number(value), conf)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(texts: &[&str]) -> Vec<OcrLine> {
        texts.iter().map(|t| OcrLine::new(*t, 0.9)).collect()
    }

    fn text_of(c: &RawCandidate) -> &str {
        match &c.raw_value {
            RawValue::Text(s) => s,
            _ => "",
        }
    }

    #[test]
    fn test_dealer_keyword_lines() {
        let found = dealer_candidates(&lines(&[
            "TAX INVOICE",
            "M/s. ABC Tractors Pvt. Ltd.",
            "Ltd",
            "GSTIN: 27ABCDE1234F1Z5",
        ]));
        assert_eq!(found.len(), 1);
        assert_eq!(text_of(&found[0]), "M s ABC Tractors Pvt Ltd");
    }

    #[test]
    fn test_dealer_cap() {
        let many: Vec<String> = (0..8).map(|i| format!("Dealer number {}", i)).collect();
        let refs: Vec<&str> = many.iter().map(String::as_str).collect();
        assert_eq!(dealer_candidates(&lines(&refs)).len(), MAX_DEALER_CANDIDATES);
    }

    #[test]
    fn test_model_label_then_brand() {
        let found = model_candidates(&lines(&[
            "Mahindra 575 DI XP Plus",
            "Model No: 575 DI",
        ]));
        let values: Vec<&str> = found.iter().map(text_of).collect();
        assert_eq!(values, vec!["575 DI", "Mahindra 575 DI XP Plus", "575 DI XP Plus"]);
    }

    #[test]
    fn test_horse_power_patterns() {
        let c = horse_power_candidate(&lines(&["Engine 3 cyl", "Rated 45 HP"])).unwrap();
        assert_eq!(text_of(&c), "45");

        let c = horse_power_candidate(&lines(&["HP: 50"])).unwrap();
        assert_eq!(text_of(&c), "50");

        let c = horse_power_candidate(&lines(&["Power - 39"])).unwrap();
        assert_eq!(text_of(&c), "39");

        assert!(horse_power_candidate(&lines(&["Qty 1"])).is_none());
    }

    #[test]
    fn test_asset_cost_takes_largest_plausible() {
        let range = ValueRange::new(200_000.0, 2_000_000.0);
        let c = asset_cost_candidate(
            &lines(&[
                "Price: Rs. 4,20,000",
                "GST Amount: 50,400",
                "Total Amount ₹ 4,70,400.00",
                "Invoice value 98765432",
            ]),
            Some(&range),
        )
        .unwrap();
        assert_eq!(c.raw_value, RawValue::Number(470_400.0));
    }

    #[test]
    fn test_asset_cost_lakh_suffix() {
        let c = asset_cost_candidate(&lines(&["Cost 6.5 lakh"]), None).unwrap();
        assert_eq!(c.raw_value, RawValue::Number(650_000.0));

        let c = asset_cost_candidate(&lines(&["Ex-showroom 1.5 crore"]), None).unwrap();
        assert_eq!(c.raw_value, RawValue::Number(15_000_000.0));
    }

    #[test]
    fn test_asset_cost_falls_back_to_largest() {
        let range = ValueRange::new(200_000.0, 2_000_000.0);
        let c = asset_cost_candidate(&lines(&["Total: 45000"]), Some(&range)).unwrap();
        assert_eq!(c.raw_value, RawValue::Number(45_000.0));
    }

    #[test]
    fn test_harvest_respects_schema() {
        let config = ReconcileConfig::from_toml(
            r#"
fields = ["horse_power"]
required = []
"#,
        )
        .unwrap();
        let found = harvest(&lines(&["ABC Motors", "45 HP", "Total Rs 500000"]), &config);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].field_name, FieldName::HorsePower);
    }
}
