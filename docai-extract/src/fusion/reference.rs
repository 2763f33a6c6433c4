//! Reference Matcher and Reference Store
//!
//! Dealer names are fuzzy-matched (normalized Levenshtein over folded text);
//! model names are matched exactly on a compact key, since a near-miss on a
//! model code is worse than no match.
//!
//! # Reference file format
//! ```text
//! # canonical | alias | alias
//! ABC Tractors Pvt Ltd | ABC Tractors | A.B.C. Tractors
//! Sharma Motors
//! ```
//!
//! Lists are loaded once at startup and shared read-only (`Arc<ReferenceStore>`)
//! across all documents of a run.

use crate::error::{ExtractError, ExtractResult};
use crate::fusion::normalizer::{compact_key, fold_text};
use crate::types::MatchResult;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{info, warn};

/// One canonical name with its known aliases
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry {
    pub canonical_name: String,
    pub aliases: BTreeSet<String>,
}

impl ReferenceEntry {
    pub fn new(canonical_name: impl Into<String>) -> Self {
        Self {
            canonical_name: canonical_name.into(),
            aliases: BTreeSet::new(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.insert(alias.into());
        self
    }
}

/// Entry with comparison forms precomputed at load time
#[derive(Debug, Clone)]
struct PreparedEntry {
    entry: ReferenceEntry,
    canonical_folded: String,
    alias_folded: Vec<String>,
    canonical_key: String,
    alias_keys: Vec<String>,
}

impl PreparedEntry {
    fn new(entry: ReferenceEntry) -> Self {
        Self {
            canonical_folded: fold_text(&entry.canonical_name),
            alias_folded: entry.aliases.iter().map(|a| fold_text(a)).collect(),
            canonical_key: compact_key(&entry.canonical_name),
            alias_keys: entry.aliases.iter().map(|a| compact_key(a)).collect(),
            entry,
        }
    }

    fn name_len(&self) -> usize {
        self.entry.canonical_name.chars().count()
    }
}

/// Best hit within a single entry
struct Hit<'a> {
    entry: &'a PreparedEntry,
    score: f64,
    via_canonical: bool,
}

/// Ranking for equal-score hits: canonical hit first, then shortest canonical
/// name, then lexicographic. `Ordering::Less` means `a` ranks ahead.
fn rank(a: &Hit<'_>, b: &Hit<'_>) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.via_canonical.cmp(&a.via_canonical))
        .then_with(|| a.entry.name_len().cmp(&b.entry.name_len()))
        .then_with(|| a.entry.entry.canonical_name.cmp(&b.entry.entry.canonical_name))
}

/// Immutable reference list
#[derive(Debug, Clone)]
pub struct ReferenceList {
    name: String,
    entries: Vec<PreparedEntry>,
}

impl ReferenceList {
    pub fn new(name: impl Into<String>, entries: Vec<ReferenceEntry>) -> Self {
        Self {
            name: name.into(),
            entries: entries.into_iter().map(PreparedEntry::new).collect(),
        }
    }

    /// Parse `canonical | alias | alias` lines. Repeated canonical names merge.
    pub fn parse(name: impl Into<String>, content: &str) -> Self {
        let mut merged: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut parts = line.split('|').map(str::trim).filter(|p| !p.is_empty());
            let Some(canonical) = parts.next() else {
                continue;
            };
            let aliases = merged.entry(canonical.to_string()).or_default();
            aliases.extend(parts.map(str::to_string));
        }

        let entries = merged
            .into_iter()
            .map(|(canonical_name, aliases)| ReferenceEntry {
                canonical_name,
                aliases,
            })
            .collect();
        Self::new(name, entries)
    }

    /// Read a list file. A missing or unreadable file is fatal.
    pub fn load(name: &str, path: &Path) -> ExtractResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ExtractError::Reference(format!("{} list {}: {}", name, path.display(), e))
        })?;
        let list = Self::parse(name, &content);

        if list.is_empty() {
            warn!(list = name, path = %path.display(), "Reference list is empty, every match will fail");
        } else {
            info!(list = name, entries = list.len(), path = %path.display(), "Loaded reference list");
        }
        Ok(list)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &ReferenceEntry> {
        self.entries.iter().map(|p| &p.entry)
    }

    /// Fuzzy match a folded candidate against canonical names and aliases.
    ///
    /// `matched` is set when the best score reaches `threshold`. The result
    /// is independent of list order.
    pub fn match_fuzzy(&self, folded: &str, threshold: f64) -> MatchResult {
        let best = self
            .entries
            .iter()
            .map(|entry| {
                let canonical = strsim::normalized_levenshtein(folded, &entry.canonical_folded);
                let alias = entry
                    .alias_folded
                    .iter()
                    .map(|a| strsim::normalized_levenshtein(folded, a))
                    .fold(0.0_f64, f64::max);
                Hit {
                    entry,
                    score: canonical.max(alias),
                    via_canonical: canonical >= alias,
                }
            })
            .min_by(rank);

        match best {
            Some(hit) if hit.score >= threshold => MatchResult {
                canonical_name: Some(hit.entry.entry.canonical_name.clone()),
                similarity_score: hit.score,
                matched: true,
            },
            Some(hit) => MatchResult::no_match(hit.score),
            None => MatchResult::no_match(0.0),
        }
    }

    /// Exact match on the compact key (case, spacing and punctuation ignored)
    pub fn match_exact(&self, candidate: &str) -> MatchResult {
        let key = compact_key(candidate);
        if key.is_empty() {
            return MatchResult::no_match(0.0);
        }

        let best = self
            .entries
            .iter()
            .filter_map(|entry| {
                if entry.canonical_key == key {
                    Some(Hit { entry, score: 1.0, via_canonical: true })
                } else if entry.alias_keys.iter().any(|k| *k == key) {
                    Some(Hit { entry, score: 1.0, via_canonical: false })
                } else {
                    None
                }
            })
            .min_by(rank);

        match best {
            Some(hit) => MatchResult {
                canonical_name: Some(hit.entry.entry.canonical_name.clone()),
                similarity_score: 1.0,
                matched: true,
            },
            None => MatchResult::no_match(0.0),
        }
    }
}

/// Which list a policy matches against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Dealers,
    Models,
}

/// Dealer and model lists for a run
#[derive(Debug, Clone)]
pub struct ReferenceStore {
    pub dealers: ReferenceList,
    pub models: ReferenceList,
}

impl ReferenceStore {
    pub fn new(dealers: ReferenceList, models: ReferenceList) -> Self {
        Self { dealers, models }
    }

    pub fn list(&self, kind: ReferenceKind) -> &ReferenceList {
        match kind {
            ReferenceKind::Dealers => &self.dealers,
            ReferenceKind::Models => &self.models,
        }
    }

    /// Load both lists from disk
    pub fn load(dealer_list_path: &Path, model_list_path: &Path) -> ExtractResult<Self> {
        Ok(Self {
            dealers: ReferenceList::load("dealer", dealer_list_path)?,
            models: ReferenceList::load("model", model_list_path)?,
        })
    }
}
