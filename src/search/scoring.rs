//! Candidate merging and confidence scoring.
//!
//! Scoring is a pure function of the candidate, the query and the injected
//! [`ScoringConfig`]: identical inputs always give identical confidences and
//! ordering.
//!
//! ```text
//! confidence = base + access + reputation + title + doi + year + authors   (clamped to [0, 1])
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::models::{AccessLevel, Candidate, PdfQuery};

/// Upper bound on any single source's reputation bonus
pub const MAX_REPUTATION_BONUS: f64 = 0.15;

const TITLE_SIMILARITY_WEIGHT: f64 = 0.3;
const DOI_EXACT_BONUS: f64 = 0.25;
const YEAR_BONUS: f64 = 0.1;
const AUTHOR_OVERLAP_WEIGHT: f64 = 0.2;

/// Bigram similarity above which two author names are the same person
pub const AUTHOR_MATCH_THRESHOLD: f64 = 0.8;

const DEFAULT_REPUTATION: &[(&str, f64)] = &[
    ("Unpaywall", 0.15),
    ("PubMed Central", 0.12),
    ("arXiv", 0.12),
    ("CrossRef", 0.1),
    ("Europe PMC", 0.1),
    ("OpenAlex", 0.1),
    ("Semantic Scholar", 0.08),
    ("CORE", 0.05),
    ("Snapshot", 0.0),
];

/// Per-source reputation table.
///
/// Entries from the config file override the built-in defaults by source
/// name (case-insensitive); sources in neither table get no bonus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_reputation")]
    pub reputation: BTreeMap<String, f64>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            reputation: default_reputation(),
        }
    }
}

fn default_reputation() -> BTreeMap<String, f64> {
    DEFAULT_REPUTATION
        .iter()
        .map(|(name, bonus)| (name.to_string(), *bonus))
        .collect()
}

impl ScoringConfig {
    /// Reputation bonus for a source name, capped at [`MAX_REPUTATION_BONUS`]
    pub fn reputation_for(&self, source: &str) -> f64 {
        let configured = self
            .reputation
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(source))
            .map(|(_, bonus)| *bonus);
        let bonus = configured.or_else(|| {
            DEFAULT_REPUTATION
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(source))
                .map(|(_, bonus)| *bonus)
        });

        match bonus {
            Some(b) if b.is_finite() => b.clamp(0.0, MAX_REPUTATION_BONUS),
            _ => 0.0,
        }
    }
}

/// Individual terms of a candidate's score
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ScoreBreakdown {
    pub base: f64,
    pub access: f64,
    pub reputation: f64,
    pub title: f64,
    pub doi: f64,
    pub year: f64,
    pub authors: f64,
}

impl ScoreBreakdown {
    /// Sum of all terms, clamped to `[0, 1]`
    pub fn total(&self) -> f64 {
        let sum =
            self.base + self.access + self.reputation + self.title + self.doi + self.year + self.authors;
        sum.clamp(0.0, 1.0)
    }
}

/// Character-bigram Sørensen–Dice similarity of two strings, case-insensitive.
///
/// `2|A ∩ B| / (|A| + |B|)` over the distinct bigrams of each lower-cased
/// string. Inner whitespace is kept, so `"ab cd"` and `"abcd"` differ.
pub fn bigram_similarity(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let left = bigrams(&a);
    let right = bigrams(&b);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let shared = left.intersection(&right).count();
    2.0 * shared as f64 / (left.len() + right.len()) as f64
}

fn bigrams(s: &str) -> HashSet<(char, char)> {
    let chars: Vec<char> = s.chars().collect();
    chars.windows(2).map(|w| (w[0], w[1])).collect()
}

fn access_adjustment(level: AccessLevel) -> f64 {
    match level {
        AccessLevel::Free => 0.2,
        AccessLevel::Institutional => 0.1,
        AccessLevel::Subscription => 0.0,
        AccessLevel::Purchase => -0.1,
    }
}

/// Compute each scoring term for one candidate
pub fn score_breakdown(candidate: &Candidate, query: &PdfQuery, config: &ScoringConfig) -> ScoreBreakdown {
    let mut breakdown = ScoreBreakdown {
        base: candidate.confidence(),
        access: access_adjustment(candidate.access_level),
        reputation: config.reputation_for(&candidate.source),
        ..ScoreBreakdown::default()
    };

    let Some(meta) = &candidate.metadata else {
        return breakdown;
    };

    if let (Some(wanted), Some(title)) = (query.title_str(), meta.title.as_deref()) {
        breakdown.title = TITLE_SIMILARITY_WEIGHT * bigram_similarity(wanted, title);
    }

    if let (Some(wanted), Some(doi)) = (query.doi_str(), meta.doi.as_deref()) {
        if wanted.trim().eq_ignore_ascii_case(doi.trim()) {
            breakdown.doi = DOI_EXACT_BONUS;
        }
    }

    if query.year.is_some() && query.year == meta.year {
        breakdown.year = YEAR_BONUS;
    }

    let wanted_authors: Vec<&str> = query
        .authors
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .collect();
    if !wanted_authors.is_empty() && !meta.authors.is_empty() {
        let matched = wanted_authors
            .iter()
            .filter(|wanted| {
                meta.authors
                    .iter()
                    .any(|author| bigram_similarity(wanted, author) > AUTHOR_MATCH_THRESHOLD)
            })
            .count();
        breakdown.authors = AUTHOR_OVERLAP_WEIGHT * matched as f64 / wanted_authors.len() as f64;
    }

    breakdown
}

/// Collapse candidates sharing a url, keeping the higher confidence.
///
/// The survivor takes the position of the first occurrence; on equal
/// confidence the first occurrence wins.
pub fn merge_candidates(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut merged: Vec<Candidate> = Vec::with_capacity(candidates.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for candidate in candidates {
        match index.get(&candidate.url) {
            Some(&slot) => {
                if candidate.confidence() > merged[slot].confidence() {
                    merged[slot] = candidate;
                }
            }
            None => {
                index.insert(candidate.url.clone(), merged.len());
                merged.push(candidate);
            }
        }
    }

    merged
}

/// Stable sort by descending confidence
pub fn sort_by_confidence(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| b.confidence().total_cmp(&a.confidence()));
}

/// Dedup, rescore and rank candidates against the query
pub fn merge_and_score(
    candidates: Vec<Candidate>,
    query: &PdfQuery,
    config: &ScoringConfig,
) -> Vec<Candidate> {
    let mut merged = merge_candidates(candidates);
    for candidate in &mut merged {
        let score = score_breakdown(candidate, query, config).total();
        candidate.set_confidence(score);
    }
    sort_by_confidence(&mut merged);
    merged
}
