//! Federated search: validation, fan-out, scoring and orchestration.

mod finder;
mod orchestrator;
mod scoring;
mod validate;

pub use finder::{FinderOutcome, OpenAccessFinder};
pub use orchestrator::{SearchOrchestrator, SearchPhase};
pub use scoring::{
    bigram_similarity, merge_and_score, merge_candidates, score_breakdown, sort_by_confidence,
    ScoreBreakdown, ScoringConfig, AUTHOR_MATCH_THRESHOLD, MAX_REPUTATION_BONUS,
};
pub use validate::{normalize_doi, normalize_query, validate, InputValidationError};
