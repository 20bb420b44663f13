//! Open-access multi-source finder.
//!
//! Fans a query out to every registered catalog adapter that can serve it and
//! waits for all of them to settle. A slow or failing adapter costs
//! completeness only: its error becomes a warning and the other adapters'
//! candidates are kept.

use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::models::{Candidate, PdfQuery};
use crate::search::scoring::{merge_candidates, sort_by_confidence};
use crate::sources::{CandidateSource, SourceError, SourceRegistry};

/// Candidates and non-fatal warnings from one fan-out
#[derive(Debug, Clone, Default)]
pub struct FinderOutcome {
    /// Deduplicated by url and sorted by descending baseline confidence
    pub candidates: Vec<Candidate>,
    /// One `"<Source name>: <error>"` entry per failed adapter
    pub warnings: Vec<String>,
}

/// Settle-all fan-out over a [`SourceRegistry`]
#[derive(Debug, Clone)]
pub struct OpenAccessFinder {
    registry: Arc<SourceRegistry>,
}

impl OpenAccessFinder {
    pub fn new(registry: Arc<SourceRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Query every capable adapter concurrently
    pub async fn find(&self, query: &PdfQuery) -> FinderOutcome {
        let sources: Vec<&Arc<dyn CandidateSource>> = self
            .registry
            .all()
            .filter(|s| s.can_handle(query))
            .collect();

        info!(
            "Using {} sources for search: {:?}",
            sources.len(),
            sources.iter().map(|s| s.name()).collect::<Vec<_>>()
        );

        let per_source = query.timeout();
        let calls = sources.iter().map(|source| async move {
            let started = Instant::now();
            let result = match timeout(per_source, source.find(query)).await {
                Ok(result) => result,
                Err(_) => Err(SourceError::Timeout(per_source)),
            };
            debug!(
                "Source {} settled in {:?}",
                source.name(),
                started.elapsed()
            );
            (source.name().to_string(), result)
        });

        let mut outcome = FinderOutcome::default();
        let mut found = Vec::new();

        // join_all preserves input order, so registry order breaks ties
        for (name, result) in join_all(calls).await {
            match result {
                Ok(candidates) => {
                    debug!("Source {} returned {} candidates", name, candidates.len());
                    found.extend(candidates);
                }
                Err(error) => {
                    warn!("Source {} failed: {}", name, error);
                    outcome.warnings.push(format!("{}: {}", name, error));
                }
            }
        }

        outcome.candidates = merge_candidates(found);
        sort_by_confidence(&mut outcome.candidates);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::mock::make_candidate;
    use crate::sources::{MockSource, SourceCapabilities};
    use std::time::Duration;

    #[tokio::test]
    async fn test_failures_become_warnings() {
        let mut registry = SourceRegistry::new();
        registry.register(Arc::new(
            MockSource::new("good", "Good").with_candidates(vec![make_candidate("Good", "http://a", 0.6)]),
        ));
        registry.register(Arc::new(MockSource::new("bad", "Bad").failing("boom")));

        let finder = OpenAccessFinder::new(Arc::new(registry));
        let outcome = finder.find(&PdfQuery::new().title("x")).await;

        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.warnings, vec!["Bad: API error: boom".to_string()]);
    }

    #[tokio::test]
    async fn test_slow_source_times_out() {
        let mut registry = SourceRegistry::new();
        registry.register(Arc::new(
            MockSource::new("slow", "Slow")
                .delayed(Duration::from_secs(5))
                .with_candidates(vec![make_candidate("Slow", "http://slow", 0.9)]),
        ));
        registry.register(Arc::new(
            MockSource::new("fast", "Fast").with_candidates(vec![make_candidate("Fast", "http://fast", 0.5)]),
        ));

        let finder = OpenAccessFinder::new(Arc::new(registry));
        let query = PdfQuery::new().title("x").timeout_secs(1);
        let outcome = finder.find(&query).await;

        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.candidates[0].url, "http://fast");
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].starts_with("Slow: Timed out"));
    }

    #[tokio::test]
    async fn test_skips_sources_that_cannot_serve_query() {
        let doi_only = Arc::new(
            MockSource::new("doi", "DOI only").with_capabilities(SourceCapabilities::DOI_LOOKUP),
        );
        let mut registry = SourceRegistry::new();
        registry.register(doi_only.clone());

        let finder = OpenAccessFinder::new(Arc::new(registry));
        let outcome = finder.find(&PdfQuery::new().title("x")).await;

        assert!(outcome.candidates.is_empty());
        assert_eq!(doi_only.call_count(), 0);
    }

    #[tokio::test]
    async fn test_dedups_and_sorts() {
        let mut registry = SourceRegistry::new();
        registry.register(Arc::new(MockSource::new("a", "A").with_candidates(vec![
            make_candidate("A", "http://shared", 0.4),
            make_candidate("A", "http://only-a", 0.3),
        ])));
        registry.register(Arc::new(
            MockSource::new("b", "B").with_candidates(vec![make_candidate("B", "http://shared", 0.8)]),
        ));

        let finder = OpenAccessFinder::new(Arc::new(registry));
        let outcome = finder.find(&PdfQuery::new().title("x")).await;

        assert_eq!(outcome.candidates.len(), 2);
        assert_eq!(outcome.candidates[0].source, "B");
        assert_eq!(outcome.candidates[0].confidence(), 0.8);
    }
}
