//! Search orchestration.
//!
//! A search moves through `Idle → Validating → Searching → Merging → Done`,
//! or stops in `Failed` when the query is rejected. While searching, up to four
//! independent branches run concurrently:
//!
//! - the DOI branch (registry lookup), when the query has a DOI
//! - the open-access finder, always
//! - the publisher-API branch, when `PUBLISHER_API` is requested
//! - the snapshot branch, when `SNAPSHOT` is requested and a title is present
//!
//! Branch errors are recorded as warnings on the result and never fail the
//! search.

use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::models::{Candidate, PdfQuery, SearchResult, SourceType};
use crate::search::finder::OpenAccessFinder;
use crate::search::scoring::{merge_and_score, ScoringConfig};
use crate::search::validate::{normalize_query, InputValidationError};
use crate::sources::snapshot::{snapshot_candidate, snapshot_target, SNAPSHOT_SOURCE_NAME};
use crate::sources::{
    CandidateSource, CrossRefResolver, DoiResolver, RenderOptions, SnapshotProvider,
    SourceCapabilities, SourceError, SourceRegistry, CROSSREF_SOURCE_NAME,
};

/// Lifecycle of a single search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Idle,
    Validating,
    Searching,
    Merging,
    Done,
    Failed,
}

/// Output of one search branch
type BranchOutput = (Vec<Candidate>, Vec<String>);

/// Federated search over the DOI registry, catalogs and optional fallbacks
#[derive(Debug, Clone)]
pub struct SearchOrchestrator {
    finder: OpenAccessFinder,
    resolver: Option<Arc<dyn DoiResolver>>,
    snapshot: Option<Arc<dyn SnapshotProvider>>,
    publisher_sources: Vec<Arc<dyn CandidateSource>>,
    scoring: Arc<ScoringConfig>,
}

impl SearchOrchestrator {
    /// Create an orchestrator over the given catalogs, with no DOI resolver
    pub fn new(registry: SourceRegistry) -> Self {
        Self {
            finder: OpenAccessFinder::new(Arc::new(registry)),
            resolver: None,
            snapshot: None,
            // No publisher APIs are wired up yet; the branch stays empty.
            publisher_sources: Vec::new(),
            scoring: Arc::new(ScoringConfig::default()),
        }
    }

    /// Build the default pipeline: configured catalogs plus the CrossRef resolver
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        let registry = SourceRegistry::from_config(&config.sources)?;
        let resolver = CrossRefResolver::new(config.sources.crossref_email.as_deref())?;
        Ok(Self::new(registry)
            .with_resolver(Arc::new(resolver))
            .with_scoring(config.scoring.clone()))
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn DoiResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_snapshot_provider(mut self, provider: Arc<dyn SnapshotProvider>) -> Self {
        self.snapshot = Some(provider);
        self
    }

    /// Add a source to the publisher-API branch
    pub fn with_publisher_source(mut self, source: Arc<dyn CandidateSource>) -> Self {
        self.publisher_sources.push(source);
        self
    }

    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = Arc::new(scoring);
        self
    }

    pub fn registry(&self) -> &SourceRegistry {
        self.finder.registry()
    }

    pub fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    /// Run a federated search.
    ///
    /// Only input validation fails the call; everything after that is
    /// reported through the result's `errors`.
    pub async fn search(&self, query: &PdfQuery) -> Result<SearchResult, InputValidationError> {
        let started = Instant::now();
        let mut phase = SearchPhase::Idle;

        advance(&mut phase, SearchPhase::Validating);
        let query = match normalize_query(query) {
            Ok(query) => query,
            Err(e) => {
                advance(&mut phase, SearchPhase::Failed);
                return Err(e);
            }
        };

        advance(&mut phase, SearchPhase::Searching);
        let (doi_branch, finder_branch, publisher_branch, snapshot_branch) = tokio::join!(
            self.doi_branch(&query),
            self.finder_branch(&query),
            self.publisher_branch(&query),
            self.snapshot_branch(&query),
        );

        advance(&mut phase, SearchPhase::Merging);
        let mut candidates = Vec::new();
        let mut warnings = Vec::new();
        for (found, errors) in [doi_branch, finder_branch, publisher_branch, snapshot_branch] {
            candidates.extend(found);
            warnings.extend(errors);
        }
        if self.isbn_unsearchable(&query) {
            warnings.push("No registered source handles ISBN lookups".to_string());
        }

        let mut ranked = merge_and_score(candidates, &query, &self.scoring);
        ranked.truncate(query.max_results);

        let result = SearchResult::new(ranked, elapsed_ms(started), warnings);
        advance(&mut phase, SearchPhase::Done);
        info!(
            "Search completed: {} candidates from {} sources in {}ms ({} warnings)",
            result.results.len(),
            result.total_sources,
            result.search_time_ms,
            result.errors.len()
        );
        Ok(result)
    }

    /// An ISBN-only query that no registered source can search on
    fn isbn_unsearchable(&self, query: &PdfQuery) -> bool {
        query.isbn_str().is_some()
            && query.doi_str().is_none()
            && query.pmid_str().is_none()
            && query.title_str().is_none()
            && self
                .registry()
                .with_capability(SourceCapabilities::ISBN_LOOKUP)
                .is_empty()
    }

    /// Like [`search`](Self::search), but reports a rejected query as a failed result
    pub async fn search_or_report(&self, query: &PdfQuery) -> SearchResult {
        let started = Instant::now();
        match self.search(query).await {
            Ok(result) => result,
            Err(e) => SearchResult::failed(e.to_string(), elapsed_ms(started)),
        }
    }

    async fn doi_branch(&self, query: &PdfQuery) -> BranchOutput {
        let (Some(resolver), Some(doi)) = (&self.resolver, query.doi_str()) else {
            return (Vec::new(), Vec::new());
        };

        debug!("DOI branch resolving {}", doi);
        let per_call = query.timeout();
        match timeout(per_call, resolver.resolve(doi)).await {
            Ok(Ok(metadata)) => {
                let candidate = resolver.to_candidate(&metadata);
                if candidate.is_none() {
                    debug!("Registry record for {} has no PDF link", doi);
                }
                (candidate.into_iter().collect(), Vec::new())
            }
            Ok(Err(e)) => {
                warn!("DOI resolution failed for {}: {}", doi, e);
                (Vec::new(), vec![format!("{}: {}", CROSSREF_SOURCE_NAME, e)])
            }
            Err(_) => {
                let e = SourceError::Timeout(per_call);
                warn!("DOI resolution failed for {}: {}", doi, e);
                (Vec::new(), vec![format!("{}: {}", CROSSREF_SOURCE_NAME, e)])
            }
        }
    }

    async fn finder_branch(&self, query: &PdfQuery) -> BranchOutput {
        let outcome = self.finder.find(query).await;
        (outcome.candidates, outcome.warnings)
    }

    async fn publisher_branch(&self, query: &PdfQuery) -> BranchOutput {
        if !query.wants(SourceType::PublisherApi) {
            return (Vec::new(), Vec::new());
        }
        if self.publisher_sources.is_empty() {
            debug!("Publisher-API branch requested but no publisher sources are configured");
            return (Vec::new(), Vec::new());
        }

        let per_source = query.timeout();
        let calls = self
            .publisher_sources
            .iter()
            .filter(|s| s.can_handle(query))
            .map(|source| async move {
                let result = match timeout(per_source, source.find(query)).await {
                    Ok(result) => result,
                    Err(_) => Err(SourceError::Timeout(per_source)),
                };
                (source.name().to_string(), result)
            });

        let mut output: BranchOutput = (Vec::new(), Vec::new());
        for (name, result) in join_all(calls).await {
            match result {
                Ok(found) => output.0.extend(found),
                Err(e) => {
                    warn!("Publisher source {} failed: {}", name, e);
                    output.1.push(format!("{}: {}", name, e));
                }
            }
        }
        output
    }

    async fn snapshot_branch(&self, query: &PdfQuery) -> BranchOutput {
        if !query.wants(SourceType::Snapshot) || query.title_str().is_none() {
            return (Vec::new(), Vec::new());
        }
        let Some(provider) = &self.snapshot else {
            return (
                Vec::new(),
                vec![format!("{}: no snapshot provider configured", SNAPSHOT_SOURCE_NAME)],
            );
        };
        let Some(target) = snapshot_target(query) else {
            return (Vec::new(), Vec::new());
        };

        debug!("Snapshot branch rendering {}", target);
        let options = RenderOptions {
            timeout: query.timeout(),
        };
        let rendered = match timeout(options.timeout, provider.render_to_pdf(&target, &options)).await {
            Ok(rendered) => rendered,
            Err(_) => {
                let e = SourceError::Timeout(options.timeout);
                warn!("Snapshot of {} failed: {}", target, e);
                return (Vec::new(), vec![format!("{}: {}", SNAPSHOT_SOURCE_NAME, e)]);
            }
        };

        let error = rendered.error.clone();
        match snapshot_candidate(&target, query, rendered) {
            Some(candidate) => (vec![candidate], Vec::new()),
            None => {
                let reason = error.unwrap_or_else(|| "renderer returned no document".to_string());
                warn!("Snapshot of {} failed: {}", target, reason);
                (Vec::new(), vec![format!("{}: {}", SNAPSHOT_SOURCE_NAME, reason)])
            }
        }
    }
}

fn advance(phase: &mut SearchPhase, next: SearchPhase) {
    debug!("Search phase {:?} -> {:?}", phase, next);
    *phase = next;
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
