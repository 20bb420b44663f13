//! Registry for managing catalog adapters.

use std::sync::Arc;

use super::{
    ArxivSource, CandidateSource, CoreSource, EuropePmcSource, OpenAlexSource, PmcSource,
    SemanticScholarSource, SourceError, UnpaywallSource,
};
use crate::config::SourcesConfig;

bitflags::bitflags! {
    /// Identifiers a source can search on
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SourceCapabilities: u32 {
        const DOI_LOOKUP = 1 << 0;
        const PMID_LOOKUP = 1 << 1;
        const TITLE_SEARCH = 1 << 2;
        const ISBN_LOOKUP = 1 << 3;
    }
}

/// Ordered registry of catalog adapters.
///
/// Registration order is preserved so that fan-out results, and therefore
/// tie-breaking in the ranked list, are deterministic.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn CandidateSource>>,
}

impl SourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Create a registry with every built-in source the configuration allows
    pub fn from_config(config: &SourcesConfig) -> Result<Self, SourceError> {
        let mut registry = Self::new();

        registry.register(Arc::new(UnpaywallSource::new(
            config.unpaywall_email.clone(),
        )?));
        registry.register(Arc::new(OpenAlexSource::new(config.openalex_email.clone())?));
        registry.register(Arc::new(SemanticScholarSource::new(
            config.semantic_scholar_api_key.clone(),
        )?));
        registry.register(Arc::new(EuropePmcSource::new()?));
        registry.register(Arc::new(PmcSource::new()?));
        registry.register(Arc::new(ArxivSource::new()?));

        match &config.core_api_key {
            Some(key) if !key.trim().is_empty() => {
                registry.register(Arc::new(CoreSource::new(key.clone())?));
            }
            _ => tracing::debug!("CORE_API_KEY not set, CORE source disabled"),
        }

        registry.sources.retain(|s| config.is_enabled(s.id()));
        Ok(registry)
    }

    /// Register a source, replacing any existing source with the same id
    pub fn register(&mut self, source: Arc<dyn CandidateSource>) {
        if let Some(slot) = self.sources.iter_mut().find(|s| s.id() == source.id()) {
            *slot = source;
        } else {
            self.sources.push(source);
        }
    }

    /// Get a source by ID
    pub fn get(&self, id: &str) -> Option<&Arc<dyn CandidateSource>> {
        self.sources.iter().find(|s| s.id() == id)
    }

    /// Get all registered sources in registration order
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn CandidateSource>> {
        self.sources.iter()
    }

    /// Get all source IDs
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.id())
    }

    /// Get sources that support a specific capability
    pub fn with_capability(&self, capability: SourceCapabilities) -> Vec<&Arc<dyn CandidateSource>> {
        self.all()
            .filter(|s| s.capabilities().contains(capability))
            .collect()
    }

    /// Check if a source exists
    pub fn has(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Get the number of registered sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
