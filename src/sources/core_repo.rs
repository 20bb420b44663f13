//! CORE source implementation.
//!
//! Uses the CORE v3 search API, which aggregates institutional repositories.
//! API documentation: https://core.ac.uk/services/api
//! A free API key is required (https://core.ac.uk/register).

use async_trait::async_trait;
use serde::Deserialize;

use crate::models::{AccessLevel, Candidate, CandidateMetadata, PdfQuery, SourceType};
use crate::sources::{bare_doi, check_status, CandidateSource, SourceCapabilities, SourceError};
use crate::utils::HttpClient;

const CORE_API_BASE: &str = "https://api.core.ac.uk/v3";

const DOI_MATCH_CONFIDENCE: f64 = 0.7;
const TITLE_MATCH_CONFIDENCE: f64 = 0.5;
const SEARCH_LIMIT: usize = 5;

/// CORE source
#[derive(Debug, Clone)]
pub struct CoreSource {
    client: HttpClient,
    base_url: String,
    api_key: String,
}

impl CoreSource {
    pub fn new(api_key: String) -> Result<Self, SourceError> {
        if api_key.trim().is_empty() {
            return Err(SourceError::Unavailable(
                "CORE requires an API key".to_string(),
            ));
        }
        Ok(Self {
            client: HttpClient::new()?,
            base_url: CORE_API_BASE.to_string(),
            api_key,
        })
    }

    /// Point the source at a different API base (used by tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_query(query: &PdfQuery) -> Option<(String, bool)> {
        if let Some(doi) = query.doi_str() {
            return Some((format!("doi:\"{}\"", doi), true));
        }
        query
            .title_str()
            .map(|title| (format!("title:\"{}\"", title.replace('"', "")), false))
    }

    fn parse_work(&self, work: &CoreWork, baseline: f64) -> Option<Candidate> {
        let pdf = work
            .download_url
            .clone()
            .filter(|u| !u.trim().is_empty())?;

        let metadata = CandidateMetadata {
            title: work.title.clone(),
            authors: work.authors.iter().filter_map(|a| a.name.clone()).collect(),
            journal: work.journals.first().and_then(|j| j.title.clone()),
            year: work.year_published,
            doi: work.doi.as_deref().map(bare_doi),
            publisher: work.publisher.clone().filter(|p| !p.is_empty()),
            content_type: None,
        };

        Some(
            Candidate::new(self.name(), SourceType::Repository, pdf, baseline, AccessLevel::Free)
                .with_metadata(metadata),
        )
    }
}

#[async_trait]
impl CandidateSource for CoreSource {
    fn id(&self) -> &str {
        "core"
    }

    fn name(&self) -> &str {
        "CORE"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::DOI_LOOKUP | SourceCapabilities::TITLE_SEARCH
    }

    async fn find(&self, query: &PdfQuery) -> Result<Vec<Candidate>, SourceError> {
        let Some((search, by_doi)) = Self::build_query(query) else {
            return Err(SourceError::InvalidRequest("CORE needs a DOI or title".to_string()));
        };

        let url = format!(
            "{}/search/works?q={}&limit={}",
            self.base_url,
            urlencoding::encode(&search),
            SEARCH_LIMIT
        );

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to search CORE: {}", e)))?;

        let data: CoreSearchResponse = check_status(response, self.name())
            .await?
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse CORE response: {}", e)))?;

        let baseline = if by_doi {
            DOI_MATCH_CONFIDENCE
        } else {
            TITLE_MATCH_CONFIDENCE
        };

        Ok(data
            .results
            .iter()
            .filter_map(|w| self.parse_work(w, baseline))
            .collect())
    }
}

// ===== CORE API Types =====

#[derive(Debug, Deserialize)]
struct CoreSearchResponse {
    #[serde(default)]
    results: Vec<CoreWork>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoreWork {
    title: Option<String>,
    #[serde(default)]
    authors: Vec<CoreAuthor>,
    doi: Option<String>,
    year_published: Option<i32>,
    publisher: Option<String>,
    #[serde(default)]
    journals: Vec<CoreJournal>,
    download_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CoreAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CoreJournal {
    title: Option<String>,
}
