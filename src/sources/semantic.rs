//! Semantic Scholar source implementation.
//!
//! Uses the Graph API `openAccessPdf` field.

use async_trait::async_trait;
use serde::Deserialize;

use crate::models::{AccessLevel, Candidate, CandidateMetadata, PdfQuery, SourceType};
use crate::sources::{
    check_status, doi_path, CandidateSource, SourceCapabilities, SourceError,
};
use crate::utils::HttpClient;

const SEMANTIC_SCHOLAR_API_BASE: &str = "https://api.semanticscholar.org/graph/v1";
const PAPER_FIELDS: &str = "title,authors,year,venue,externalIds,openAccessPdf";

const DOI_MATCH_CONFIDENCE: f64 = 0.8;
const TITLE_MATCH_CONFIDENCE: f64 = 0.55;
const TITLE_SEARCH_LIMIT: usize = 5;

/// Semantic Scholar source
#[derive(Debug, Clone)]
pub struct SemanticScholarSource {
    client: HttpClient,
    base_url: String,
    api_key: Option<String>,
}

impl SemanticScholarSource {
    /// Create a new Semantic Scholar source; an API key raises rate limits
    pub fn new(api_key: Option<String>) -> Result<Self, SourceError> {
        Ok(Self {
            client: HttpClient::new()?,
            base_url: SEMANTIC_SCHOLAR_API_BASE.to_string(),
            api_key,
        })
    }

    /// Point the source at a different API base (used by tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn parse_paper(&self, paper: &S2Paper, baseline: f64) -> Option<Candidate> {
        let pdf = paper.open_access_pdf.as_ref()?.url.clone()?;
        if pdf.trim().is_empty() {
            return None;
        }

        let metadata = CandidateMetadata {
            title: paper.title.clone(),
            authors: paper.authors.iter().filter_map(|a| a.name.clone()).collect(),
            journal: paper.venue.clone().filter(|v| !v.is_empty()),
            year: paper.year,
            doi: paper
                .external_ids
                .as_ref()
                .and_then(|ids| ids.doi.as_ref())
                .map(|d| d.to_lowercase()),
            publisher: None,
            content_type: None,
        };

        Some(
            Candidate::new(
                self.name(),
                SourceType::OpenAccess,
                pdf,
                baseline,
                AccessLevel::Free,
            )
            .with_metadata(metadata),
        )
    }

    async fn get(&self, url: &str) -> Result<Option<reqwest::Response>, SourceError> {
        let mut request = self.client.get(url);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await.map_err(|e| {
            SourceError::Network(format!("Failed to query Semantic Scholar: {}", e))
        })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(check_status(response, self.name()).await?))
    }
}

#[async_trait]
impl CandidateSource for SemanticScholarSource {
    fn id(&self) -> &str {
        "semantic"
    }

    fn name(&self) -> &str {
        "Semantic Scholar"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::DOI_LOOKUP | SourceCapabilities::TITLE_SEARCH
    }

    async fn find(&self, query: &PdfQuery) -> Result<Vec<Candidate>, SourceError> {
        if let Some(doi) = query.doi_str() {
            let url = format!(
                "{}/paper/DOI:{}?fields={}",
                self.base_url,
                doi_path(doi),
                PAPER_FIELDS
            );
            if let Some(response) = self.get(&url).await? {
                let paper: S2Paper = response.json().await.map_err(|e| {
                    SourceError::Parse(format!("Failed to parse Semantic Scholar paper: {}", e))
                })?;
                return Ok(self
                    .parse_paper(&paper, DOI_MATCH_CONFIDENCE)
                    .into_iter()
                    .collect());
            }
        }

        let Some(title) = query.title_str() else {
            if query.doi_str().is_some() {
                return Ok(Vec::new());
            }
            return Err(SourceError::InvalidRequest(
                "Semantic Scholar needs a DOI or title".to_string(),
            ));
        };

        let mut url = format!(
            "{}/paper/search?query={}&limit={}&fields={}",
            self.base_url,
            urlencoding::encode(title),
            TITLE_SEARCH_LIMIT,
            PAPER_FIELDS
        );
        if let Some(year) = query.year {
            url.push_str(&format!("&year={}", year));
        }

        let Some(response) = self.get(&url).await? else {
            return Ok(Vec::new());
        };
        let data: S2SearchResponse = response.json().await.map_err(|e| {
            SourceError::Parse(format!("Failed to parse Semantic Scholar search: {}", e))
        })?;

        Ok(data
            .data
            .iter()
            .filter_map(|p| self.parse_paper(p, TITLE_MATCH_CONFIDENCE))
            .collect())
    }
}

// ===== Semantic Scholar API Types =====

#[derive(Debug, Deserialize)]
struct S2SearchResponse {
    #[serde(default)]
    data: Vec<S2Paper>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Paper {
    title: Option<String>,
    #[serde(default)]
    authors: Vec<S2Author>,
    year: Option<i32>,
    venue: Option<String>,
    external_ids: Option<S2ExternalIds>,
    open_access_pdf: Option<S2OpenAccessPdf>,
}

#[derive(Debug, Deserialize)]
struct S2Author {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2OpenAccessPdf {
    url: Option<String>,
}
