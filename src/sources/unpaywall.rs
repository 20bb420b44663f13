//! Unpaywall source implementation.
//!
//! Unpaywall keeps a verified registry of open-access copies keyed by DOI, so
//! its best location is the most trustworthy link any catalog can give.
//! API documentation: <https://unpaywall.org/products/api>

use async_trait::async_trait;
use serde::Deserialize;

use crate::models::{AccessLevel, Candidate, CandidateMetadata, PdfQuery, SourceType};
use crate::sources::{
    check_status, doi_path, CandidateSource, SourceCapabilities, SourceError,
};
use crate::utils::HttpClient;

const UNPAYWALL_API_BASE: &str = "https://api.unpaywall.org/v2";
const DEFAULT_EMAIL: &str = "pdf-finder@example.com";

/// Baseline for the registry's best open-access location
const BEST_LOCATION_CONFIDENCE: f64 = 1.0;
/// Baseline for any other listed open-access location
const OTHER_LOCATION_CONFIDENCE: f64 = 0.9;

/// Unpaywall source
///
/// API requires an email address (free, no key needed).
#[derive(Debug, Clone)]
pub struct UnpaywallSource {
    client: HttpClient,
    base_url: String,
    email: String,
}

impl UnpaywallSource {
    pub fn new(email: Option<String>) -> Result<Self, SourceError> {
        Ok(Self {
            client: HttpClient::new()?,
            base_url: UNPAYWALL_API_BASE.to_string(),
            email: email.unwrap_or_else(|| DEFAULT_EMAIL.to_string()),
        })
    }

    /// Point the source at a different API base (used by tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn parse_response(&self, item: UnpaywallResponse) -> Vec<Candidate> {
        let metadata = CandidateMetadata {
            title: item.title.clone(),
            authors: item
                .z_authors
                .iter()
                .filter_map(UnpaywallAuthor::full_name)
                .collect(),
            journal: item.journal_name.clone(),
            year: item.year,
            doi: item.doi.clone(),
            publisher: item.publisher.clone(),
            content_type: Some("application/pdf".to_string()),
        };

        let mut candidates = Vec::new();
        let best_pdf = item
            .best_oa_location
            .as_ref()
            .and_then(|loc| loc.url_for_pdf.clone());

        if let Some(best) = &item.best_oa_location {
            if let Some(pdf) = &best.url_for_pdf {
                candidates.push(
                    Candidate::new(
                        self.name(),
                        best.source_type(),
                        pdf.clone(),
                        BEST_LOCATION_CONFIDENCE,
                        AccessLevel::Free,
                    )
                    .with_metadata(metadata.clone()),
                );
            }
        }

        for location in &item.oa_locations {
            let Some(pdf) = &location.url_for_pdf else {
                continue;
            };
            if best_pdf.as_deref() == Some(pdf.as_str()) {
                continue;
            }
            candidates.push(
                Candidate::new(
                    self.name(),
                    location.source_type(),
                    pdf.clone(),
                    OTHER_LOCATION_CONFIDENCE,
                    AccessLevel::Free,
                )
                .with_metadata(metadata.clone()),
            );
        }

        candidates
    }
}

#[async_trait]
impl CandidateSource for UnpaywallSource {
    fn id(&self) -> &str {
        "unpaywall"
    }

    fn name(&self) -> &str {
        "Unpaywall"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::DOI_LOOKUP
    }

    async fn find(&self, query: &PdfQuery) -> Result<Vec<Candidate>, SourceError> {
        let Some(doi) = query.doi_str() else {
            return Err(SourceError::InvalidRequest("Unpaywall needs a DOI".to_string()));
        };

        let url = format!(
            "{}/{}?email={}",
            self.base_url,
            doi_path(doi),
            urlencoding::encode(&self.email)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to lookup DOI in Unpaywall: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        let item: UnpaywallResponse = check_status(response, self.name())
            .await?
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse Unpaywall response: {}", e)))?;

        Ok(self.parse_response(item))
    }
}

/// Unpaywall API response
#[derive(Debug, Deserialize)]
struct UnpaywallResponse {
    doi: Option<String>,
    title: Option<String>,
    year: Option<i32>,
    journal_name: Option<String>,
    publisher: Option<String>,
    #[serde(default)]
    z_authors: Vec<UnpaywallAuthor>,
    best_oa_location: Option<UnpaywallLocation>,
    #[serde(default)]
    oa_locations: Vec<UnpaywallLocation>,
}

#[derive(Debug, Deserialize)]
struct UnpaywallAuthor {
    given: Option<String>,
    family: Option<String>,
}

impl UnpaywallAuthor {
    fn full_name(&self) -> Option<String> {
        match (&self.given, &self.family) {
            (Some(given), Some(family)) => Some(format!("{} {}", given, family)),
            (None, Some(family)) => Some(family.clone()),
            (Some(given), None) => Some(given.clone()),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UnpaywallLocation {
    url_for_pdf: Option<String>,
    host_type: Option<String>,
}

impl UnpaywallLocation {
    fn source_type(&self) -> SourceType {
        match self.host_type.as_deref() {
            Some("repository") => SourceType::Repository,
            _ => SourceType::OpenAccess,
        }
    }
}
