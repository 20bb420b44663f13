//! OpenAlex source implementation.

use async_trait::async_trait;
use serde::Deserialize;

use crate::models::{AccessLevel, Candidate, CandidateMetadata, PdfQuery, SourceType};
use crate::sources::{
    bare_doi, check_status, doi_path, CandidateSource, SourceCapabilities, SourceError,
};
use crate::utils::HttpClient;

const OPENALEX_API_BASE: &str = "https://api.openalex.org";

/// Baseline for the best OA location of a work matched by DOI
const DOI_MATCH_CONFIDENCE: f64 = 0.85;
/// Baseline for the best OA location of a work matched by title search
const TITLE_MATCH_CONFIDENCE: f64 = 0.6;
/// Secondary locations rank a step below the best one
const SECONDARY_LOCATION_PENALTY: f64 = 0.1;
const TITLE_SEARCH_LIMIT: usize = 5;

/// OpenAlex source
///
/// Uses the OpenAlex REST API.
#[derive(Debug, Clone)]
pub struct OpenAlexSource {
    client: HttpClient,
    base_url: String,
    email: Option<String>,
}

impl OpenAlexSource {
    /// Create a new OpenAlex source; an email joins the polite pool
    pub fn new(email: Option<String>) -> Result<Self, SourceError> {
        Ok(Self {
            client: HttpClient::polite(email.as_deref())?,
            base_url: OPENALEX_API_BASE.to_string(),
            email,
        })
    }

    /// Point the source at a different API base (used by tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Add email to request URL if available (for polite pool)
    fn add_email_if_present(&self, url: String) -> String {
        match &self.email {
            Some(email) => {
                let sep = if url.contains('?') { '&' } else { '?' };
                format!("{}{}mailto={}", url, sep, urlencoding::encode(email))
            }
            None => url,
        }
    }

    fn title_search_url(&self, title: &str, query: &PdfQuery) -> String {
        let mut filter = format!("title.search:{}", title.replace(',', " "));
        if let Some(journal) = query.journal_str() {
            filter.push_str(&format!(
                ",primary_location.source.display_name.search:{}",
                journal.replace(',', " ")
            ));
        }
        if let Some(year) = query.year {
            filter.push_str(&format!(",publication_year:{}", year));
        }
        format!(
            "{}/works?filter={}&per-page={}",
            self.base_url,
            urlencoding::encode(&filter),
            TITLE_SEARCH_LIMIT
        )
    }

    /// Lift one work into candidates, best location first
    fn parse_work(&self, work: &OAWork, baseline: f64) -> Vec<Candidate> {
        let metadata = CandidateMetadata {
            title: work.title.clone(),
            authors: work
                .authorships
                .iter()
                .filter_map(|a| a.author.display_name.clone())
                .collect(),
            journal: work
                .primary_location
                .as_ref()
                .and_then(|l| l.source.as_ref())
                .and_then(|s| s.display_name.clone()),
            year: work.publication_year,
            doi: work.doi.as_deref().map(bare_doi),
            publisher: None,
            content_type: None,
        };

        let access = if work.open_access.as_ref().is_some_and(|oa| oa.is_oa) {
            AccessLevel::Free
        } else {
            AccessLevel::Subscription
        };

        let mut candidates = Vec::new();
        let best_pdf = work
            .best_oa_location
            .as_ref()
            .and_then(|l| l.pdf_url.clone());

        if let Some(pdf) = &best_pdf {
            let location_type = work
                .best_oa_location
                .as_ref()
                .map(OALocation::source_type)
                .unwrap_or(SourceType::OpenAccess);
            candidates.push(
                Candidate::new(self.name(), location_type, pdf.clone(), baseline, access)
                    .with_metadata(metadata.clone()),
            );
        }

        for location in &work.locations {
            let Some(pdf) = &location.pdf_url else {
                continue;
            };
            if best_pdf.as_deref() == Some(pdf.as_str()) {
                continue;
            }
            let access = if location.is_oa {
                AccessLevel::Free
            } else {
                AccessLevel::Subscription
            };
            candidates.push(
                Candidate::new(
                    self.name(),
                    location.source_type(),
                    pdf.clone(),
                    baseline - SECONDARY_LOCATION_PENALTY,
                    access,
                )
                .with_metadata(metadata.clone()),
            );
        }

        candidates
    }

    async fn fetch_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: String,
    ) -> Result<Option<T>, SourceError> {
        let url = self.add_email_if_present(url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to query OpenAlex: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let data = check_status(response, self.name())
            .await?
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse JSON: {}", e)))?;
        Ok(Some(data))
    }
}

#[async_trait]
impl CandidateSource for OpenAlexSource {
    fn id(&self) -> &str {
        "openalex"
    }

    fn name(&self) -> &str {
        "OpenAlex"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::DOI_LOOKUP | SourceCapabilities::TITLE_SEARCH
    }

    async fn find(&self, query: &PdfQuery) -> Result<Vec<Candidate>, SourceError> {
        if let Some(doi) = query.doi_str() {
            let url = format!("{}/works/doi:{}", self.base_url, doi_path(doi));
            if let Some(work) = self.fetch_json::<OAWork>(url).await? {
                return Ok(self.parse_work(&work, DOI_MATCH_CONFIDENCE));
            }
            // Registry miss; fall through to title search when we have one.
        }

        let Some(title) = query.title_str() else {
            if query.doi_str().is_some() {
                return Ok(Vec::new());
            }
            return Err(SourceError::InvalidRequest("OpenAlex needs a DOI or title".to_string()));
        };

        let url = self.title_search_url(title, query);
        let Some(data) = self.fetch_json::<WorksResponse>(url).await? else {
            return Ok(Vec::new());
        };

        Ok(data
            .results
            .iter()
            .flat_map(|work| self.parse_work(work, TITLE_MATCH_CONFIDENCE))
            .collect())
    }
}

// ===== OpenAlex API Types =====

#[derive(Debug, Deserialize)]
struct WorksResponse {
    #[serde(default)]
    results: Vec<OAWork>,
}

#[derive(Debug, Deserialize)]
struct OAWork {
    doi: Option<String>,
    title: Option<String>,
    publication_year: Option<i32>,
    #[serde(default)]
    authorships: Vec<OAAuthorship>,
    primary_location: Option<OALocation>,
    best_oa_location: Option<OALocation>,
    #[serde(default)]
    locations: Vec<OALocation>,
    open_access: Option<OAOpenAccess>,
}

#[derive(Debug, Deserialize)]
struct OAAuthorship {
    author: OAAuthor,
}

#[derive(Debug, Deserialize)]
struct OAAuthor {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OALocation {
    pdf_url: Option<String>,
    #[serde(default)]
    is_oa: bool,
    source: Option<OALocationSource>,
}

impl OALocation {
    fn source_type(&self) -> SourceType {
        match self.source.as_ref().and_then(|s| s.r#type.as_deref()) {
            Some("repository") => SourceType::Repository,
            _ => SourceType::OpenAccess,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OALocationSource {
    display_name: Option<String>,
    r#type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OAOpenAccess {
    #[serde(default)]
    is_oa: bool,
}
