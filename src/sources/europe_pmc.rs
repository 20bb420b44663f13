//! Europe PMC source implementation using their REST API.
//!
//! Europe PMC indexes PubMed, PMC and preprints, and lists full-text links
//! per record together with an availability code.

use async_trait::async_trait;
use serde::Deserialize;

use crate::models::{AccessLevel, Candidate, CandidateMetadata, PdfQuery, SourceType};
use crate::sources::{check_status, leading_year, CandidateSource, SourceCapabilities, SourceError};
use crate::utils::HttpClient;

/// Europe PMC REST API base URL
const EUROPE_PMC_API_BASE: &str = "https://www.ebi.ac.uk/europepmc/webservices/rest";
const EUROPE_PMC_RENDER_URL: &str = "https://europepmc.org/articles";

const ID_MATCH_CONFIDENCE: f64 = 0.8;
const TITLE_MATCH_CONFIDENCE: f64 = 0.5;
const PAGE_SIZE: usize = 5;

/// Europe PMC source
#[derive(Debug, Clone)]
pub struct EuropePmcSource {
    client: HttpClient,
    base_url: String,
}

impl EuropePmcSource {
    pub fn new() -> Result<Self, SourceError> {
        Ok(Self {
            client: HttpClient::new()?,
            base_url: EUROPE_PMC_API_BASE.to_string(),
        })
    }

    /// Point the source at a different API base (used by tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build the Europe PMC query grammar; returns the query and whether it is id-based
    fn build_query(query: &PdfQuery) -> Option<(String, bool)> {
        if let Some(doi) = query.doi_str() {
            return Some((format!("DOI:\"{}\"", doi), true));
        }
        if let Some(pmid) = query.pmid_str() {
            return Some((format!("EXT_ID:{} AND SRC:MED", pmid), true));
        }
        let title = query.title_str()?;
        let mut parts = vec![format!("TITLE:\"{}\"", title.replace('"', ""))];
        if let Some(surname) = query.first_author_surname() {
            parts.push(format!("AUTH:\"{}\"", surname));
        }
        if let Some(journal) = query.journal_str() {
            parts.push(format!("JOURNAL:\"{}\"", journal.replace('"', "")));
        }
        if let Some(year) = query.year {
            parts.push(format!("PUB_YEAR:{}", year));
        }
        Some((parts.join(" AND "), false))
    }

    fn parse_record(&self, record: &EpmcRecord, baseline: f64) -> Vec<Candidate> {
        let metadata = CandidateMetadata {
            title: record.title.as_ref().map(|t| t.trim_end_matches('.').to_string()),
            authors: record
                .author_string
                .as_deref()
                .map(|s| {
                    s.trim_end_matches('.')
                        .split(", ")
                        .map(|a| a.trim().to_string())
                        .filter(|a| !a.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            journal: record.journal_title.clone(),
            year: record.pub_year.as_deref().and_then(leading_year),
            doi: record.doi.as_ref().map(|d| d.to_lowercase()),
            publisher: None,
            content_type: None,
        };

        let mut candidates = Vec::new();

        if let Some(list) = &record.full_text_url_list {
            for link in &list.full_text_url {
                if link.document_style.as_deref() != Some("pdf") {
                    continue;
                }
                let Some(url) = &link.url else {
                    continue;
                };
                candidates.push(
                    Candidate::new(
                        self.name(),
                        SourceType::Repository,
                        url.clone(),
                        baseline,
                        availability_to_access(link.availability_code.as_deref()),
                    )
                    .with_metadata(metadata.clone()),
                );
            }
        }

        let open_in_epmc =
            record.is_open_access.as_deref() == Some("Y") && record.in_epmc.as_deref() == Some("Y");
        if let (true, Some(pmcid)) = (open_in_epmc, &record.pmcid) {
            let url = format!("{}/{}?pdf=render", EUROPE_PMC_RENDER_URL, pmcid);
            if !candidates.iter().any(|c| c.url == url) {
                candidates.push(
                    Candidate::new(
                        self.name(),
                        SourceType::Repository,
                        url,
                        baseline,
                        AccessLevel::Free,
                    )
                    .with_metadata(metadata),
                );
            }
        }

        candidates
    }
}

fn availability_to_access(code: Option<&str>) -> AccessLevel {
    match code {
        Some("OA") | Some("F") => AccessLevel::Free,
        _ => AccessLevel::Subscription,
    }
}

#[async_trait]
impl CandidateSource for EuropePmcSource {
    fn id(&self) -> &str {
        "europe_pmc"
    }

    fn name(&self) -> &str {
        "Europe PMC"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::DOI_LOOKUP
            | SourceCapabilities::PMID_LOOKUP
            | SourceCapabilities::TITLE_SEARCH
    }

    async fn find(&self, query: &PdfQuery) -> Result<Vec<Candidate>, SourceError> {
        let Some((search, by_id)) = Self::build_query(query) else {
            return Err(SourceError::InvalidRequest(
                "Europe PMC needs a DOI, PMID or title".to_string(),
            ));
        };

        let url = format!(
            "{}/search?query={}&resultType=core&format=json&pageSize={}",
            self.base_url,
            urlencoding::encode(&search),
            PAGE_SIZE
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to search Europe PMC: {}", e)))?;

        let data: EpmcSearchResponse = check_status(response, self.name())
            .await?
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse Europe PMC response: {}", e)))?;

        let baseline = if by_id {
            ID_MATCH_CONFIDENCE
        } else {
            TITLE_MATCH_CONFIDENCE
        };

        Ok(data
            .result_list
            .map(|list| list.result)
            .unwrap_or_default()
            .iter()
            .flat_map(|record| self.parse_record(record, baseline))
            .collect())
    }
}

// ===== Europe PMC API Types =====

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpmcSearchResponse {
    result_list: Option<EpmcResultList>,
}

#[derive(Debug, Deserialize)]
struct EpmcResultList {
    #[serde(default)]
    result: Vec<EpmcRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpmcRecord {
    title: Option<String>,
    author_string: Option<String>,
    journal_title: Option<String>,
    pub_year: Option<String>,
    doi: Option<String>,
    pmcid: Option<String>,
    is_open_access: Option<String>,
    #[serde(rename = "inEPMC")]
    in_epmc: Option<String>,
    full_text_url_list: Option<EpmcFullTextList>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpmcFullTextList {
    #[serde(default)]
    full_text_url: Vec<EpmcFullTextUrl>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpmcFullTextUrl {
    availability_code: Option<String>,
    document_style: Option<String>,
    url: Option<String>,
}
