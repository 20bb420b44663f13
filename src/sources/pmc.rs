//! PubMed Central (PMC) source implementation.
//!
//! Two dependent E-utilities calls: `esearch` turns the identifier into PMC
//! uids, then `esummary` fetches the document summaries for those uids.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

use crate::models::{AccessLevel, Candidate, CandidateMetadata, PdfQuery, SourceType};
use crate::sources::{check_status, leading_year, CandidateSource, SourceCapabilities, SourceError};
use crate::utils::HttpClient;

/// Base URL for NCBI E-utilities
const PMC_EUTILS_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
/// Base URL for PMC articles
const PMC_BASE_URL: &str = "https://www.ncbi.nlm.nih.gov/pmc";

const ID_MATCH_CONFIDENCE: f64 = 0.85;
const TITLE_MATCH_CONFIDENCE: f64 = 0.55;
const RETMAX: usize = 5;

/// PMC source
#[derive(Debug, Clone)]
pub struct PmcSource {
    client: HttpClient,
    base_url: String,
}

impl PmcSource {
    pub fn new() -> Result<Self, SourceError> {
        Ok(Self {
            client: HttpClient::new()?,
            base_url: PMC_EUTILS_BASE.to_string(),
        })
    }

    /// Point the source at a different E-utilities base (used by tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Entrez search term and whether it is id-based
    fn search_term(query: &PdfQuery) -> Option<(String, bool)> {
        if let Some(doi) = query.doi_str() {
            return Some((format!("{}[doi]", doi), true));
        }
        if let Some(pmid) = query.pmid_str() {
            return Some((format!("{}[pmid]", pmid), true));
        }
        let title = query.title_str()?;
        let mut term = format!("\"{}\"[title]", title.replace('"', ""));
        if let Some(journal) = query.journal_str() {
            term.push_str(&format!(" AND \"{}\"[ta]", journal.replace('"', "")));
        }
        Some((term, false))
    }

    fn parse_summary(&self, uid: &str, doc: &DocSum, baseline: f64) -> Candidate {
        let doi = doc
            .articleids
            .iter()
            .find(|id| id.idtype.eq_ignore_ascii_case("doi"))
            .map(|id| id.value.to_lowercase());

        let metadata = CandidateMetadata {
            title: doc.title.clone(),
            authors: doc.authors.iter().map(|a| a.name.clone()).collect(),
            journal: doc
                .fulljournalname
                .clone()
                .or_else(|| doc.source.clone())
                .filter(|j| !j.is_empty()),
            year: doc.pubdate.as_deref().and_then(leading_year),
            doi,
            publisher: None,
            content_type: None,
        };

        Candidate::new(
            self.name(),
            SourceType::Repository,
            format!("{}/articles/PMC{}/pdf/", PMC_BASE_URL, uid),
            baseline,
            AccessLevel::Free,
        )
        .with_metadata(metadata)
    }

    async fn esearch(&self, term: &str) -> Result<Vec<String>, SourceError> {
        let url = format!(
            "{}/esearch.fcgi?db=pmc&term={}&retmax={}&retmode=json",
            self.base_url,
            urlencoding::encode(term),
            RETMAX
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to search PMC: {}", e)))?;

        let data: ESearchResponse = check_status(response, self.name())
            .await?
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse JSON: {}", e)))?;

        Ok(data.esearchresult.idlist)
    }

    async fn esummary(&self, uids: &[String]) -> Result<ESummaryResult, SourceError> {
        let url = format!(
            "{}/esummary.fcgi?db=pmc&id={}&retmode=json",
            self.base_url,
            uids.join(",")
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to fetch PMC summaries: {}", e)))?;

        let data: ESummaryResponse = check_status(response, self.name())
            .await?
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse JSON: {}", e)))?;

        Ok(data.result)
    }
}

#[async_trait]
impl CandidateSource for PmcSource {
    fn id(&self) -> &str {
        "pmc"
    }

    fn name(&self) -> &str {
        "PubMed Central"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::DOI_LOOKUP
            | SourceCapabilities::PMID_LOOKUP
            | SourceCapabilities::TITLE_SEARCH
    }

    async fn find(&self, query: &PdfQuery) -> Result<Vec<Candidate>, SourceError> {
        let Some((term, by_id)) = Self::search_term(query) else {
            return Err(SourceError::InvalidRequest(
                "PubMed Central needs a DOI, PMID or title".to_string(),
            ));
        };

        let uids = self.esearch(&term).await?;
        if uids.is_empty() {
            return Ok(Vec::new());
        }

        let summaries = self.esummary(&uids).await?;
        let baseline = if by_id {
            ID_MATCH_CONFIDENCE
        } else {
            TITLE_MATCH_CONFIDENCE
        };

        // Keep esearch ranking order rather than the map's
        Ok(summaries
            .uids
            .iter()
            .filter_map(|uid| {
                let doc = summaries.docs.get(uid)?;
                if doc.error.is_some() {
                    tracing::debug!("PMC summary for {} reported an error", uid);
                    return None;
                }
                Some(self.parse_summary(uid, doc, baseline))
            })
            .collect())
    }
}

// ===== PMC API Types =====

#[derive(Debug, Deserialize)]
struct ESearchResponse {
    esearchresult: ESearchResult,
}

#[derive(Debug, Deserialize)]
struct ESearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ESummaryResponse {
    result: ESummaryResult,
}

#[derive(Debug, Deserialize)]
struct ESummaryResult {
    #[serde(default)]
    uids: Vec<String>,
    #[serde(flatten)]
    docs: HashMap<String, DocSum>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DocSum {
    title: Option<String>,
    authors: Vec<DocAuthor>,
    fulljournalname: Option<String>,
    source: Option<String>,
    pubdate: Option<String>,
    articleids: Vec<ArticleId>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DocAuthor {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ArticleId {
    idtype: String,
    value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUMMARY: &str = r#"{
        "header": {"type": "esummary", "version": "0.3"},
        "result": {
            "uids": ["6543210", "1111111"],
            "6543210": {
                "uid": "6543210",
                "title": "CRISPR screens in cancer",
                "authors": [{"name": "Smith J", "authtype": "Author"}],
                "fulljournalname": "Nature reviews. Cancer",
                "pubdate": "2019 Jun",
                "articleids": [
                    {"idtype": "pmid", "value": "31000000"},
                    {"idtype": "doi", "value": "10.1038/S41568-019-0001-2"}
                ]
            },
            "1111111": {"uid": "1111111", "error": "cannot get document summary"}
        }
    }"#;

    #[test]
    fn test_search_term() {
        let q = PdfQuery::new().pmid("31000000").title("x");
        assert_eq!(PmcSource::search_term(&q), Some(("31000000[pmid]".to_string(), true)));

        let q = PdfQuery::new().title("A \"quoted\" title");
        assert_eq!(
            PmcSource::search_term(&q),
            Some(("\"A quoted title\"[title]".to_string(), false))
        );

        assert!(PmcSource::search_term(&PdfQuery::new().isbn("123")).is_none());
    }

    #[test]
    fn test_search_term_restricts_journal() {
        let q = PdfQuery::new().title("Tumour evolution").journal("Nat Rev Cancer");
        assert_eq!(
            PmcSource::search_term(&q),
            Some(("\"Tumour evolution\"[title] AND \"Nat Rev Cancer\"[ta]".to_string(), false))
        );

        // id lookups ignore the journal
        let q = PdfQuery::new().doi("10.1038/s41568-019-0001-2").journal("Nat Rev Cancer");
        assert_eq!(
            PmcSource::search_term(&q),
            Some(("10.1038/s41568-019-0001-2[doi]".to_string(), true))
        );
    }

    #[tokio::test]
    async fn test_search_then_summary() {
        let mut server = mockito::Server::new_async().await;
        let search = server
            .mock("GET", "/esearch.fcgi")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"esearchresult": {"count": "2", "idlist": ["6543210", "1111111"]}}"#)
            .create_async()
            .await;
        let summary = server
            .mock("GET", "/esummary.fcgi")
            .match_query(mockito::Matcher::UrlEncoded(
                "id".into(),
                "6543210,1111111".into(),
            ))
            .with_status(200)
            .with_body(SUMMARY)
            .create_async()
            .await;

        let source = PmcSource::new().unwrap().with_base_url(server.url());
        let candidates = source
            .find(&PdfQuery::new().doi("10.1038/s41568-019-0001-2"))
            .await
            .unwrap();

        search.assert_async().await;
        summary.assert_async().await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(
            candidates[0].url,
            "https://www.ncbi.nlm.nih.gov/pmc/articles/PMC6543210/pdf/"
        );
        assert_eq!(candidates[0].confidence(), 0.85);
        let meta = candidates[0].metadata.as_ref().unwrap();
        assert_eq!(meta.year, Some(2019));
        assert_eq!(meta.doi.as_deref(), Some("10.1038/s41568-019-0001-2"));
    }

    #[tokio::test]
    async fn test_empty_search_skips_summary() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/esearch.fcgi")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"esearchresult": {"idlist": []}}"#)
            .create_async()
            .await;
        let summary = server
            .mock("GET", "/esummary.fcgi")
            .match_query(mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let source = PmcSource::new().unwrap().with_base_url(server.url());
        let candidates = source.find(&PdfQuery::new().title("Nothing")).await.unwrap();

        summary.assert_async().await;
        assert!(candidates.is_empty());
    }
}
