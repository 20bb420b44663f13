//! arXiv source implementation.
//!
//! arXiv has no DOI index of its own, so lookups are title searches against
//! the Atom query API. An entry whose registered DOI equals the query DOI is
//! promoted to a near-certain match.

use async_trait::async_trait;
use chrono::Datelike;
use feed_rs::parser;

use crate::models::{AccessLevel, Candidate, CandidateMetadata, PdfQuery, SourceType};
use crate::sources::{bare_doi, check_status, CandidateSource, SourceCapabilities, SourceError};
use crate::utils::HttpClient;

/// Base URL for arXiv API
const ARXIV_API_URL: &str = "http://export.arxiv.org/api/query";
/// Base URL for arXiv PDFs
const ARXIV_PDF_URL: &str = "https://arxiv.org/pdf";

const TITLE_MATCH_CONFIDENCE: f64 = 0.6;
const DOI_MATCH_CONFIDENCE: f64 = 0.9;
const MAX_RESULTS: usize = 5;

/// arXiv source
#[derive(Debug, Clone)]
pub struct ArxivSource {
    client: HttpClient,
    base_url: String,
}

impl ArxivSource {
    pub fn new() -> Result<Self, SourceError> {
        Ok(Self {
            client: HttpClient::new()?,
            base_url: ARXIV_API_URL.to_string(),
        })
    }

    /// Point the source at a different query endpoint (used by tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Extract the versionless arXiv id from an entry id like
    /// `http://arxiv.org/abs/2301.12345v2`
    fn paper_id(entry_id: &str) -> Option<String> {
        let after = entry_id.split("/abs/").nth(1)?;
        let trimmed = match after.rfind('v') {
            Some(pos) => {
                let version = &after[pos + 1..];
                if !version.is_empty() && version.chars().all(|c| c.is_ascii_digit()) {
                    &after[..pos]
                } else {
                    after
                }
            }
            None => after,
        };
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// Build search query for arXiv API
    fn build_search_query(query: &PdfQuery) -> Option<String> {
        let title = query.title_str()?;
        let cleaned: String = title
            .chars()
            .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
            .collect();
        let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
        if cleaned.is_empty() {
            return None;
        }

        let mut parts = vec![format!("ti:\"{}\"", cleaned)];
        if let Some(surname) = query.first_author_surname() {
            parts.push(format!("au:{}", surname));
        }
        Some(parts.join(" AND "))
    }

    fn parse_entry(&self, entry: &feed_rs::model::Entry, query_doi: Option<&str>) -> Option<Candidate> {
        let pdf_url = entry
            .links
            .iter()
            .find(|l| {
                l.media_type.as_deref() == Some("application/pdf") || l.title.as_deref() == Some("pdf")
            })
            .map(|l| l.href.clone())
            .or_else(|| Self::paper_id(&entry.id).map(|id| format!("{}/{}", ARXIV_PDF_URL, id)))?;

        let doi = entry
            .links
            .iter()
            .find(|l| l.title.as_deref() == Some("doi"))
            .map(|l| bare_doi(&l.href));

        let baseline = match (&doi, query_doi) {
            (Some(entry_doi), Some(wanted)) if entry_doi.eq_ignore_ascii_case(wanted) => {
                DOI_MATCH_CONFIDENCE
            }
            _ => TITLE_MATCH_CONFIDENCE,
        };

        let metadata = CandidateMetadata {
            title: entry
                .title
                .as_ref()
                .map(|t| t.content.split_whitespace().collect::<Vec<_>>().join(" ")),
            authors: entry.authors.iter().map(|a| a.name.clone()).collect(),
            journal: None,
            year: entry.published.map(|d| d.year()),
            doi,
            publisher: Some("arXiv".to_string()),
            content_type: Some("application/pdf".to_string()),
        };

        Some(
            Candidate::new(self.name(), SourceType::Preprint, pdf_url, baseline, AccessLevel::Free)
                .with_metadata(metadata),
        )
    }
}

#[async_trait]
impl CandidateSource for ArxivSource {
    fn id(&self) -> &str {
        "arxiv"
    }

    fn name(&self) -> &str {
        "arXiv"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::TITLE_SEARCH
    }

    async fn find(&self, query: &PdfQuery) -> Result<Vec<Candidate>, SourceError> {
        if query.title_str().is_none() {
            return Err(SourceError::InvalidRequest("arXiv needs a title".to_string()));
        }
        let Some(search_query) = Self::build_search_query(query) else {
            return Ok(Vec::new());
        };

        let url = format!(
            "{}?search_query={}&max_results={}",
            self.base_url,
            urlencoding::encode(&search_query),
            MAX_RESULTS
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to search arXiv: {}", e)))?;

        let bytes = check_status(response, self.name())
            .await?
            .bytes()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to read arXiv response: {}", e)))?;

        let feed = parser::parse(bytes.as_ref())
            .map_err(|e| SourceError::Parse(format!("Failed to parse arXiv feed: {}", e)))?;

        let query_doi = query.doi_str().map(bare_doi);
        Ok(feed
            .entries
            .iter()
            .filter_map(|entry| self.parse_entry(entry, query_doi.as_deref()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>ArXiv Query</title>
  <id>http://arxiv.org/api/abc</id>
  <updated>2023-01-30T00:00:00-05:00</updated>
  <entry>
    <id>http://arxiv.org/abs/2301.12345v2</id>
    <updated>2023-01-30T18:00:00Z</updated>
    <published>2023-01-29T18:00:00Z</published>
    <title>Attention Is
      All You Need</title>
    <summary>Transformers.</summary>
    <author><name>Ashish Vaswani</name></author>
    <author><name>Noam Shazeer</name></author>
    <link href="http://arxiv.org/abs/2301.12345v2" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2301.12345v2" rel="related" type="application/pdf"/>
    <link title="doi" href="http://dx.doi.org/10.48550/arXiv.2301.12345" rel="related"/>
  </entry>
</feed>"#;

    #[test]
    fn test_paper_id() {
        assert_eq!(
            ArxivSource::paper_id("http://arxiv.org/abs/2301.12345v2"),
            Some("2301.12345".to_string())
        );
        assert_eq!(
            ArxivSource::paper_id("http://arxiv.org/abs/hep-th/9901001v1"),
            Some("hep-th/9901001".to_string())
        );
        assert_eq!(ArxivSource::paper_id("nonsense"), None);
    }

    #[test]
    fn test_build_search_query() {
        let q = PdfQuery::new().title("Attention: is all you need?").author("Ashish Vaswani");
        assert_eq!(
            ArxivSource::build_search_query(&q),
            Some("ti:\"Attention is all you need\" AND au:Vaswani".to_string())
        );
        assert!(ArxivSource::build_search_query(&PdfQuery::new().doi("10.1/x")).is_none());
    }

    #[test]
    fn test_parse_entry_doi_promotion() {
        let source = ArxivSource::new().unwrap();
        let feed = parser::parse(FEED.as_bytes()).unwrap();
        let entry = &feed.entries[0];

        let plain = source.parse_entry(entry, None).unwrap();
        assert_eq!(plain.confidence(), TITLE_MATCH_CONFIDENCE);
        assert_eq!(plain.url, "http://arxiv.org/pdf/2301.12345v2");
        assert_eq!(plain.source_type, SourceType::Preprint);

        let promoted = source
            .parse_entry(entry, Some("10.48550/arxiv.2301.12345"))
            .unwrap();
        assert_eq!(promoted.confidence(), DOI_MATCH_CONFIDENCE);

        let meta = promoted.metadata.as_ref().unwrap();
        assert_eq!(meta.title.as_deref(), Some("Attention Is All You Need"));
        assert_eq!(meta.year, Some(2023));
        assert_eq!(meta.authors.len(), 2);
    }

    #[tokio::test]
    async fn test_find_with_mock_server() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/atom+xml")
            .with_body(FEED)
            .create_async()
            .await;

        let source = ArxivSource::new().unwrap().with_base_url(server.url());
        let candidates = source
            .find(&PdfQuery::new().title("Attention Is All You Need"))
            .await
            .unwrap();
        assert_eq!(candidates.len(), 1);
    }
}
