//! CrossRef DOI resolver.
//!
//! Resolves a DOI against the CrossRef works API and picks the most direct
//! PDF link the registry record allows, in this order:
//!
//! 1. a registry `link` entry tagged `application/pdf`
//! 2. the primary resource URL, when it already ends in `.pdf`
//! 3. a publisher URL template keyed by DOI prefix or publisher name

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{AccessLevel, Candidate, CandidateMetadata, SourceType};
use crate::sources::{bare_doi, check_status, doi_path, DoiResolver, SourceError};
use crate::utils::HttpClient;

const CROSSREF_API_BASE: &str = "https://api.crossref.org";

/// Source name used on candidates produced from CrossRef links
pub const CROSSREF_SOURCE_NAME: &str = "CrossRef";

const REGISTRY_PDF_CONFIDENCE: f64 = 0.95;
const PRIMARY_PDF_CONFIDENCE: f64 = 0.85;
const TEMPLATE_CONFIDENCE: f64 = 0.7;

/// How a PDF link was obtained from the registry record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PdfLinkKind {
    /// A `link` entry with a PDF content type
    RegistryPdf,
    /// The primary resource URL ends in `.pdf`
    PrimaryResource,
    /// Built from a known publisher URL pattern
    PublisherTemplate,
}

impl PdfLinkKind {
    fn baseline(self) -> f64 {
        match self {
            PdfLinkKind::RegistryPdf => REGISTRY_PDF_CONFIDENCE,
            PdfLinkKind::PrimaryResource => PRIMARY_PDF_CONFIDENCE,
            PdfLinkKind::PublisherTemplate => TEMPLATE_CONFIDENCE,
        }
    }
}

/// Registry metadata for one DOI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoiMetadata {
    pub doi: String,
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    pub publisher: Option<String>,
    /// Partial ISO date, e.g. "2015-05" or "2015-05-28"
    pub publication_date: Option<String>,
    pub journal: Option<String>,
    pub year: Option<i32>,
    pub pdf_url: Option<String>,
    pub link_kind: Option<PdfLinkKind>,
    /// The record carries a Creative Commons license
    #[serde(default)]
    pub license_open: bool,
    #[serde(default)]
    pub raw_metadata: serde_json::Value,
}

impl DoiMetadata {
    /// Lift the resolved PDF link into a candidate
    pub fn to_candidate(&self) -> Option<Candidate> {
        let url = self.pdf_url.clone()?;
        let kind = self.link_kind.unwrap_or(PdfLinkKind::PublisherTemplate);

        // Template publishers are all open-access houses
        let access = if self.license_open || kind == PdfLinkKind::PublisherTemplate {
            AccessLevel::Free
        } else {
            AccessLevel::Subscription
        };

        let metadata = CandidateMetadata {
            title: self.title.clone(),
            authors: self.authors.clone(),
            journal: self.journal.clone(),
            year: self.year,
            doi: Some(self.doi.clone()),
            publisher: self.publisher.clone(),
            content_type: Some("application/pdf".to_string()),
        };

        Some(
            Candidate::new(
                CROSSREF_SOURCE_NAME,
                SourceType::OpenAccess,
                url,
                kind.baseline(),
                access,
            )
            .with_metadata(metadata),
        )
    }
}

/// CrossRef works API resolver
#[derive(Debug, Clone)]
pub struct CrossRefResolver {
    client: HttpClient,
    base_url: String,
}

impl CrossRefResolver {
    /// Create a resolver; a contact email joins CrossRef's polite pool
    pub fn new(mailto: Option<&str>) -> Result<Self, SourceError> {
        Ok(Self {
            client: HttpClient::polite(mailto)?,
            base_url: CROSSREF_API_BASE.to_string(),
        })
    }

    /// Point the resolver at a different API base (used by tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn parse_message(doi: &str, raw: serde_json::Value) -> Result<DoiMetadata, SourceError> {
        let item: CRItem = serde_json::from_value(raw.clone())?;

        let publication_date = item
            .issued
            .as_ref()
            .or(item.published_print.as_ref())
            .or(item.published_online.as_ref())
            .and_then(CRDate::iso);
        let year = item
            .issued
            .as_ref()
            .or(item.published_print.as_ref())
            .or(item.published_online.as_ref())
            .and_then(CRDate::year);

        let license_open = item
            .license
            .iter()
            .any(|l| l.url.contains("creativecommons.org"));

        let doi = item.doi.as_deref().map(bare_doi).unwrap_or_else(|| doi.to_string());
        let (pdf_url, link_kind) = match select_pdf_link(&doi, &item) {
            Some((url, kind)) => (Some(url), Some(kind)),
            None => (None, None),
        };

        Ok(DoiMetadata {
            title: item.title.first().cloned(),
            authors: item.author.iter().filter_map(CRAuthor::full_name).collect(),
            publisher: item.publisher.clone(),
            journal: item.container_title.first().cloned(),
            publication_date,
            year,
            pdf_url,
            link_kind,
            license_open,
            doi,
            raw_metadata: raw,
        })
    }
}

#[async_trait]
impl DoiResolver for CrossRefResolver {
    async fn resolve(&self, doi: &str) -> Result<DoiMetadata, SourceError> {
        let doi = bare_doi(doi);
        let url = format!("{}/works/{}", self.base_url, doi_path(&doi));

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to get DOI from CrossRef: {}", e)))?;

        let data: CRResponse = check_status(response, CROSSREF_SOURCE_NAME)
            .await?
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse JSON: {}", e)))?;

        let metadata = Self::parse_message(&doi, data.message)?;
        tracing::debug!(
            doi = %metadata.doi,
            link = ?metadata.link_kind,
            "Resolved DOI via CrossRef"
        );
        Ok(metadata)
    }
}

/// Pick the best PDF link following registry-link, primary-resource, template priority
fn select_pdf_link(doi: &str, item: &CRItem) -> Option<(String, PdfLinkKind)> {
    if let Some(link) = item.link.iter().find(|l| {
        l.content_type
            .as_deref()
            .is_some_and(|ct| ct.eq_ignore_ascii_case("application/pdf"))
    }) {
        return Some((link.url.clone(), PdfLinkKind::RegistryPdf));
    }

    let primary = item
        .resource
        .as_ref()
        .and_then(|r| r.primary.as_ref())
        .map(|p| p.url.as_str());

    if let Some(url) = primary {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        if path.to_ascii_lowercase().ends_with(".pdf") {
            return Some((url.to_string(), PdfLinkKind::PrimaryResource));
        }
    }

    publisher_template(doi, item.publisher.as_deref(), primary)
        .map(|url| (url, PdfLinkKind::PublisherTemplate))
}

/// Known open-access publisher PDF URL patterns
fn publisher_template(doi: &str, publisher: Option<&str>, primary: Option<&str>) -> Option<String> {
    let doi = doi.to_lowercase();
    let (prefix, suffix) = doi.split_once('/')?;

    match prefix {
        // 10.48550/arXiv.2301.12345
        "10.48550" => {
            let id = suffix.strip_prefix("arxiv.")?;
            Some(format!("https://arxiv.org/pdf/{}", id))
        }
        "10.1101" => {
            let host = match primary {
                Some(url) if url.contains("medrxiv") => "www.medrxiv.org",
                _ => "www.biorxiv.org",
            };
            Some(format!("https://{}/content/{}v1.full.pdf", host, doi))
        }
        "10.1371" => {
            let journal = match suffix.strip_prefix("journal.").and_then(|s| s.split('.').next()) {
                Some("pbio") => "plosbiology",
                Some("pmed") => "plosmedicine",
                Some("pcbi") => "ploscompbiol",
                Some("pgen") => "plosgenetics",
                Some("ppat") => "plospathogens",
                Some("pntd") => "plosntds",
                _ => "plosone",
            };
            Some(format!(
                "https://journals.plos.org/{}/article/file?id={}&type=printable",
                journal, doi
            ))
        }
        "10.7717" => {
            let id = suffix.strip_prefix("peerj.")?;
            Some(format!("https://peerj.com/articles/{}.pdf", id))
        }
        "10.7554" => {
            let id = suffix.strip_prefix("elife.")?;
            Some(format!("https://elifesciences.org/articles/{}.pdf", id))
        }
        "10.3389" => Some(format!("https://www.frontiersin.org/articles/{}/pdf", doi)),
        "10.21105" => Some(format!(
            "https://www.theoj.org/joss-papers/{}/{}.pdf",
            suffix,
            doi.replace('/', ".")
        )),
        _ => {
            let is_mdpi = publisher.is_some_and(|p| p.to_lowercase().contains("mdpi"));
            match (is_mdpi, primary) {
                (true, Some(url)) => Some(format!("{}/pdf", url.trim_end_matches('/'))),
                _ => None,
            }
        }
    }
}

// ===== CrossRef API Types =====

#[derive(Debug, Deserialize)]
struct CRResponse {
    message: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CRItem {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    author: Vec<CRAuthor>,
    publisher: Option<String>,
    #[serde(default)]
    container_title: Vec<String>,
    issued: Option<CRDate>,
    published_print: Option<CRDate>,
    published_online: Option<CRDate>,
    #[serde(default)]
    link: Vec<CRLink>,
    resource: Option<CRResource>,
    #[serde(default)]
    license: Vec<CRLicense>,
}

#[derive(Debug, Deserialize)]
struct CRAuthor {
    given: Option<String>,
    family: Option<String>,
    name: Option<String>,
}

impl CRAuthor {
    fn full_name(&self) -> Option<String> {
        match (&self.given, &self.family) {
            (Some(given), Some(family)) => Some(format!("{} {}", given, family)),
            (None, Some(family)) => Some(family.clone()),
            _ => self.name.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CRDate {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<Option<i32>>>,
}

impl CRDate {
    fn parts(&self) -> Vec<i32> {
        self.date_parts
            .first()
            .map(|p| p.iter().map_while(|v| *v).collect())
            .unwrap_or_default()
    }

    fn year(&self) -> Option<i32> {
        self.parts().first().copied()
    }

    fn iso(&self) -> Option<String> {
        match self.parts().as_slice() {
            [] => None,
            [y] => Some(format!("{:04}", y)),
            [y, m] => Some(format!("{:04}-{:02}", y, m)),
            [y, m, d, ..] => Some(format!("{:04}-{:02}-{:02}", y, m, d)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CRLink {
    #[serde(rename = "URL")]
    url: String,
    #[serde(rename = "content-type")]
    content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CRResource {
    primary: Option<CRPrimary>,
}

#[derive(Debug, Deserialize)]
struct CRPrimary {
    #[serde(rename = "URL")]
    url: String,
}

#[derive(Debug, Deserialize)]
struct CRLicense {
    #[serde(rename = "URL")]
    url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(doi: &str, message: serde_json::Value) -> DoiMetadata {
        CrossRefResolver::parse_message(doi, message).unwrap()
    }

    #[test]
    fn test_registry_pdf_link_wins() {
        let meta = parse(
            "10.1000/xyz",
            json!({
                "DOI": "10.1000/XYZ",
                "title": ["A paper"],
                "author": [{"given": "Ada", "family": "Lovelace"}],
                "publisher": "Example Press",
                "container-title": ["Journal of Examples"],
                "issued": {"date-parts": [[2020, 3]]},
                "link": [
                    {"URL": "https://pub.example.com/xyz.xml", "content-type": "text/xml"},
                    {"URL": "https://pub.example.com/xyz.pdf", "content-type": "application/pdf"}
                ],
                "resource": {"primary": {"URL": "https://pub.example.com/primary.pdf"}},
                "license": [{"URL": "https://creativecommons.org/licenses/by/4.0/"}]
            }),
        );

        assert_eq!(meta.doi, "10.1000/xyz");
        assert_eq!(meta.pdf_url.as_deref(), Some("https://pub.example.com/xyz.pdf"));
        assert_eq!(meta.link_kind, Some(PdfLinkKind::RegistryPdf));
        assert_eq!(meta.publication_date.as_deref(), Some("2020-03"));
        assert_eq!(meta.year, Some(2020));
        assert!(meta.license_open);

        let candidate = meta.to_candidate().unwrap();
        assert_eq!(candidate.source, "CrossRef");
        assert_eq!(candidate.confidence(), 0.95);
        assert_eq!(candidate.access_level, AccessLevel::Free);
    }

    #[test]
    fn test_primary_pdf_resource() {
        let meta = parse(
            "10.1000/abc",
            json!({
                "resource": {"primary": {"URL": "https://pub.example.com/abc.PDF?download=1"}}
            }),
        );
        assert_eq!(meta.link_kind, Some(PdfLinkKind::PrimaryResource));
        let candidate = meta.to_candidate().unwrap();
        assert_eq!(candidate.confidence(), 0.85);
        assert_eq!(candidate.access_level, AccessLevel::Subscription);
    }

    #[test]
    fn test_publisher_templates() {
        assert_eq!(
            publisher_template("10.48550/arxiv.2301.12345", None, None).as_deref(),
            Some("https://arxiv.org/pdf/2301.12345")
        );
        assert_eq!(
            publisher_template(
                "10.1101/2020.01.01.123456",
                None,
                Some("https://www.medrxiv.org/content/10.1101/2020.01.01.123456")
            )
            .as_deref(),
            Some("https://www.medrxiv.org/content/10.1101/2020.01.01.123456v1.full.pdf")
        );
        assert_eq!(
            publisher_template("10.1371/journal.pbio.3000001", None, None).as_deref(),
            Some("https://journals.plos.org/plosbiology/article/file?id=10.1371/journal.pbio.3000001&type=printable")
        );
        assert_eq!(
            publisher_template("10.7717/peerj.1234", None, None).as_deref(),
            Some("https://peerj.com/articles/1234.pdf")
        );
        assert_eq!(
            publisher_template("10.7554/elife.04567", None, None).as_deref(),
            Some("https://elifesciences.org/articles/04567.pdf")
        );
        assert_eq!(
            publisher_template("10.3389/fpsyg.2020.00001", None, None).as_deref(),
            Some("https://www.frontiersin.org/articles/10.3389/fpsyg.2020.00001/pdf")
        );
        assert_eq!(
            publisher_template("10.21105/joss.01234", None, None).as_deref(),
            Some("https://www.theoj.org/joss-papers/joss.01234/10.21105.joss.01234.pdf")
        );
        assert_eq!(
            publisher_template(
                "10.3390/s20010001",
                Some("MDPI AG"),
                Some("https://www.mdpi.com/1424-8220/20/1/1/")
            )
            .as_deref(),
            Some("https://www.mdpi.com/1424-8220/20/1/1/pdf")
        );
        assert!(publisher_template("10.1016/j.cell.2020.01.001", Some("Elsevier"), None).is_none());
    }

    #[test]
    fn test_no_link_means_no_candidate() {
        let meta = parse("10.1016/j.x", json!({"publisher": "Elsevier"}));
        assert!(meta.pdf_url.is_none());
        assert!(meta.to_candidate().is_none());
    }

    #[tokio::test]
    async fn test_resolve_with_mock_server() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/works/10.7717/peerj.1234")
            .with_status(200)
            .with_body(r#"{"status": "ok", "message": {"DOI": "10.7717/peerj.1234", "title": ["PeerJ paper"]}}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/works/10.9999/missing")
            .with_status(404)
            .create_async()
            .await;

        let resolver = CrossRefResolver::new(None).unwrap().with_base_url(server.url());

        let link = resolver.find_pdf_link("https://doi.org/10.7717/PeerJ.1234").await.unwrap();
        assert_eq!(link.as_deref(), Some("https://peerj.com/articles/1234.pdf"));

        let missing = resolver.resolve("10.9999/missing").await;
        assert!(matches!(missing, Err(SourceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_resolve_encodes_reserved_doi_characters() {
        let mut server = mockito::Server::new_async().await;
        let works = server
            .mock("GET", "/works/10.1000/a%3Fb")
            .with_status(200)
            .with_body(r#"{"status": "ok", "message": {"DOI": "10.1000/a?b", "title": ["Odd DOI"]}}"#)
            .create_async()
            .await;

        let resolver = CrossRefResolver::new(None).unwrap().with_base_url(server.url());
        let metadata = resolver.resolve("10.1000/a?b").await.unwrap();

        works.assert_async().await;
        assert_eq!(metadata.doi, "10.1000/a?b");
    }
}
