//! Query model describing what the caller knows about a document.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Duration;

/// Default cap on the number of ranked candidates returned by a search
pub const DEFAULT_MAX_RESULTS: usize = 20;

/// Default per-source search timeout in seconds
pub const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 30;

/// Kind of location a candidate was found at
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    OpenAccess,
    PublisherApi,
    Institutional,
    Preprint,
    Repository,
    Snapshot,
}

impl SourceType {
    /// Returns the wire name of the source type
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::OpenAccess => "OPEN_ACCESS",
            SourceType::PublisherApi => "PUBLISHER_API",
            SourceType::Institutional => "INSTITUTIONAL",
            SourceType::Preprint => "PREPRINT",
            SourceType::Repository => "REPOSITORY",
            SourceType::Snapshot => "SNAPSHOT",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "open_access" | "oa" => Ok(SourceType::OpenAccess),
            "publisher_api" | "publisher" => Ok(SourceType::PublisherApi),
            "institutional" => Ok(SourceType::Institutional),
            "preprint" => Ok(SourceType::Preprint),
            "repository" => Ok(SourceType::Repository),
            "snapshot" => Ok(SourceType::Snapshot),
            other => Err(format!("unknown source type: {}", other)),
        }
    }
}

/// How freely a candidate can be fetched.
///
/// Variants are declared from least to most desirable so that the derived
/// ordering gives `Free > Institutional > Subscription > Purchase`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessLevel {
    Purchase,
    Subscription,
    Institutional,
    Free,
}

/// Bibliographic identifiers for a document the caller wants a PDF of.
///
/// At least one of `doi`, `title`, `pmid` or `isbn` must be present for the
/// query to pass validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfQuery {
    pub doi: Option<String>,

    pub title: Option<String>,

    /// Author names in citation order
    #[serde(default)]
    pub authors: Vec<String>,

    pub journal: Option<String>,

    pub year: Option<i32>,

    /// PubMed identifier (digits only)
    pub pmid: Option<String>,

    pub isbn: Option<String>,

    /// Optional source-type filter; opts into the publisher and snapshot branches
    pub source_types: Option<BTreeSet<SourceType>>,

    /// Maximum number of ranked candidates to return
    pub max_results: usize,

    /// Per-source timeout in seconds
    pub timeout_secs: u64,
}

impl Default for PdfQuery {
    fn default() -> Self {
        Self {
            doi: None,
            title: None,
            authors: Vec::new(),
            journal: None,
            year: None,
            pmid: None,
            isbn: None,
            source_types: None,
            max_results: DEFAULT_MAX_RESULTS,
            timeout_secs: DEFAULT_SOURCE_TIMEOUT_SECS,
        }
    }
}

impl PdfQuery {
    /// Create an empty query
    pub fn new() -> Self {
        Self::default()
    }

    pub fn doi(mut self, doi: impl Into<String>) -> Self {
        self.doi = Some(doi.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Append an author name
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.authors.push(author.into());
        self
    }

    pub fn journal(mut self, journal: impl Into<String>) -> Self {
        self.journal = Some(journal.into());
        self
    }

    pub fn year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn pmid(mut self, pmid: impl Into<String>) -> Self {
        self.pmid = Some(pmid.into());
        self
    }

    pub fn isbn(mut self, isbn: impl Into<String>) -> Self {
        self.isbn = Some(isbn.into());
        self
    }

    /// Add a source type to the filter set
    pub fn source_type(mut self, source_type: SourceType) -> Self {
        self.source_types
            .get_or_insert_with(BTreeSet::new)
            .insert(source_type);
        self
    }

    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Per-source timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Whether the caller explicitly asked for the given source type
    pub fn wants(&self, source_type: SourceType) -> bool {
        self.source_types
            .as_ref()
            .is_some_and(|types| types.contains(&source_type))
    }

    /// Title, if present and not blank
    pub fn title_str(&self) -> Option<&str> {
        non_blank(&self.title)
    }

    /// DOI, if present and not blank
    pub fn doi_str(&self) -> Option<&str> {
        non_blank(&self.doi)
    }

    /// Journal name, if present and not blank
    pub fn journal_str(&self) -> Option<&str> {
        non_blank(&self.journal)
    }

    /// PMID, if present and not blank
    pub fn pmid_str(&self) -> Option<&str> {
        non_blank(&self.pmid)
    }

    /// ISBN, if present and not blank
    pub fn isbn_str(&self) -> Option<&str> {
        non_blank(&self.isbn)
    }

    /// First author's family name, used by catalogs that search on surname
    pub fn first_author_surname(&self) -> Option<&str> {
        self.authors
            .iter()
            .map(|a| a.trim())
            .find(|a| !a.is_empty())
            .and_then(|a| {
                if let Some((family, _)) = a.split_once(',') {
                    Some(family.trim())
                } else {
                    a.split_whitespace().last()
                }
            })
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_level_ordering() {
        assert!(AccessLevel::Free > AccessLevel::Institutional);
        assert!(AccessLevel::Institutional > AccessLevel::Subscription);
        assert!(AccessLevel::Subscription > AccessLevel::Purchase);
    }

    #[test]
    fn test_query_builder() {
        let query = PdfQuery::new()
            .title("Deep Learning")
            .author("LeCun, Yann")
            .author("Geoffrey Hinton")
            .year(2015)
            .source_type(SourceType::Snapshot)
            .max_results(5);

        assert_eq!(query.title_str(), Some("Deep Learning"));
        assert_eq!(query.authors.len(), 2);
        assert_eq!(query.max_results, 5);
        assert!(query.wants(SourceType::Snapshot));
        assert!(!query.wants(SourceType::PublisherApi));
        assert_eq!(query.first_author_surname(), Some("LeCun"));
    }

    #[test]
    fn test_blank_identifiers_are_absent() {
        let query = PdfQuery::new().doi("   ").title("");
        assert!(query.doi_str().is_none());
        assert!(query.title_str().is_none());
    }

    #[test]
    fn test_source_type_parse() {
        assert_eq!("snapshot".parse::<SourceType>(), Ok(SourceType::Snapshot));
        assert_eq!("open-access".parse::<SourceType>(), Ok(SourceType::OpenAccess));
        assert_eq!(SourceType::PublisherApi.to_string(), "PUBLISHER_API");
        assert!("nope".parse::<SourceType>().is_err());
    }
}
