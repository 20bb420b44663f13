//! HTTP client shared by the catalog adapters.

use reqwest::{Client, RequestBuilder};
use std::sync::Arc;
use std::time::Duration;

use crate::sources::SourceError;

/// User agent sent to catalog APIs and download hosts
pub const DEFAULT_USER_AGENT: &str = concat!(
    env!("CARGO_PKG_NAME"),
    "/",
    env!("CARGO_PKG_VERSION")
);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Cheaply cloneable client for JSON and feed lookups.
///
/// Redirects are followed normally here; only the download transport
/// handles them by hand.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
}

impl HttpClient {
    /// Create a client with the default user agent
    pub fn new() -> Result<Self, SourceError> {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    /// Create a client whose user agent carries a contact address.
    ///
    /// CrossRef and OpenAlex route such requests to their "polite pool".
    pub fn polite(contact: Option<&str>) -> Result<Self, SourceError> {
        match contact.map(str::trim).filter(|c| !c.is_empty()) {
            Some(contact) => {
                Self::with_user_agent(&format!("{} (mailto:{})", DEFAULT_USER_AGENT, contact))
            }
            None => Self::new(),
        }
    }

    pub fn with_user_agent(user_agent: &str) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| SourceError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// Start a GET request
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_polite_user_agent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .match_header(
                "user-agent",
                format!("{} (mailto:me@example.org)", DEFAULT_USER_AGENT).as_str(),
            )
            .with_status(200)
            .create_async()
            .await;

        let client = HttpClient::polite(Some(" me@example.org ")).unwrap();
        client.get(&server.url()).send().await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_blank_contact_uses_default_agent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .match_header("user-agent", DEFAULT_USER_AGENT)
            .with_status(200)
            .create_async()
            .await;

        let client = HttpClient::polite(Some("  ")).unwrap();
        client.get(&server.url()).send().await.unwrap();
        mock.assert_async().await;
    }
}
