//! HTTP transport for PDF downloads.
//!
//! Redirects are followed by hand so that every hop is visible: the client
//! never follows a `Location` itself, which lets us cap the chain and detect
//! cycles. Bodies are streamed to disk with a running byte count so an
//! oversized response is cut off mid-transfer.

use futures_util::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::{redirect, Client, Proxy, Response, StatusCode};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;
use url::Url;

use super::error::{CandidateError, DownloadError};
use crate::models::ProxyConfig;
use crate::utils::DEFAULT_USER_AGENT;

/// Maximum number of redirects followed for one candidate
pub const MAX_REDIRECTS: usize = 10;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Where a candidate URL finally lands, with the headers of the last HEAD response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUrl {
    pub url: String,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    /// Number of redirects followed
    pub hops: usize,
}

/// HTTP client configured for manual redirects and optional proxying
#[derive(Debug, Clone)]
pub struct DownloadTransport {
    client: Client,
}

impl DownloadTransport {
    /// Build a transport, routing through `proxy` when given
    pub fn new(proxy: Option<&ProxyConfig>) -> Result<Self, DownloadError> {
        let mut builder = Client::builder()
            .redirect(redirect::Policy::none())
            .user_agent(DEFAULT_USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT);

        if let Some(config) = proxy {
            let mut proxy = Proxy::all(&config.url)
                .map_err(|e| DownloadError::InvalidProxy(format!("{}: {}", config.url, e)))?;
            if let Some(username) = &config.username {
                proxy = proxy.basic_auth(username, config.password.as_deref().unwrap_or(""));
            }
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| DownloadError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    /// Follow redirects with header-only requests until a non-redirect response.
    ///
    /// Fails on the first revisited URL or after [`MAX_REDIRECTS`] hops.
    pub async fn resolve_redirects(&self, url: &str) -> Result<ResolvedUrl, CandidateError> {
        let mut current = Url::parse(url).map_err(|_| CandidateError::InvalidUrl {
            url: url.to_string(),
        })?;
        let mut visited: HashSet<String> = HashSet::new();

        for hops in 0..=MAX_REDIRECTS {
            if !visited.insert(current.as_str().to_string()) {
                return Err(CandidateError::CircularRedirect {
                    url: current.to_string(),
                });
            }

            let response = self.head_request(&current).await?;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|loc| current.join(loc).ok())
                    .ok_or_else(|| CandidateError::MissingLocation {
                        url: current.to_string(),
                    })?;
                debug!("Redirect {} -> {}", current, location);
                current = location;
                continue;
            }

            if !status.is_success() {
                return Err(CandidateError::HttpStatus {
                    url: current.to_string(),
                    status: status.as_u16(),
                });
            }

            return Ok(ResolvedUrl {
                url: current.to_string(),
                content_type: header_str(&response, CONTENT_TYPE),
                content_length: declared_length(&response),
                hops,
            });
        }

        Err(CandidateError::TooManyRedirects {
            url: url.to_string(),
            limit: MAX_REDIRECTS,
        })
    }

    /// HEAD, falling back to a GET whose body is never read when HEAD is refused
    async fn head_request(&self, url: &Url) -> Result<Response, CandidateError> {
        let response = self
            .client
            .head(url.clone())
            .send()
            .await
            .map_err(|e| CandidateError::network(url.as_str(), e))?;

        if matches!(
            response.status(),
            StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED
        ) {
            debug!("HEAD refused by {}, probing with GET", url);
            return self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| CandidateError::network(url.as_str(), e));
        }

        Ok(response)
    }

    /// Stream the body at `url` into `path`, aborting once it exceeds `limit_bytes`.
    ///
    /// Returns the number of bytes written. The caller owns cleanup of `path`
    /// on error.
    pub async fn stream_to_file(
        &self,
        url: &str,
        path: &Path,
        limit_bytes: u64,
    ) -> Result<u64, CandidateError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CandidateError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CandidateError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if declared_length(&response).is_some_and(|len| len > limit_bytes) {
            return Err(CandidateError::TooLarge {
                url: url.to_string(),
                limit_bytes,
            });
        }

        let file = File::create(path)
            .await
            .map_err(|e| CandidateError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        let mut stream = response.bytes_stream();
        let mut bytes_written: u64 = 0;

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| CandidateError::network(url, e))?;

            bytes_written += chunk.len() as u64;
            if bytes_written > limit_bytes {
                return Err(CandidateError::TooLarge {
                    url: url.to_string(),
                    limit_bytes,
                });
            }

            writer
                .write_all(&chunk)
                .await
                .map_err(|e| CandidateError::io(path, e))?;
        }

        writer
            .flush()
            .await
            .map_err(|e| CandidateError::io(path, e))?;

        Ok(bytes_written)
    }
}

/// Accept `application/pdf`, or `application/octet-stream` for a `.pdf` path
pub fn check_content_type(resolved: &ResolvedUrl) -> Result<(), CandidateError> {
    let media_type = resolved
        .content_type
        .as_deref()
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());

    let accepted = match media_type.as_deref() {
        Some("application/pdf") => true,
        Some("application/octet-stream") => has_pdf_suffix(&resolved.url),
        _ => false,
    };

    if accepted {
        Ok(())
    } else {
        Err(CandidateError::UnsupportedContentType {
            url: resolved.url.clone(),
            content_type: resolved.content_type.clone(),
        })
    }
}

fn has_pdf_suffix(url: &str) -> bool {
    Url::parse(url)
        .map(|u| u.path().to_ascii_lowercase().ends_with(".pdf"))
        .unwrap_or(false)
}

fn header_str(response: &Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn declared_length(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn resolved(url: &str, content_type: Option<&str>) -> ResolvedUrl {
        ResolvedUrl {
            url: url.to_string(),
            content_type: content_type.map(str::to_string),
            content_length: None,
            hops: 0,
        }
    }

    #[test]
    fn test_check_content_type() {
        assert!(check_content_type(&resolved("http://x/a", Some("application/pdf"))).is_ok());
        assert!(check_content_type(&resolved("http://x/a", Some("Application/PDF; charset=binary"))).is_ok());
        assert!(check_content_type(&resolved("http://x/a.PDF?dl=1", Some("application/octet-stream"))).is_ok());
        assert!(check_content_type(&resolved("http://x/a", Some("application/octet-stream"))).is_err());
        assert!(check_content_type(&resolved("http://x/a.pdf", Some("text/html"))).is_err());
        assert!(check_content_type(&resolved("http://x/a.pdf", None)).is_err());
    }

    #[tokio::test]
    async fn test_follows_relative_redirects() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("HEAD", "/start")
            .with_status(302)
            .with_header("location", "/final.pdf")
            .create_async()
            .await;
        server
            .mock("HEAD", "/final.pdf")
            .with_status(200)
            .with_header("content-type", "application/pdf")
            .create_async()
            .await;

        let transport = DownloadTransport::new(None).unwrap();
        let resolved = transport
            .resolve_redirects(&format!("{}/start", server.url()))
            .await
            .unwrap();

        assert_eq!(resolved.url, format!("{}/final.pdf", server.url()));
        assert_eq!(resolved.hops, 1);
        assert_eq!(resolved.content_type.as_deref(), Some("application/pdf"));
    }

    #[tokio::test]
    async fn test_circular_redirect() {
        let mut server = mockito::Server::new_async().await;
        let a = server
            .mock("HEAD", "/a")
            .with_status(301)
            .with_header("location", "/b")
            .expect(1)
            .create_async()
            .await;
        server
            .mock("HEAD", "/b")
            .with_status(302)
            .with_header("location", "/a")
            .create_async()
            .await;

        let transport = DownloadTransport::new(None).unwrap();
        let err = transport
            .resolve_redirects(&format!("{}/a", server.url()))
            .await
            .unwrap_err();

        assert!(matches!(err, CandidateError::CircularRedirect { .. }));
        a.assert_async().await;
    }

    #[tokio::test]
    async fn test_redirect_hop_cap() {
        let mut server = mockito::Server::new_async().await;
        for i in 0..=MAX_REDIRECTS {
            server
                .mock("HEAD", format!("/r{}", i).as_str())
                .with_status(302)
                .with_header("location", &format!("/r{}", i + 1))
                .create_async()
                .await;
        }

        let transport = DownloadTransport::new(None).unwrap();
        let err = transport
            .resolve_redirects(&format!("{}/r0", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, CandidateError::TooManyRedirects { limit: 10, .. }));
    }

    #[tokio::test]
    async fn test_head_not_allowed_falls_back_to_get() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("HEAD", "/doc")
            .with_status(405)
            .create_async()
            .await;
        server
            .mock("GET", "/doc")
            .with_status(200)
            .with_header("content-type", "application/pdf")
            .with_body("%PDF-1.4")
            .create_async()
            .await;

        let transport = DownloadTransport::new(None).unwrap();
        let resolved = transport
            .resolve_redirects(&format!("{}/doc", server.url()))
            .await
            .unwrap();
        assert_eq!(resolved.content_type.as_deref(), Some("application/pdf"));
    }

    #[tokio::test]
    async fn test_stream_aborts_when_body_exceeds_limit() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/big.pdf")
            .with_status(200)
            .with_header("content-type", "application/pdf")
            .with_chunked_body(|w| {
                for _ in 0..64 {
                    w.write_all(&[b'x'; 1024])?;
                }
                Ok(())
            })
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let path = dir.path().join("big.part");
        let transport = DownloadTransport::new(None).unwrap();
        let err = transport
            .stream_to_file(&format!("{}/big.pdf", server.url()), &path, 10 * 1024)
            .await
            .unwrap_err();

        assert!(matches!(err, CandidateError::TooLarge { limit_bytes: 10240, .. }));
    }

    #[tokio::test]
    async fn test_stream_rejects_declared_length() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/declared.pdf")
            .with_status(200)
            .with_body(vec![b'x'; 4096])
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let path = dir.path().join("declared.part");
        let transport = DownloadTransport::new(None).unwrap();
        let err = transport
            .stream_to_file(&format!("{}/declared.pdf", server.url()), &path, 1024)
            .await
            .unwrap_err();

        assert!(matches!(err, CandidateError::TooLarge { .. }));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_stream_writes_file() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/ok.pdf")
            .with_status(200)
            .with_body("%PDF-1.4 tiny")
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let path = dir.path().join("ok.part");
        let transport = DownloadTransport::new(None).unwrap();
        let written = transport
            .stream_to_file(&format!("{}/ok.pdf", server.url()), &path, 1024)
            .await
            .unwrap();

        assert_eq!(written, 13);
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4 tiny");
    }

    #[test]
    fn test_invalid_proxy() {
        let err = DownloadTransport::new(Some(&ProxyConfig::new("::not a url::"))).unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }
}
