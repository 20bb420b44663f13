//! Ranked-fallback download pipeline.
//!
//! Each candidate goes through `ResolveRedirects → CheckContentType →
//! StreamDownload → Validate → Commit`. Candidates are tried one at a time in
//! ranked order and the first to reach `Commit` wins. A failed attempt leaves
//! nothing behind in the target directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::error::{CandidateError, DownloadError};
use super::storage::{commit, discard, ensure_directory, existing_file_size, OutputPaths};
use super::transport::{check_content_type, DownloadTransport};
use crate::models::{Candidate, DownloadOptions, DownloadResult, PdfQuery, ValidationResult};
use crate::search::{normalize_query, SearchOrchestrator};
use crate::utils::validate_pdf_file;

const PDF_CONTENT_TYPE: &str = "application/pdf";

/// A candidate that made it onto disk as a temp file
#[derive(Debug)]
struct Fetched {
    bytes: u64,
    content_type: Option<String>,
    validation: Option<ValidationResult>,
}

/// Searches for a document and downloads the best reachable copy
#[derive(Debug, Clone)]
pub struct DownloadPipeline {
    orchestrator: Arc<SearchOrchestrator>,
}

impl DownloadPipeline {
    pub fn new(orchestrator: SearchOrchestrator) -> Self {
        Self::with_orchestrator(Arc::new(orchestrator))
    }

    /// Share an orchestrator that is also used for plain searches
    pub fn with_orchestrator(orchestrator: Arc<SearchOrchestrator>) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &SearchOrchestrator {
        &self.orchestrator
    }

    /// Find and download the best candidate for `query`.
    ///
    /// An existing file at the output path is returned as-is unless
    /// `options.overwrite` is set; that check happens before any network
    /// access.
    pub async fn download_best(
        &self,
        query: &PdfQuery,
        options: &DownloadOptions,
    ) -> Result<DownloadResult, DownloadError> {
        let started = Instant::now();
        let paths = OutputPaths::new(&options.directory, &options.reference_id);
        let final_path = paths.final_path();

        if !options.overwrite {
            if let Some(size) = existing_file_size(&final_path).await {
                info!("{} already exists, skipping download", final_path.display());
                return Ok(DownloadResult::existing(final_path, size)
                    .download_time_ms(elapsed_ms(started)));
            }
        }

        let query = normalize_query(query)?;
        let transport = DownloadTransport::new(options.proxy.as_ref())?;
        ensure_directory(&options.directory).await?;

        let search = self.orchestrator.search(&query).await?;
        if !search.found {
            return Err(DownloadError::PdfNotFound {
                warnings: search.errors,
            });
        }

        let attempt_timeout = Duration::from_secs(options.timeout_secs);
        let mut failures = Vec::new();

        for candidate in &search.results {
            debug!(
                "Trying {} candidate {} (confidence {:.2})",
                candidate.source,
                candidate.url,
                candidate.confidence()
            );

            let temp_path = paths.temp_path();
            let outcome = match timeout(
                attempt_timeout,
                self.fetch(&transport, candidate, &temp_path, options),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(CandidateError::Timeout {
                    timeout: attempt_timeout,
                }),
            };

            let fetched = match outcome {
                Ok(fetched) => fetched,
                Err(error) => {
                    warn!("Candidate {} from {} failed: {}", candidate.url, candidate.source, error);
                    discard(&temp_path).await;
                    failures.push(format!("{} {}: {}", candidate.source, candidate.url, error));
                    continue;
                }
            };

            if let Err(source) = commit(&temp_path, &final_path).await {
                warn!("Failed to commit {}: {}", final_path.display(), source);
                discard(&temp_path).await;
                failures.push(format!(
                    "{} {}: {}",
                    candidate.source,
                    candidate.url,
                    CandidateError::io(final_path.clone(), source)
                ));
                continue;
            }

            info!(
                "Downloaded {} bytes from {} to {}",
                fetched.bytes,
                candidate.source,
                final_path.display()
            );
            return Ok(finish(final_path, candidate, fetched, started));
        }

        Err(DownloadError::AllFailed { attempts: failures })
    }

    /// Get one candidate's bytes into `temp_path` and validate them
    async fn fetch(
        &self,
        transport: &DownloadTransport,
        candidate: &Candidate,
        temp_path: &Path,
        options: &DownloadOptions,
    ) -> Result<Fetched, CandidateError> {
        let limit_bytes = options.max_file_size_bytes();

        let (bytes, content_type) = match &candidate.payload {
            Some(payload) => {
                if payload.len() as u64 > limit_bytes {
                    return Err(CandidateError::TooLarge {
                        url: candidate.url.clone(),
                        limit_bytes,
                    });
                }
                tokio::fs::write(temp_path, &payload[..])
                    .await
                    .map_err(|e| CandidateError::io(temp_path, e))?;
                (payload.len() as u64, Some(PDF_CONTENT_TYPE.to_string()))
            }
            None => {
                let resolved = transport.resolve_redirects(&candidate.url).await?;
                check_content_type(&resolved)?;
                if resolved.content_length.is_some_and(|len| len > limit_bytes) {
                    return Err(CandidateError::TooLarge {
                        url: resolved.url,
                        limit_bytes,
                    });
                }
                let bytes = transport
                    .stream_to_file(&resolved.url, temp_path, limit_bytes)
                    .await?;
                (bytes, resolved.content_type)
            }
        };

        let validation = if options.validate_pdf {
            let result = validate_pdf_file(temp_path)
                .await
                .map_err(|e| CandidateError::InvalidPdf {
                    reason: e.to_string(),
                })?;
            if !result.is_valid {
                return Err(CandidateError::InvalidPdf {
                    reason: result.errors.join("; "),
                });
            }
            Some(result)
        } else {
            None
        };

        Ok(Fetched {
            bytes,
            content_type,
            validation,
        })
    }
}

fn finish(final_path: PathBuf, candidate: &Candidate, fetched: Fetched, started: Instant) -> DownloadResult {
    DownloadResult::success(final_path, fetched.bytes, candidate.source.clone())
        .content_type(fetched.content_type)
        .validation(fetched.validation)
        .download_time_ms(elapsed_ms(started))
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
