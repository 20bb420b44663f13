//! Integration tests for PDF Finder
//!
//! These tests drive the public search and download entry points against
//! mock catalogs and local HTTP servers.

mod common;

use common::{build_pdf, orchestrator_with, text_heavy_pdf};
use pdf_finder::download::OutputPaths;
use pdf_finder::models::{DownloadOptions, PdfQuality, PdfQuery};
use pdf_finder::sources::mock::make_candidate;
use pdf_finder::sources::{CrossRefResolver, MockSource, SourceRegistry};
use pdf_finder::{DownloadPipeline, SearchOrchestrator};
use std::sync::Arc;
use tempfile::tempdir;

fn crossref_body(doi: &str, pdf_url: &str) -> String {
    serde_json::json!({
        "status": "ok",
        "message": {
            "DOI": doi,
            "title": ["Federated Retrieval of Documents"],
            "author": [{"given": "Ada", "family": "Lovelace"}],
            "publisher": "Example Press",
            "issued": {"date-parts": [[2021, 5, 1]]},
            "link": [{"URL": pdf_url, "content-type": "application/pdf"}],
            "license": [{"URL": "https://creativecommons.org/licenses/by/4.0/"}]
        }
    })
    .to_string()
}

#[tokio::test]
async fn test_invalid_input_makes_no_adapter_calls() {
    let (orchestrator, source) = orchestrator_with(vec![make_candidate("Mock", "http://a", 0.5)]);

    for doi in ["not-a-doi", "10.12/short", "11.1234/abc", "   "] {
        let err = orchestrator.search(&PdfQuery::new().doi(doi)).await;
        assert!(err.is_err(), "expected {:?} to be rejected", doi);
    }
    assert!(orchestrator.search(&PdfQuery::new().pmid("12ab")).await.is_err());
    assert!(orchestrator.search(&PdfQuery::new()).await.is_err());

    assert_eq!(source.call_count(), 0);
}

#[tokio::test]
async fn test_duplicate_urls_collapse_to_highest_confidence() {
    let low = Arc::new(
        MockSource::new("low", "Low").with_candidates(vec![make_candidate("Low", "http://same", 0.3)]),
    );
    let high = Arc::new(
        MockSource::new("high", "High").with_candidates(vec![make_candidate("High", "http://same", 0.6)]),
    );
    let mut registry = SourceRegistry::new();
    registry.register(low);
    registry.register(high);

    let result = SearchOrchestrator::new(registry)
        .search(&PdfQuery::new().title("Anything"))
        .await
        .unwrap();

    assert_eq!(result.results.len(), 1);
    assert_eq!(result.results[0].source, "High");
    assert_eq!(result.total_sources, 1);
}

#[tokio::test]
async fn test_doi_with_registry_pdf_link_ranks_high() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/works/10.1000/xyz")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(crossref_body("10.1000/xyz", "https://pub.example.com/xyz.pdf"))
        .create_async()
        .await;

    let resolver = CrossRefResolver::new(None).unwrap().with_base_url(server.url());
    let orchestrator = SearchOrchestrator::new(SourceRegistry::new()).with_resolver(Arc::new(resolver));

    let result = orchestrator
        .search(&PdfQuery::new().doi("https://doi.org/10.1000/XYZ"))
        .await
        .unwrap();

    assert!(result.found);
    let best = result.best().unwrap();
    assert_eq!(best.source, "CrossRef");
    assert_eq!(best.url, "https://pub.example.com/xyz.pdf");
    assert!(best.confidence() >= 0.9);
}

#[tokio::test]
async fn test_download_end_to_end_is_idempotent() {
    let mut server = mockito::Server::new_async().await;
    let pdf = text_heavy_pdf();
    let pdf_url = format!("{}/files/paper.pdf", server.url());

    let works = server
        .mock("GET", "/works/10.1000/e2e")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(crossref_body("10.1000/e2e", &pdf_url))
        .expect(1)
        .create_async()
        .await;
    let head = server
        .mock("HEAD", "/files/paper.pdf")
        .with_status(200)
        .with_header("content-type", "application/pdf")
        .expect(1)
        .create_async()
        .await;
    let get = server
        .mock("GET", "/files/paper.pdf")
        .with_status(200)
        .with_header("content-type", "application/pdf")
        .with_body(pdf.clone())
        .expect(1)
        .create_async()
        .await;

    let resolver = CrossRefResolver::new(None).unwrap().with_base_url(server.url());
    let pipeline = DownloadPipeline::new(
        SearchOrchestrator::new(SourceRegistry::new()).with_resolver(Arc::new(resolver)),
    );

    let dir = tempdir().unwrap();
    let query = PdfQuery::new().doi("10.1000/e2e");
    let options = DownloadOptions::new("lovelace-2021", dir.path());

    let first = pipeline.download_best(&query, &options).await.unwrap();
    assert!(first.success);
    assert_eq!(first.source.as_deref(), Some("CrossRef"));
    assert_eq!(first.file_size, pdf.len() as u64);

    let validation = first.validation.expect("validation should run by default");
    assert!(validation.is_valid);
    assert_eq!(validation.page_count, Some(3));
    assert!(validation.has_text);
    assert_eq!(validation.quality, PdfQuality::High);

    let expected_path = OutputPaths::new(dir.path(), "lovelace-2021").final_path();
    assert_eq!(first.file_path.as_deref(), Some(expected_path.as_path()));

    let second = pipeline.download_best(&query, &options).await.unwrap();
    assert!(second.success);
    assert_eq!(second.file_size, pdf.len() as u64);
    assert_eq!(second.file_path, first.file_path);

    works.assert_async().await;
    head.assert_async().await;
    get.assert_async().await;
}

#[tokio::test]
async fn test_multi_page_text_pdf_downloads_as_high_quality() {
    let mut server = mockito::Server::new_async().await;
    let line = "Ranked fallback keeps the best reachable copy of a paper. ".repeat(8);
    let pdf = build_pdf(6, &line);

    server
        .mock("HEAD", "/thesis.pdf")
        .with_status(200)
        .with_header("content-type", "application/pdf")
        .create_async()
        .await;
    server
        .mock("GET", "/thesis.pdf")
        .with_status(200)
        .with_header("content-type", "application/pdf")
        .with_body(pdf.clone())
        .create_async()
        .await;

    let (orchestrator, _) =
        orchestrator_with(vec![make_candidate("Mock", &format!("{}/thesis.pdf", server.url()), 0.9)]);
    let dir = tempdir().unwrap();
    let result = DownloadPipeline::new(orchestrator)
        .download_best(&PdfQuery::new().title("Anything"), &DownloadOptions::new("ref-thesis", dir.path()))
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.file_size, pdf.len() as u64);
    let validation = result.validation.expect("validation should run by default");
    assert!(validation.is_valid, "errors: {:?}", validation.errors);
    assert_eq!(
        (validation.page_count, validation.has_text, validation.quality),
        (Some(6), true, PdfQuality::High)
    );
}

#[tokio::test]
async fn test_redirect_loop_and_oversize_leave_no_file() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("HEAD", "/loop-a")
        .with_status(302)
        .with_header("location", "/loop-b")
        .create_async()
        .await;
    server
        .mock("HEAD", "/loop-b")
        .with_status(302)
        .with_header("location", "/loop-a")
        .create_async()
        .await;
    server
        .mock("HEAD", "/huge.pdf")
        .with_status(200)
        .with_header("content-type", "application/pdf")
        .create_async()
        .await;
    server
        .mock("GET", "/huge.pdf")
        .with_status(200)
        .with_header("content-type", "application/pdf")
        .with_chunked_body(|w| {
            w.write_all(b"%PDF-1.4\n")?;
            for _ in 0..2048 {
                w.write_all(&[b' '; 1024])?;
            }
            Ok(())
        })
        .create_async()
        .await;

    let (orchestrator, _) = orchestrator_with(vec![
        make_candidate("Mock", &format!("{}/loop-a", server.url()), 0.9),
        make_candidate("Mock", &format!("{}/huge.pdf", server.url()), 0.8),
    ]);
    let pipeline = DownloadPipeline::new(orchestrator);

    let dir = tempdir().unwrap();
    let options = DownloadOptions::new("ref-big", dir.path()).max_file_size_mb(1);
    let err = pipeline
        .download_best(&PdfQuery::new().title("Anything"), &options)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "DOWNLOAD_FAILED");
    let message = err.to_string();
    assert!(message.contains("circular redirect"), "{}", message);
    assert!(message.contains("byte limit"), "{}", message);

    assert!(!OutputPaths::new(dir.path(), "ref-big").final_path().exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_short_pdf_is_rejected_as_too_small() {
    let mut server = mockito::Server::new_async().await;
    let mut body = b"%PDF-1.4\n".to_vec();
    body.resize(50, b' ');

    server
        .mock("HEAD", "/short.pdf")
        .with_status(200)
        .with_header("content-type", "application/pdf")
        .create_async()
        .await;
    server
        .mock("GET", "/short.pdf")
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let (orchestrator, _) =
        orchestrator_with(vec![make_candidate("Mock", &format!("{}/short.pdf", server.url()), 0.9)]);
    let dir = tempdir().unwrap();
    let err = DownloadPipeline::new(orchestrator)
        .download_best(&PdfQuery::new().title("Anything"), &DownloadOptions::new("ref-short", dir.path()))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "DOWNLOAD_FAILED");
    assert!(err.to_string().contains("too small"));
}

#[tokio::test]
async fn test_not_found_carries_source_warnings() {
    let mut registry = SourceRegistry::new();
    registry.register(Arc::new(MockSource::new("flaky", "Flaky").failing("service unavailable")));
    let pipeline = DownloadPipeline::new(SearchOrchestrator::new(registry));

    let dir = tempdir().unwrap();
    let err = pipeline
        .download_best(&PdfQuery::new().title("Anything"), &DownloadOptions::new("ref-none", dir.path()))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "PDF_NOT_FOUND");
    assert!(err.to_string().contains("Flaky: API error: service unavailable"));
}

#[tokio::test]
async fn test_wrong_content_type_is_skipped() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("HEAD", "/landing")
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .create_async()
        .await;
    let get = server
        .mock("GET", "/landing")
        .expect(0)
        .create_async()
        .await;

    let (orchestrator, _) =
        orchestrator_with(vec![make_candidate("Mock", &format!("{}/landing", server.url()), 0.9)]);
    let dir = tempdir().unwrap();
    let err = DownloadPipeline::new(orchestrator)
        .download_best(&PdfQuery::new().title("Anything"), &DownloadOptions::new("ref-html", dir.path()))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "DOWNLOAD_FAILED");
    assert!(err.to_string().contains("unsupported content type"));
    get.assert_async().await;
}
