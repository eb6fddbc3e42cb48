//! Integration tests for litfetch.
//!
//! Plan-shape scenarios run against the real candidate generator; the
//! download scenarios run against local mockito servers with tempfile
//! output directories.

use std::sync::Arc;
use std::time::Duration;

use mockito::Matcher;

use litfetch::acquire::{AcquisitionEngine, AttemptKind, DownloadConfig, FallbackOrchestrator, PdfDownloader};
use litfetch::config::Config;
use litfetch::models::{FailureKind, ProviderTag, RecordBuilder, SearchRecord};
use litfetch::providers::{ArxivProvider, BiorxivProvider, UnpaywallProvider};
use litfetch::Error;

const PDF_BYTES: &[u8] = b"%PDF-1.5\n1 0 obj\n<< /Type /Catalog >>\nendobj\ntrailer\n%%EOF\n";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn test_config(download_dir: &std::path::Path) -> Config {
    init_tracing();
    Config {
        download_dir: download_dir.to_path_buf(),
        use_unpaywall: false,
        download_retry_attempts: 1,
        download_retry_delay: Duration::from_millis(10),
        pdf_timeout: Duration::from_secs(5),
        ..Config::default()
    }
}

fn arxiv_record(pdf_url: &str) -> SearchRecord {
    RecordBuilder::new("Scaling Laws for Neural Language Models", ProviderTag::Arxiv)
        .authors(vec!["Jared Kaplan".to_string()])
        .year(Some(2020))
        .url("https://arxiv.org/abs/2001.08361")
        .pdf_url(pdf_url)
        .build()
}

// Scenario: arXiv direct success. The plan head is the
// version-stripped arXiv PDF URL, Unpaywall is skipped, and only
// arXiv-domain candidates follow.
#[tokio::test]
async fn test_arxiv_plan_head_is_normalized() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        // Unpaywall deliberately enabled: the arXiv source must skip it
        use_unpaywall: true,
        unpaywall_email: Some("librarian@university.edu".to_string()),
        ..test_config(dir.path())
    };
    let engine = AcquisitionEngine::new(&config).unwrap();

    let record = arxiv_record("https://arxiv.org/pdf/2401.12345v1.pdf");
    let plan = engine.build_plan(&record, None).await;

    let urls = plan.urls();
    assert_eq!(urls[0], "https://arxiv.org/pdf/2401.12345.pdf");
    assert!(
        urls.iter().all(|u| u.contains("arxiv.org/")),
        "non-arXiv candidate in plan: {:?}",
        urls
    );
    assert!(
        plan.iter().all(|c| c.kind != AttemptKind::Unpaywall),
        "Unpaywall candidate present for an arXiv record"
    );
}

// Scenario: PMC landing page. The plan carries the landing URL first,
// then the PMC PDF endpoints in generator order.
#[tokio::test]
async fn test_pmc_plan_shape() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let engine = AcquisitionEngine::new(&config).unwrap();

    let record = RecordBuilder::new("Clinical proteomics of sepsis", ProviderTag::PubMed)
        .authors(vec!["Rosa Martinez".to_string()])
        .year(Some(2022))
        .url("https://www.ncbi.nlm.nih.gov/pmc/articles/PMC123456/")
        .build();

    let plan = engine.build_plan(&record, None).await;
    let urls = plan.urls();

    assert_eq!(
        urls,
        vec![
            "https://www.ncbi.nlm.nih.gov/pmc/articles/PMC123456/",
            "https://www.ncbi.nlm.nih.gov/pmc/articles/PMC123456/pdf/",
            "https://www.ncbi.nlm.nih.gov/pmc/articles/PMC123456/pdf/main.pdf",
            "https://pmc.ncbi.nlm.nih.gov/articles/PMC123456/pdf/",
            "https://pmc.ncbi.nlm.nih.gov/articles/PMC123456/pdf/main.pdf",
            "https://europepmc.org/articles/PMC123456?pdf=render",
            "https://www.ebi.ac.uk/europepmc/webservices/rest/PMC123456/fullTextPDF",
        ]
    );
}

// Abstract-page primaries are demoted behind their direct-PDF
// transforms.
#[tokio::test]
async fn test_abstract_page_transforms_precede_primary() {
    let dir = tempfile::tempdir().unwrap();
    let engine = AcquisitionEngine::new(&test_config(dir.path())).unwrap();

    let record = RecordBuilder::new("Sequence to sequence learning", ProviderTag::Dblp)
        .url("https://arxiv.org/abs/1409.3215")
        .build();

    let plan = engine.build_plan(&record, None).await;
    let urls = plan.urls();
    assert_eq!(urls[0], "https://arxiv.org/pdf/1409.3215.pdf");
    assert_eq!(urls[1], "https://export.arxiv.org/pdf/1409.3215.pdf");
    assert_eq!(urls[2], "https://arxiv.org/abs/1409.3215");
}

// The plan never exceeds the URL budget.
#[tokio::test]
async fn test_plan_respects_url_budget() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        max_url_attempts_per_pdf: 3,
        ..test_config(dir.path())
    };
    let engine = AcquisitionEngine::new(&config).unwrap();

    let record = RecordBuilder::new("Genome-wide association study", ProviderTag::EuropePmc)
        .url("https://www.ncbi.nlm.nih.gov/pmc/articles/PMC123456/")
        .doi("10.1038/s41586-020-1234-5")
        .build();

    let plan = engine.build_plan(&record, None).await;
    assert_eq!(plan.len(), 3);
}

// Scenario: Unpaywall fallback URL lands in the plan after the
// DOI-derived candidates for a non-preprint record.
#[tokio::test]
async fn test_unpaywall_candidate_in_plan() {
    let mut server = mockito::Server::new_async().await;
    let _lookup = server
        .mock("GET", Matcher::Regex(r"^/unpaywall/.*".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"is_oa": true, "best_oa_location": {"url_for_pdf": "https://repo.example/p.pdf"}}"#,
        )
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let unpaywall = UnpaywallProvider::with_api_base(
        &config,
        "librarian@university.edu",
        format!("{}/unpaywall", server.url()),
    )
    .unwrap();
    let fallbacks = FallbackOrchestrator::from_parts(
        Some(Arc::new(unpaywall)),
        Arc::new(ArxivProvider::new(&config).unwrap()),
        Arc::new(BiorxivProvider::new(&config).unwrap()),
    );
    let engine = AcquisitionEngine::new(&config).unwrap().with_fallbacks(fallbacks);

    let record = RecordBuilder::new("A paywalled landmark paper", ProviderTag::CrossRef)
        .doi("10.9999/landmark.2020")
        .build();

    let plan = engine.build_plan(&record, None).await;
    let unpaywall_pos = plan
        .iter()
        .position(|c| c.kind == AttemptKind::Unpaywall)
        .expect("plan should contain the Unpaywall candidate");
    let resolver_pos = plan
        .iter()
        .position(|c| c.url == "https://doi.org/10.9999/landmark.2020")
        .expect("plan should contain the DOI resolver candidate");

    assert_eq!(plan.iter().nth(unpaywall_pos).unwrap().url, "https://repo.example/p.pdf");
    assert!(resolver_pos < unpaywall_pos);
}

// Direct download success writes and validates the artifact.
#[tokio::test]
async fn test_direct_pdf_download_success() {
    let mut server = mockito::Server::new_async().await;
    let _pdf = server
        .mock("GET", "/direct.pdf")
        .with_status(200)
        .with_header("content-type", "application/pdf")
        .with_body(PDF_BYTES)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let engine = AcquisitionEngine::new(&test_config(dir.path())).unwrap();

    let record = RecordBuilder::new("Reproducible builds at scale", ProviderTag::CrossRef)
        .authors(vec!["Ada Lovelace".to_string()])
        .year(Some(2023))
        .pdf_url(format!("{}/direct.pdf", server.url()))
        .build();

    let path = engine.acquire(&record).await.unwrap();
    assert_eq!(path.file_name().unwrap(), "lovelace2023reproducible.pdf");
    let written = std::fs::read(&path).unwrap();
    assert_eq!(written, PDF_BYTES);
}

// Idempotent destination: an existing artifact short-circuits before
// any network call.
#[tokio::test]
async fn test_existing_artifact_skips_network() {
    let mut server = mockito::Server::new_async().await;
    let untouched = server
        .mock("GET", "/never.pdf")
        .with_status(200)
        .with_body(PDF_BYTES)
        .expect(0)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let engine = AcquisitionEngine::new(&test_config(dir.path())).unwrap();

    let record = RecordBuilder::new("Cached forever", ProviderTag::CrossRef)
        .authors(vec!["Grace Hopper".to_string()])
        .year(Some(1984))
        .pdf_url(format!("{}/never.pdf", server.url()))
        .build();

    let expected = engine.output_path(&record);
    std::fs::write(&expected, PDF_BYTES).unwrap();

    let path = engine.acquire(&record).await.unwrap();
    assert_eq!(path, expected);
    untouched.assert_async().await;
}

// Scenario: 403 on the primary recovers through browser UA rotation;
// the attempt log carries the rotation annotations.
#[tokio::test]
async fn test_access_denied_recovers_via_ua_rotation() {
    let mut server = mockito::Server::new_async().await;
    // Chrome (Windows) and Firefox (X11) stay blocked
    let _blocked = server
        .mock("GET", "/guarded.pdf")
        .match_header(
            "user-agent",
            Matcher::Regex("(Windows NT|X11)".to_string()),
        )
        .with_status(403)
        .create_async()
        .await;
    // The Safari UA gets through
    let _allowed = server
        .mock("GET", "/guarded.pdf")
        .match_header("user-agent", Matcher::Regex("Macintosh".to_string()))
        .with_status(200)
        .with_header("content-type", "application/pdf")
        .with_body(PDF_BYTES)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let downloader = PdfDownloader::new(DownloadConfig {
        retry_attempts: 0,
        ..DownloadConfig::default()
    })
    .unwrap();

    let url = format!("{}/guarded.pdf", server.url());
    let output = dir.path().join("guarded.pdf");
    let (outcome, tried) = downloader.attempt_with_recovery(&url, &output).await;

    assert!(outcome.is_success(), "outcome: {:?}", outcome);
    assert_eq!(tried.len(), 4);
    assert_eq!(tried[0], url);
    assert!(tried[1].contains("[ua-rotate:1]"));
    assert!(tried[2].contains("[ua-rotate:2]"));
    assert!(tried[3].contains("[ua-rotate:3]"));
}

// Scenario: HTML landing page with an embedded citation_pdf_url is
// recursed through to the PDF.
#[tokio::test]
async fn test_html_landing_page_recovery() {
    let mut server = mockito::Server::new_async().await;
    let landing_html = format!(
        r#"<html><head>
            <meta name="citation_pdf_url" content="{}/paper.pdf">
        </head><body>Redirecting...</body></html>"#,
        server.url()
    );
    let _landing = server
        .mock("GET", "/landing")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(landing_html)
        .create_async()
        .await;
    let _pdf = server
        .mock("GET", "/paper.pdf")
        .with_status(200)
        .with_header("content-type", "application/pdf")
        .with_body(PDF_BYTES)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let downloader = PdfDownloader::new(DownloadConfig {
        retry_attempts: 0,
        ..DownloadConfig::default()
    })
    .unwrap();

    let url = format!("{}/landing", server.url());
    let output = dir.path().join("landing.pdf");
    let (outcome, _) = downloader.attempt_with_recovery(&url, &output).await;

    assert!(outcome.is_success(), "outcome: {:?}", outcome);
    assert_eq!(std::fs::read(&output).unwrap(), PDF_BYTES);
}

// An HTML landing page without any PDF link fails with
// html_no_pdf_link.
#[tokio::test]
async fn test_html_landing_without_links_fails() {
    let mut server = mockito::Server::new_async().await;
    let _landing = server
        .mock("GET", "/dead-end")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html><body><p>Subscribe to read this article.</p></body></html>")
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let downloader = PdfDownloader::new(DownloadConfig {
        retry_attempts: 0,
        ..DownloadConfig::default()
    })
    .unwrap();

    let url = format!("{}/dead-end", server.url());
    let output = dir.path().join("dead-end.pdf");
    let (outcome, _) = downloader.attempt_with_recovery(&url, &output).await;

    assert_eq!(outcome.failure_kind(), Some(FailureKind::HtmlNoPdfLink));
    assert!(!output.exists());
}

// A body that is neither PDF nor HTML is a content mismatch.
#[tokio::test]
async fn test_content_mismatch() {
    let mut server = mockito::Server::new_async().await;
    let _blob = server
        .mock("GET", "/archive.zip")
        .with_status(200)
        .with_header("content-type", "application/zip")
        .with_body(b"PK\x03\x04 not a pdf".to_vec())
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let downloader = PdfDownloader::new(DownloadConfig {
        retry_attempts: 0,
        ..DownloadConfig::default()
    })
    .unwrap();

    let url = format!("{}/archive.zip", server.url());
    let output = dir.path().join("archive.pdf");
    let (outcome, _) = downloader.attempt_with_recovery(&url, &output).await;

    assert_eq!(outcome.failure_kind(), Some(FailureKind::ContentMismatch));
}

// Scenario: complete failure. Every candidate 404s, the arXiv title
// fallback finds nothing, the bioRxiv lookup comes back empty; the
// structured failure reports every attempted URL.
#[tokio::test]
async fn test_complete_failure_reports_attempts() {
    let mut server = mockito::Server::new_async().await;
    let _missing = server
        .mock("GET", "/missing.pdf")
        .with_status(404)
        .expect_at_least(1)
        .create_async()
        .await;
    let _arxiv = server
        .mock("GET", Matcher::Regex(r"^/arxiv/query.*".to_string()))
        .with_status(200)
        .with_header("content-type", "application/atom+xml")
        .with_body(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <feed xmlns="http://www.w3.org/2005/Atom"><title>empty</title></feed>"#,
        )
        .create_async()
        .await;
    let _biorxiv = server
        .mock("GET", Matcher::Regex(r"^/biorxiv/details/.*".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"messages": [{"status": "no posts found"}], "collection": []}"#)
        .expect_at_least(1)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let fallbacks = FallbackOrchestrator::from_parts(
        None,
        Arc::new(
            ArxivProvider::with_api_base(&config, format!("{}/arxiv/query", server.url())).unwrap(),
        ),
        Arc::new(
            BiorxivProvider::with_api_base(&config, format!("{}/biorxiv", server.url())).unwrap(),
        ),
    );
    let engine = AcquisitionEngine::new(&config).unwrap().with_fallbacks(fallbacks);

    let record = RecordBuilder::new("An unfindable manuscript", ProviderTag::CrossRef)
        .authors(vec!["John Doe".to_string()])
        .year(Some(2019))
        .pdf_url(format!("{}/missing.pdf", server.url()))
        .build();

    let err = engine.acquire(&record).await.unwrap_err();
    match err {
        Error::Download(failure) => {
            assert_eq!(failure.kind, FailureKind::NotFound);
            // Standard, minimal-headers, Google + 2 academic referers,
            // one retry: the whole unconditional ladder ran
            assert!(
                failure.attempted_urls.len() >= 6,
                "attempts: {:?}",
                failure.attempted_urls
            );
            assert_eq!(failure.total_attempts, failure.attempted_urls.len());
            assert!(failure.failure_reason.contains("404"));
            assert!(!failure.output_path.as_os_str().is_empty());
        }
        other => panic!("expected DownloadFailure, got {other:?}"),
    }
    assert!(!engine.output_path(&record).exists());
}

// The batch driver aggregates successes and failures.
#[tokio::test]
async fn test_batch_acquisition_report() {
    let mut server = mockito::Server::new_async().await;
    let _good = server
        .mock("GET", "/good.pdf")
        .with_status(200)
        .with_header("content-type", "application/pdf")
        .with_body(PDF_BYTES)
        .create_async()
        .await;
    let _bad = server
        .mock("GET", "/bad.pdf")
        .with_status(404)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        max_fallback_strategies: 0,
        ..test_config(dir.path())
    };
    let engine = AcquisitionEngine::new(&config).unwrap();

    let records = vec![
        RecordBuilder::new("The one that works", ProviderTag::CrossRef)
            .authors(vec!["Alan Turing".to_string()])
            .year(Some(1950))
            .pdf_url(format!("{}/good.pdf", server.url()))
            .build(),
        RecordBuilder::new("The one that does not", ProviderTag::CrossRef)
            .authors(vec!["John Doe".to_string()])
            .year(Some(2001))
            .pdf_url(format!("{}/bad.pdf", server.url()))
            .build(),
    ];

    let report = engine.acquire_all(&records).await;
    assert_eq!(report.succeeded.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.total_bytes, PDF_BYTES.len() as u64);
    assert!((report.success_rate() - 0.5).abs() < f64::EPSILON);
}

#[derive(Debug, Default)]
struct RecordingListener {
    calls: std::sync::Mutex<Vec<(String, std::path::PathBuf)>>,
}

impl litfetch::acquire::PdfPathListener for RecordingListener {
    fn update_pdf_path(&self, citation_key: &str, path: &std::path::Path) {
        self.calls
            .lock()
            .unwrap()
            .push((citation_key.to_string(), path.to_path_buf()));
    }
}

// A completed download notifies the library-index collaborator with
// the citation key and artifact path.
#[tokio::test]
async fn test_path_listener_notified_on_success() {
    let mut server = mockito::Server::new_async().await;
    let _pdf = server
        .mock("GET", "/indexed.pdf")
        .with_status(200)
        .with_header("content-type", "application/pdf")
        .with_body(PDF_BYTES)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let listener = Arc::new(RecordingListener::default());
    let engine = AcquisitionEngine::new(&test_config(dir.path()))
        .unwrap()
        .with_path_listener(listener.clone());

    let record = RecordBuilder::new("Indexing at scale", ProviderTag::CrossRef)
        .authors(vec!["Donald Knuth".to_string()])
        .year(Some(1973))
        .pdf_url(format!("{}/indexed.pdf", server.url()))
        .build();

    let path = engine.acquire(&record).await.unwrap();

    let calls = listener.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "knuth1973indexing");
    assert_eq!(calls[0].1, path);
}

// A pre-cancelled token surfaces Cancelled, distinct from any failure.
#[tokio::test]
async fn test_cancellation_surfaces_before_network() {
    let mut server = mockito::Server::new_async().await;
    let untouched = server
        .mock("GET", "/cancelled.pdf")
        .with_status(200)
        .with_body(PDF_BYTES)
        .expect(0)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cancel = litfetch::CancellationToken::new();
    cancel.cancel();
    let engine =
        AcquisitionEngine::new_with_cancellation(&test_config(dir.path()), cancel).unwrap();

    let record = RecordBuilder::new("Never fetched", ProviderTag::CrossRef)
        .authors(vec!["John Doe".to_string()])
        .year(Some(2024))
        .pdf_url(format!("{}/cancelled.pdf", server.url()))
        .build();

    let err = engine.acquire(&record).await.unwrap_err();
    assert!(err.is_cancelled());
    untouched.assert_async().await;
}

// Fallback orchestrator surfaces the best Unpaywall OA location.
#[tokio::test]
async fn test_fallback_unpaywall_url() {
    let mut server = mockito::Server::new_async().await;
    let _lookup = server
        .mock("GET", Matcher::Regex(r"^/v2/.*".to_string()))
        .match_query(Matcher::Regex("email=librarian".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "is_oa": true,
                "best_oa_location": {"url_for_pdf": null},
                "oa_locations": [
                    {"url_for_pdf": null},
                    {"url_for_pdf": "https://repo.example/fallback.pdf"}
                ]
            }"#,
        )
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let unpaywall = UnpaywallProvider::with_api_base(
        &config,
        "librarian@university.edu",
        format!("{}/v2", server.url()),
    )
    .unwrap();
    let fallbacks = FallbackOrchestrator::from_parts(
        Some(Arc::new(unpaywall)),
        Arc::new(ArxivProvider::new(&config).unwrap()),
        Arc::new(BiorxivProvider::new(&config).unwrap()),
    );

    let url = fallbacks.unpaywall_url("10.1038/nature12373").await;
    assert_eq!(url.as_deref(), Some("https://repo.example/fallback.pdf"));
}

// Closed-access DOIs yield no fallback URL.
#[tokio::test]
async fn test_fallback_unpaywall_closed_access() {
    let mut server = mockito::Server::new_async().await;
    let _lookup = server
        .mock("GET", Matcher::Regex(r"^/v2/.*".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"is_oa": false, "oa_locations": []}"#)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let unpaywall = UnpaywallProvider::with_api_base(
        &config,
        "librarian@university.edu",
        format!("{}/v2", server.url()),
    )
    .unwrap();
    let fallbacks = FallbackOrchestrator::from_parts(
        Some(Arc::new(unpaywall)),
        Arc::new(ArxivProvider::new(&config).unwrap()),
        Arc::new(BiorxivProvider::new(&config).unwrap()),
    );

    assert_eq!(fallbacks.unpaywall_url("10.1016/j.cell.2023.01.001").await, None);
}

// bioRxiv DOI fallback returns the canonical content PDF.
#[tokio::test]
async fn test_fallback_biorxiv_by_doi() {
    let mut server = mockito::Server::new_async().await;
    let _details = server
        .mock(
            "GET",
            Matcher::Regex(r"^/api/details/biorxiv/10\.1101/.*".to_string()),
        )
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "messages": [{"status": "ok"}],
                "collection": [{
                    "doi": "10.1101/2023.05.01.538900",
                    "title": "Mapping chromatin accessibility",
                    "authors": "Park, S.; Chen, L.",
                    "date": "2023-05-01",
                    "version": "1",
                    "abstract": "Chromatin accessibility..."
                }]
            }"#,
        )
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let fallbacks = FallbackOrchestrator::from_parts(
        None,
        Arc::new(ArxivProvider::new(&config).unwrap()),
        Arc::new(
            BiorxivProvider::with_api_base(&config, format!("{}/api", server.url())).unwrap(),
        ),
    );

    let record = RecordBuilder::new("Mapping chromatin accessibility", ProviderTag::CrossRef)
        .doi("10.1101/2023.05.01.538900")
        .build();

    let url = fallbacks.biorxiv_by_doi(&record).await;
    assert_eq!(
        url.as_deref(),
        Some("https://www.biorxiv.org/content/10.1101/2023.05.01.538900.full.pdf")
    );
}
