//! Integration tests for the crawl engine
//!
//! These tests use wiremock to serve small documentation sites and run full
//! crawl sessions end-to-end into an in-memory graph store.

use async_trait::async_trait;
use docshop::ai::{AiError, ChunkEnricher, LinkRanker, PageContext, RankedLink, RelevanceOracle};
use docshop::chunk::Chunker;
use docshop::config::{
    Config, CrawlerConfig, RetryConfig, SecurityConfig, SharedCrawlSettings, UserAgentConfig,
};
use docshop::crawler::{build_http_client, CrawlEngine};
use docshop::graph::{GraphGateway, GraphStore, SqliteGraphStore};
use docshop::ingest::Ingestor;
use docshop::retry::RetryPolicy;
use docshop::state::{CrawlState, SkipReason};
use docshop::url::UrlPolicy;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    }
}

/// Crawls loopback servers with no delay and no retries
fn create_test_config(max_depth: u32, max_pages_per_domain: u32) -> Config {
    Config {
        crawler: CrawlerConfig {
            enable_deep_crawling: true,
            max_depth,
            max_pages_per_domain,
            crawl_delay_secs: 0.0,
            fetch_timeout_secs: 5,
            ..CrawlerConfig::default()
        },
        user_agent: user_agent(),
        security: SecurityConfig {
            block_private_hosts: false,
            ..SecurityConfig::default()
        },
        chunking: Default::default(),
        graph: Default::default(),
        ai: Default::default(),
        retry: RetryConfig {
            max_attempts: 1,
            base_delay_ms: 1,
            max_delay_ms: 1,
        },
        output: Default::default(),
    }
}

fn create_engine(config: &Config) -> CrawlEngine {
    let store: Arc<dyn GraphStore> = Arc::new(SqliteGraphStore::new_in_memory().unwrap());
    CrawlEngine::from_config(config, store).expect("Failed to build engine")
}

fn create_engine_with_oracle(config: &Config, oracle: RelevanceOracle) -> CrawlEngine {
    create_engine_with_ai(config, oracle, None)
}

fn create_engine_with_ai(
    config: &Config,
    oracle: RelevanceOracle,
    enricher: Option<Arc<dyn ChunkEnricher>>,
) -> CrawlEngine {
    let store: Arc<dyn GraphStore> = Arc::new(SqliteGraphStore::new_in_memory().unwrap());
    let client = build_http_client(&config.user_agent, Duration::from_secs(5)).unwrap();
    let ingestor = Ingestor::new(
        GraphGateway::new(store, enricher, RetryPolicy::no_retry()),
        Chunker::default(),
        client.clone(),
        RetryPolicy::no_retry(),
    );
    CrawlEngine::new(
        SharedCrawlSettings::new(config.crawler.clone()),
        Arc::new(ingestor),
        client,
        oracle,
        UrlPolicy::new(&config.security),
        "TestBot",
        RetryPolicy::no_retry(),
    )
}

/// An HTML page with a title, a paragraph and `links` as (href, text)
fn html_page(title: &str, links: &[(&str, &str)]) -> ResponseTemplate {
    let anchors: String = links
        .iter()
        .map(|(href, text)| format!("<li><a href=\"{}\">{}</a></li>\n", href, text))
        .collect();
    ResponseTemplate::new(200).set_body_raw(
        format!(
            "<html><head><title>{title}</title></head><body>\
             <h1>{title}</h1><p>Content of {title}.</p><ul>{anchors}</ul></body></html>"
        ),
        "text/html; charset=utf-8",
    )
}

async fn mount_page(server: &MockServer, route: &str, title: &str, links: &[(&str, &str)]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html_page(title, links))
        .mount(server)
        .await;
}

async fn mount_docs_site(server: &MockServer) {
    mount_page(
        server,
        "/",
        "Home",
        &[
            ("/docs/intro", "Introduction"),
            ("/docs/guide", "Guide"),
            ("/docs/api", "API"),
            ("https://external.example.org/docs/one", "Elsewhere"),
            ("https://another.example.net/manual", "Manual"),
        ],
    )
    .await;
    mount_page(server, "/docs/intro", "Introduction", &[("/", "Home")]).await;
    mount_page(server, "/docs/guide", "Guide", &[("/docs/intro", "Introduction")]).await;
    mount_page(server, "/docs/api", "API", &[]).await;
}

#[tokio::test]
async fn test_crawl_visits_internal_docs_and_ignores_external() {
    let server = MockServer::start().await;
    mount_docs_site(&server).await;

    let engine = create_engine(&create_test_config(1, 50));
    let report = engine
        .start(&server.uri(), None)
        .await
        .expect("Crawl failed")
        .expect("Crawl did not start");

    assert_eq!(report.state, CrawlState::Completed);
    assert_eq!(report.visited.len(), 4, "visited: {:?}", report.visited);
    assert!(report.failed.is_empty());
    assert_eq!(report.links.external, 2);
    assert!(report
        .visited
        .iter()
        .all(|p| !p.url.contains("example.org") && !p.url.contains("example.net")));

    let status = engine.status();
    assert_eq!(status.state, CrawlState::Completed);
    assert_eq!(status.visited_count, 4);
    assert_eq!(status.crawled_pages.len(), 4);
    assert_eq!(status.progress, 1.0);
    assert!(status
        .discovered_links
        .iter()
        .any(|l| l.display_text() == "Elsewhere"));

    let root = format!("{}/", server.uri());
    let document = engine
        .ingestor()
        .gateway()
        .find_document_by_source(&root)
        .await
        .unwrap()
        .expect("root page was not persisted");
    assert_eq!(document.title, "Home");
}

#[tokio::test]
async fn test_domain_page_limit() {
    let server = MockServer::start().await;
    mount_docs_site(&server).await;

    let engine = create_engine(&create_test_config(1, 2));
    let report = engine.start(&server.uri(), None).await.unwrap().unwrap();

    assert_eq!(report.visited.len(), 2);
    assert_eq!(
        report.skip_counts().get(&SkipReason::DomainLimit),
        Some(&2),
        "skipped: {:?}",
        report.skipped
    );
    assert_eq!(report.domains.len(), 1);
    assert_eq!(report.domains[0].1, 2);
}

#[tokio::test]
async fn test_breadth_first_order() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "Root", &[("/docs/a", "A"), ("/docs/b", "B")]).await;
    mount_page(&server, "/docs/a", "A", &[("/docs/a/deep", "A deep")]).await;
    mount_page(&server, "/docs/b", "B", &[("/docs/b/deep", "B deep")]).await;
    mount_page(&server, "/docs/a/deep", "A deep", &[]).await;
    mount_page(&server, "/docs/b/deep", "B deep", &[]).await;

    let engine = create_engine(&create_test_config(3, 50));
    let report = engine.start(&server.uri(), None).await.unwrap().unwrap();

    let titles: Vec<&str> = report.visited.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["Root", "A", "B", "A deep", "B deep"]);

    let depths: Vec<u32> = report.visited.iter().map(|p| p.depth).collect();
    assert!(depths.windows(2).all(|w| w[0] <= w[1]), "depths: {:?}", depths);
}

#[tokio::test]
async fn test_crawl_with_depth_limit() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "Root", &[("/docs/level1", "Level 1")]).await;
    mount_page(&server, "/docs/level1", "Level 1", &[("/docs/level2", "Level 2")]).await;
    mount_page(&server, "/docs/level2", "Level 2", &[("/docs/level3", "Level 3")]).await;

    // Level 3 is one link past the bound
    Mock::given(method("GET"))
        .and(path("/docs/level3"))
        .respond_with(html_page("Level 3", &[]))
        .expect(0)
        .mount(&server)
        .await;

    let engine = create_engine(&create_test_config(2, 50));
    let report = engine.start(&server.uri(), None).await.unwrap().unwrap();

    assert_eq!(report.visited.len(), 3);
    assert_eq!(report.visited.iter().map(|p| p.depth).max(), Some(2));
}

#[tokio::test]
async fn test_max_depth_override() {
    let server = MockServer::start().await;
    mount_docs_site(&server).await;

    let engine = create_engine(&create_test_config(3, 50));
    let report = engine.start(&server.uri(), Some(0)).await.unwrap().unwrap();

    assert_eq!(report.visited.len(), 1);
    assert_eq!(report.visited[0].title, "Home");
}

#[tokio::test]
async fn test_robots_txt_respect() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /docs/private"),
        )
        .mount(&server)
        .await;

    mount_page(
        &server,
        "/",
        "Home",
        &[("/docs/public", "Public"), ("/docs/private", "Private")],
    )
    .await;
    mount_page(&server, "/docs/public", "Public", &[]).await;

    Mock::given(method("GET"))
        .and(path("/docs/private"))
        .respond_with(html_page("Private", &[]))
        .expect(0)
        .mount(&server)
        .await;

    let engine = create_engine(&create_test_config(3, 50));
    let report = engine.start(&server.uri(), None).await.unwrap().unwrap();

    assert_eq!(report.visited.len(), 2);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].reason, SkipReason::RobotsDisallowed);
    assert!(report.skipped[0].url.ends_with("/docs/private"));
}

#[tokio::test]
async fn test_failed_page_does_not_end_session() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        "Home",
        &[("/docs/broken", "Broken"), ("/docs/working", "Working")],
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/docs/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_page(&server, "/docs/working", "Working", &[]).await;

    let engine = create_engine(&create_test_config(3, 50));
    let report = engine.start(&server.uri(), None).await.unwrap().unwrap();

    assert_eq!(report.state, CrawlState::Completed);
    assert_eq!(report.visited.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].url.ends_with("/docs/broken"));
    assert!(report.failed[0].message.contains("500"));
}

#[tokio::test]
async fn test_non_html_pages_are_imported_without_links() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "Home", &[("/docs/notes.md", "Notes")]).await;
    Mock::given(method("GET"))
        .and(path("/docs/notes.md"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("# Notes\n\nSee [the guide](/docs/guide).\n", "text/markdown"),
        )
        .mount(&server)
        .await;

    let engine = create_engine(&create_test_config(3, 50));
    let report = engine.start(&server.uri(), None).await.unwrap().unwrap();

    assert_eq!(report.visited.len(), 2);
    assert_eq!(report.visited[1].title, "Notes");
    assert_eq!(report.links.total(), 1);
}

#[tokio::test]
async fn test_stop_interrupts_delay() {
    let server = MockServer::start().await;
    mount_docs_site(&server).await;

    let mut config = create_test_config(3, 50);
    config.crawler.crawl_delay_secs = 30.0;
    let engine = Arc::new(create_engine(&config));

    let started = Instant::now();
    let running = Arc::clone(&engine);
    let uri = server.uri();
    let session = tokio::spawn(async move { running.start(&uri, None).await });

    for _ in 0..500 {
        if engine.status().visited_count >= 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(engine.state(), CrawlState::Running);
    engine.stop();

    let report = session.await.unwrap().unwrap().unwrap();
    assert_eq!(report.state, CrawlState::Stopped);
    assert_eq!(report.visited.len(), 1);
    assert!(started.elapsed() < Duration::from_secs(20));
    assert_eq!(engine.state(), CrawlState::Stopped);
}

#[tokio::test]
async fn test_second_start_while_running_is_ignored() {
    let server = MockServer::start().await;
    mount_docs_site(&server).await;

    let mut config = create_test_config(3, 50);
    config.crawler.crawl_delay_secs = 30.0;
    let engine = Arc::new(create_engine(&config));

    let running = Arc::clone(&engine);
    let uri = server.uri();
    let session = tokio::spawn(async move { running.start(&uri, None).await });

    for _ in 0..500 {
        if engine.state() == CrawlState::Running {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(engine.start(&server.uri(), None).await.unwrap().is_none());

    engine.stop();
    session.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_engine_restarts_and_clears() {
    let server = MockServer::start().await;
    mount_docs_site(&server).await;

    let engine = create_engine(&create_test_config(3, 50));
    engine.start(&server.uri(), Some(0)).await.unwrap().unwrap();
    assert_eq!(engine.state(), CrawlState::Completed);

    let report = engine.start(&server.uri(), Some(1)).await.unwrap().unwrap();
    assert_eq!(report.visited.len(), 4);
    assert_eq!(engine.status().crawled_pages.len(), 4);

    engine.clear().unwrap();
    let status = engine.status();
    assert_eq!(status.state, CrawlState::Idle);
    assert!(status.crawled_pages.is_empty());
    assert!(status.discovered_links.is_empty());

    engine.settings().update(|c| c.enable_deep_crawling = false);
    assert!(engine.start(&server.uri(), None).await.unwrap().is_none());
    assert_eq!(engine.state(), CrawlState::Idle);
}

/// Ranks links whose URL contains `keep` at priority 9, everything else 1
struct KeywordRanker {
    keep: &'static str,
}

#[async_trait]
impl LinkRanker for KeywordRanker {
    async fn rank(
        &self,
        links: &[String],
        _context: &PageContext,
    ) -> Result<Vec<RankedLink>, AiError> {
        Ok(links
            .iter()
            .map(|url| RankedLink {
                url: url.clone(),
                priority: if url.contains(self.keep) { 9 } else { 1 },
            })
            .collect())
    }
}

struct BrokenRanker;

#[async_trait]
impl LinkRanker for BrokenRanker {
    async fn rank(&self, _: &[String], _: &PageContext) -> Result<Vec<RankedLink>, AiError> {
        Err(AiError::Request("connection refused".to_string()))
    }
}

/// Root page with twelve links, two of them under /docs/core
async fn mount_wide_site(server: &MockServer) {
    let routes: Vec<String> = (0..10)
        .map(|i| format!("/docs/misc{}", i))
        .chain(["/docs/core/a".to_string(), "/docs/core/b".to_string()])
        .collect();
    let links: Vec<(&str, &str)> = routes.iter().map(|r| (r.as_str(), "Page")).collect();
    mount_page(server, "/", "Home", &links).await;
    for route in &routes {
        mount_page(server, route, "Page", &[]).await;
    }
}

#[tokio::test]
async fn test_relevance_oracle_narrows_wide_pages() {
    let server = MockServer::start().await;
    mount_wide_site(&server).await;

    let oracle = RelevanceOracle::Available(Arc::new(KeywordRanker { keep: "/docs/core/" }));
    let engine = create_engine_with_oracle(&create_test_config(3, 50), oracle);
    let report = engine.start(&server.uri(), None).await.unwrap().unwrap();

    assert_eq!(report.visited.len(), 3);
    assert!(report.visited[1..].iter().all(|p| p.url.contains("/docs/core/")));
    assert_eq!(report.links.internal, 12);
}

#[tokio::test]
async fn test_relevance_oracle_with_no_survivors_keeps_all_links() {
    let server = MockServer::start().await;
    mount_wide_site(&server).await;

    let oracle = RelevanceOracle::Available(Arc::new(KeywordRanker { keep: "/nothing/" }));
    let engine = create_engine_with_oracle(&create_test_config(3, 50), oracle);
    let report = engine.start(&server.uri(), None).await.unwrap().unwrap();

    assert_eq!(report.visited.len(), 13);
}

#[tokio::test]
async fn test_failing_oracle_passes_links_through() {
    let server = MockServer::start().await;
    mount_wide_site(&server).await;

    let oracle = RelevanceOracle::Available(Arc::new(BrokenRanker));
    let engine = create_engine_with_oracle(&create_test_config(3, 50), oracle);
    let report = engine.start(&server.uri(), None).await.unwrap().unwrap();

    assert_eq!(report.visited.len(), 13);
}

/// Tags every chunk "crawled" after a short delay
struct SlowEnricher;

#[async_trait]
impl ChunkEnricher for SlowEnricher {
    async fn tags(&self, _text: &str) -> Result<Vec<String>, AiError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(vec!["crawled".to_string()])
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, AiError> {
        Ok(vec![1.0])
    }
}

#[tokio::test]
async fn test_enrichment_of_crawled_pages_can_be_awaited() {
    let server = MockServer::start().await;
    mount_docs_site(&server).await;

    let engine = create_engine_with_ai(
        &create_test_config(1, 50),
        RelevanceOracle::Unavailable,
        Some(Arc::new(SlowEnricher)),
    );
    let report = engine.start(&server.uri(), None).await.unwrap().unwrap();
    assert_eq!(report.visited.len(), 4);
    assert_eq!(engine.pending_enrichment(), 4);

    let chunks: usize = report.visited.iter().map(|p| p.chunk_count).sum();
    let summary = engine.wait_for_enrichment().await;
    assert_eq!(summary.enriched, chunks);
    assert_eq!(summary.failed, 0);
    assert_eq!(engine.pending_enrichment(), 0);

    let tagged = engine
        .ingestor()
        .gateway()
        .chunks_by_tag("crawled")
        .await
        .unwrap();
    assert_eq!(tagged.len(), chunks);
}
