//! Deep crawl engine
//!
//! One [`CrawlEngine`] runs at most one session at a time. A session walks the
//! frontier breadth-first from its root page:
//!
//! 1. pop the front of the frontier
//! 2. skip it if already visited, deeper than the session allows, over its
//!    domain's page budget, or disallowed by robots.txt
//! 3. fetch it once and import it through the [`Ingestor`]
//! 4. for HTML pages, extract links, optionally let the relevance oracle
//!    narrow them, and enqueue the admitted ones at depth + 1
//! 5. wait out the crawl delay
//!
//! A failing page never ends the session. `stop` is honored before the next
//! pop and cuts the inter-page delay short.

use crate::ai::{AiServices, PageContext, RelevanceOracle};
use crate::chunk::Chunker;
use crate::config::{Config, CrawlerConfig, SharedCrawlSettings};
use crate::crawler::{build_http_client, fetch_page, parse_page, Frontier, QueuedUrl};
use crate::graph::{EnrichmentSummary, GraphGateway, GraphStore, PersistOutcome};
use crate::ingest::{DuplicatePolicy, Ingestor};
use crate::output::{CrawlReport, VisitedPage};
use crate::retry::RetryPolicy;
use crate::robots::RobotsCache;
use crate::state::{CrawlState, DomainTable, SkipReason};
use crate::url::{extract_domain, is_documentation_link, normalize, normalize_url, CrawlLink, UrlPolicy};
use crate::DocShopError;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use url::Url;

/// Settings of one crawl session, fixed when it starts
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlSession {
    pub root_url: Url,
    pub max_depth: u32,
    pub max_pages_per_domain: u32,
    pub delay: Duration,
    pub follow_external_links: bool,
    pub respect_robots_txt: bool,
    pub relevance_link_threshold: usize,
    pub relevance_min_priority: u8,
    pub started_at: DateTime<Utc>,
}

impl CrawlSession {
    /// `max_depth` overrides the configured depth for this session only
    pub fn new(root_url: Url, max_depth: Option<u32>, settings: &CrawlerConfig) -> Self {
        Self {
            root_url,
            max_depth: max_depth.unwrap_or(settings.max_depth),
            max_pages_per_domain: settings.max_pages_per_domain,
            delay: settings.crawl_delay(),
            follow_external_links: settings.follow_external_links,
            respect_robots_txt: settings.respect_robots_txt,
            relevance_link_threshold: settings.relevance_link_threshold,
            relevance_min_priority: settings.relevance_min_priority,
            started_at: Utc::now(),
        }
    }
}

/// Observable state of the engine
#[derive(Debug, Clone)]
pub struct CrawlStatus {
    pub state: CrawlState,
    pub message: String,

    /// 0.0 to 1.0, see [`progress`]
    pub progress: f64,

    pub visited_count: usize,
    pub discovered_count: usize,
    pub crawled_pages: Vec<VisitedPage>,
    pub discovered_links: Vec<CrawlLink>,

    /// The running or most recent session
    pub session: Option<CrawlSession>,
}

impl Default for CrawlStatus {
    fn default() -> Self {
        Self {
            state: CrawlState::Idle,
            message: "Idle".to_string(),
            progress: 0.0,
            visited_count: 0,
            discovered_count: 0,
            crawled_pages: Vec::new(),
            discovered_links: Vec::new(),
            session: None,
        }
    }
}

/// Approximate session progress
///
/// `visited / min(visited + queued, max_pages_per_domain)`, clamped to 1.0.
///
/// ```
/// use docshop::crawler::progress;
///
/// assert_eq!(progress(0, 0, 50), 0.0);
/// assert_eq!(progress(2, 2, 50), 0.5);
/// assert_eq!(progress(10, 90, 20), 0.5);
/// ```
pub fn progress(visited: usize, queued: usize, max_pages_per_domain: u32) -> f64 {
    let estimate = (visited + queued).min(max_pages_per_domain as usize);
    if estimate == 0 {
        return 0.0;
    }
    (visited as f64 / estimate as f64).min(1.0)
}

/// How the frontier loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Exhausted,
    Stopped,
}

/// What processing one page produced
enum PageOutcome {
    /// Imported; these links are candidates for the frontier
    Imported(Vec<CrawlLink>),
    /// Fetch or import failed, already recorded
    Failed,
    /// Stop arrived while the page was in flight
    Discarded,
}

/// Frontier bookkeeping owned by the running loop
struct Traversal {
    frontier: Frontier,
    visited: HashSet<String>,
    enqueued: HashSet<String>,
    domains: DomainTable,
    robots: RobotsCache,
}

pub struct CrawlEngine {
    settings: SharedCrawlSettings,
    ingestor: Arc<Ingestor>,
    client: Client,
    oracle: RelevanceOracle,
    url_policy: UrlPolicy,
    robots_agent: String,
    retry: RetryPolicy,
    status: RwLock<CrawlStatus>,
    stop: watch::Sender<bool>,

    /// Enrichment of imported pages not yet waited for, across sessions
    enrichment: Mutex<Vec<PersistOutcome>>,
}

impl CrawlEngine {
    pub fn new(
        settings: SharedCrawlSettings,
        ingestor: Arc<Ingestor>,
        client: Client,
        oracle: RelevanceOracle,
        url_policy: UrlPolicy,
        robots_agent: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            settings,
            ingestor,
            client,
            oracle,
            url_policy,
            robots_agent: robots_agent.into(),
            retry,
            status: RwLock::new(CrawlStatus::default()),
            stop,
            enrichment: Mutex::new(Vec::new()),
        }
    }

    /// Wires an engine from configuration on top of an opened graph store
    pub fn from_config(config: &Config, store: Arc<dyn GraphStore>) -> crate::Result<Self> {
        let ai = AiServices::from_config(&config.ai)?;
        let client = build_http_client(&config.user_agent, config.crawler.fetch_timeout())?;
        let retry = RetryPolicy::from_config(&config.retry);

        let gateway = GraphGateway::new(store, ai.enricher.clone(), retry.clone());
        let ingestor = Ingestor::new(
            gateway,
            Chunker::from_config(&config.chunking),
            client.clone(),
            retry.clone(),
        );

        Ok(Self::new(
            SharedCrawlSettings::new(config.crawler.clone()),
            Arc::new(ingestor),
            client,
            ai.oracle,
            UrlPolicy::new(&config.security),
            config.user_agent.crawler_name.clone(),
            retry,
        ))
    }

    /// Runtime-mutable settings, read at the next `start`
    pub fn settings(&self) -> &SharedCrawlSettings {
        &self.settings
    }

    pub fn ingestor(&self) -> &Ingestor {
        &self.ingestor
    }

    pub fn status(&self) -> CrawlStatus {
        self.read_status().clone()
    }

    pub fn state(&self) -> CrawlState {
        self.read_status().state
    }

    /// Runs one crawl session from `root_url` to completion
    ///
    /// Returns `Ok(None)` without doing anything when deep crawling is
    /// disabled or a session is already active. A terminal state left by the
    /// previous session goes back to `Idle` first.
    ///
    /// # Errors
    ///
    /// The root URL does not parse or fails the URL policy; the engine is
    /// left `Failed`.
    pub async fn start(
        &self,
        root_url: &str,
        max_depth: Option<u32>,
    ) -> crate::Result<Option<CrawlReport>> {
        let settings = self.settings.snapshot();
        if !settings.enable_deep_crawling {
            info!("Deep crawling is disabled; ignoring start for {}", root_url);
            return Ok(None);
        }

        {
            let mut status = self.write_status();
            if status.state.is_active() {
                warn!(
                    "A crawl session is already {}; ignoring start for {}",
                    status.state, root_url
                );
                return Ok(None);
            }
            if status.state.is_terminal() {
                transition(&mut status, CrawlState::Idle)?;
            }
            transition(&mut status, CrawlState::Initializing)?;
            *status = CrawlStatus {
                state: CrawlState::Initializing,
                message: format!("Initializing crawl of {}", root_url),
                ..CrawlStatus::default()
            };
            self.stop.send_replace(false);
        }

        let session = match self.initialize(root_url, max_depth, &settings) {
            Ok(session) => session,
            Err(e) => {
                error!("Could not start crawl of {}: {}", root_url, e);
                let mut status = self.write_status();
                transition(&mut status, CrawlState::Failed)?;
                status.message = format!("Failed to start: {}", e);
                return Err(e);
            }
        };

        {
            let mut status = self.write_status();
            if self.stop_requested() {
                transition(&mut status, CrawlState::Stopped)?;
                status.message = "Stopped before the first page".to_string();
                let mut report = CrawlReport::new(session.root_url.as_str(), session.started_at);
                report.finish(CrawlState::Stopped, status.message.clone());
                return Ok(Some(report));
            }
            transition(&mut status, CrawlState::Running)?;
            status.message = format!("Crawling {}", session.root_url);
            status.session = Some(session.clone());
        }

        info!(
            "Starting crawl of {} (max depth {}, {} pages per domain, delay {:?}, external links {})",
            session.root_url,
            session.max_depth,
            session.max_pages_per_domain,
            session.delay,
            if session.follow_external_links { "followed" } else { "ignored" }
        );

        let mut report = CrawlReport::new(session.root_url.as_str(), session.started_at);
        let end = self.run_session(&session, &mut report).await;

        let imported = report.visited.len();
        let (state, message) = match end {
            SessionEnd::Exhausted => (
                CrawlState::Completed,
                format!("Completed: {} pages imported", imported),
            ),
            SessionEnd::Stopped => (
                CrawlState::Stopped,
                format!("Stopped: {} pages imported", imported),
            ),
        };

        {
            let mut status = self.write_status();
            transition(&mut status, state)?;
            status.message = message.clone();
        }
        report.finish(state, message);

        info!(
            "Crawl of {} {}: {} imported, {} skipped, {} failed, {} links discovered",
            report.root_url,
            state,
            report.visited.len(),
            report.skipped.len(),
            report.failed.len(),
            report.links.total()
        );

        Ok(Some(report))
    }

    /// Asks the active session to stop before its next page
    pub fn stop(&self) {
        let mut status = self.write_status();
        if !status.state.is_active() {
            debug!("No active crawl session to stop");
            return;
        }
        info!("Stop requested");
        status.message = "Stopping".to_string();
        self.stop.send_replace(true);
    }

    /// Number of imported pages whose enrichment has not been waited for
    pub fn pending_enrichment(&self) -> usize {
        self.lock_enrichment().len()
    }

    /// Waits for the chunk enrichment of every page imported so far
    ///
    /// Tasks keep running when this is never called, but a process that
    /// exits first abandons them.
    pub async fn wait_for_enrichment(&self) -> EnrichmentSummary {
        let pending = std::mem::take(&mut *self.lock_enrichment());
        let mut total = EnrichmentSummary::default();
        for outcome in pending {
            let summary = outcome.wait_for_enrichment().await;
            total.enriched += summary.enriched;
            total.failed += summary.failed;
        }
        total
    }

    /// Drops the pages and links held from the last session
    ///
    /// Ignored while a session is active.
    pub fn clear(&self) -> crate::Result<()> {
        let mut status = self.write_status();
        if status.state.is_active() {
            warn!("Cannot clear crawl results while a session is {}", status.state);
            return Ok(());
        }
        if status.state.is_terminal() {
            transition(&mut status, CrawlState::Idle)?;
        }
        *status = CrawlStatus::default();
        Ok(())
    }

    fn initialize(
        &self,
        root_url: &str,
        max_depth: Option<u32>,
        settings: &CrawlerConfig,
    ) -> crate::Result<CrawlSession> {
        let root = normalize_url(root_url)?;
        self.url_policy.validate(&root)?;
        Ok(CrawlSession::new(root, max_depth, settings))
    }

    async fn run_session(&self, session: &CrawlSession, report: &mut CrawlReport) -> SessionEnd {
        let mut traversal = Traversal {
            frontier: Frontier::new(),
            visited: HashSet::new(),
            enqueued: HashSet::new(),
            domains: DomainTable::new(session.max_pages_per_domain),
            robots: RobotsCache::new(self.robots_agent.clone()),
        };
        let mut stop = self.stop.subscribe();

        traversal.enqueued.insert(session.root_url.to_string());
        traversal.frontier.push(session.root_url.clone(), 0);

        loop {
            if self.stop_requested() {
                report.domains = traversal.domains.counts();
                return SessionEnd::Stopped;
            }
            let Some(QueuedUrl { url, depth }) = traversal.frontier.pop() else {
                report.domains = traversal.domains.counts();
                return SessionEnd::Exhausted;
            };

            let domain = extract_domain(&url).unwrap_or_default();
            if let Some(reason) = self.skip_reason(&url, depth, &domain, session, &mut traversal).await {
                debug!("Skipping {} at depth {}: {}", url, depth, reason);
                report.record_skip(url.as_str(), depth, reason);
                continue;
            }

            traversal.visited.insert(url.to_string());
            traversal.domains.record_visit(&domain);
            self.update_status(|status| status.message = format!("Crawling {}", url));

            match self.process_page(&url, depth, session, &mut traversal, report).await {
                PageOutcome::Discarded => {
                    debug!("Discarding {} after stop request", url);
                    report.domains = traversal.domains.counts();
                    return SessionEnd::Stopped;
                }
                PageOutcome::Failed => {}
                PageOutcome::Imported(links) => {
                    for link in links {
                        if self.admit(&link, session, &traversal) {
                            traversal.enqueued.insert(link.url.to_string());
                            traversal.frontier.push(link.url, link.depth);
                        }
                    }
                }
            }

            let visited = traversal.visited.len();
            let queued = traversal.frontier.len();
            self.update_status(|status| {
                status.visited_count = visited;
                status.progress = progress(visited, queued, session.max_pages_per_domain);
            });

            if !traversal.frontier.is_empty() {
                let delay = self.effective_delay(session, &traversal.robots, &url);
                pause(delay, &mut stop).await;
            }
        }
    }

    /// First reason not to fetch a popped entry, in check order
    async fn skip_reason(
        &self,
        url: &Url,
        depth: u32,
        domain: &str,
        session: &CrawlSession,
        traversal: &mut Traversal,
    ) -> Option<SkipReason> {
        if traversal.visited.contains(url.as_str()) {
            return Some(SkipReason::Visited);
        }
        if depth > session.max_depth {
            return Some(SkipReason::DepthExceeded);
        }
        if !traversal.domains.has_capacity(domain) {
            return Some(SkipReason::DomainLimit);
        }
        if session.respect_robots_txt && !traversal.robots.is_allowed(&self.client, url).await {
            return Some(SkipReason::RobotsDisallowed);
        }
        None
    }

    async fn process_page(
        &self,
        url: &Url,
        depth: u32,
        session: &CrawlSession,
        traversal: &mut Traversal,
        report: &mut CrawlReport,
    ) -> PageOutcome {
        let page = match fetch_page(&self.client, url, &self.retry).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Failed to fetch {}: {}", url, e);
                report.record_failure(url.as_str(), depth, e.to_string());
                return PageOutcome::Failed;
            }
        };
        if self.stop_requested() {
            return PageOutcome::Discarded;
        }

        let final_url = normalize(&page.url);
        if &final_url != url {
            debug!("{} redirected to {}", url, final_url);
            traversal.visited.insert(final_url.to_string());
        }

        let outcome = match self.ingestor.ingest_fetched(&page, DuplicatePolicy::Allow).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Failed to import {}: {}", url, e);
                report.record_failure(url.as_str(), depth, e.to_string());
                return PageOutcome::Failed;
            }
        };

        info!(
            "Imported {} (depth {}) as \"{}\" with {} chunks",
            url, depth, outcome.document.title, outcome.chunk_count
        );
        let visited_page = VisitedPage {
            url: url.to_string(),
            depth,
            document_id: outcome.document.id,
            title: outcome.document.title.clone(),
            chunk_count: outcome.chunk_count,
        };
        report.visited.push(visited_page.clone());
        self.update_status(|status| status.crawled_pages.push(visited_page));

        let document_title = outcome.document.title;
        if outcome.persisted.enrichment_tasks() > 0 {
            self.lock_enrichment().push(outcome.persisted);
        }

        if !page.is_html() {
            return PageOutcome::Imported(Vec::new());
        }

        let parsed = parse_page(&page.text(), &page.url, depth);
        for link in &parsed.links {
            report.links.record(link.link_type);
        }
        let discovered = parsed.links.clone();
        self.update_status(|status| {
            status.discovered_count += discovered.len();
            status.discovered_links.extend(discovered);
        });

        let context = PageContext {
            url: page.url.to_string(),
            title: parsed.title.unwrap_or(document_title),
            excerpt: parsed.excerpt,
        };
        let links = self
            .oracle
            .filter(
                parsed.links,
                &context,
                session.relevance_link_threshold,
                session.relevance_min_priority,
            )
            .await;

        PageOutcome::Imported(links)
    }

    /// Link admission, first failing check wins
    fn admit(&self, link: &CrawlLink, session: &CrawlSession, traversal: &Traversal) -> bool {
        let key = link.url.as_str();
        if traversal.visited.contains(key) || traversal.enqueued.contains(key) {
            return false;
        }
        if link.depth > session.max_depth {
            debug!("Not queueing {}: depth {} exceeds {}", key, link.depth, session.max_depth);
            return false;
        }
        if !is_documentation_link(link) {
            debug!("Not queueing {}: not documentation", key);
            return false;
        }
        if !session.follow_external_links && !link.link_type.is_same_site() {
            debug!("Not queueing {}: {} link", key, link.link_type);
            return false;
        }
        if let Err(e) = self.url_policy.validate(&link.url) {
            debug!("Not queueing {}: {}", key, e);
            return false;
        }
        true
    }

    /// The session delay, raised to the host's robots.txt crawl-delay
    fn effective_delay(&self, session: &CrawlSession, robots: &RobotsCache, url: &Url) -> Duration {
        if !session.respect_robots_txt {
            return session.delay;
        }
        robots
            .crawl_delay(url)
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64)
            .map_or(session.delay, |robots_delay| robots_delay.max(session.delay))
    }

    fn stop_requested(&self) -> bool {
        *self.stop.borrow()
    }

    fn update_status<F>(&self, f: F)
    where
        F: FnOnce(&mut CrawlStatus),
    {
        f(&mut self.write_status());
    }

    fn lock_enrichment(&self) -> std::sync::MutexGuard<'_, Vec<PersistOutcome>> {
        self.enrichment
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_status(&self) -> RwLockReadGuard<'_, CrawlStatus> {
        self.status
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_status(&self) -> RwLockWriteGuard<'_, CrawlStatus> {
        self.status
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn transition(status: &mut CrawlStatus, next: CrawlState) -> crate::Result<()> {
    if !status.state.can_transition_to(next) {
        return Err(DocShopError::InvalidTransition {
            from: status.state,
            to: next,
        });
    }
    debug!("Crawl state {} -> {}", status.state, next);
    status.state = next;
    Ok(())
}

/// Sleeps for `delay`, returning early once a stop is requested
async fn pause(delay: Duration, stop: &mut watch::Receiver<bool>) {
    if delay.is_zero() {
        return;
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => {}
        _ = stop.wait_for(|stopped| *stopped) => {}
    }
}
