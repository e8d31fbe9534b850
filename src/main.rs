//! DocShop main entry point
//!
//! This is the command-line interface for the DocShop crawler and graph
//! ingestion pipeline.

use anyhow::Context;
use clap::{Parser, Subcommand};
use docshop::config::{load_config_with_hash, Config};
use docshop::crawler::CrawlEngine;
use docshop::graph::{open_store, EnrichmentSummary, GraphGateway, GraphStore};
use docshop::ingest::{DuplicatePolicy, IngestError};
use docshop::output::{generate_markdown_summary, print_statistics};
use docshop::retry::RetryPolicy;
use docshop::Chunk;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Characters of chunk content shown per result line
const PREVIEW_CHARS: usize = 100;

/// DocShop: documentation crawler and graph ingestion pipeline
///
/// Crawls documentation sites breadth-first, imports pages and local files
/// as documents split into chunks, and stores them in a graph.
#[derive(Parser, Debug)]
#[command(name = "docshop")]
#[command(version)]
#[command(about = "Documentation crawler and graph ingestion pipeline", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Deep crawl a documentation site starting at URL
    Crawl {
        url: String,

        /// Override the configured maximum depth for this crawl
        #[arg(long)]
        max_depth: Option<u32>,
    },

    /// Import a local file
    Ingest {
        path: PathBuf,

        /// Import again even if this file was imported before
        #[arg(long)]
        reimport: bool,
    },

    /// List chunks carrying TAG
    Tag { tag: String },

    /// Full-text search over chunk content
    Search { query: String },

    /// List chunks linked from a chunk
    Related { chunk_id: Uuid },

    /// List chunks satisfying a requirement
    Satisfies { requirement_id: Uuid },

    /// Validate the configuration and print it without doing anything
    DryRun,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    match cli.command {
        Command::DryRun => {
            handle_dry_run(&config, &config_hash);
            Ok(ExitCode::SUCCESS)
        }
        Command::Crawl { url, max_depth } => handle_crawl(&config, &url, max_depth).await,
        Command::Ingest { path, reimport } => handle_ingest(&config, &path, reimport).await,
        Command::Tag { tag } => {
            let gateway = open_gateway(&config).await?;
            let chunks = gateway.chunks_by_tag(&tag).await?;
            print_chunks(&format!("Chunks tagged \"{}\"", tag), &chunks);
            Ok(ExitCode::SUCCESS)
        }
        Command::Search { query } => {
            let gateway = open_gateway(&config).await?;
            let chunks = gateway.search_chunks(&query).await?;
            print_chunks(&format!("Chunks matching \"{}\"", query), &chunks);
            Ok(ExitCode::SUCCESS)
        }
        Command::Related { chunk_id } => {
            let gateway = open_gateway(&config).await?;
            let chunks = gateway.linked_chunks(chunk_id).await?;
            print_chunks(&format!("Chunks linked from {}", chunk_id), &chunks);
            Ok(ExitCode::SUCCESS)
        }
        Command::Satisfies { requirement_id } => {
            let gateway = open_gateway(&config).await?;
            let chunks = gateway.chunks_satisfying(requirement_id).await?;
            print_chunks(&format!("Chunks satisfying {}", requirement_id), &chunks);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("docshop=info,warn"),
            1 => EnvFilter::new("docshop=debug,info"),
            2 => EnvFilter::new("docshop=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Opens and initializes the configured graph store
async fn open_initialized_store(config: &Config) -> anyhow::Result<Arc<dyn GraphStore>> {
    let store = open_store(&config.graph)?;
    store
        .initialize()
        .await
        .with_context(|| format!("Failed to initialize {} graph store", store.backend_name()))?;
    Ok(store)
}

/// Read-only access to the graph, without HTTP client or AI backend
///
/// # Arguments
///
/// * `config` - Loaded configuration; only `[graph]` and `[retry]` are used
///
/// # Returns
///
/// A gateway over the initialized store
async fn open_gateway(config: &Config) -> anyhow::Result<GraphGateway> {
    let store = open_initialized_store(config).await?;
    Ok(GraphGateway::new(
        store,
        None,
        RetryPolicy::from_config(&config.retry),
    ))
}

/// Opens the graph store and wires the full crawl engine on top
async fn open_engine(config: &Config) -> anyhow::Result<CrawlEngine> {
    let store = open_initialized_store(config).await?;
    Ok(CrawlEngine::from_config(config, store)?)
}

fn handle_dry_run(config: &Config, config_hash: &str) {
    println!("=== DocShop Dry Run ===\n");
    println!("Config hash: {}\n", config_hash);

    println!("Crawler Configuration:");
    println!("  Deep crawling enabled: {}", config.crawler.enable_deep_crawling);
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Max pages per domain: {}", config.crawler.max_pages_per_domain);
    println!("  Crawl delay: {}s", config.crawler.crawl_delay_secs);
    println!("  Follow external links: {}", config.crawler.follow_external_links);
    println!("  Respect robots.txt: {}", config.crawler.respect_robots_txt);
    println!("  Fetch timeout: {}s", config.crawler.fetch_timeout_secs);
    println!(
        "  Relevance filter: more than {} links, priority >= {}",
        config.crawler.relevance_link_threshold, config.crawler.relevance_min_priority
    );

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nSecurity:");
    println!("  Block private hosts: {}", config.security.block_private_hosts);
    println!("  Max URL length: {}", config.security.max_url_length);
    println!("  Blocked domains ({}):", config.security.blocked_domains.len());
    for domain in &config.security.blocked_domains {
        println!("    - {}", domain);
    }

    println!("\nChunking:");
    println!("  Max chunk chars: {}", config.chunking.max_chunk_chars);

    println!("\nGraph Store:");
    println!("  Backend: {:?}", config.graph.backend);
    println!("  URL: {}", config.graph.url);
    println!("  Database: {}", config.graph.database);
    println!("  SQLite path: {}", config.graph.sqlite_path);

    println!("\nAI:");
    println!("  Provider: {:?}", config.ai.provider);
    println!("  Base URL: {}", config.ai.base_url);
    println!("  Generation model: {}", config.ai.generation_model);
    println!("  Embedding model: {}", config.ai.embedding_model);

    println!("\nRetry:");
    println!("  Max attempts: {}", config.retry.max_attempts);
    println!(
        "  Backoff: {}ms doubling up to {}ms",
        config.retry.base_delay_ms, config.retry.max_delay_ms
    );

    if let Some(summary) = &config.output.summary_path {
        println!("\nOutput:");
        println!("  Summary: {}", summary);
    }

    println!("\n✓ Configuration is valid");
}

async fn handle_crawl(config: &Config, url: &str, max_depth: Option<u32>) -> anyhow::Result<ExitCode> {
    let engine = Arc::new(open_engine(config).await?);

    let interrupted = Arc::clone(&engine);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping after the current page");
            interrupted.stop();
        }
    });

    let Some(report) = engine.start(url, max_depth).await? else {
        println!("Deep crawling is disabled in the configuration; nothing to do");
        return Ok(ExitCode::SUCCESS);
    };

    print_statistics(&report);

    let pending = engine.pending_enrichment();
    if pending > 0 {
        println!("Waiting for chunk enrichment of {} pages...", pending);
        report_enrichment(&engine.wait_for_enrichment().await);
    }

    if let Some(summary_path) = &config.output.summary_path {
        generate_markdown_summary(&report, Path::new(summary_path))?;
        println!("\n✓ Summary exported to: {}", summary_path);
    }

    Ok(ExitCode::SUCCESS)
}

async fn handle_ingest(config: &Config, path: &Path, reimport: bool) -> anyhow::Result<ExitCode> {
    let engine = open_engine(config).await?;
    let policy = if reimport {
        DuplicatePolicy::Allow
    } else {
        DuplicatePolicy::Reject
    };

    match engine.ingestor().ingest_file(path, policy).await {
        Ok(outcome) => {
            println!(
                "✓ Imported {} as document {} (\"{}\", {} chunks)",
                outcome.document.source,
                outcome.document.id,
                outcome.document.title,
                outcome.chunk_count
            );
            report_enrichment(&outcome.persisted.wait_for_enrichment().await);
            Ok(ExitCode::SUCCESS)
        }
        Err(IngestError::Duplicate {
            location,
            existing_id,
        }) => {
            eprintln!(
                "{} was already imported as document {}; run again with --reimport to import it anyway",
                location, existing_id
            );
            Ok(ExitCode::from(2))
        }
        Err(e) => Err(e.into()),
    }
}

fn report_enrichment(enrichment: &EnrichmentSummary) {
    if enrichment.enriched + enrichment.failed > 0 {
        println!(
            "  Enriched {} chunks ({} failed)",
            enrichment.enriched, enrichment.failed
        );
    }
}

fn print_chunks(heading: &str, chunks: &[Chunk]) {
    println!("{} ({}):", heading, chunks.len());
    for chunk in chunks {
        let preview: String = chunk
            .content()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .chars()
            .take(PREVIEW_CHARS)
            .collect();
        println!(
            "  {} [document {} #{}] {}",
            chunk.id, chunk.document_id, chunk.position, preview
        );
        if !chunk.tags.is_empty() {
            println!("      tags: {}", chunk.tags.join(", "));
        }
    }
}
