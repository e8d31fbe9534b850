//! Markdown summary generation
//!
//! Renders a [`CrawlReport`] as a human-readable markdown file: session
//! metadata, per-depth and per-reason breakdowns, link classification counts,
//! and the failed pages.

use super::report::{CrawlReport, OutputResult};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Most rows listed per page table
const MAX_LISTED: usize = 50;

/// Writes the markdown summary of `report` to `output_path`
pub fn generate_markdown_summary(report: &CrawlReport, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(report);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a crawl report as markdown
pub fn format_markdown_summary(report: &CrawlReport) -> String {
    let mut md = String::new();

    md.push_str("# DocShop Crawl Summary\n\n");

    md.push_str("## Session\n\n");
    md.push_str(&format!("- **Root URL**: {}\n", report.root_url));
    md.push_str(&format!("- **Started**: {}\n", report.started_at.to_rfc3339()));
    if let Some(finished) = &report.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished.to_rfc3339()));
    }
    if let Some(duration) = report.duration_seconds() {
        md.push_str(&format!("- **Duration**: {} seconds\n", duration));
    }
    md.push_str(&format!("- **State**: {}\n", report.state));
    if !report.message.is_empty() {
        md.push_str(&format!("- **Message**: {}\n", report.message));
    }
    md.push('\n');

    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Pages Imported**: {}\n", report.visited.len()));
    md.push_str(&format!("- **Pages Skipped**: {}\n", report.skipped.len()));
    md.push_str(&format!("- **Pages Failed**: {}\n", report.failed.len()));
    md.push_str(&format!(
        "- **Chunks Created**: {}\n",
        report.visited.iter().map(|p| p.chunk_count).sum::<usize>()
    ));
    md.push_str(&format!("- **Links Discovered**: {}\n", report.links.total()));
    md.push_str(&format!("- **Success Rate**: {:.2}%\n\n", report.success_rate()));

    let depths = report.depth_breakdown();
    if !depths.is_empty() {
        md.push_str("## Depth Breakdown\n\n");
        md.push_str("| Depth | Pages |\n");
        md.push_str("|-------|-------|\n");
        for (depth, count) in depths {
            md.push_str(&format!("| {} | {} |\n", depth, count));
        }
        md.push('\n');
    }

    md.push_str("## Links by Classification\n\n");
    md.push_str("| Type | Count |\n");
    md.push_str("|------|-------|\n");
    md.push_str(&format!("| internal | {} |\n", report.links.internal));
    md.push_str(&format!("| subdomain | {} |\n", report.links.subdomain));
    md.push_str(&format!("| external | {} |\n", report.links.external));
    md.push_str(&format!("| unknown | {} |\n\n", report.links.unknown));

    if !report.domains.is_empty() {
        md.push_str("## Pages by Domain\n\n");
        md.push_str("| Domain | Pages |\n");
        md.push_str("|--------|-------|\n");
        for (domain, pages) in report.domains.iter().take(MAX_LISTED) {
            md.push_str(&format!("| {} | {} |\n", escape_cell(domain), pages));
        }
        md.push('\n');
    }

    let skips = report.skip_counts();
    if !skips.is_empty() {
        md.push_str("## Skipped Pages\n\n");
        md.push_str("| Reason | Count |\n");
        md.push_str("|--------|-------|\n");
        for (reason, count) in skips {
            md.push_str(&format!("| {} | {} |\n", reason, count));
        }
        md.push('\n');
    }

    if !report.visited.is_empty() {
        md.push_str("## Imported Pages\n\n");
        md.push_str("| Depth | URL | Title | Chunks |\n");
        md.push_str("|-------|-----|-------|--------|\n");
        for page in report.visited.iter().take(MAX_LISTED) {
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                page.depth,
                page.url,
                escape_cell(&page.title),
                page.chunk_count
            ));
        }
        push_overflow(&mut md, report.visited.len());
    }

    if !report.failed.is_empty() {
        md.push_str("## Failed Pages\n\n");
        md.push_str("| URL | Error |\n");
        md.push_str("|-----|-------|\n");
        for page in report.failed.iter().take(MAX_LISTED) {
            md.push_str(&format!("| {} | {} |\n", page.url, escape_cell(&page.message)));
        }
        push_overflow(&mut md, report.failed.len());
    }

    md
}

fn push_overflow(md: &mut String, total: usize) {
    if total > MAX_LISTED {
        md.push_str(&format!("\n... and {} more\n\n", total - MAX_LISTED));
    } else {
        md.push('\n');
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
