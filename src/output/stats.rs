//! Console statistics for a finished crawl

use super::report::CrawlReport;

/// Prints the report to stdout in a formatted manner
pub fn print_statistics(report: &CrawlReport) {
    println!("=== Crawl Statistics ===\n");

    println!("Session:");
    println!("  Root URL: {}", report.root_url);
    println!("  State: {}", report.state);
    if !report.message.is_empty() {
        println!("  Message: {}", report.message);
    }
    if let Some(duration) = report.duration_seconds() {
        println!("  Duration: {}s", duration);
    }
    println!();

    println!("Pages:");
    println!("  Imported: {}", report.visited.len());
    println!("  Skipped: {}", report.skipped.len());
    println!("  Failed: {}", report.failed.len());
    println!();

    let skips = report.skip_counts();
    if !skips.is_empty() {
        println!("Skipped by Reason:");
        for (reason, count) in skips {
            println!("  {}: {}", reason, count);
        }
        println!();
    }

    println!("Links Discovered ({}):", report.links.total());
    println!("  internal: {}", report.links.internal);
    println!("  subdomain: {}", report.links.subdomain);
    println!("  external: {}", report.links.external);
    println!("  unknown: {}", report.links.unknown);
    println!();

    if report.domains.len() > 1 {
        println!("Pages by Domain:");
        for (domain, pages) in &report.domains {
            println!("  {}: {}", domain, pages);
        }
        println!();
    }

    if !report.failed.is_empty() {
        println!("Failures:");
        for page in &report.failed {
            println!("  - {} ({})", page.url, page.message);
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} fetched pages imported)",
        report.success_rate(),
        report.visited.len(),
        report.visited.len() + report.failed.len()
    );
}
