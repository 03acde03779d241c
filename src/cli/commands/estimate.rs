//! Estimate Command
//!
//! Crawls a repository (no LLM calls) and prints projected token usage per
//! pipeline phase plus a cost comparison across candidate models, cheapest
//! first.

use console::style;
use tokio::runtime::Runtime;

use crate::config::ConfigLoader;
use crate::cost::{compare_costs, estimate_tokens};
use crate::crawler::GithubCrawler;
use crate::types::Result;

pub fn run(
    repo_url: &str,
    branch: Option<&str>,
    chapter_count: usize,
    providers: &[String],
    token: Option<&str>,
) -> Result<()> {
    let mut config = ConfigLoader::load()?;
    if let Some(token) = token {
        config.crawl.token = Some(token.to_string());
    }

    let crawler = GithubCrawler::new(&config.crawl)?;
    let rt = Runtime::new()?;
    let crawl = rt.block_on(crawler.crawl(repo_url, branch))?;

    println!(
        "Crawled {} files ({} excluded, {} skipped)\n",
        crawl.files.len(),
        crawl.stats.excluded_count,
        crawl.stats.skipped_count
    );

    let breakdown = estimate_tokens(&crawl.files, chapter_count);

    println!("{}", style("Projected tokens per phase").bold());
    for phase in &breakdown.phases {
        println!(
            "  {:<24} {:>10} in  {:>8} out",
            phase.phase, phase.input_tokens, phase.output_tokens
        );
    }
    println!(
        "  {:<24} {:>10} in  {:>8} out\n",
        style("total").bold(),
        breakdown.total_input_tokens,
        breakdown.total_output_tokens
    );

    let provider_refs: Vec<&str> = providers.iter().map(String::as_str).collect();
    let costs = compare_costs(&crawl.files, chapter_count, &provider_refs);

    println!("{}", style("Estimated cost per model (±20%)").bold());
    for row in &costs {
        println!(
            "  {:<10} {:<16} ${:>8.4}  (${:.4} – ${:.4})",
            row.provider, row.model, row.cost.estimated, row.cost.low, row.cost.high
        );
    }

    if let Some(cheapest) = costs.first() {
        println!(
            "\n{} {}/{}",
            style("Recommended:").green().bold(),
            cheapest.provider,
            cheapest.model
        );
    }

    Ok(())
}
