mod backends;
mod config;
mod gemini;
mod keywords;
mod model;
mod parse;
mod pipeline;
mod query;
mod report;
mod scoring;
mod sources;

pub const USER_AGENT: &str = concat!("litscout/", env!("CARGO_PKG_VERSION"));

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use reqwest::Client;
use tracing::{error, info};

use config::Config;
use pipeline::{Pipeline, ResearchRequest};
use report::ReportOptions;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_REDIRECTS: usize = 5;

/// Search PubMed, Google Scholar and Gemini for EGFR-inhibitor
/// nephrotoxicity literature and print an evidence report.
#[derive(Parser, Debug)]
#[command(name = "litscout", version, about)]
struct Cli {
    /// Research question in plain language
    question: String,

    /// Comma-separated keywords (skips keyword extraction)
    #[arg(long)]
    keywords: Option<String>,

    /// Comma-separated sources, e.g. "PubMed,Google Scholar" (skips recommendation)
    #[arg(long)]
    sources: Option<String>,

    /// Maximum records requested from each source
    #[arg(long, default_value_t = 50)]
    limit: usize,

    /// Language tag recorded in the report
    #[arg(long, default_value = "en")]
    lang: String,

    /// Drop papers scoring below this relevance (0.0-1.0)
    #[arg(long, default_value_t = 0.0, value_parser = parse_relevance)]
    min_relevance: f32,

    /// Maximum papers listed in the report
    #[arg(long, default_value_t = 50)]
    max_papers: usize,

    /// Merge papers sharing a DOI or title across sources
    #[arg(long)]
    dedup: bool,

    /// Print the report as JSON instead of Markdown
    #[arg(long)]
    json: bool,
}

fn parse_relevance(raw: &str) -> Result<f32, String> {
    let value: f32 = raw
        .trim()
        .parse()
        .map_err(|e| format!("not a number: {e}"))?;
    if !(0.0..=1.0).contains(&value) {
        return Err(format!("{value} is outside 0.0-1.0"));
    }
    Ok(value)
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("litscout=info".parse()?),
        )
        .init();

    let http = Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(HTTP_TIMEOUT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()?;

    let options = ReportOptions {
        min_relevance: cli.min_relevance,
        max_papers: cli.max_papers,
        dedup: cli.dedup,
    };
    let pipeline = Pipeline::from_config(&Config::from_env(), http, options);

    info!(question = %cli.question, "starting literature search");
    let request = ResearchRequest {
        question: &cli.question,
        keywords: cli.keywords.as_deref(),
        sources: cli.sources.as_deref(),
        language: &cli.lang,
        limit: cli.limit,
    };

    let report = match pipeline.run(&request).await {
        Ok(report) => report,
        Err(e) => {
            error!("invalid query: {e}");
            eprintln!("error: {e}");
            return Ok(ExitCode::FAILURE);
        }
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report::format_report(&report));
    }
    Ok(ExitCode::SUCCESS)
}
