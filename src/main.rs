//! Command-line interface for the crawler.

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use webcrawler::{CrawlOptions, Crawler, PageResult};

/// A polite, concurrent, single-host web crawler.
///
/// Starting from the seed URL, discovers every reachable page on the same
/// host and prints the links found on each page. External links are
/// reported but never followed.
#[derive(Parser, Debug)]
#[command(name = "webcrawler")]
#[command(version)]
#[command(about = "Crawl all same-host pages reachable from a seed URL", long_about = None)]
struct Cli {
    /// Seed URL to start crawling from
    #[arg(value_name = "URL")]
    url: String,

    /// Number of concurrent workers
    #[arg(long, default_value_t = 10)]
    workers: usize,

    /// Requests per second
    #[arg(long, default_value_t = 5.0)]
    rate: f64,

    /// Maximum URLs to crawl (0 = unlimited)
    #[arg(long = "max-urls", default_value_t = 0)]
    max_urls: i64,

    /// User agent string (also the robots.txt group key)
    #[arg(long)]
    user_agent: Option<String>,

    /// Use a Redis-backed frontier for distributed crawling
    #[arg(long)]
    redis: bool,

    /// Redis server address
    #[arg(long, default_value = "localhost:6379")]
    redis_addr: String,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let mut opts = CrawlOptions {
        workers: cli.workers,
        rate_limit: cli.rate,
        max_urls: cli.max_urls,
        use_redis: cli.redis,
        redis_addr: cli.redis_addr.clone(),
        ..Default::default()
    };
    if let Some(user_agent) = cli.user_agent {
        opts.user_agent = user_agent;
    }

    let crawler = match Crawler::new(&cli.url, opts.clone()).await {
        Ok(crawler) => Arc::new(crawler),
        Err(e) => {
            tracing::error!("Failed to create crawler: {}", e);
            return Err(e.into());
        }
    };

    // Ctrl-C cancels the crawl; workers stop promptly and the result
    // stream closes once they have all halted.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nShutting down...");
                cancel.cancel();
            }
        });
    }

    println!("Starting crawl of {}", crawler.seed());
    println!(
        "Workers: {}, Rate: {:.1} req/s, Max URLs: {}",
        opts.workers, opts.rate_limit, opts.max_urls
    );
    println!("---");

    let mut results = Arc::clone(&crawler).run(cancel);
    while let Some(result) = results.recv().await {
        print_result(&result);
    }

    println!("---");
    println!(
        "Crawl complete. Total URLs crawled: {}",
        crawler.crawled_count()
    );

    Ok(())
}

/// Sets up the tracing subscriber based on verbosity level.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("webcrawler=info,warn"),
            1 => EnvFilter::new("webcrawler=debug,info"),
            2 => EnvFilter::new("webcrawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_result(result: &PageResult) {
    println!("URL: {}", result.url);

    match &result.error {
        Some(error) => println!("Error: {}", error),
        None => {
            if !result.same_host.is_empty() || !result.external.is_empty() {
                println!("Found URLs:");
                for link in &result.same_host {
                    println!("  - {}", link);
                }
                for link in &result.external {
                    println!("  - {} (external)", link);
                }
            }
        }
    }

    println!("---");
}
