use std::path::PathBuf;

use clap::Parser;

use website_status::{run, Config, LogLevel, SignatureConfig};

/// Checks business websites, classifies dead ones, and exports sales leads.
#[derive(Parser, Debug)]
#[command(name = "website_status", version, about)]
struct Cli {
    /// Input file with one business record per line (JSON Lines)
    input: Option<PathBuf>,

    /// Check a single URL, print the classification, and exit
    #[arg(long, value_name = "URL")]
    check_url: Option<String>,

    /// Skip ingest; only check entries still pending in the ledger
    #[arg(long)]
    resume: bool,

    /// Perform no checks; export what the ledger already holds
    #[arg(long)]
    export_only: bool,

    /// Maximum simultaneous in-flight checks
    #[arg(short, long, default_value_t = 100)]
    concurrency: usize,

    /// Per-check hard deadline in seconds
    #[arg(short, long, default_value_t = 10)]
    timeout: u64,

    /// Path to the SQLite work ledger
    #[arg(long, default_value = "./website_status.db")]
    db_path: PathBuf,

    /// Directory for exported CSV/JSON/summary files
    #[arg(short, long, default_value = "./output")]
    output: PathBuf,

    /// Base filename for exported files
    #[arg(long, default_value = "dead_websites")]
    output_name: String,

    /// Minimum rating for a business to qualify as a lead
    #[arg(long)]
    min_rating: Option<f64>,

    /// Minimum review count for a business to qualify as a lead
    #[arg(long)]
    min_reviews: Option<i64>,

    /// Only keep leads with a phone number
    #[arg(long)]
    require_phone: bool,

    /// Shorthand for --min-rating 3.5 --min-reviews 5 --require-phone
    #[arg(long)]
    quality_filter: bool,

    /// JSON file overriding the built-in parking/construction signature lists
    #[arg(long, value_name = "FILE")]
    signatures: Option<PathBuf>,

    /// Maximum redirect hops before a check fails
    #[arg(long, default_value_t = 5)]
    max_redirects: usize,

    /// Skip body downloads and content signature matching
    #[arg(long)]
    no_content_check: bool,

    /// HTTP User-Agent header value
    #[arg(long)]
    user_agent: Option<String>,

    /// Logging verbosity
    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(log::LevelFilter::from(cli.log_level.clone()))
        .format_timestamp_millis()
        .init();

    website_status::init_crypto_provider();

    if let Err(e) = run_cli(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run_cli(cli: Cli) -> anyhow::Result<()> {
    let signatures = match &cli.signatures {
        Some(path) => SignatureConfig::from_file(path)?,
        None => SignatureConfig::default(),
    };

    let (min_rating, min_reviews, require_phone) = if cli.quality_filter {
        (
            cli.min_rating.unwrap_or(3.5),
            cli.min_reviews.unwrap_or(5),
            true,
        )
    } else {
        (
            cli.min_rating.unwrap_or(0.0),
            cli.min_reviews.unwrap_or(0),
            cli.require_phone,
        )
    };

    let config = Config {
        input: cli.input,
        db_path: cli.db_path,
        output_dir: cli.output.clone(),
        output_name: cli.output_name,
        max_concurrency: cli.concurrency,
        timeout_seconds: cli.timeout,
        max_redirects: cli.max_redirects,
        check_content: !cli.no_content_check,
        user_agent: cli
            .user_agent
            .unwrap_or_else(|| Config::default().user_agent),
        resume: cli.resume,
        export_only: cli.export_only,
        min_rating,
        min_reviews,
        require_phone,
        signatures,
    };

    if let Some(url) = &cli.check_url {
        let result = website_status::check_single_url(url, &config).await?;
        println!("URL:           {url}");
        println!("Status:        {}", result.status);
        if let Some(code) = result.status_code {
            println!("HTTP status:   {code}");
        }
        if let Some(final_url) = &result.final_url {
            println!("Final URL:     {final_url}");
        }
        println!("Reason:        {}", result.reason);
        println!("Response time: {:.0} ms", result.response_time_ms);
        println!("Dead website:  {}", if result.is_dead() { "yes" } else { "no" });
        return Ok(());
    }

    let report = run(config).await?;
    println!(
        "Checked {} of {} businesses in {:.1}s; {} leads written to {}",
        report.checked,
        report.total_records,
        report.elapsed_seconds,
        report.leads,
        cli.output.display()
    );
    Ok(())
}
