//! website_status library: finds business websites that are dead or broken,
//! classifies why, and exports the affected businesses as sales leads.
//!
//! # Example
//!
//! ```no_run
//! use website_status::{run, Config};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config {
//!     input: Some(std::path::PathBuf::from("businesses.jsonl")),
//!     max_concurrency: 50,
//!     ..Default::default()
//! };
//!
//! let report = run(config).await?;
//! println!(
//!     "Checked {} of {} businesses, {} leads",
//!     report.checked, report.total_records, report.leads
//! );
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your
//! application or call library functions from an async context.

pub mod checker;
pub mod config;
pub mod export;
pub mod filter;
pub mod governor;
pub mod ledger;
pub mod models;
pub mod status;

// Re-export public API
pub use checker::CheckerContext;
pub use config::{Config, LogLevel, SignatureConfig};
pub use export::Exporter;
pub use filter::{FilterCriteria, LeadFilter};
pub use ledger::{CheckState, CheckTarget, Ledger, LedgerError, LedgerStats};
pub use models::{Business, Lead};
pub use run::{run, RunReport};
pub use status::{CheckResult, WebsiteStatus};

/// Installs the process-wide rustls crypto provider.
///
/// Idempotent; a second call is a no-op. Must happen before the first TLS
/// handshake.
pub fn init_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

/// Checks a single URL without touching any ledger.
///
/// Ad-hoc entry point for the `--check-url` mode; builds a throwaway context
/// and applies the same per-check deadline as a full run.
pub async fn check_single_url(url: &str, config: &Config) -> anyhow::Result<CheckResult> {
    let ctx = CheckerContext::new(config)?;
    let result = match tokio::time::timeout(
        config.check_timeout(),
        checker::check_url(&ctx, url),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => CheckResult::new(
            WebsiteStatus::Timeout,
            format!("check exceeded the {}s deadline", config.timeout_seconds),
        ),
    };
    Ok(result)
}

// Internal run module (contains the main work-loop logic)
mod run {
    use std::path::PathBuf;
    use std::sync::Arc;

    use anyhow::{bail, Context, Result};
    use log::{info, warn};
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use crate::checker::{self, CheckerContext};
    use crate::config::Config;
    use crate::export::Exporter;
    use crate::filter::{FilterCriteria, LeadFilter};
    use crate::governor;
    use crate::ledger::Ledger;
    use crate::models::Business;

    /// Results of a completed run.
    #[derive(Debug, Clone)]
    pub struct RunReport {
        /// Rows in the ledger after ingest.
        pub total_records: u64,
        /// Checks completed during this run.
        pub checked: u64,
        /// Leads exported.
        pub leads: u64,
        /// Path to the SQLite ledger holding all results.
        pub db_path: PathBuf,
        /// Elapsed time in seconds.
        pub elapsed_seconds: f64,
    }

    /// Runs the full check pipeline with the provided configuration.
    ///
    /// Ingests records from the input file (unless resuming), checks every
    /// pending website concurrently, then filters and exports the leads.
    /// Interruption (ctrl-c) stops admission of new checks; whatever already
    /// finished is persisted, and the next `resume: true` run picks up the
    /// rest.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the input file or
    /// ledger cannot be opened, or an export file cannot be written.
    pub async fn run(config: Config) -> Result<RunReport> {
        if config.max_concurrency == 0 {
            bail!("max_concurrency must be greater than zero");
        }

        let start_time = std::time::Instant::now();
        let ledger = Ledger::open(&config.db_path)
            .await
            .context("failed to open work ledger")?;

        let recovered = ledger
            .recover_interrupted()
            .await
            .context("failed to recover interrupted rows")?;
        if recovered > 0 {
            info!("recovered {recovered} interrupted checks from a previous run");
        }

        let ctx = Arc::new(CheckerContext::new(&config)?);

        if let Some(input) = &config.input {
            if config.resume || config.export_only {
                info!("skipping ingest of {} in resume/export-only mode", input.display());
            } else {
                let (new, updated) = ingest_file(&ledger, input, &ctx).await?;
                info!("ingested {new} new and {updated} existing records");
            }
        }

        let mut checked = 0u64;
        if !config.export_only {
            let targets = ledger
                .fetch_pending()
                .await
                .context("failed to fetch pending work")?;
            info!("{} businesses pending check", targets.len());

            let cancel = CancellationToken::new();
            let signal_cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, stopping admission of new checks");
                    signal_cancel.cancel();
                }
            });

            let (tx, mut rx) = mpsc::channel::<(String, crate::status::CheckResult)>(100);
            let consumer = tokio::spawn(async move {
                while let Some((place_id, result)) = rx.recv().await {
                    info!(
                        "checked {place_id}: {} ({})",
                        result.status, result.reason
                    );
                }
            });

            let report = governor::run_checks(
                ledger.clone(),
                targets,
                Arc::clone(&ctx),
                config.max_concurrency,
                config.check_timeout(),
                cancel.clone(),
                tx,
            )
            .await
            .context("check run failed")?;
            checked = report.completed;
            let _ = consumer.await;
        }

        let records = ledger
            .load_all()
            .await
            .context("failed to load records for export")?;
        let criteria = FilterCriteria {
            min_rating: (config.min_rating > 0.0).then_some(config.min_rating),
            min_reviews: (config.min_reviews > 0).then_some(config.min_reviews),
            require_phone: config.require_phone,
        };
        let (leads, filter_stats) = LeadFilter::new(criteria).filter_leads(&records);

        let stats = ledger
            .statistics()
            .await
            .context("failed to compute ledger statistics")?;

        let exporter = Exporter::new(&config.output_dir)?;
        exporter.export_leads_csv(&leads, &config.output_name)?;
        exporter.export_leads_json(&leads, &config.output_name)?;
        let summary = exporter.export_summary(&stats, &filter_stats, &config.output_name)?;
        info!("\n{summary}");

        Ok(RunReport {
            total_records: stats.total,
            checked,
            leads: leads.len() as u64,
            db_path: config.db_path.clone(),
            elapsed_seconds: start_time.elapsed().as_secs_f64(),
        })
    }

    /// Reads a JSON Lines file of business records into the ledger.
    ///
    /// Blank lines and `#` comments are skipped; unparseable lines are logged
    /// and skipped rather than failing the run. Website URLs pointing at
    /// platform/social domains are nulled out so those records classify as
    /// NO_WEBSITE without network I/O.
    async fn ingest_file(
        ledger: &Ledger,
        path: &std::path::Path,
        ctx: &CheckerContext,
    ) -> Result<(u64, u64)> {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("failed to open input file {}", path.display()))?;
        let mut lines = BufReader::new(file).lines();

        let mut new = 0u64;
        let mut updated = 0u64;
        let mut line_no = 0u64;
        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let mut business: Business = match serde_json::from_str(trimmed) {
                Ok(business) => business,
                Err(e) => {
                    warn!("skipping malformed record on line {line_no}: {e}");
                    continue;
                }
            };

            if let Some(website) = &business.website {
                if let Ok(url) = checker::normalize_url(website) {
                    if let Some(host) = url.host_str() {
                        if ctx.signatures.is_skip_domain(host) {
                            log::debug!(
                                "treating {} as no-website (platform URL {website})",
                                business.place_id
                            );
                            business.website = None;
                        }
                    }
                }
            }

            if ledger.upsert_business(&business).await? {
                new += 1;
            } else {
                updated += 1;
            }
        }
        Ok((new, updated))
    }
}
