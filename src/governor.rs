//! Concurrency governor: bounded parallel dispatch of pending checks.
//!
//! Admission follows a sliding-window pattern: a semaphore caps how many
//! checks run at once, every dispatched check runs under a hard deadline, and
//! each finished result is persisted and streamed out immediately rather than
//! collected at the end. Cancellation stops admission; checks already in
//! flight run to completion so their rows still land in DONE.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::checker::{self, CheckerContext};
use crate::config::PROGRESS_LOG_INTERVAL;
use crate::ledger::{CheckTarget, Ledger, LedgerError};
use crate::status::{CheckResult, WebsiteStatus};

/// What the governor did with the target list.
#[derive(Debug, Default)]
pub struct GovernorReport {
    /// Checks that ran and were persisted (including no-website fast paths).
    pub completed: u64,
    /// Targets whose row could not be claimed (already claimed or done).
    pub skipped: u64,
    /// Targets never admitted because of cancellation.
    pub abandoned: u64,
}

/// Runs every target through the pipeline with at most `limit` in flight.
///
/// The target sequence is consumed lazily, one admission at a time, so a
/// large pending set never has to sit in memory beyond what the caller
/// already holds. Each finished `(place_id, result)` pair is written to the
/// ledger first and then sent on `tx`, so a consumer crash never loses a
/// persisted result.
pub async fn run_checks(
    ledger: Ledger,
    targets: impl IntoIterator<Item = CheckTarget>,
    ctx: Arc<CheckerContext>,
    limit: usize,
    check_timeout: Duration,
    cancel: CancellationToken,
    tx: mpsc::Sender<(String, CheckResult)>,
) -> Result<GovernorReport, LedgerError> {
    let semaphore = Arc::new(Semaphore::new(limit));
    let mut in_flight = FuturesUnordered::new();
    let mut report = GovernorReport::default();

    let completed_counter = Arc::new(AtomicU64::new(0));
    let progress = spawn_progress_logger(Arc::clone(&completed_counter), cancel.clone());

    let mut targets = targets.into_iter();
    for target in targets.by_ref() {
        if cancel.is_cancelled() {
            report.abandoned += 1;
            break;
        }

        // Records with no URL are classified without consuming a permit or
        // touching the network.
        let url = match &target.url {
            Some(url) if !url.trim().is_empty() => url.clone(),
            _ => {
                if ledger.mark_in_progress(&target.place_id).await? {
                    let result = checker::no_website_result();
                    ledger.mark_done(&target.place_id, &result).await?;
                    let _ = tx.send((target.place_id, result)).await;
                    report.completed += 1;
                    completed_counter.fetch_add(1, Ordering::Relaxed);
                } else {
                    report.skipped += 1;
                }
                continue;
            }
        };

        let permit = tokio::select! {
            _ = cancel.cancelled() => {
                report.abandoned += 1;
                break;
            }
            permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break, // semaphore closed, nothing left to admit
            },
        };

        if !ledger.mark_in_progress(&target.place_id).await? {
            report.skipped += 1;
            continue;
        }

        let ctx = Arc::clone(&ctx);
        let task_ledger = ledger.clone();
        let task_tx = tx.clone();
        let task_counter = Arc::clone(&completed_counter);
        in_flight.push(tokio::spawn(async move {
            let _permit = permit;

            let outcome = tokio::time::timeout(
                check_timeout,
                std::panic::AssertUnwindSafe(checker::check_url(&ctx, &url)).catch_unwind(),
            )
            .await;
            let result = match outcome {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => CheckResult::new(
                    WebsiteStatus::ConnectionError,
                    "check task panicked",
                ),
                Err(_) => CheckResult::new(
                    WebsiteStatus::Timeout,
                    format!(
                        "check exceeded the {}s deadline",
                        check_timeout.as_secs()
                    ),
                ),
            };

            task_ledger.mark_done(&target.place_id, &result).await?;
            task_counter.fetch_add(1, Ordering::Relaxed);
            let _ = task_tx.send((target.place_id, result)).await;
            Ok::<(), LedgerError>(())
        }));
    }
    report.abandoned += targets.count() as u64;

    while let Some(joined) = in_flight.next().await {
        match joined {
            Ok(Ok(())) => report.completed += 1,
            Ok(Err(e)) => {
                // Result lost before persistence; the row stays IN_PROGRESS
                // and is recovered on the next run.
                log::error!("failed to persist check result: {e}");
            }
            Err(e) => log::error!("check task failed to join: {e}"),
        }
    }

    progress.abort();
    log::info!(
        "check run finished: {} completed, {} skipped, {} abandoned",
        report.completed,
        report.skipped,
        report.abandoned
    );
    Ok(report)
}

fn spawn_progress_logger(
    completed: Arc<AtomicU64>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(PROGRESS_LOG_INTERVAL);
        tick.tick().await; // interval fires immediately; skip the zero tick
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {
                    let done = completed.load(Ordering::Relaxed);
                    log::info!("progress: {done} checks complete");
                }
            }
        }
    })
}
