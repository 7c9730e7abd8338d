//! Governor behavior: the concurrency bound, the no-website fast path,
//! incremental result delivery, and cancellation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use website_status::checker::CheckerContext;
use website_status::{governor, Business, Config, Ledger, WebsiteStatus};

/// Minimal HTTP server that tracks how many connections are open at once.
///
/// Probe connections (opened and closed without sending data) are counted
/// too, which is fine: they run under the same permit as the request that
/// follows them.
async fn start_counting_server() -> (u16, Arc<AtomicUsize>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let active = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));
    let max_out = Arc::clone(&max_seen);

    tokio::spawn(async move {
        loop {
            let Ok((mut sock, _)) = listener.accept().await else {
                break;
            };
            let active = Arc::clone(&active);
            let max_seen = Arc::clone(&max_seen);
            tokio::spawn(async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);

                let mut buf = [0u8; 1024];
                let n = sock.read(&mut buf).await.unwrap_or(0);
                if n > 0 {
                    // Hold the request open long enough for overlap to show.
                    tokio::time::sleep(Duration::from_millis(150)).await;
                    let _ = sock
                        .write_all(
                            b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                        )
                        .await;
                }
                active.fetch_sub(1, Ordering::SeqCst);
            });
        }
    });

    (port, max_out)
}

fn business(id: usize, website: Option<String>) -> Business {
    Business {
        place_id: format!("p{id}"),
        name: format!("Business {id}"),
        address: String::new(),
        phone: String::new(),
        website,
        rating: 4.0,
        review_count: 10,
        category: "shop".into(),
    }
}

fn context() -> Arc<CheckerContext> {
    website_status::init_crypto_provider();
    let mut config = Config::default();
    config.check_content = false; // HEAD only, one request per check
    Arc::new(CheckerContext::new(&config).expect("context should build"))
}

#[tokio::test]
async fn concurrency_stays_within_bound_and_results_stream() {
    let (port, max_seen) = start_counting_server().await;
    let ledger = Ledger::open_in_memory().await.unwrap();

    let total = 12;
    for i in 0..total {
        let url = format!("http://127.0.0.1:{port}/");
        ledger.upsert_business(&business(i, Some(url))).await.unwrap();
    }
    let targets = ledger.fetch_pending().await.unwrap();

    let (tx, mut rx) = mpsc::channel(16);
    let consumer = tokio::spawn(async move {
        let mut results = Vec::new();
        while let Some(item) = rx.recv().await {
            results.push(item);
        }
        results
    });

    let limit = 3;
    let report = governor::run_checks(
        ledger.clone(),
        targets,
        context(),
        limit,
        Duration::from_secs(10),
        CancellationToken::new(),
        tx,
    )
    .await
    .unwrap();
    let results = consumer.await.unwrap();

    assert_eq!(report.completed, total as u64);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.abandoned, 0);
    assert_eq!(results.len(), total);
    assert!(results
        .iter()
        .all(|(_, r)| r.status == WebsiteStatus::Ok));

    let observed = max_seen.load(Ordering::SeqCst);
    assert!(observed <= limit, "saw {observed} concurrent connections");
    assert!(observed >= 2, "no overlap observed");

    // Everything persisted: nothing left to do.
    assert!(ledger.fetch_pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn no_website_targets_bypass_the_network() {
    let ledger = Ledger::open_in_memory().await.unwrap();
    ledger.upsert_business(&business(0, None)).await.unwrap();
    ledger
        .upsert_business(&business(1, Some("   ".into())))
        .await
        .unwrap();
    let targets = ledger.fetch_pending().await.unwrap();

    let (tx, mut rx) = mpsc::channel(16);
    let report = governor::run_checks(
        ledger.clone(),
        targets,
        context(),
        3,
        Duration::from_secs(10),
        CancellationToken::new(),
        tx,
    )
    .await
    .unwrap();

    assert_eq!(report.completed, 2);
    let mut statuses = Vec::new();
    while let Some((_, result)) = rx.recv().await {
        statuses.push(result.status);
    }
    assert_eq!(statuses, vec![WebsiteStatus::NoWebsite; 2]);
}

#[tokio::test]
async fn targets_are_pulled_on_demand() {
    let ledger = Ledger::open_in_memory().await.unwrap();
    let total = 5;
    for i in 0..total {
        ledger.upsert_business(&business(i, None)).await.unwrap();
    }
    let pending = ledger.fetch_pending().await.unwrap();

    let pulled = Arc::new(AtomicUsize::new(0));
    let pull_counter = Arc::clone(&pulled);
    let targets = pending.into_iter().inspect(move |_| {
        pull_counter.fetch_add(1, Ordering::SeqCst);
    });

    // Capacity-1 channel with a slow consumer: delivery back-pressures the
    // admission loop, so the sequence can only ever be pulled a step or two
    // ahead of the results already handed out. An up-front collect of all
    // five targets would trip the bound on the first receive.
    let (tx, mut rx) = mpsc::channel(1);
    let run = tokio::spawn(governor::run_checks(
        ledger.clone(),
        targets,
        context(),
        3,
        Duration::from_secs(10),
        CancellationToken::new(),
        tx,
    ));

    for received in 1..=total {
        rx.recv().await.expect("a result per target");
        let seen = pulled.load(Ordering::SeqCst);
        assert!(
            seen <= received + 2,
            "pulled {seen} targets after {received} results"
        );
    }

    let report = run.await.unwrap().unwrap();
    assert_eq!(report.completed, total as u64);
    assert_eq!(pulled.load(Ordering::SeqCst), total);
}

#[tokio::test]
async fn cancellation_stops_admission() {
    let ledger = Ledger::open_in_memory().await.unwrap();
    for i in 0..5 {
        ledger
            .upsert_business(&business(i, Some("http://127.0.0.1:1/".into())))
            .await
            .unwrap();
    }
    let targets = ledger.fetch_pending().await.unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();

    let (tx, _rx) = mpsc::channel(16);
    let report = governor::run_checks(
        ledger.clone(),
        targets,
        context(),
        3,
        Duration::from_secs(10),
        cancel,
        tx,
    )
    .await
    .unwrap();

    assert_eq!(report.completed, 0);
    assert_eq!(report.abandoned, 5);
    // Nothing was claimed; a resume run still sees all five.
    assert_eq!(ledger.fetch_pending().await.unwrap().len(), 5);
}

#[tokio::test]
async fn deadline_overruns_become_timeout() {
    // Server accepts and reads but never responds.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let Ok((mut sock, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                loop {
                    match sock.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {}
                    }
                }
            });
        }
    });

    let ledger = Ledger::open_in_memory().await.unwrap();
    ledger
        .upsert_business(&business(0, Some(format!("http://127.0.0.1:{port}/"))))
        .await
        .unwrap();
    let targets = ledger.fetch_pending().await.unwrap();

    let (tx, mut rx) = mpsc::channel(16);
    let report = governor::run_checks(
        ledger.clone(),
        targets,
        context(),
        1,
        Duration::from_secs(1),
        CancellationToken::new(),
        tx,
    )
    .await
    .unwrap();

    assert_eq!(report.completed, 1);
    let (_, result) = rx.recv().await.unwrap();
    assert_eq!(result.status, WebsiteStatus::Timeout);
}
