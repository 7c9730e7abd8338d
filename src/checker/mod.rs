//! The per-URL diagnostic pipeline.
//!
//! Stages run in strict order (normalize, DNS, connect/TLS, HTTP exchange,
//! content signatures) and the first decisive failure terminates the check
//! with that stage's status. Earlier stages are cheaper and strictly more
//! informative than later ones, so they preempt: a parked-registrar NS result
//! wins over whatever the HTTP server would have said.

pub mod dns;
pub mod http;
pub mod signatures;
pub mod transport;

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::ClientBuilder;
use url::{Host, Url};

use crate::config::{Config, RETRY_DELAY};
use crate::status::{CheckResult, WebsiteStatus};
use dns::{DnsLookup, HickoryDns};
use signatures::Signatures;

/// A stage's terminal verdict: the status to emit and the concrete detail.
#[derive(Debug)]
pub struct StageFailure {
    pub status: WebsiteStatus,
    pub reason: String,
}

impl StageFailure {
    pub fn new(status: WebsiteStatus, reason: impl Into<String>) -> Self {
        StageFailure {
            status,
            reason: reason.into(),
        }
    }
}

/// Shared, read-only resources threaded through every check.
///
/// No ambient singletons: the run loop builds one context and clones the Arc
/// into each task.
pub struct CheckerContext {
    pub client: reqwest::Client,
    pub resolver: Arc<dyn DnsLookup>,
    pub signatures: Arc<Signatures>,
    pub check_content: bool,
}

impl CheckerContext {
    /// Builds the HTTP client, DNS resolver, and compiled signatures from
    /// configuration. Fails only on client construction, which is fatal at
    /// startup anyway.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = init_client(
            &config.user_agent,
            config.timeout_seconds,
            config.max_redirects,
        )?;
        Ok(CheckerContext {
            client,
            resolver: Arc::new(HickoryDns::new()),
            signatures: Arc::new(Signatures::new(&config.signatures)),
            check_content: config.check_content,
        })
    }
}

/// Initializes the HTTP client: bounded redirects, request timeout, rustls.
pub fn init_client(
    user_agent: &str,
    timeout_seconds: u64,
    max_redirects: usize,
) -> Result<reqwest::Client, reqwest::Error> {
    ClientBuilder::new()
        .timeout(Duration::from_secs(timeout_seconds))
        .user_agent(user_agent.to_string())
        .redirect(reqwest::redirect::Policy::limited(max_redirects))
        .use_rustls_tls()
        .build()
}

/// Result for a record with no website URL. No network I/O is involved.
pub fn no_website_result() -> CheckResult {
    CheckResult::new(WebsiteStatus::NoWebsite, "no website URL on record")
}

/// Normalizes a raw URL: trims, defaults to https:// when the scheme is
/// missing, strips the trailing slash, and validates scheme and host.
pub fn normalize_url(raw: &str) -> Result<Url, String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err("empty URL".to_string());
    }

    let candidate = if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        format!("https://{trimmed}")
    } else {
        trimmed.to_string()
    };

    let url = Url::parse(&candidate).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme: {other}")),
    }
    if url.host().is_none() {
        return Err("URL has no host".to_string());
    }
    Ok(url)
}

/// Runs the full diagnostic pipeline on one URL, including the single retry
/// granted to transient outcomes.
///
/// Always returns a `CheckResult`; every failure mode maps into the taxonomy.
pub async fn check_url(ctx: &CheckerContext, raw_url: &str) -> CheckResult {
    let started = Instant::now();

    let mut retried = false;
    let mut result = loop {
        let result = run_pipeline(ctx, raw_url).await;
        if result.status.is_transient() && !retried {
            retried = true;
            log::debug!(
                "transient {} for {raw_url}, retrying once: {}",
                result.status,
                result.reason
            );
            tokio::time::sleep(RETRY_DELAY).await;
            continue;
        }
        break result;
    };

    result.response_time_ms = started.elapsed().as_secs_f64() * 1000.0;
    result.checked_at = Utc::now();
    result
}

async fn run_pipeline(ctx: &CheckerContext, raw_url: &str) -> CheckResult {
    // Stage 1: normalize.
    if raw_url.trim().is_empty() {
        return no_website_result();
    }
    let url = match normalize_url(raw_url) {
        Ok(url) => url,
        Err(e) => {
            return CheckResult::new(
                WebsiteStatus::ConnectionError,
                format!("invalid URL: {e}"),
            )
        }
    };
    let Some(host) = url.host().map(|h| h.to_owned()) else {
        return CheckResult::new(WebsiteStatus::ConnectionError, "invalid URL: URL has no host");
    };
    let host_str = host.to_string();

    // Stage 2: DNS. IP-literal hosts have nothing to resolve.
    let addrs: Vec<IpAddr> = match &host {
        Host::Domain(domain) => {
            let addrs = match ctx.resolver.resolve(domain).await {
                Ok(addrs) => addrs,
                Err(e) => {
                    return CheckResult::new(
                        WebsiteStatus::NoDns,
                        format!("DNS resolution failed: {e}"),
                    )
                }
            };

            let nameservers = ctx.resolver.nameservers(domain).await;
            if let Some((suffix, ns_host)) = ctx.signatures.parked_ns_match(&nameservers) {
                return CheckResult::new(
                    WebsiteStatus::DeadDomain,
                    format!("nameserver {ns_host} belongs to parking registrar {suffix}"),
                );
            }

            addrs
        }
        Host::Ipv4(ip) => vec![IpAddr::V4(*ip)],
        Host::Ipv6(ip) => vec![IpAddr::V6(*ip)],
    };

    // Stage 3: connect + TLS.
    let secure = url.scheme() == "https";
    let port = url.port_or_known_default().unwrap_or(443);
    if let Err(failure) = transport::probe(&host_str, &addrs, port, secure).await {
        return CheckResult::new(failure.status, failure.reason);
    }

    // Stage 4: HTTP exchange and content signatures.
    let outcome = match http::exchange(&ctx.client, &url, ctx.check_content).await {
        Ok(outcome) => outcome,
        Err(failure) => return CheckResult::new(failure.status, failure.reason),
    };

    let mut result = classify_response(ctx, &outcome);
    result.status_code = Some(outcome.status_code);
    result.final_url = Some(outcome.final_url.to_string());
    result
}

fn classify_response(ctx: &CheckerContext, outcome: &http::HttpOutcome) -> CheckResult {
    let code = outcome.status_code;

    if let Some(final_host) = outcome.final_url.host_str() {
        if let Some(domain) = ctx.signatures.parking_domain_match(final_host) {
            return CheckResult::new(
                WebsiteStatus::RedirectParking,
                format!("redirected to parking domain: {domain}"),
            );
        }
    }

    if (500..600).contains(&code) {
        return CheckResult::new(
            WebsiteStatus::HttpError5xx,
            format!("server error: HTTP {code}"),
        );
    }
    if (400..500).contains(&code) {
        return CheckResult::new(
            WebsiteStatus::HttpError4xx,
            format!("client error: HTTP {code}"),
        );
    }

    if let Some(body) = &outcome.body {
        if let Some(keyword) = ctx.signatures.parking_content_match(body) {
            return CheckResult::new(
                WebsiteStatus::RedirectParking,
                format!("page content matches parking signature: \"{keyword}\""),
            );
        }
        if ctx.signatures.is_under_construction(body) {
            return CheckResult::new(
                WebsiteStatus::UnderConstruction,
                "page content matches under-construction signature",
            );
        }
    }

    CheckResult::new(
        WebsiteStatus::Ok,
        format!("website is accessible (HTTP {code})"),
    )
}
