//! Configuration types, defaults, and signature lists.

use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

// Stage timeouts. The per-check deadline in `Config` bounds the whole pipeline
// on top of these.
/// DNS query timeout in seconds.
pub const DNS_TIMEOUT_SECS: u64 = 10;
/// TCP connection timeout in seconds.
pub const TCP_CONNECT_TIMEOUT_SECS: u64 = 5;
/// TLS handshake timeout in seconds.
pub const TLS_HANDSHAKE_TIMEOUT_SECS: u64 = 5;

/// Upper bound on how much of a response body is scanned for signatures.
pub const BODY_SCAN_LIMIT: usize = 64 * 1024;

/// Bodies shorter than this are treated as likely placeholders: a single
/// under-construction marker is enough to classify them.
pub const SHORT_BODY_THRESHOLD: usize = 2000;

/// Delay before the single retry granted to transient failures.
pub const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Interval between progress log lines during a run.
pub const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Default User-Agent header. Generic Chrome-like string; some parking hosts
/// serve different content to obvious bots.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Logging level for the application.
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Library configuration (no CLI dependencies).
///
/// Can be constructed programmatically; the binary fills it from clap args.
#[derive(Debug, Clone)]
pub struct Config {
    /// Input file with one business record per line (JSON Lines). `None` means
    /// no ingest (resume or export-only runs).
    pub input: Option<PathBuf>,

    /// SQLite ledger path.
    pub db_path: PathBuf,

    /// Directory for exported CSV/JSON/summary files.
    pub output_dir: PathBuf,

    /// Base filename (stem) for exported files.
    pub output_name: String,

    /// Maximum simultaneous in-flight checks. Must be > 0.
    pub max_concurrency: usize,

    /// Per-check hard deadline in seconds, independent of stage timeouts.
    pub timeout_seconds: u64,

    /// Maximum redirect hops before the exchange is treated as a failure.
    pub max_redirects: usize,

    /// Scan response bodies for parking/under-construction signatures.
    pub check_content: bool,

    /// HTTP User-Agent header value.
    pub user_agent: String,

    /// Skip ingest and only check entries still pending in the ledger.
    pub resume: bool,

    /// Read-only run: export what the ledger holds, perform no checks.
    pub export_only: bool,

    /// Minimum rating for a record to qualify as a lead.
    pub min_rating: f64,

    /// Minimum review count for a record to qualify as a lead.
    pub min_reviews: i64,

    /// Only keep leads with a phone number.
    pub require_phone: bool,

    /// Parking/under-construction signature lists.
    pub signatures: SignatureConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            input: None,
            db_path: PathBuf::from("./website_status.db"),
            output_dir: PathBuf::from("./output"),
            output_name: "dead_websites".to_string(),
            max_concurrency: 100,
            timeout_seconds: 10,
            max_redirects: 5,
            check_content: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            resume: false,
            export_only: false,
            min_rating: 0.0,
            min_reviews: 0,
            require_phone: false,
            signatures: SignatureConfig::default(),
        }
    }
}

impl Config {
    /// Per-check hard deadline as a `Duration`.
    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Data-driven signature lists consumed by the content and DNS heuristics.
///
/// Shipped with defaults matching known registrar parking services; any list
/// can be replaced wholesale by loading a JSON file with the same shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureConfig {
    /// Domains that host parking/for-sale pages. A final URL landing on one of
    /// these (or a subdomain) marks the original site as parked.
    pub parking_domains: Vec<String>,
    /// Phrases in page content that indicate a parking/for-sale page.
    pub parking_keywords: Vec<String>,
    /// Phrases in page content that indicate an under-construction placeholder.
    pub construction_markers: Vec<String>,
    /// Nameserver suffixes operated by parking registrars. A domain whose NS
    /// records land here is treated as expired regardless of HTTP behavior.
    pub parked_ns_suffixes: Vec<String>,
    /// Platform/social domains that are never a business's own website; a
    /// record URL pointing here is treated as having no website.
    pub skip_domains: Vec<String>,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        SignatureConfig {
            parking_domains: vec![
                "sedoparking.com".into(),
                "sedo.com".into(),
                "hugedomains.com".into(),
                "parkingcrew.net".into(),
                "bodis.com".into(),
                "above.com".into(),
                "undeveloped.com".into(),
                "dan.com".into(),
                "afternic.com".into(),
                "domainmarket.com".into(),
                "parked.com".into(),
                "parkeddomain.com".into(),
            ],
            parking_keywords: vec![
                "domain is for sale".into(),
                "this domain is for sale".into(),
                "buy this domain".into(),
                "domain name for sale".into(),
                "domain may be for sale".into(),
                "this webpage is parked".into(),
                "domain has expired".into(),
                "domain expired".into(),
                "renewal grace period".into(),
                "the domain has expired".into(),
                "expired domain".into(),
                "parked free".into(),
                "parked domain".into(),
            ],
            construction_markers: vec![
                "under construction".into(),
                "coming soon".into(),
                "website coming soon".into(),
                "launching soon".into(),
                "we're working on it".into(),
            ],
            parked_ns_suffixes: vec![
                "sedoparking.com".into(),
                "parkingcrew.net".into(),
                "bodis.com".into(),
                "above.com".into(),
                "afternic.com".into(),
                "hugedomains.com".into(),
                "dan.com".into(),
            ],
            skip_domains: vec![
                "google.com".into(),
                "facebook.com".into(),
                "fb.com".into(),
                "instagram.com".into(),
                "twitter.com".into(),
                "x.com".into(),
                "youtube.com".into(),
                "tiktok.com".into(),
                "line.me".into(),
                "linkedin.com".into(),
                "booking.com".into(),
                "agoda.com".into(),
                "airbnb.com".into(),
                "tripadvisor.com".into(),
            ],
        }
    }
}

impl SignatureConfig {
    /// Loads signature lists from a JSON file. Missing fields fall back to the
    /// built-in defaults.
    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.max_concurrency, 100);
        assert_eq!(config.timeout_seconds, 10);
        assert_eq!(config.max_redirects, 5);
        assert!(config.check_content);
        assert!(!config.resume);
        assert!(!config.export_only);
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(
            log::LevelFilter::from(LogLevel::Error),
            log::LevelFilter::Error
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Debug),
            log::LevelFilter::Debug
        );
    }

    #[test]
    fn test_signature_defaults_nonempty() {
        let sig = SignatureConfig::default();
        assert!(!sig.parking_domains.is_empty());
        assert!(!sig.parking_keywords.is_empty());
        assert!(!sig.construction_markers.is_empty());
        assert!(!sig.parked_ns_suffixes.is_empty());
    }

    #[test]
    fn test_signature_config_partial_json() {
        // A file overriding only one list keeps defaults for the rest.
        let json = r#"{"parking_domains": ["example-parking.test"]}"#;
        let sig: SignatureConfig = serde_json::from_str(json).unwrap();
        assert_eq!(sig.parking_domains, vec!["example-parking.test"]);
        assert!(!sig.parking_keywords.is_empty());
    }
}
