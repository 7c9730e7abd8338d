//! Website status taxonomy and check results.
//!
//! Every check resolves to exactly one [`WebsiteStatus`]; there is no separate
//! "crashed" outcome. Unanticipated failures are mapped to `ConnectionError`
//! by the pipeline and the governor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Outcome of checking one website.
///
/// The string forms (used in the database and exports) are stable; `Display`
/// and `FromStr` round-trip through them.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
pub enum WebsiteStatus {
    /// Responds with a healthy page.
    #[strum(serialize = "OK")]
    #[serde(rename = "OK")]
    Ok,
    /// Name resolution fails (NXDOMAIN or no records).
    #[strum(serialize = "NO_DNS")]
    #[serde(rename = "NO_DNS")]
    NoDns,
    /// Resolves, but the authoritative nameservers belong to a parking registrar.
    #[strum(serialize = "DEAD_DOMAIN")]
    #[serde(rename = "DEAD_DOMAIN")]
    DeadDomain,
    /// TLS handshake fails or the certificate is invalid/expired.
    #[strum(serialize = "SSL_ERROR")]
    #[serde(rename = "SSL_ERROR")]
    SslError,
    /// No response within the configured deadline at connect or read stage.
    #[strum(serialize = "TIMEOUT")]
    #[serde(rename = "TIMEOUT")]
    Timeout,
    /// TCP connect refused/reset/unreachable, or any failure with no better home.
    #[strum(serialize = "CONNECTION_ERROR")]
    #[serde(rename = "CONNECTION_ERROR")]
    ConnectionError,
    /// Final HTTP response status in [400, 500).
    #[strum(serialize = "HTTP_ERROR_4XX")]
    #[serde(rename = "HTTP_ERROR_4XX")]
    HttpError4xx,
    /// Final HTTP response status in [500, 600).
    #[strum(serialize = "HTTP_ERROR_5XX")]
    #[serde(rename = "HTTP_ERROR_5XX")]
    HttpError5xx,
    /// Final location or page content matches a parking/for-sale signature.
    #[strum(serialize = "REDIRECT_PARKING")]
    #[serde(rename = "REDIRECT_PARKING")]
    RedirectParking,
    /// 2xx response whose content matches an under-construction signature.
    #[strum(serialize = "UNDER_CONSTRUCTION")]
    #[serde(rename = "UNDER_CONSTRUCTION")]
    UnderConstruction,
    /// The record never had a website URL; no network I/O was performed.
    #[strum(serialize = "NO_WEBSITE")]
    #[serde(rename = "NO_WEBSITE")]
    NoWebsite,
}

impl WebsiteStatus {
    /// Whether this status marks the record as a sales lead.
    ///
    /// A business whose site is broken in any classified way is a lead; a
    /// healthy site or a record with no site at all is not.
    pub fn is_lead(self) -> bool {
        match self {
            WebsiteStatus::Ok | WebsiteStatus::NoWebsite => false,
            WebsiteStatus::NoDns
            | WebsiteStatus::DeadDomain
            | WebsiteStatus::SslError
            | WebsiteStatus::Timeout
            | WebsiteStatus::ConnectionError
            | WebsiteStatus::HttpError4xx
            | WebsiteStatus::HttpError5xx
            | WebsiteStatus::RedirectParking
            | WebsiteStatus::UnderConstruction => true,
        }
    }

    /// Whether a check that produced this status may be retried once.
    ///
    /// Only transient transport-level outcomes qualify; definitive results
    /// (DNS, TLS, HTTP status, signature matches) are never retried.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            WebsiteStatus::Timeout | WebsiteStatus::ConnectionError
        )
    }
}

/// The outcome of running the diagnostic pipeline on one target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    /// Terminal classification.
    pub status: WebsiteStatus,
    /// Final HTTP status code, when the exchange got that far.
    pub status_code: Option<u16>,
    /// Diagnostic detail; never empty, even for `Ok`.
    pub reason: String,
    /// Wall-clock duration of the whole pipeline run, in milliseconds.
    pub response_time_ms: f64,
    /// URL after following redirects, when the exchange got that far.
    pub final_url: Option<String>,
    /// Completion timestamp.
    pub checked_at: DateTime<Utc>,
}

impl CheckResult {
    /// Builds a result with no HTTP detail (pre-HTTP stage failures).
    pub fn new(status: WebsiteStatus, reason: impl Into<String>) -> Self {
        CheckResult {
            status,
            status_code: None,
            reason: reason.into(),
            response_time_ms: 0.0,
            final_url: None,
            checked_at: Utc::now(),
        }
    }

    /// Whether the checked website counts as dead (a potential lead).
    pub fn is_dead(&self) -> bool {
        self.status.is_lead()
    }
}
