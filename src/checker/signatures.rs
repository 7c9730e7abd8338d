//! Signature matching for parking pages, parked nameservers, and
//! under-construction placeholders.
//!
//! All matching is data-driven from [`SignatureConfig`] so the lists can
//! evolve without touching the pipeline.

use crate::config::{SignatureConfig, SHORT_BODY_THRESHOLD};

/// Compiled, lowercased signature lists.
#[derive(Debug)]
pub struct Signatures {
    parking_domains: Vec<String>,
    parking_keywords: Vec<String>,
    construction_markers: Vec<String>,
    parked_ns_suffixes: Vec<String>,
    skip_domains: Vec<String>,
}

impl Signatures {
    pub fn new(config: &SignatureConfig) -> Self {
        let lower = |list: &[String]| -> Vec<String> {
            list.iter().map(|s| s.trim().to_lowercase()).collect()
        };
        Signatures {
            parking_domains: lower(&config.parking_domains),
            parking_keywords: lower(&config.parking_keywords),
            construction_markers: lower(&config.construction_markers),
            parked_ns_suffixes: lower(&config.parked_ns_suffixes),
            skip_domains: lower(&config.skip_domains),
        }
    }

    /// Returns the matched parking domain if `host` is a known parking host
    /// or one of its subdomains.
    pub fn parking_domain_match(&self, host: &str) -> Option<&str> {
        let host = host.to_lowercase();
        self.parking_domains
            .iter()
            .find(|d| domain_matches(&host, d))
            .map(|d| d.as_str())
    }

    /// Returns the matched registrar suffix if any nameserver belongs to a
    /// parking service. NS names come with a trailing dot from DNS.
    pub fn parked_ns_match<'a>(&'a self, nameservers: &[String]) -> Option<(&'a str, String)> {
        for ns in nameservers {
            let ns_host = ns.trim_end_matches('.').to_lowercase();
            if let Some(suffix) = self
                .parked_ns_suffixes
                .iter()
                .find(|s| domain_matches(&ns_host, s))
            {
                return Some((suffix.as_str(), ns_host));
            }
        }
        None
    }

    /// Returns the matched phrase if page content looks like a parking /
    /// for-sale page.
    pub fn parking_content_match(&self, body: &str) -> Option<&str> {
        if body.is_empty() {
            return None;
        }
        let body = body.to_lowercase();
        self.parking_keywords
            .iter()
            .find(|k| body.contains(k.as_str()))
            .map(|k| k.as_str())
    }

    /// Whether page content looks like an under-construction placeholder.
    ///
    /// A short body (likely a bare placeholder) needs a single marker; a
    /// full-sized page must contain at least two distinct markers before it
    /// is written off.
    pub fn is_under_construction(&self, body: &str) -> bool {
        if body.is_empty() {
            return false;
        }
        let lower = body.to_lowercase();
        let matches = self
            .construction_markers
            .iter()
            .filter(|m| lower.contains(m.as_str()))
            .count();
        if body.len() < SHORT_BODY_THRESHOLD {
            matches >= 1
        } else {
            matches >= 2
        }
    }

    /// Whether `host` is a platform/social domain rather than a business's
    /// own site (used at ingest, never inside the pipeline).
    pub fn is_skip_domain(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        self.skip_domains.iter().any(|d| domain_matches(&host, d))
    }
}

/// Suffix match on domain labels: `host` matches `domain` when equal or a
/// subdomain of it. Avoids the substring false positives of a plain
/// `contains` ("notsedo.com" must not match "sedo.com").
fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{domain}"))
}
