//! DNS stage: hostname resolution and nameserver inspection.
//!
//! The pipeline talks to DNS through the [`DnsLookup`] trait so the stage can
//! be driven by a stub in tests; [`HickoryDns`] is the production
//! implementation.

use std::net::IpAddr;
use std::time::Duration;

use futures::future::BoxFuture;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::proto::rr::{RData, RecordType};
use hickory_resolver::TokioAsyncResolver;

use crate::config::DNS_TIMEOUT_SECS;

/// Name resolution as the pipeline consumes it.
pub trait DnsLookup: Send + Sync {
    /// Resolves a hostname to its IP addresses.
    ///
    /// The error is the resolver's own text so the caller can build a
    /// concrete NO_DNS reason (NXDOMAIN, no records, server failure, ...).
    /// An `Ok` is never empty.
    fn resolve<'a>(&'a self, host: &'a str) -> BoxFuture<'a, Result<Vec<IpAddr>, String>>;

    /// Queries NS records for a domain.
    ///
    /// A failed NS query is not decisive on its own (the host already
    /// resolved), so errors collapse to an empty list and the
    /// parked-registrar heuristic simply doesn't fire.
    fn nameservers<'a>(&'a self, domain: &'a str) -> BoxFuture<'a, Vec<String>>;
}

/// Production resolver backed by hickory.
///
/// Uses the default resolver configuration with a bounded per-query timeout
/// and reduced retry attempts so unresponsive DNS servers fail fast. `ndots`
/// is pinned to 0 to prevent search-domain appending.
pub struct HickoryDns {
    resolver: TokioAsyncResolver,
}

impl HickoryDns {
    pub fn new() -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = Duration::from_secs(DNS_TIMEOUT_SECS);
        opts.attempts = 2;
        opts.ndots = 0;

        HickoryDns {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), opts),
        }
    }
}

impl Default for HickoryDns {
    fn default() -> Self {
        Self::new()
    }
}

impl DnsLookup for HickoryDns {
    fn resolve<'a>(&'a self, host: &'a str) -> BoxFuture<'a, Result<Vec<IpAddr>, String>> {
        Box::pin(async move {
            let lookup = self
                .resolver
                .lookup_ip(host)
                .await
                .map_err(|e| e.to_string())?;
            let addrs: Vec<IpAddr> = lookup.iter().collect();
            if addrs.is_empty() {
                return Err(format!("no address records for {host}"));
            }
            Ok(addrs)
        })
    }

    fn nameservers<'a>(&'a self, domain: &'a str) -> BoxFuture<'a, Vec<String>> {
        Box::pin(async move {
            match self.resolver.lookup(domain, RecordType::NS).await {
                Ok(lookup) => lookup
                    .iter()
                    .filter_map(|rdata| {
                        if let RData::NS(ns) = rdata {
                            Some(ns.0.to_utf8())
                        } else {
                            None
                        }
                    })
                    .collect(),
                Err(e) => {
                    log::debug!("NS lookup failed for {domain}: {e}");
                    Vec::new()
                }
            }
        })
    }
}
