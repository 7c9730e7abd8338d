//! Pipeline tests that drive the DNS stage through a stubbed resolver:
//! parked-nameserver precedence over a live HTTP server, and stable
//! classification of hosts that never resolve.

use std::net::IpAddr;
use std::sync::Arc;

use futures::future::BoxFuture;
use httptest::{matchers::*, responders::*, Expectation, Server};

use website_status::checker::dns::DnsLookup;
use website_status::checker::{self, CheckerContext};
use website_status::{Config, WebsiteStatus};

/// Resolver returning canned answers regardless of the queried name.
struct StaticDns {
    addrs: Result<Vec<IpAddr>, String>,
    ns: Vec<String>,
}

impl DnsLookup for StaticDns {
    fn resolve<'a>(&'a self, _host: &'a str) -> BoxFuture<'a, Result<Vec<IpAddr>, String>> {
        let out = self.addrs.clone();
        Box::pin(async move { out })
    }

    fn nameservers<'a>(&'a self, _domain: &'a str) -> BoxFuture<'a, Vec<String>> {
        let out = self.ns.clone();
        Box::pin(async move { out })
    }
}

fn context_with_dns(dns: StaticDns) -> CheckerContext {
    website_status::init_crypto_provider();
    let mut ctx = CheckerContext::new(&Config::default()).expect("context should build");
    ctx.resolver = Arc::new(dns);
    ctx
}

#[tokio::test]
async fn parked_nameservers_preempt_a_live_http_server() {
    // The server would answer 200, but a parked-registrar NS answer must
    // settle the check before any HTTP request is made.
    let server = Server::run();
    server.expect(
        Expectation::matching(any())
            .times(0)
            .respond_with(status_code(200)),
    );
    let port = server.addr().port();

    let ctx = context_with_dns(StaticDns {
        addrs: Ok(vec!["127.0.0.1".parse().unwrap()]),
        ns: vec![
            "ns1.sedoparking.com.".to_string(),
            "ns2.sedoparking.com.".to_string(),
        ],
    });

    let result = checker::check_url(&ctx, &format!("http://parked-shop.example:{port}/")).await;

    assert_eq!(result.status, WebsiteStatus::DeadDomain);
    assert!(result.reason.contains("sedoparking.com"), "{}", result.reason);
    // Dropping the server verifies the zero-request expectation.
}

#[tokio::test]
async fn unresolvable_host_is_no_dns_every_time() {
    let ctx = context_with_dns(StaticDns {
        addrs: Err("no records found for gone-for-good.example".to_string()),
        ns: Vec::new(),
    });

    let first = checker::check_url(&ctx, "https://gone-for-good.example").await;
    let second = checker::check_url(&ctx, "https://gone-for-good.example").await;

    assert_eq!(first.status, WebsiteStatus::NoDns);
    assert_eq!(second.status, WebsiteStatus::NoDns);
    assert_eq!(first.reason, second.reason);
    assert!(first.reason.contains("gone-for-good.example"), "{}", first.reason);
}

#[tokio::test]
async fn clean_nameservers_continue_to_http() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("HEAD", "/"))
            .respond_with(status_code(200)),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/"))
            .respond_with(status_code(200).body("<html>an ordinary business site</html>")),
    );
    let addr = server.addr();

    // reqwest resolves the URL host itself, so the stubbed domain must stay
    // out of the HTTP stage; an IP-literal URL keeps this test offline while
    // the domain case is covered by the parked-NS test above.
    let ctx = context_with_dns(StaticDns {
        addrs: Ok(vec![addr.ip()]),
        ns: vec!["ns1.examplehost.net.".to_string()],
    });

    let result = checker::check_url(&ctx, &format!("http://{addr}/")).await;
    assert_eq!(result.status, WebsiteStatus::Ok);
}
