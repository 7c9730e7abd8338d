//! Transport stage: TCP connect and TLS handshake with stage timeouts.
//!
//! The connection established here is probe-only and dropped immediately; the
//! HTTP stage opens its own connection through reqwest. Splitting the stages
//! keeps the classification unambiguous: a refused socket is CONNECTION_ERROR
//! even when a later HTTP attempt would report something vaguer.

use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

use super::StageFailure;
use crate::config::{TCP_CONNECT_TIMEOUT_SECS, TLS_HANDSHAKE_TIMEOUT_SECS};
use crate::status::WebsiteStatus;

/// Probes TCP reachability and, for https targets, completes a TLS handshake
/// against `host` with certificate verification.
///
/// `addrs` must come from the DNS stage so no second resolution happens here.
/// Every resolved address is attempted in order before the stage fails; a
/// host whose first record is stale but whose second answers is reachable,
/// same as a resolver-backed connect would see it.
pub async fn probe(
    host: &str,
    addrs: &[IpAddr],
    port: u16,
    secure: bool,
) -> Result<(), StageFailure> {
    let stream = connect_any(addrs, port).await?;

    if !secure {
        return Ok(());
    }

    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    let server_name = server_name_for(host)?;

    let connector = TlsConnector::from(Arc::new(config));
    let tls_stream = match tokio::time::timeout(
        Duration::from_secs(TLS_HANDSHAKE_TIMEOUT_SECS),
        connector.connect(server_name, stream),
    )
    .await
    {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            return Err(StageFailure::new(
                WebsiteStatus::SslError,
                format!("TLS handshake with {host} failed: {e}"),
            ))
        }
        Err(_) => {
            return Err(StageFailure::new(
                WebsiteStatus::Timeout,
                format!("TLS handshake with {host} timed out after {TLS_HANDSHAKE_TIMEOUT_SECS}s"),
            ))
        }
    };

    // rustls already rejected untrusted chains and hostname mismatches; the
    // explicit validity check catches certificates that expired but still
    // chain to a trusted root on lenient stacks.
    if let Some(certs) = tls_stream.get_ref().1.peer_certificates() {
        if let Some(cert_der) = certs.first() {
            if let Ok((_, cert)) = x509_parser::parse_x509_certificate(cert_der.as_ref()) {
                if !cert.validity().is_valid() {
                    return Err(StageFailure::new(
                        WebsiteStatus::SslError,
                        format!(
                            "certificate for {host} outside its validity period (not_after {})",
                            cert.validity().not_after
                        ),
                    ));
                }
            }
        }
    }

    Ok(())
}

/// Connects to the first address that answers, in resolution order.
///
/// Returns the last failure when every address is dead, so the reason names a
/// concrete address and error rather than a generic message.
async fn connect_any(addrs: &[IpAddr], port: u16) -> Result<TcpStream, StageFailure> {
    let mut last = StageFailure::new(
        WebsiteStatus::ConnectionError,
        "no addresses to connect to",
    );
    for ip in addrs {
        let addr = SocketAddr::new(*ip, port);
        match tokio::time::timeout(
            Duration::from_secs(TCP_CONNECT_TIMEOUT_SECS),
            TcpStream::connect(addr),
        )
        .await
        {
            Ok(Ok(stream)) => return Ok(stream),
            Ok(Err(e)) => {
                log::debug!("TCP connect to {addr} failed: {e}");
                last = StageFailure::new(
                    WebsiteStatus::ConnectionError,
                    format!("TCP connect to {addr} failed: {}", describe_io_error(&e)),
                );
            }
            Err(_) => {
                log::debug!("TCP connect to {addr} timed out");
                last = StageFailure::new(
                    WebsiteStatus::Timeout,
                    format!("TCP connect to {addr} timed out after {TCP_CONNECT_TIMEOUT_SECS}s"),
                );
            }
        }
    }
    Err(last)
}

/// Builds the TLS server name for SNI and certificate verification.
///
/// URL hosts arrive in display form, so IPv6 literals carry brackets; those
/// (and IPv4 literals) become `ServerName::IpAddress` rather than a DNS name.
fn server_name_for(host: &str) -> Result<ServerName<'static>, StageFailure> {
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = bare.parse::<IpAddr>() {
        return Ok(ServerName::IpAddress(ip.into()));
    }
    ServerName::try_from(host.to_string()).map_err(|e| {
        StageFailure::new(
            WebsiteStatus::SslError,
            format!("invalid TLS server name {host}: {e}"),
        )
    })
}

/// Maps an I/O error to a short classification string for reason text.
fn describe_io_error(e: &std::io::Error) -> String {
    match e.kind() {
        ErrorKind::ConnectionRefused => format!("connection refused ({e})"),
        ErrorKind::ConnectionReset => format!("connection reset ({e})"),
        ErrorKind::TimedOut => format!("timed out ({e})"),
        _ => e.to_string(),
    }
}
