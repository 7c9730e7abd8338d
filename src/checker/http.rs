//! HTTP stage: HEAD-then-GET exchange and reqwest error classification.

use reqwest::Client;
use url::Url;

use super::StageFailure;
use crate::config::BODY_SCAN_LIMIT;
use crate::status::WebsiteStatus;

/// What the HTTP exchange observed. Classification against signature lists
/// happens in the pipeline, not here.
#[derive(Debug)]
pub struct HttpOutcome {
    pub status_code: u16,
    pub final_url: Url,
    /// Bounded body prefix, present only when content checking issued a GET.
    pub body: Option<String>,
}

/// Runs the HTTP exchange: HEAD first (cheap), falling back to GET when the
/// HEAD status is an error (some servers reject HEAD outright), and issuing a
/// GET for the body when content checking needs one.
pub async fn exchange(
    client: &Client,
    url: &Url,
    check_content: bool,
) -> Result<HttpOutcome, StageFailure> {
    let head = client.head(url.clone()).send().await;

    let head_response = match head {
        Ok(resp) if resp.status().as_u16() < 400 => Some(resp),
        Ok(_) => None, // HEAD said error; re-check with GET before trusting it
        Err(e) => return Err(classify_request_error(&e)),
    };

    if let Some(resp) = head_response {
        let status_code = resp.status().as_u16();
        let final_url = resp.url().clone();
        if !(check_content && status_code < 300) {
            return Ok(HttpOutcome {
                status_code,
                final_url,
                body: None,
            });
        }
        // fall through to GET for the body
    }

    let resp = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| classify_request_error(&e))?;

    let status_code = resp.status().as_u16();
    let final_url = resp.url().clone();
    // A GET can also be the fallback for a failed HEAD; the body is only
    // downloaded when content checking is on.
    let body = if check_content {
        Some(read_body_prefix(resp).await)
    } else {
        None
    };

    Ok(HttpOutcome {
        status_code,
        final_url,
        body,
    })
}

/// Reads at most [`BODY_SCAN_LIMIT`] bytes of the response body.
///
/// A mid-body failure keeps whatever prefix arrived; a partial body is still
/// useful for signature matching and the status code is already known.
async fn read_body_prefix(mut resp: reqwest::Response) -> String {
    let mut buf: Vec<u8> = Vec::new();
    loop {
        match resp.chunk().await {
            Ok(Some(chunk)) => {
                buf.extend_from_slice(&chunk);
                if buf.len() >= BODY_SCAN_LIMIT {
                    buf.truncate(BODY_SCAN_LIMIT);
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                log::debug!("body read stopped early: {e}");
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Maps a `reqwest::Error` to the closest taxonomy value.
///
/// reqwest performs its own DNS/TLS inside the exchange, so failures that
/// belong to earlier stages can still surface here (e.g. a redirect hopping
/// to a host with a bad certificate); the error-chain text is the only
/// reliable discriminator for those.
pub fn classify_request_error(e: &reqwest::Error) -> StageFailure {
    if e.is_timeout() {
        return StageFailure::new(WebsiteStatus::Timeout, format!("HTTP request timed out: {e}"));
    }
    if e.is_redirect() {
        return StageFailure::new(
            WebsiteStatus::ConnectionError,
            format!("redirect loop or hop limit exceeded: {e}"),
        );
    }

    let chain = error_chain_text(e);
    let lower = chain.to_lowercase();
    if lower.contains("certificate")
        || lower.contains("handshake")
        || lower.contains("ssl")
        || lower.contains("tls")
    {
        return StageFailure::new(WebsiteStatus::SslError, format!("SSL/TLS error: {chain}"));
    }
    if lower.contains("dns") || lower.contains("resolve") || lower.contains("lookup") {
        return StageFailure::new(
            WebsiteStatus::NoDns,
            format!("DNS resolution failed: {chain}"),
        );
    }

    StageFailure::new(
        WebsiteStatus::ConnectionError,
        format!("connection error: {chain}"),
    )
}

/// Flattens an error and its sources into one line of text.
fn error_chain_text(e: &reqwest::Error) -> String {
    let mut parts = vec![e.to_string()];
    let mut source = std::error::Error::source(e);
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    parts.join(": ")
}
