use crate::config::HttpSettings;
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while downloading the feed or an article page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded its timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Builds the HTTP client shared by the feed fetch and preview lookups.
///
/// Timeouts and the user agent are applied per request, since the feed and
/// article pages use different limits.
pub fn build_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
}

/// Downloads the remote feed.
///
/// A single attempt bounded by `feed_timeout_secs`. Any failure is returned to
/// the caller; the next scheduled run acts as the retry.
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &str,
    http: &HttpSettings,
) -> Result<Vec<u8>, FetchError> {
    let bytes = get_bytes(client, url, http, http.feed_timeout()).await?;
    tracing::debug!(url = %url, bytes = bytes.len(), "Fetched feed");
    Ok(bytes)
}

/// GET `url` with the configured user agent, returning the full body.
///
/// The timeout covers both the response headers and the body transfer.
pub(crate) async fn get_bytes(
    client: &reqwest::Client,
    url: &str,
    http: &HttpSettings,
    timeout: Duration,
) -> Result<Vec<u8>, FetchError> {
    tokio::time::timeout(timeout, send_and_read(client, url, http))
        .await
        .map_err(|_| FetchError::Timeout)?
}

async fn send_and_read(
    client: &reqwest::Client,
    url: &str,
    http: &HttpSettings,
) -> Result<Vec<u8>, FetchError> {
    let response = client
        .get(url)
        .header(reqwest::header::USER_AGENT, http.user_agent.as_str())
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    read_limited_bytes(response, http.max_body_bytes).await
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Capture Content-Length for completeness check
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    // EDGE-005: Network interruptions can end the stream early
    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
