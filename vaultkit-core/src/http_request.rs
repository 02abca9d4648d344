//! HTTP transport shared by the JSON-RPC ledger and the IPFS client.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{header::USER_AGENT, RequestBuilder, Response, StatusCode, Url};

use crate::error::{VaultError, VaultResult};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Retries after the first attempt.
const MAX_RETRIES: usize = 3;

/// Thin wrapper around a `reqwest` client.
///
/// Applies a timeout and user agent to every request, refuses plain HTTP to
/// remote hosts and retries transient failures with exponential backoff.
/// Retries live here only; the vault logic above never retries on its own.
#[derive(Debug, Clone)]
pub(crate) struct Request {
    client: reqwest::Client,
    timeout: Duration,
    max_retries: usize,
}

impl Request {
    pub(crate) fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: MAX_RETRIES,
        }
    }

    pub(crate) const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// A POST request to `url` with the defaults applied.
    ///
    /// Plain HTTP is only accepted for loopback hosts (local nodes).
    pub(crate) fn post(&self, url: &str) -> VaultResult<RequestBuilder> {
        let url = checked_url(url)?;
        Ok(self
            .client
            .post(url)
            .timeout(self.timeout)
            .header(USER_AGENT, concat!("vaultkit-core/", env!("CARGO_PKG_VERSION"))))
    }

    /// Sends `builder`, retrying rate limits, server errors, timeouts and
    /// refused connections.
    ///
    /// Requests with a streaming body cannot be replayed and are sent once.
    pub(crate) async fn handle(&self, builder: RequestBuilder) -> VaultResult<Response> {
        let Some(template) = builder.try_clone() else {
            return send(builder).await.map_err(Into::into);
        };

        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(2))
            .with_max_times(self.max_retries);

        (|| async {
            let attempt = template.try_clone().ok_or_else(|| Failure {
                url: String::new(),
                status: None,
                reason: "request body cannot be replayed".to_string(),
                transient: false,
            })?;
            send(attempt).await
        })
        .retry(backoff)
        .when(|failure: &Failure| failure.transient)
        .notify(|failure: &Failure, delay: Duration| {
            log::debug!("retrying {} in {delay:?}: {}", failure.url, failure.reason);
        })
        .await
        .map_err(Into::into)
    }
}

fn checked_url(url: &str) -> VaultResult<Url> {
    let parsed = Url::parse(url).map_err(|err| VaultError::InvalidInput {
        attribute: "url".to_string(),
        reason: format!("{url}: {err}"),
    })?;
    let loopback = matches!(
        parsed.host_str(),
        Some("localhost" | "127.0.0.1" | "[::1]")
    );
    if parsed.scheme() != "https" && !loopback {
        return Err(VaultError::InvalidInput {
            attribute: "url".to_string(),
            reason: format!("{url} must use https"),
        });
    }
    Ok(parsed)
}

/// A failed attempt, transient ones are retried.
#[derive(Debug)]
struct Failure {
    url: String,
    status: Option<u16>,
    reason: String,
    transient: bool,
}

impl From<Failure> for VaultError {
    fn from(failure: Failure) -> Self {
        Self::NetworkError {
            url: failure.url,
            status: failure.status,
            error: failure.reason,
        }
    }
}

async fn send(builder: RequestBuilder) -> Result<Response, Failure> {
    let (client, request) = builder.build_split();
    let request = request.map_err(|err| Failure {
        url: err.url().map(ToString::to_string).unwrap_or_default(),
        status: None,
        reason: format!("invalid request: {err}"),
        transient: false,
    })?;
    let url = request.url().to_string();

    let response = client.execute(request).await.map_err(|err| Failure {
        url: url.clone(),
        status: None,
        transient: err.is_timeout() || err.is_connect(),
        reason: err.to_string(),
    })?;

    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return Err(Failure {
            url,
            status: Some(status.as_u16()),
            reason: format!("server answered {status}"),
            transient: true,
        });
    }
    Ok(response)
}
