//! Upstream fetches performed on a client's behalf.
//!
//! Provides the shared [`Client`] used by the proxy handler and
//! [`ProxyRequest`], which carries the target URL plus the small set of
//! client headers that are allowed to reach the upstream host.

use crate::server::url_validation::AllowList;
use axum::http::{HeaderMap, HeaderName, HeaderValue, header};
use reqwest::{Client, Response, redirect};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Default connect/read timeout for upstream fetches, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Maximum number of redirect hops followed for a single fetch.
pub const MAX_REDIRECTS: usize = 10;

/// Client request headers copied to the upstream request. Nothing else is
/// forwarded, so cookies and credentials never leave the proxy.
pub const FORWARDED_HEADERS: [HeaderName; 3] = [header::RANGE, header::USER_AGENT, header::ACCEPT];

/// Build the shared upstream client.
///
/// `timeout` bounds connecting and each read, not the whole transfer, so a
/// long segment stream is not cut off while bytes keep flowing. Redirects are
/// only followed to hosts on `allow_list`.
pub fn build_client(allow_list: AllowList, timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .connect_timeout(timeout)
        .read_timeout(timeout)
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(10)
        .redirect(redirect_policy(allow_list))
        .build()
}

fn redirect_policy(allow_list: AllowList) -> redirect::Policy {
    redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            attempt.error(format!("too many redirects (max {MAX_REDIRECTS})"))
        } else if allow_list.permits(attempt.url()) {
            attempt.follow()
        } else {
            let message = format!("redirect to disallowed host: {}", attempt.url());
            warn!("{}", message);
            attempt.error(message)
        }
    })
}

/// One client request to relay upstream. Built per request, consumed by
/// [`fetch`].
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub target: Url,
    pub range: Option<HeaderValue>,
    pub user_agent: Option<HeaderValue>,
    pub accept: Option<HeaderValue>,
}

impl ProxyRequest {
    pub fn new(target: Url) -> Self {
        Self {
            target,
            range: None,
            user_agent: None,
            accept: None,
        }
    }

    /// Capture the forwardable headers of an inbound request.
    pub fn from_headers(target: Url, headers: &HeaderMap) -> Self {
        Self {
            target,
            range: headers.get(header::RANGE).cloned(),
            user_agent: headers.get(header::USER_AGENT).cloned(),
            accept: headers.get(header::ACCEPT).cloned(),
        }
    }

    /// Headers sent upstream: only those present among [`FORWARDED_HEADERS`].
    pub fn upstream_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let values = [&self.range, &self.user_agent, &self.accept];

        for (name, value) in FORWARDED_HEADERS.iter().zip(values) {
            if let Some(value) = value {
                headers.insert(name.clone(), value.clone());
            }
        }

        headers
    }
}

/// Fetch `request.target` once. There are no retries.
///
/// Any status code is returned as a [`Response`]; only transport failures
/// (DNS, connect, timeout, refused redirect) are errors.
///
/// # Errors
///
/// Returns the [`reqwest::Error`] describing the transport failure.
pub async fn fetch(client: &Client, request: &ProxyRequest) -> Result<Response, reqwest::Error> {
    debug!("Fetching upstream: {}", request.target);

    let response = client
        .get(request.target.clone())
        .headers(request.upstream_headers())
        .send()
        .await
        .map_err(|e| {
            warn!("Upstream fetch failed for {}: {}", request.target, e);
            e
        })?;

    debug!(
        "Upstream responded {} for {}",
        response.status(),
        request.target
    );

    Ok(response)
}
