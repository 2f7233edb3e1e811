//! Page retrieval: receipt URL → portal HTML.
//!
//! ## Why relax TLS verification?
//!
//! State tax portals routinely serve self-signed, expired or incomplete
//! certificate chains. Refusing them would make most receipts unreadable, and
//! the page carries no secrets: it is the public verification view of a
//! receipt whose key is printed on paper. The relaxation is a config switch
//! ([`crate::config::ScanConfig::accept_invalid_certs`]) and applies only to
//! this client.
//!
//! ## Why a browser user agent?
//!
//! Several portals answer default HTTP-library identities with a 403 or an
//! empty shell page.

use crate::config::ScanConfig;
use crate::error::FetchError;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info};

/// Retrieves the HTML behind a receipt URL.
///
/// The pipeline only needs `GET url → body`; the trait exists so callers can
/// plug in a caching or recording client, and tests can count calls.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// The default [`PageFetcher`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpPageFetcher {
    /// Build a client from the fetch-related fields of `config`.
    pub fn new(config: &ScanConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .user_agent(config.user_agent.as_str())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self {
            client,
            timeout_secs: config.fetch_timeout_secs,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        info!("Fetching receipt page: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(e, self.timeout_secs))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| match classify_reqwest_error(e, self.timeout_secs) {
                FetchError::Transport(detail) => FetchError::Body(detail),
                other => other,
            })?;

        // Portals mislabel their charset often enough that the header is not
        // trusted; the markup itself is UTF-8 in practice.
        let html = String::from_utf8_lossy(&bytes).into_owned();
        debug!("Fetched {} bytes from {}", html.len(), url);
        Ok(html)
    }
}

fn classify_reqwest_error(e: reqwest::Error, timeout_secs: u64) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout { secs: timeout_secs }
    } else {
        FetchError::Transport(e.to_string())
    }
}
