use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::time::timeout;
use tracing::debug;
use url::Url;

use super::errors::{CrlError, CrlResult};

/// Retrieves the raw bytes of a revocation list.
///
/// There is no retry here; a failed fetch is picked up again on the next
/// scheduled cycle.
#[async_trait]
pub trait CrlFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> CrlResult<Vec<u8>>;
}

/// Fetches CRLs over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    request_timeout: Duration,
}

impl HttpFetcher {
    /// Returns an error if the HTTP client cannot be initialized
    pub fn new(timeout_secs: u64) -> CrlResult<Self> {
        let request_timeout = Duration::from_secs(timeout_secs);
        let client = Client::builder().timeout(request_timeout).build()?;

        Ok(Self {
            client,
            request_timeout,
        })
    }
}

#[async_trait]
impl CrlFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> CrlResult<Vec<u8>> {
        debug!("Fetching CRL from: {}", url);

        let _ = Url::parse(url)?;

        let response = match timeout(self.request_timeout, self.client.get(url).send()).await {
            Ok(result) => result?,
            Err(_) => return Err(CrlError::Timeout(url.to_string())),
        };

        if !response.status().is_success() {
            return Err(CrlError::Retrieval(format!(
                "HTTP error {} when fetching CRL from {}",
                response.status(),
                url
            )));
        }

        // The body is consumed (and the connection released) on every path
        let crl_data = response.bytes().await?.to_vec();
        debug!("Fetched {} bytes from {}", crl_data.len(), url);
        Ok(crl_data)
    }
}
