//! HTTP transport for tracking API calls.

use crate::config::Config;
use crate::Error;
use reqwest::{Method, Url};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// TCP keepalive interval for pooled connections.
const TCP_KEEPALIVE: Duration = Duration::from_secs(60);

/// HTTP transport for the Vero tracking API.
///
/// Every call is a single attempt: no retries, no backoff.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    tracking_api_key: String,
}

impl HttpTransport {
    /// Create a new HTTP transport.
    pub fn new(config: &Config) -> Result<Self, Error> {
        let mut builder = reqwest::Client::builder().tcp_keepalive(TCP_KEEPALIVE);
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url: config.tracking_api_base_url().to_string(),
            tracking_api_key: config.tracking_api_key().to_string(),
        })
    }

    /// Build `{base_url}{path}?tracking_api_key={key}`.
    pub(crate) fn url(&self, path: &str) -> Result<Url, Error> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| Error::Config(format!("invalid tracking API URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("tracking_api_key", &self.tracking_api_key);
        Ok(url)
    }

    /// Send one JSON request. Resolves on any 2xx response.
    pub async fn send<T: Serialize + ?Sized>(
        &self,
        path: &str,
        method: Method,
        body: &T,
    ) -> Result<(), Error> {
        let url = self.url(path)?;
        debug!(method = %method, path = %path, "sending request");

        let response = self
            .client
            .request(method, url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".into());
            warn!(status = %status, body = %body, path = %path, "API request failed");
            return Err(Error::Status {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        debug!(status = %status, path = %path, "request succeeded");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerBuilder;

    fn transport(base_url: &str) -> HttpTransport {
        let config = TrackerBuilder::new("test-api-key")
            .tracking_api_base_url(base_url)
            .build_config()
            .unwrap();
        HttpTransport::new(&config).unwrap()
    }

    #[test]
    fn test_url_construction() {
        let transport = transport("https://api.getvero.com/api/v2");

        assert_eq!(
            transport.url("/users/track").unwrap().as_str(),
            "https://api.getvero.com/api/v2/users/track?tracking_api_key=test-api-key"
        );
    }

    #[test]
    fn test_url_encodes_api_key() {
        let config = TrackerBuilder::new("key with&symbols")
            .build_config()
            .unwrap();
        let transport = HttpTransport::new(&config).unwrap();

        let url = transport.url("/foo").unwrap();
        let (name, value) = url.query_pairs().next().unwrap();
        assert_eq!(name, "tracking_api_key");
        assert_eq!(value, "key with&symbols");
    }

    #[test]
    fn test_invalid_base_url() {
        let transport = transport("not a url");
        assert!(matches!(transport.url("/foo"), Err(Error::Config(_))));
    }
}
