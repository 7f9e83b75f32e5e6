//! Tracker configuration.

use crate::environment::{hash_string, Environment};
use crate::identity_store::IdentityStore;
use crate::site_visited_store::SiteVisitedStore;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default tracking API base URL.
pub const DEFAULT_TRACKING_API_BASE_URL: &str = "https://api.getvero.com/api/v2";

/// Vero tracker configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) tracking_api_key: String,
    pub(crate) tracking_api_base_url: String,
    pub(crate) timeout: Option<Duration>,
    pub(crate) key_namespace: String,
}

impl Config {
    /// Get the tracking API key.
    pub fn tracking_api_key(&self) -> &str {
        &self.tracking_api_key
    }

    /// Get the tracking API base URL.
    pub fn tracking_api_base_url(&self) -> &str {
        &self.tracking_api_base_url
    }

    /// Get the request timeout, if one was configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Namespace prefixed to every persistence key, derived from the API key.
    pub fn key_namespace(&self) -> &str {
        &self.key_namespace
    }
}

/// Builder for [`Tracker`](crate::Tracker).
pub struct TrackerBuilder {
    tracking_api_key: String,
    tracking_api_base_url: Option<String>,
    timeout: Option<Duration>,
    pub(crate) environment: Option<Environment>,
    pub(crate) identity_store: Option<Arc<dyn IdentityStore>>,
    pub(crate) site_visited_store: Option<Arc<dyn SiteVisitedStore>>,
}

impl fmt::Debug for TrackerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackerBuilder")
            .field("tracking_api_base_url", &self.tracking_api_base_url)
            .field("timeout", &self.timeout)
            .field("environment", &self.environment)
            .field("identity_store", &self.identity_store.is_some())
            .field("site_visited_store", &self.site_visited_store.is_some())
            .finish_non_exhaustive()
    }
}

impl TrackerBuilder {
    /// Create a new builder with the given tracking API key.
    pub fn new(tracking_api_key: impl Into<String>) -> Self {
        Self {
            tracking_api_key: tracking_api_key.into(),
            tracking_api_base_url: None,
            timeout: None,
            environment: None,
            identity_store: None,
            site_visited_store: None,
        }
    }

    /// Set the tracking API base URL.
    pub fn tracking_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.tracking_api_base_url = Some(url.into());
        self
    }

    /// Set a request timeout. Requests have no timeout by default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the host environment used for default stores and reserved data.
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Store identities in the given store instead of the environment default.
    pub fn identity_store<S: IdentityStore + 'static>(mut self, store: Arc<S>) -> Self {
        self.identity_store = Some(store);
        self
    }

    /// Track "visited site" with the given store instead of the environment default.
    pub fn site_visited_store<S: SiteVisitedStore + 'static>(mut self, store: Arc<S>) -> Self {
        self.site_visited_store = Some(store);
        self
    }

    /// Build the configuration.
    pub(crate) fn build_config(&self) -> Result<Config, crate::Error> {
        if self.tracking_api_key.is_empty() {
            return Err(crate::Error::Config(
                "tracking_api_key cannot be empty".into(),
            ));
        }

        let base_url = self
            .tracking_api_base_url
            .as_deref()
            .unwrap_or(DEFAULT_TRACKING_API_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        if base_url.is_empty() {
            return Err(crate::Error::Config(
                "tracking_api_base_url cannot be empty".into(),
            ));
        }

        Ok(Config {
            key_namespace: hash_string(&self.tracking_api_key),
            tracking_api_key: self.tracking_api_key.clone(),
            tracking_api_base_url: base_url,
            timeout: self.timeout,
        })
    }
}
