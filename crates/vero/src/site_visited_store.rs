//! Persistence of the per-session "visited site" marker.

use crate::cookies::CookieJar;
use crate::environment::Environment;
use crate::storage::Storage;
use crate::Error;
use std::sync::Arc;

/// Records whether a "Visited site" event was already tracked this session.
pub trait SiteVisitedStore: Send + Sync {
    /// Whether the user was marked visited and not cleared since.
    fn has_visited(&self, user_id: &str) -> bool;

    /// Mark the user visited. Idempotent.
    fn set_visited(&self, user_id: &str);

    /// Remove the marker. No-op when absent.
    fn clear(&self, user_id: &str);
}

/// Per-user marker in the environment's session storage.
///
/// Markers vanish when the session storage does.
pub struct SessionSiteVisitedStore {
    storage: Arc<dyn Storage>,
    key_namespace: String,
}

impl SessionSiteVisitedStore {
    /// Create a store in the environment's session storage.
    ///
    /// Fails if the environment has no session storage.
    pub fn new(env: &Environment, key_namespace: &str) -> Result<Self, Error> {
        let storage = env.session_storage().cloned().ok_or_else(|| {
            Error::Environment("session storage is not available in this environment".into())
        })?;
        Ok(Self::with_storage(storage, key_namespace))
    }

    /// Create a store over an explicit storage medium.
    pub fn with_storage(storage: Arc<dyn Storage>, key_namespace: &str) -> Self {
        Self {
            storage,
            key_namespace: key_namespace.into(),
        }
    }

    fn key(&self, user_id: &str) -> String {
        format!(
            "{}:__vero_tracking_site_visited:{}",
            self.key_namespace, user_id
        )
    }
}

impl SiteVisitedStore for SessionSiteVisitedStore {
    fn has_visited(&self, user_id: &str) -> bool {
        self.storage.get_item(&self.key(user_id)).as_deref() == Some("true")
    }

    fn set_visited(&self, user_id: &str) {
        self.storage.set_item(&self.key(user_id), "true");
    }

    fn clear(&self, user_id: &str) {
        self.storage.remove_item(&self.key(user_id));
    }
}

/// Global session-cookie marker, compatible with the legacy `m.js` SDK.
///
/// The marker is not user specific: the `user_id` arguments are ignored.
/// Prefer [`SessionSiteVisitedStore`] unless exact parity with `m.js` is needed.
pub struct LegacyCookieSiteVisitedStore {
    jar: Arc<dyn CookieJar>,
    cookie_domain: Option<String>,
}

impl LegacyCookieSiteVisitedStore {
    pub const COOKIE_NAME: &'static str = "__vero_visit";

    /// Create a store in the environment's cookie jar.
    ///
    /// Fails if the environment has no cookie jar.
    pub fn new(env: &Environment, cookie_domain: Option<String>) -> Result<Self, Error> {
        let jar = env.cookie_jar().cloned().ok_or_else(|| {
            Error::Environment("cookies are not available in this environment".into())
        })?;
        Ok(Self::with_jar(jar, cookie_domain))
    }

    /// Create a store over an explicit cookie jar.
    pub fn with_jar(jar: Arc<dyn CookieJar>, cookie_domain: Option<String>) -> Self {
        Self { jar, cookie_domain }
    }

    fn with_domain(&self, mut cookie: String) -> String {
        if let Some(domain) = &self.cookie_domain {
            cookie.push_str(&format!("; domain=.{}", domain));
        }
        cookie
    }
}

impl SiteVisitedStore for LegacyCookieSiteVisitedStore {
    fn has_visited(&self, _user_id: &str) -> bool {
        let marker = format!("{}=true", Self::COOKIE_NAME);
        self.jar
            .cookie()
            .split(';')
            .any(|cookie| cookie.contains(&marker))
    }

    fn set_visited(&self, _user_id: &str) {
        let cookie = self.with_domain(format!("{}=true; path=/", Self::COOKIE_NAME));
        self.jar.set_cookie(&cookie);
    }

    fn clear(&self, _user_id: &str) {
        let cookie = self.with_domain(format!(
            "{}=; expires=Thu, 01 Jan 1970 00:00:00 GMT; path=/",
            Self::COOKIE_NAME
        ));
        self.jar.set_cookie(&cookie);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::MemoryCookieJar;
    use crate::storage::MemoryStorage;
    use std::sync::Mutex;

    #[test]
    fn test_session_store_keys() {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionSiteVisitedStore::with_storage(storage.clone(), "test");

        assert!(!store.has_visited("1"));
        store.set_visited("1");
        assert_eq!(
            storage
                .get_item("test:__vero_tracking_site_visited:1")
                .as_deref(),
            Some("true")
        );
        assert!(store.has_visited("1"));
        assert!(!store.has_visited("2"));

        store.clear("1");
        store.clear("1");
        assert!(storage.is_empty());
        assert!(!store.has_visited("1"));
    }

    #[test]
    fn test_session_store_requires_session_storage() {
        let result = SessionSiteVisitedStore::new(&Environment::headless(), "test");
        assert!(matches!(result, Err(Error::Environment(_))));
    }

    #[test]
    fn test_legacy_store_is_global() {
        let jar = Arc::new(MemoryCookieJar::new());
        let store = LegacyCookieSiteVisitedStore::with_jar(jar.clone(), None);

        assert!(!store.has_visited("1"));
        store.set_visited("1");
        assert!(jar.cookie().contains("__vero_visit=true"));
        assert!(store.has_visited("2"));

        store.clear("2");
        assert!(!store.has_visited("1"));
    }

    /// Records raw cookie strings instead of interpreting them.
    #[derive(Default)]
    struct RecordingJar {
        written: Mutex<Vec<String>>,
    }

    impl CookieJar for RecordingJar {
        fn cookie(&self) -> String {
            String::new()
        }

        fn set_cookie(&self, cookie: &str) {
            self.written.lock().unwrap().push(cookie.to_string());
        }
    }

    #[test]
    fn test_legacy_store_cookie_strings() {
        let jar = Arc::new(RecordingJar::default());
        let store = LegacyCookieSiteVisitedStore::with_jar(jar.clone(), Some("example.com".into()));

        store.set_visited("1");
        store.clear("1");

        let written = jar.written.lock().unwrap();
        assert_eq!(written[0], "__vero_visit=true; path=/; domain=.example.com");
        assert_eq!(
            written[1],
            "__vero_visit=; expires=Thu, 01 Jan 1970 00:00:00 GMT; path=/; domain=.example.com"
        );
    }

    #[test]
    fn test_legacy_store_requires_cookie_jar() {
        let result = LegacyCookieSiteVisitedStore::new(&Environment::headless(), None);
        assert!(matches!(result, Err(Error::Environment(_))));
    }
}
