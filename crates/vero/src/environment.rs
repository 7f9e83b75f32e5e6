//! Host environment: storage media, hostname and reserved user data.
//!
//! The tracker never probes globals to find out where it runs. Instead an
//! [`Environment`] value describes which storage media exist and which
//! environment-derived fields are sent along with identify and track calls.

use crate::cookies::{CookieJar, MemoryCookieJar};
use crate::storage::{FileStorage, MemoryStorage, Storage};
use crate::Error;
use serde_json::{json, Map, Value};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// File name used by [`Environment::with_data_dir`] for durable storage.
pub const LOCAL_STORAGE_FILE: &str = "local_storage.json";

/// Environment-derived fields auto-populated into identify and track data.
///
/// These take precedence over caller-supplied fields with the same name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReservedUserData {
    pub language: Option<String>,
    /// Offset from UTC in minutes, positive east of Greenwich.
    pub timezone_offset_minutes: Option<i32>,
    pub iana_timezone: Option<String>,
    pub user_agent: Option<String>,
}

impl ReservedUserData {
    /// Render as the JSON object merged into request data.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(language) = &self.language {
            map.insert("language".into(), json!(language));
        }
        if let Some(minutes) = self.timezone_offset_minutes {
            map.insert("timezone".into(), timezone_hours(minutes));
        }
        if let Some(iana) = &self.iana_timezone {
            map.insert("ianaTimezone".into(), json!(iana));
        }
        if let Some(user_agent) = &self.user_agent {
            map.insert("userAgent".into(), json!(user_agent));
        }
        map
    }
}

/// Hours east of UTC, as an integer when whole (`10`, `-3`, `5.5`).
fn timezone_hours(minutes: i32) -> Value {
    if minutes % 60 == 0 {
        json!(minutes / 60)
    } else {
        json!(f64::from(minutes) / 60.0)
    }
}

/// Where the tracker is running.
#[derive(Clone, Default)]
pub struct Environment {
    local_storage: Option<Arc<dyn Storage>>,
    session_storage: Option<Arc<dyn Storage>>,
    cookie_jar: Option<Arc<dyn CookieJar>>,
    hostname: Option<String>,
    reserved: ReservedUserData,
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("local_storage", &self.local_storage.is_some())
            .field("session_storage", &self.session_storage.is_some())
            .field("cookie_jar", &self.cookie_jar.is_some())
            .field("hostname", &self.hostname)
            .field("reserved", &self.reserved)
            .finish()
    }
}

impl Environment {
    /// A server or CLI process: no storage media, no hostname, no reserved data.
    pub fn headless() -> Self {
        Self::default()
    }

    /// Start describing a custom environment.
    pub fn builder() -> EnvironmentBuilder {
        EnvironmentBuilder::default()
    }

    /// Desktop/CLI environment persisting identities under `dir`.
    ///
    /// Local storage is a [`FileStorage`] at `dir/local_storage.json`; session
    /// storage and cookies live for the lifetime of the process.
    pub fn with_data_dir(dir: impl AsRef<Path>) -> Result<Self, Error> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(Error::Environment(format!(
                "data directory {} does not exist",
                dir.display()
            )));
        }

        let local = FileStorage::open(dir.join(LOCAL_STORAGE_FILE))?;
        Ok(Self::builder()
            .local_storage(Arc::new(local))
            .session_storage(Arc::new(MemoryStorage::new()))
            .cookie_jar(Arc::new(MemoryCookieJar::new()))
            .build())
    }

    /// Whether any storage medium is available.
    pub fn is_browser(&self) -> bool {
        self.local_storage.is_some() || self.session_storage.is_some() || self.cookie_jar.is_some()
    }

    /// Durable key/value storage, if present.
    pub fn local_storage(&self) -> Option<&Arc<dyn Storage>> {
        self.local_storage.as_ref()
    }

    /// Session-scoped key/value storage, if present.
    pub fn session_storage(&self) -> Option<&Arc<dyn Storage>> {
        self.session_storage.as_ref()
    }

    /// Cookie jar, if present.
    pub fn cookie_jar(&self) -> Option<&Arc<dyn CookieJar>> {
        self.cookie_jar.as_ref()
    }

    /// Hostname reported as the default event source.
    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    /// Reserved fields merged into identify and track data.
    pub fn reserved_user_data(&self) -> Map<String, Value> {
        self.reserved.to_map()
    }
}

/// Builder for [`Environment`].
#[derive(Default)]
pub struct EnvironmentBuilder {
    env: Environment,
}

impl EnvironmentBuilder {
    /// Set the durable key/value storage.
    pub fn local_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.env.local_storage = Some(storage);
        self
    }

    /// Set the session-scoped key/value storage.
    pub fn session_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.env.session_storage = Some(storage);
        self
    }

    /// Set the cookie jar.
    pub fn cookie_jar(mut self, jar: Arc<dyn CookieJar>) -> Self {
        self.env.cookie_jar = Some(jar);
        self
    }

    /// Set the hostname.
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.env.hostname = Some(hostname.into());
        self
    }

    /// Set the preferred language, e.g. `en-US`.
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.env.reserved.language = Some(language.into());
        self
    }

    /// Set the UTC offset in minutes, positive east of Greenwich.
    pub fn timezone_offset_minutes(mut self, minutes: i32) -> Self {
        self.env.reserved.timezone_offset_minutes = Some(minutes);
        self
    }

    /// Set the IANA timezone name, e.g. `Australia/Sydney`.
    pub fn iana_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.env.reserved.iana_timezone = Some(timezone.into());
        self
    }

    /// Set the user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.env.reserved.user_agent = Some(user_agent.into());
        self
    }

    /// Build the environment.
    pub fn build(self) -> Environment {
        self.env
    }
}

/// Hash a string with djb2 over its UTF-16 code units.
///
/// Arithmetic wraps at 32 bits and the absolute value is rendered in
/// lowercase base 36, so the result matches the browser SDK and persisted
/// keys stay compatible.
pub fn hash_string(input: &str) -> String {
    let mut hash: i32 = 5381;
    for unit in input.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_add(hash)
            .wrapping_add(i32::from(unit));
    }
    to_base36(i64::from(hash).unsigned_abs())
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".into();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_string_matches_browser_sdk() {
        assert_eq!(hash_string(""), "45h");
        assert_eq!(hash_string("a"), "3t3a");
        assert_eq!(hash_string("hello"), "4bj995");
        assert_eq!(hash_string("test-api-key"), "ymigpu");
    }

    #[test]
    fn test_hash_string_uses_utf16_units() {
        // surrogate pair counts as two units
        assert_eq!(hash_string("é😀"), "38eju3");
    }

    #[test]
    fn test_headless_has_nothing() {
        let env = Environment::headless();

        assert!(!env.is_browser());
        assert!(env.hostname().is_none());
        assert!(env.reserved_user_data().is_empty());
    }

    #[test]
    fn test_reserved_user_data() {
        let env = Environment::builder()
            .language("en-AU")
            .timezone_offset_minutes(600)
            .iana_timezone("Australia/Sydney")
            .user_agent("test-agent")
            .build();

        let data = env.reserved_user_data();
        assert_eq!(data["language"], "en-AU");
        assert_eq!(data["timezone"], json!(10));
        assert_eq!(data["ianaTimezone"], "Australia/Sydney");
        assert_eq!(data["userAgent"], "test-agent");
    }

    #[test]
    fn test_fractional_timezone() {
        let env = Environment::builder().timezone_offset_minutes(330).build();
        assert_eq!(env.reserved_user_data()["timezone"], json!(5.5));

        let env = Environment::builder().timezone_offset_minutes(-180).build();
        assert_eq!(env.reserved_user_data()["timezone"], json!(-3));
    }

    #[test]
    fn test_with_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let env = Environment::with_data_dir(dir.path()).unwrap();

        assert!(env.is_browser());
        assert!(env.local_storage().is_some());
        assert!(env.session_storage().is_some());
        assert!(env.cookie_jar().is_some());
    }

    #[test]
    fn test_with_missing_data_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = Environment::with_data_dir(dir.path().join("missing"));
        assert!(matches!(result, Err(Error::Environment(_))));
    }
}
