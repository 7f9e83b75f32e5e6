//! Cookie jar medium for the legacy "visited site" store.

use cookie::Cookie;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use time::OffsetDateTime;
use tracing::warn;

/// A cookie jar with `document.cookie` semantics.
pub trait CookieJar: Send + Sync {
    /// All live cookies as `name=value` pairs joined by `"; "`.
    fn cookie(&self) -> String;

    /// Apply a `Set-Cookie` style string, e.g. `a=b; path=/`.
    ///
    /// A cookie whose expiry lies in the past is removed.
    fn set_cookie(&self, cookie: &str);
}

/// In-process cookie jar, keyed by cookie name.
///
/// Path and domain attributes are accepted but not used for scoping.
#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    cookies: Mutex<BTreeMap<String, String>>,
}

impl MemoryCookieJar {
    /// Create an empty jar.
    pub fn new() -> Self {
        Self::default()
    }
}

fn is_expired(cookie: &Cookie<'_>) -> bool {
    if let Some(max_age) = cookie.max_age() {
        if max_age.is_zero() || max_age.is_negative() {
            return true;
        }
    }
    cookie
        .expires_datetime()
        .is_some_and(|expires| expires <= OffsetDateTime::now_utc())
}

impl CookieJar for MemoryCookieJar {
    fn cookie(&self) -> String {
        let cookies = self.cookies.lock().unwrap_or_else(PoisonError::into_inner);
        cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn set_cookie(&self, cookie: &str) {
        let parsed = match Cookie::parse(cookie.to_owned()) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "ignoring malformed cookie");
                return;
            }
        };

        let mut cookies = self.cookies.lock().unwrap_or_else(PoisonError::into_inner);
        if is_expired(&parsed) {
            cookies.remove(parsed.name());
        } else {
            cookies.insert(parsed.name().to_string(), parsed.value().to_string());
        }
    }
}
