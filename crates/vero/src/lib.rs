//! Vero tracking SDK for Rust.
//!
//! Identify users, manage their subscriptions and tags, and track events
//! against the Vero tracking API. The tracker remembers the current user
//! between calls and records a "Visited site" event once per user per
//! session, depending on the storage media the [`Environment`] provides.
//!
//! # Example
//!
//! ```rust,ignore
//! use vero::{identity, Tracker};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), vero::Error> {
//!     let tracker = Tracker::builder("tracking-api-key").build()?;
//!
//!     tracker.event().track("Purchased item")
//!         .identity(identity("1000", "test@example.com"))
//!         .data("product_name", "Red T-shirt")
//!         .send()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

mod builders;
mod client;
mod config;
mod cookies;
mod environment;
mod error;
mod global;
mod identity_store;
mod site_visited_store;
mod storage;
mod transport;
pub mod types;

pub use builders::{is_visited_site_event, VISITED_SITE_EVENT};
pub use client::{
    EventMethods, SendableAlias, SendableIdentify, SendableTagEdit, SendableTrack,
    SendableUserAction, TagMethods, Tracker, UserMethods,
};
pub use config::{Config, TrackerBuilder, DEFAULT_TRACKING_API_BASE_URL};
pub use cookies::{CookieJar, MemoryCookieJar};
pub use environment::{hash_string, Environment, EnvironmentBuilder, ReservedUserData};
pub use error::Error;
pub use global::{init, is_initialized, tracker};
pub use identity_store::{IdentityStore, LocalIdentityStore};
pub use site_visited_store::{
    LegacyCookieSiteVisitedStore, SessionSiteVisitedStore, SiteVisitedStore,
};
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use types::{Channel, EventExtras, Identity};

/// Create an identity.
pub fn identity(user_id: impl Into<String>, email: impl Into<String>) -> Identity {
    Identity::new(user_id, email)
}
