//! Vero tracker implementation.

use crate::builders::{
    is_visited_site_event, AliasBuilder, IdentifyBuilder, TagEditBuilder, TrackBuilder,
    VISITED_SITE_EVENT,
};
use crate::config::{Config, TrackerBuilder};
use crate::environment::Environment;
use crate::identity_store::{IdentityStore, LocalIdentityStore};
use crate::site_visited_store::{SessionSiteVisitedStore, SiteVisitedStore};
use crate::transport::HttpTransport;
use crate::types::{Channel, Identity, UserPayload};
use crate::Error;
use reqwest::Method;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

const PATH_USERS_TRACK: &str = "/users/track";
const PATH_USERS_REIDENTIFY: &str = "/users/reidentify";
const PATH_USERS_UNSUBSCRIBE: &str = "/users/unsubscribe";
const PATH_USERS_RESUBSCRIBE: &str = "/users/resubscribe";
const PATH_USERS_DELETE: &str = "/users/delete";
const PATH_TAGS_EDIT: &str = "/users/tags/edit";
const PATH_EVENTS_TRACK: &str = "/events/track";

/// Vero tracker.
///
/// Keeps track of the current user in an [`IdentityStore`] so that calls
/// after `identify` can omit the user, and records a "Visited site" event
/// once per user per session when a [`SiteVisitedStore`] is available.
///
/// # Example
///
/// ```rust,no_run
/// use vero::{Environment, Tracker};
///
/// # async fn example() -> Result<(), vero::Error> {
/// let tracker = Tracker::builder("tracking-api-key")
///     .environment(Environment::with_data_dir("/var/lib/myapp")?)
///     .build()?;
///
/// tracker.user().identify("1000", "test@example.com")
///     .data("first_name", "Damien")
///     .send()
///     .await?;
///
/// // The identity is remembered, no need to pass it again.
/// tracker.event().track("Viewed product")
///     .data("product_name", "Red T-shirt")
///     .send()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct Tracker {
    config: Config,
    environment: Environment,
    transport: HttpTransport,
    identity_store: Option<Arc<dyn IdentityStore>>,
    site_visited_store: Option<Arc<dyn SiteVisitedStore>>,
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("config", &self.config)
            .field("environment", &self.environment)
            .field("identity_store", &self.identity_store.is_some())
            .field("site_visited_store", &self.site_visited_store.is_some())
            .finish_non_exhaustive()
    }
}

impl TrackerBuilder {
    /// Build the tracker.
    pub fn build(self) -> Result<Tracker, Error> {
        Tracker::from_builder(self)
    }
}

impl Tracker {
    /// Create a new builder with the given tracking API key.
    pub fn builder(tracking_api_key: impl Into<String>) -> TrackerBuilder {
        TrackerBuilder::new(tracking_api_key)
    }

    pub(crate) fn from_builder(builder: TrackerBuilder) -> Result<Self, Error> {
        let config = builder.build_config()?;
        let transport = HttpTransport::new(&config)?;
        let environment = builder.environment.unwrap_or_default();

        let identity_store = builder
            .identity_store
            .or_else(|| default_identity_store(&environment, config.key_namespace()));
        let site_visited_store = builder
            .site_visited_store
            .or_else(|| default_site_visited_store(&environment, config.key_namespace()));

        debug!(
            base_url = %config.tracking_api_base_url(),
            identity_store = identity_store.is_some(),
            site_visited_store = site_visited_store.is_some(),
            "tracker created"
        );

        Ok(Self {
            config,
            environment,
            transport,
            identity_store,
            site_visited_store,
        })
    }

    /// Get the tracker configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the host environment.
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// The identity store in use, if any.
    pub fn identity_store(&self) -> Option<&Arc<dyn IdentityStore>> {
        self.identity_store.as_ref()
    }

    /// The "visited site" store in use, if any.
    pub fn site_visited_store(&self) -> Option<&Arc<dyn SiteVisitedStore>> {
        self.site_visited_store.as_ref()
    }

    // ============================================
    // NAMESPACES
    // ============================================

    /// User lifecycle methods.
    pub fn user(&self) -> UserMethods<'_> {
        UserMethods { client: self }
    }

    /// Tag methods.
    pub fn tag(&self) -> TagMethods<'_> {
        TagMethods { client: self }
    }

    /// Event methods.
    pub fn event(&self) -> EventMethods<'_> {
        EventMethods { client: self }
    }

    // ============================================
    // USER LIFECYCLE
    // ============================================

    #[instrument(skip_all, fields(user_id = %builder.id))]
    async fn identify(&self, builder: IdentifyBuilder) -> Result<(), Error> {
        let payload = builder.build(&self.environment);
        self.transport
            .send(PATH_USERS_TRACK, Method::POST, &payload)
            .await?;

        if let Some(store) = &self.identity_store {
            store.save(&builder.id, &builder.email);
            info!("identity saved");
        }

        if self.should_track_visited_site(builder.no_site_visit_event, &builder.id) {
            // resolved from the identity saved above
            self.track(TrackBuilder::new(VISITED_SITE_EVENT)).await?;
            self.mark_visited(&builder.id);
        }

        Ok(())
    }

    fn unidentify(&self) {
        let Some(store) = &self.identity_store else {
            return;
        };

        let user_id = store.get().map(|identity| identity.user_id);
        store.clear();

        if let Some(user_id) = user_id {
            if let Some(visited) = &self.site_visited_store {
                visited.clear(&user_id);
            }
            info!(user_id = %user_id, "identity cleared");
        }
    }

    #[instrument(skip_all, fields(new_id = %builder.new_id()))]
    async fn alias(&self, builder: AliasBuilder) -> Result<(), Error> {
        let user_id = self.resolve_user_id(builder.user_id.as_deref())?;
        self.transport
            .send(PATH_USERS_REIDENTIFY, Method::PUT, &builder.build(&user_id))
            .await?;

        if let Some(store) = &self.identity_store {
            if let Some(stored) = store.get() {
                if stored.user_id == user_id {
                    store.save(builder.new_id(), &stored.email);
                    info!(user_id = %user_id, "stored identity aliased");
                }
            }
        }

        Ok(())
    }

    #[instrument(skip(self, user_id))]
    async fn user_action(&self, action: UserAction, user_id: Option<&str>) -> Result<(), Error> {
        let user_id = self.resolve_user_id(user_id)?;
        let payload = UserPayload {
            id: user_id.clone(),
        };
        self.transport
            .send(action.path(), Method::POST, &payload)
            .await?;

        if action == UserAction::Delete && self.stored_user_id().as_deref() == Some(user_id.as_str()) {
            self.unidentify();
        }

        Ok(())
    }

    // ============================================
    // TAGS
    // ============================================

    #[instrument(skip_all)]
    async fn edit_tags(&self, builder: TagEditBuilder) -> Result<(), Error> {
        let user_id = self.resolve_user_id(builder.user_id.as_deref())?;
        self.transport
            .send(PATH_TAGS_EDIT, Method::PUT, &builder.build(&user_id))
            .await
    }

    // ============================================
    // EVENTS
    // ============================================

    #[instrument(skip_all, fields(event_name = %builder.event_name))]
    async fn track(&self, builder: TrackBuilder) -> Result<(), Error> {
        let identity = match builder.identity.clone() {
            Some(identity) => identity,
            None => self.stored_identity().ok_or(Error::NoIdentity)?,
        };

        if self.should_track_visited_site(builder.no_site_visit_event, &identity.user_id)
            && !is_visited_site_event(&builder.event_name)
        {
            let visit = TrackBuilder::new(VISITED_SITE_EVENT).build(&identity, &self.environment);
            self.transport
                .send(PATH_EVENTS_TRACK, Method::POST, &visit)
                .await?;
            self.mark_visited(&identity.user_id);
        }

        let payload = builder.build(&identity, &self.environment);
        self.transport
            .send(PATH_EVENTS_TRACK, Method::POST, &payload)
            .await?;

        if let Some(store) = &self.identity_store {
            match store.get() {
                Some(stored) if stored.user_id != identity.user_id => {
                    debug!("stored identity belongs to another user, leaving it");
                }
                _ => store.save(&identity.user_id, &identity.email),
            }
        }

        Ok(())
    }

    // ============================================
    // INTERNAL
    // ============================================

    fn stored_identity(&self) -> Option<Identity> {
        self.identity_store.as_ref().and_then(|store| store.get())
    }

    fn stored_user_id(&self) -> Option<String> {
        self.stored_identity().map(|identity| identity.user_id)
    }

    /// Explicit non-empty id, else the stored identity's id.
    fn resolve_user_id(&self, explicit: Option<&str>) -> Result<String, Error> {
        match explicit {
            Some(user_id) if !user_id.is_empty() => Ok(user_id.to_string()),
            _ => self.stored_user_id().ok_or(Error::NoIdentity),
        }
    }

    fn should_track_visited_site(&self, no_site_visit_event: bool, user_id: &str) -> bool {
        match &self.site_visited_store {
            Some(store) => !no_site_visit_event && !store.has_visited(user_id),
            None => false,
        }
    }

    fn mark_visited(&self, user_id: &str) {
        if let Some(store) = &self.site_visited_store {
            store.set_visited(user_id);
            debug!(user_id = %user_id, "marked site visited");
        }
    }
}

fn default_identity_store(
    env: &Environment,
    key_namespace: &str,
) -> Option<Arc<dyn IdentityStore>> {
    if !env.is_browser() {
        debug!("no storage media, identities will not be stored");
        return None;
    }
    match LocalIdentityStore::new(env, key_namespace) {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
            error!(error = %e, "unable to create LocalIdentityStore, no identities will be stored");
            None
        }
    }
}

fn default_site_visited_store(
    env: &Environment,
    key_namespace: &str,
) -> Option<Arc<dyn SiteVisitedStore>> {
    if !env.is_browser() {
        debug!("no storage media, no site visited events will be tracked");
        return None;
    }
    match SessionSiteVisitedStore::new(env, key_namespace) {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
            error!(
                error = %e,
                "unable to create SessionSiteVisitedStore, no site visited events will be tracked"
            );
            None
        }
    }
}

/// Single-user endpoints sharing the `{id}` body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UserAction {
    Unsubscribe,
    Resubscribe,
    Delete,
}

impl UserAction {
    fn path(self) -> &'static str {
        match self {
            UserAction::Unsubscribe => PATH_USERS_UNSUBSCRIBE,
            UserAction::Resubscribe => PATH_USERS_RESUBSCRIBE,
            UserAction::Delete => PATH_USERS_DELETE,
        }
    }
}

// ============================================
// SENDABLE WRAPPERS
// ============================================

/// Sendable identify request.
pub struct SendableIdentify<'a> {
    builder: IdentifyBuilder,
    client: &'a Tracker,
}

impl<'a> SendableIdentify<'a> {
    /// Add a device channel.
    pub fn channel(mut self, channel: Channel) -> Self {
        self.builder = self.builder.channel(channel);
        self
    }

    /// Add a custom user property.
    pub fn data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.builder = self.builder.data(key, value);
        self
    }

    /// Skip the implicit "Visited site" event.
    pub fn no_site_visit_event(mut self) -> Self {
        self.builder = self.builder.no_site_visit_event();
        self
    }

    /// Send the request.
    pub async fn send(self) -> Result<(), Error> {
        self.client.identify(self.builder).await
    }
}

/// Sendable alias request.
pub struct SendableAlias<'a> {
    builder: AliasBuilder,
    client: &'a Tracker,
}

impl<'a> SendableAlias<'a> {
    /// Alias this user instead of the stored one.
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.builder = self.builder.user_id(user_id);
        self
    }

    /// Send the request.
    pub async fn send(self) -> Result<(), Error> {
        self.client.alias(self.builder).await
    }
}

/// Sendable unsubscribe, resubscribe or delete request.
pub struct SendableUserAction<'a> {
    action: UserAction,
    user_id: Option<String>,
    client: &'a Tracker,
}

impl<'a> SendableUserAction<'a> {
    /// Act on this user instead of the stored one.
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Send the request.
    pub async fn send(self) -> Result<(), Error> {
        self.client
            .user_action(self.action, self.user_id.as_deref())
            .await
    }
}

/// Sendable tag edit request.
pub struct SendableTagEdit<'a> {
    builder: TagEditBuilder,
    client: &'a Tracker,
}

impl<'a> SendableTagEdit<'a> {
    /// Edit this user's tags instead of the stored user's.
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.builder = self.builder.user_id(user_id);
        self
    }

    /// Add a tag.
    pub fn add(mut self, tag: impl Into<String>) -> Self {
        self.builder = self.builder.add(tag);
        self
    }

    /// Remove a tag.
    pub fn remove(mut self, tag: impl Into<String>) -> Self {
        self.builder = self.builder.remove(tag);
        self
    }

    /// Send the request.
    pub async fn send(self) -> Result<(), Error> {
        self.client.edit_tags(self.builder).await
    }
}

/// Sendable event.
pub struct SendableTrack<'a> {
    builder: TrackBuilder,
    client: &'a Tracker,
}

impl<'a> SendableTrack<'a> {
    /// Track against this identity instead of the stored one.
    pub fn identity(mut self, identity: Identity) -> Self {
        self.builder = self.builder.identity(identity);
        self
    }

    /// Add an event property.
    pub fn data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.builder = self.builder.data(key, value);
        self
    }

    /// Set the reserved `source` property.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.builder = self.builder.source(source);
        self
    }

    /// Set the reserved `created_at` property.
    pub fn created_at(mut self, created_at: impl Into<String>) -> Self {
        self.builder = self.builder.created_at(created_at);
        self
    }

    /// Skip the implicit "Visited site" event.
    pub fn no_site_visit_event(mut self) -> Self {
        self.builder = self.builder.no_site_visit_event();
        self
    }

    /// Send the event.
    pub async fn send(self) -> Result<(), Error> {
        self.client.track(self.builder).await
    }
}

// ============================================
// NAMESPACE METHODS
// ============================================

/// User lifecycle methods.
pub struct UserMethods<'a> {
    client: &'a Tracker,
}

impl<'a> UserMethods<'a> {
    /// Create or update a user profile and remember the user.
    ///
    /// Unless disabled with `no_site_visit_event()`, a "Visited site" event is
    /// tracked afterwards if none was tracked for this user in the session.
    pub fn identify(&self, id: impl Into<String>, email: impl Into<String>) -> SendableIdentify<'a> {
        SendableIdentify {
            builder: IdentifyBuilder::new(id, email),
            client: self.client,
        }
    }

    /// Forget the stored user, e.g. on logout. Does not delete the user in Vero.
    pub fn unidentify(&self) {
        self.client.unidentify()
    }

    /// Change a user's id to `new_id`.
    pub fn alias(&self, new_id: impl Into<String>) -> SendableAlias<'a> {
        SendableAlias {
            builder: AliasBuilder::new(new_id),
            client: self.client,
        }
    }

    /// Unsubscribe a user globally.
    pub fn unsubscribe(&self) -> SendableUserAction<'a> {
        self.action(UserAction::Unsubscribe)
    }

    /// Resubscribe a user globally.
    pub fn resubscribe(&self) -> SendableUserAction<'a> {
        self.action(UserAction::Resubscribe)
    }

    /// Delete a user. Deleting the stored user also unidentifies it.
    pub fn delete(&self) -> SendableUserAction<'a> {
        self.action(UserAction::Delete)
    }

    fn action(&self, action: UserAction) -> SendableUserAction<'a> {
        SendableUserAction {
            action,
            user_id: None,
            client: self.client,
        }
    }
}

/// Tag methods.
pub struct TagMethods<'a> {
    client: &'a Tracker,
}

impl<'a> TagMethods<'a> {
    /// Add tags to or remove tags from a user's profile.
    pub fn edit(&self) -> SendableTagEdit<'a> {
        SendableTagEdit {
            builder: TagEditBuilder::new(),
            client: self.client,
        }
    }
}

/// Event methods.
pub struct EventMethods<'a> {
    client: &'a Tracker,
}

impl<'a> EventMethods<'a> {
    /// Track an event.
    ///
    /// Event names are matched case-insensitively by Vero, with underscores
    /// and spaces treated the same.
    pub fn track(&self, event_name: impl Into<String>) -> SendableTrack<'a> {
        SendableTrack {
            builder: TrackBuilder::new(event_name),
            client: self.client,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn browser_env() -> Environment {
        Environment::builder()
            .local_storage(Arc::new(MemoryStorage::new()))
            .session_storage(Arc::new(MemoryStorage::new()))
            .build()
    }

    #[test]
    fn test_headless_has_no_default_stores() {
        let tracker = Tracker::builder("key").build().unwrap();

        assert!(tracker.identity_store().is_none());
        assert!(tracker.site_visited_store().is_none());
    }

    #[test]
    fn test_browser_gets_default_stores() {
        let tracker = Tracker::builder("key")
            .environment(browser_env())
            .build()
            .unwrap();

        assert!(tracker.identity_store().is_some());
        assert!(tracker.site_visited_store().is_some());
    }

    #[test]
    fn test_missing_medium_degrades() {
        // session storage only: no durable identity store
        let env = Environment::builder()
            .session_storage(Arc::new(MemoryStorage::new()))
            .build();
        let tracker = Tracker::builder("key").environment(env).build().unwrap();

        assert!(tracker.identity_store().is_none());
        assert!(tracker.site_visited_store().is_some());
    }

    #[test]
    fn test_resolve_user_id() {
        let tracker = Tracker::builder("key")
            .environment(browser_env())
            .build()
            .unwrap();

        assert!(matches!(
            tracker.resolve_user_id(None),
            Err(Error::NoIdentity)
        ));
        assert_eq!(tracker.resolve_user_id(Some("1")).unwrap(), "1");

        tracker.identity_store().unwrap().save("2", "b@c.d");
        assert_eq!(tracker.resolve_user_id(None).unwrap(), "2");
        // empty explicit id falls back to the stored one
        assert_eq!(tracker.resolve_user_id(Some("")).unwrap(), "2");
    }

    #[test]
    fn test_unidentify_clears_visit_marker() {
        let tracker = Tracker::builder("key")
            .environment(browser_env())
            .build()
            .unwrap();
        let identities = tracker.identity_store().unwrap();
        let visits = tracker.site_visited_store().unwrap();

        identities.save("1", "a@b.c");
        visits.set_visited("1");

        tracker.user().unidentify();
        assert!(identities.get().is_none());
        assert!(!visits.has_visited("1"));

        tracker.user().unidentify();
        assert!(identities.get().is_none());
    }

    #[test]
    fn test_should_track_visited_site() {
        let tracker = Tracker::builder("key")
            .environment(browser_env())
            .build()
            .unwrap();

        assert!(tracker.should_track_visited_site(false, "1"));
        assert!(!tracker.should_track_visited_site(true, "1"));

        tracker.mark_visited("1");
        assert!(!tracker.should_track_visited_site(false, "1"));
        assert!(tracker.should_track_visited_site(false, "2"));
    }
}
