//! Request builders for fluent API.

use crate::environment::Environment;
use crate::types::{
    Channel, EventExtras, EventTrackPayload, ExtrasPayload, Identity, IdentifyPayload,
    IdentityPayload, ReidentifyPayload, TagEditPayload,
};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

/// Name of the implicit once-per-session event.
pub const VISITED_SITE_EVENT: &str = "Visited site";

/// Get the current time as an ISO 8601 UTC string with milliseconds.
fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Whether `event_name` names the "visited site" event.
///
/// Case is ignored and underscores match spaces, as on the backend.
pub fn is_visited_site_event(event_name: &str) -> bool {
    event_name.to_lowercase().replace('_', " ") == "visited site"
}

/// Merge caller data with reserved environment data. Reserved keys win.
fn merge_reserved(mut data: Map<String, Value>, env: &Environment) -> Map<String, Value> {
    data.extend(env.reserved_user_data());
    data
}

// ============================================
// IDENTIFY BUILDER
// ============================================

/// Builder for profile upserts.
#[derive(Debug)]
pub struct IdentifyBuilder {
    pub(crate) id: String,
    pub(crate) email: String,
    channels: Vec<Channel>,
    data: Map<String, Value>,
    pub(crate) no_site_visit_event: bool,
}

impl IdentifyBuilder {
    pub(crate) fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            channels: Vec::new(),
            data: Map::new(),
            no_site_visit_event: false,
        }
    }

    /// Add a device channel.
    pub fn channel(mut self, channel: Channel) -> Self {
        self.channels.push(channel);
        self
    }

    /// Add a custom user property.
    pub fn data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Skip the implicit "Visited site" event.
    pub fn no_site_visit_event(mut self) -> Self {
        self.no_site_visit_event = true;
        self
    }

    /// Build the request body.
    pub(crate) fn build(&self, env: &Environment) -> IdentifyPayload {
        IdentifyPayload {
            id: self.id.clone(),
            email: self.email.clone(),
            channels: self.channels.clone(),
            data: merge_reserved(self.data.clone(), env),
        }
    }
}

// ============================================
// ALIAS BUILDER
// ============================================

/// Builder for user id changes.
#[derive(Debug)]
pub struct AliasBuilder {
    pub(crate) user_id: Option<String>,
    new_id: String,
}

impl AliasBuilder {
    pub(crate) fn new(new_id: impl Into<String>) -> Self {
        Self {
            user_id: None,
            new_id: new_id.into(),
        }
    }

    /// Alias this user instead of the stored one.
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Build the request body for the resolved acting user.
    pub(crate) fn build(&self, user_id: &str) -> ReidentifyPayload {
        ReidentifyPayload {
            id: user_id.into(),
            new_id: self.new_id.clone(),
        }
    }

    pub(crate) fn new_id(&self) -> &str {
        &self.new_id
    }
}

// ============================================
// TAG EDIT BUILDER
// ============================================

/// Builder for tag edits.
#[derive(Debug, Default)]
pub struct TagEditBuilder {
    pub(crate) user_id: Option<String>,
    add: Vec<String>,
    remove: Vec<String>,
}

impl TagEditBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Edit this user's tags instead of the stored user's.
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Add a tag.
    pub fn add(mut self, tag: impl Into<String>) -> Self {
        self.add.push(tag.into());
        self
    }

    /// Remove a tag.
    pub fn remove(mut self, tag: impl Into<String>) -> Self {
        self.remove.push(tag.into());
        self
    }

    /// Build the request body for the resolved acting user.
    pub(crate) fn build(&self, user_id: &str) -> TagEditPayload {
        TagEditPayload {
            id: user_id.into(),
            add: self.add.clone(),
            remove: self.remove.clone(),
        }
    }
}

// ============================================
// TRACK BUILDER
// ============================================

/// Builder for events.
#[derive(Debug)]
pub struct TrackBuilder {
    pub(crate) event_name: String,
    pub(crate) identity: Option<Identity>,
    data: Map<String, Value>,
    extras: EventExtras,
    pub(crate) no_site_visit_event: bool,
}

impl TrackBuilder {
    pub(crate) fn new(event_name: impl Into<String>) -> Self {
        Self {
            event_name: event_name.into(),
            identity: None,
            data: Map::new(),
            extras: EventExtras::default(),
            no_site_visit_event: false,
        }
    }

    /// Track against this identity instead of the stored one.
    pub fn identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Add an event property.
    pub fn data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Set the reserved `source` property. Defaults to the hostname.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.extras.source = Some(source.into());
        self
    }

    /// Set the reserved `created_at` property, e.g. `2023-05-30T04:46:31+0000`.
    /// Defaults to now.
    pub fn created_at(mut self, created_at: impl Into<String>) -> Self {
        self.extras.created_at = Some(created_at.into());
        self
    }

    /// Skip the implicit "Visited site" event.
    pub fn no_site_visit_event(mut self) -> Self {
        self.no_site_visit_event = true;
        self
    }

    /// Build the request body for the resolved identity.
    pub(crate) fn build(&self, identity: &Identity, env: &Environment) -> EventTrackPayload {
        EventTrackPayload {
            identity: IdentityPayload::from(identity),
            event_name: self.event_name.clone(),
            data: merge_reserved(self.data.clone(), env),
            extras: ExtrasPayload {
                source: self
                    .extras
                    .source
                    .clone()
                    .or_else(|| env.hostname().map(String::from)),
                created_at: self.extras.created_at.clone().unwrap_or_else(now_iso),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn browser_env() -> Environment {
        Environment::builder()
            .hostname("www.example.com")
            .language("en")
            .build()
    }

    #[test]
    fn test_is_visited_site_event() {
        assert!(is_visited_site_event("Visited site"));
        assert!(is_visited_site_event("visited_site"));
        assert!(is_visited_site_event("VISITED SITE"));
        assert!(is_visited_site_event("Visited_Site"));
        assert!(!is_visited_site_event("Visited site page"));
        assert!(!is_visited_site_event("Purchase"));
    }

    #[test]
    fn test_identify_builder() {
        let payload = IdentifyBuilder::new("1", "a@b.c")
            .channel(Channel::new("push", "token", "ios"))
            .data("first_name", "Damien")
            .data("age", 30)
            .build(&Environment::headless());

        assert_eq!(payload.id, "1");
        assert_eq!(payload.email, "a@b.c");
        assert_eq!(payload.channels.len(), 1);
        assert_eq!(payload.data["first_name"], "Damien");
        assert_eq!(payload.data["age"], 30);
    }

    #[test]
    fn test_reserved_data_wins_on_collision() {
        let payload = IdentifyBuilder::new("1", "a@b.c")
            .data("a", 1)
            .data("language", "fr")
            .build(&browser_env());

        assert_eq!(
            Value::Object(payload.data),
            json!({"a": 1, "language": "en"})
        );
    }

    #[test]
    fn test_alias_builder() {
        let builder = AliasBuilder::new("2").user_id("1");
        assert_eq!(builder.user_id.as_deref(), Some("1"));

        let payload = builder.build("1");
        assert_eq!(payload.id, "1");
        assert_eq!(payload.new_id, "2");
    }

    #[test]
    fn test_tag_edit_builder_defaults_to_empty_lists() {
        let payload = TagEditBuilder::new().build("1");
        assert!(payload.add.is_empty());
        assert!(payload.remove.is_empty());

        let payload = TagEditBuilder::new().add("a").add("b").remove("c").build("1");
        assert_eq!(payload.add, vec!["a", "b"]);
        assert_eq!(payload.remove, vec!["c"]);
    }

    #[test]
    fn test_track_builder_defaults_extras_from_environment() {
        let identity = Identity::new("1", "a@b.c");
        let payload = TrackBuilder::new("Purchase")
            .data("a", 1)
            .build(&identity, &browser_env());

        assert_eq!(payload.event_name, "Purchase");
        assert_eq!(payload.identity.id, "1");
        assert_eq!(Value::Object(payload.data), json!({"a": 1, "language": "en"}));
        assert_eq!(payload.extras.source.as_deref(), Some("www.example.com"));
        assert!(chrono::DateTime::parse_from_rfc3339(&payload.extras.created_at).is_ok());
        assert!(payload.extras.created_at.ends_with('Z'));
    }

    #[test]
    fn test_track_builder_explicit_extras() {
        let identity = Identity::new("1", "a@b.c");
        let payload = TrackBuilder::new("Purchase")
            .source("Segment.com")
            .created_at("2023-05-30T04:46:31+0000")
            .build(&identity, &browser_env());

        assert_eq!(payload.extras.source.as_deref(), Some("Segment.com"));
        assert_eq!(payload.extras.created_at, "2023-05-30T04:46:31+0000");
    }

    #[test]
    fn test_track_builder_headless_has_no_source() {
        let identity = Identity::new("1", "a@b.c");
        let payload = TrackBuilder::new("Purchase").build(&identity, &Environment::headless());

        assert!(payload.extras.source.is_none());
        assert!(payload.data.is_empty());
    }
}
