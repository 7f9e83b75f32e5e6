//! Request types and wire payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A known user in the local environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    pub email: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
        }
    }
}

/// A device token attached to a user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// e.g. `push`
    #[serde(rename = "type")]
    pub channel_type: String,
    /// e.g. the device token
    pub address: String,
    /// e.g. `android`
    pub platform: String,
}

impl Channel {
    pub fn new(
        channel_type: impl Into<String>,
        address: impl Into<String>,
        platform: impl Into<String>,
    ) -> Self {
        Self {
            channel_type: channel_type.into(),
            address: address.into(),
            platform: platform.into(),
        }
    }
}

/// Reserved `source` and `created_at` event properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventExtras {
    pub source: Option<String>,
    pub created_at: Option<String>,
}

/// Body of `POST /users/track`.
#[derive(Debug, Clone, Serialize)]
pub struct IdentifyPayload {
    pub id: String,
    pub email: String,
    pub channels: Vec<Channel>,
    pub data: Map<String, Value>,
}

/// Body of `PUT /users/reidentify`.
#[derive(Debug, Clone, Serialize)]
pub struct ReidentifyPayload {
    pub id: String,
    pub new_id: String,
}

/// Body of the single-user endpoints (unsubscribe, resubscribe, delete).
#[derive(Debug, Clone, Serialize)]
pub struct UserPayload {
    pub id: String,
}

/// Body of `PUT /users/tags/edit`.
#[derive(Debug, Clone, Serialize)]
pub struct TagEditPayload {
    pub id: String,
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

/// Identity as it appears inside an event body.
#[derive(Debug, Clone, Serialize)]
pub struct IdentityPayload {
    pub id: String,
    pub email: String,
}

impl From<&Identity> for IdentityPayload {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.user_id.clone(),
            email: identity.email.clone(),
        }
    }
}

/// Extras as they appear inside an event body.
#[derive(Debug, Clone, Serialize)]
pub struct ExtrasPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub created_at: String,
}

/// Body of `POST /events/track`.
#[derive(Debug, Clone, Serialize)]
pub struct EventTrackPayload {
    pub identity: IdentityPayload,
    pub event_name: String,
    pub data: Map<String, Value>,
    pub extras: ExtrasPayload,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_channel_type_field_name() {
        let channel = Channel::new("push", "token-123", "android");
        let json = serde_json::to_value(&channel).unwrap();

        assert_eq!(
            json,
            json!({"type": "push", "address": "token-123", "platform": "android"})
        );
    }

    #[test]
    fn test_source_omitted_when_none() {
        let payload = EventTrackPayload {
            identity: IdentityPayload {
                id: "1".into(),
                email: "a@b.c".into(),
            },
            event_name: "test".into(),
            data: Map::new(),
            extras: ExtrasPayload {
                source: None,
                created_at: "2023-05-30T04:46:31.000Z".into(),
            },
        };

        let json = serde_json::to_value(&payload).unwrap();

        assert!(json["extras"].get("source").is_none());
        assert_eq!(json["extras"]["created_at"], "2023-05-30T04:46:31.000Z");
    }

    #[test]
    fn test_identity_payload_from_identity() {
        let payload = IdentityPayload::from(&Identity::new("1", "a@b.c"));
        assert_eq!(payload.id, "1");
        assert_eq!(payload.email, "a@b.c");
    }
}
