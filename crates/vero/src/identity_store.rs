//! Persistence of the currently identified user.

use crate::environment::Environment;
use crate::storage::Storage;
use crate::types::Identity;
use crate::Error;
use std::sync::Arc;

/// Stores the `(user_id, email)` pair of the current user.
///
/// Implement this to keep identities somewhere other than the environment's
/// local storage, e.g. per request in a server or in an OS keychain.
pub trait IdentityStore: Send + Sync {
    /// Overwrite the stored identity.
    fn save(&self, user_id: &str, email: &str);

    /// The stored identity, only if both fields are present and non-empty.
    fn get(&self) -> Option<Identity>;

    /// Remove the stored identity. No-op when nothing is stored.
    fn clear(&self);
}

/// [`IdentityStore`] over the environment's durable local storage.
pub struct LocalIdentityStore {
    storage: Arc<dyn Storage>,
    user_id_key: String,
    email_key: String,
}

impl LocalIdentityStore {
    /// Create a store in the environment's local storage.
    ///
    /// Fails if the environment has no local storage.
    pub fn new(env: &Environment, key_namespace: &str) -> Result<Self, Error> {
        let storage = env.local_storage().cloned().ok_or_else(|| {
            Error::Environment("local storage is not available in this environment".into())
        })?;
        Ok(Self::with_storage(storage, key_namespace))
    }

    /// Create a store over an explicit storage medium.
    pub fn with_storage(storage: Arc<dyn Storage>, key_namespace: &str) -> Self {
        Self {
            storage,
            user_id_key: format!("{}:__vero_tracking_user_id", key_namespace),
            email_key: format!("{}:__vero_tracking_email", key_namespace),
        }
    }
}

impl IdentityStore for LocalIdentityStore {
    fn save(&self, user_id: &str, email: &str) {
        self.storage.set_item(&self.user_id_key, user_id);
        self.storage.set_item(&self.email_key, email);
    }

    fn get(&self) -> Option<Identity> {
        let user_id = self.storage.get_item(&self.user_id_key)?;
        let email = self.storage.get_item(&self.email_key)?;
        if user_id.is_empty() || email.is_empty() {
            return None;
        }
        Some(Identity { user_id, email })
    }

    fn clear(&self) {
        self.storage.remove_item(&self.user_id_key);
        self.storage.remove_item(&self.email_key);
    }
}
