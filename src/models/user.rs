//! Signed-in user identity.

use serde::{Deserialize, Serialize};

/// User identity supplied by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Auth provider UID (scopes remote queries and local cache keys)
    pub uid: String,
    /// Email address (may be None if the provider does not share it)
    pub email: Option<String>,
    /// Display name
    pub name: String,
}

impl User {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            name: String::new(),
        }
    }

    /// Whether the identity is usable for scoping.
    pub fn has_uid(&self) -> bool {
        !self.uid.trim().is_empty()
    }
}
