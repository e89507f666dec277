// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session state passed explicitly to the synchronizer.

use crate::models::User;

/// Auth provider session as seen by the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    /// The provider has not settled yet; do not reconcile.
    Loading,
    SignedOut,
    SignedIn(User),
}

impl Session {
    pub fn user(&self) -> Option<&User> {
        match self {
            Session::SignedIn(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Session::Loading)
    }
}

impl From<Option<User>> for Session {
    fn from(user: Option<User>) -> Self {
        match user {
            Some(user) => Session::SignedIn(user),
            None => Session::SignedOut,
        }
    }
}
