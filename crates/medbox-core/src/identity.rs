//! Authenticated principal types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier assigned to a principal by the identity provider.
///
/// The client never interprets the contents; it only compares ids for
/// equality and uses them as document keys and owner scopes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityId(String);

impl IdentityId {
    /// Wrap a raw provider-assigned id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An authenticated principal supplied by the identity gateway.
///
/// Created on successful authentication, destroyed on sign-out. Owned
/// exclusively by the session resolver and exposed read-only downstream;
/// never persisted beyond process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Provider-assigned id.
    pub id: IdentityId,
    /// Email the principal authenticated with.
    pub email: String,
}

impl Identity {
    /// Create an identity from its provider-assigned parts.
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self { id: IdentityId::new(id), email: email.into() }
    }
}
