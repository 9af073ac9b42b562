//! Profile and onboarding-secret documents.
//!
//! One profile document exists per identity, keyed by the identity id. It is
//! created once at onboarding and is immutable afterwards. The patient
//! secret is stored alongside it under a separate key, also write-once.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::env::Environment;

/// Recognized account roles.
///
/// A profile whose stored role string does not parse into this enum is an
/// explicit unrecognized-role condition, surfaced to the user; it is never
/// treated as a missing profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// A patient with a medication box and consultation history.
    Patient,
}

impl Role {
    /// Stable string form stored in profile documents.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Patient => "patient",
        }
    }
}

/// A profile document carried a role string this client does not know.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognized role: {0:?}")]
pub struct UnrecognizedRole(pub String);

impl FromStr for Role {
    type Err = UnrecognizedRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(Role::Patient),
            other => Err(UnrecognizedRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human-facing display id assigned at onboarding (`MB-` + 6 base36 chars).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MedboxId(String);

/// Alphabet for the generated suffix.
const MEDBOX_ID_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Length of the generated suffix.
const MEDBOX_ID_SUFFIX_LEN: usize = 6;

impl MedboxId {
    /// Generate a fresh display id from environment randomness.
    ///
    /// Locally unique in practice; collisions are as likely as a 6-char
    /// base36 birthday collision and the id is display-only, never a key.
    pub fn generate(env: &impl Environment) -> Self {
        let mut raw = [0u8; MEDBOX_ID_SUFFIX_LEN];
        env.random_bytes(&mut raw);
        let suffix: String = raw
            .iter()
            .map(|b| MEDBOX_ID_ALPHABET[*b as usize % MEDBOX_ID_ALPHABET.len()] as char)
            .collect();
        Self(format!("MB-{suffix}"))
    }

    /// Raw display string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MedboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque derived form of a PIN.
///
/// The clear PIN exists only transiently during onboarding submission; only
/// this derivative is ever stored. The `Debug` form does not reveal the
/// value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretHash(String);

impl SecretHash {
    /// Wrap an already-derived hash string.
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Derived hash string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretHash(..)")
    }
}

/// Wire form of a profile document, as stored.
///
/// The role is kept as a string so that documents written by newer clients
/// with roles this build does not know still decode; role recognition
/// happens in [`ProfileRecord::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    /// Stored role string.
    pub role: String,
    /// Display name chosen at onboarding.
    pub name: String,
    /// Display id assigned at onboarding.
    pub medbox_id: MedboxId,
}

impl ProfileRecord {
    /// Validate the stored role and produce the typed profile.
    pub fn validate(self) -> Result<Profile, UnrecognizedRole> {
        let role = self.role.parse()?;
        Ok(Profile { role, name: self.name, medbox_id: self.medbox_id })
    }
}

/// A validated profile: the role-defining document resolved for an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Recognized role.
    pub role: Role,
    /// Display name.
    pub name: String,
    /// Display id.
    pub medbox_id: MedboxId,
}

impl Profile {
    /// Wire form for storage.
    pub fn to_record(&self) -> ProfileRecord {
        ProfileRecord {
            role: self.role.as_str().to_string(),
            name: self.name.clone(),
            medbox_id: self.medbox_id.clone(),
        }
    }
}

/// Patient-specific secret document written once at onboarding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientSecret {
    /// Display name snapshot taken at onboarding.
    pub name: String,
    /// Display id snapshot taken at onboarding.
    pub medbox_id: MedboxId,
    /// Derived PIN, never the clear value.
    pub pin_hash: SecretHash,
    /// Insurer reference; unset until an insurer links the account.
    pub insurer_id: Option<String>,
}
